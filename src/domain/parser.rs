use crate::domain::row::Row;
use crate::IngestError;

const EXPECTED_HEADER: [&str; 6] = [
    "orderNumber",
    "clientId",
    "deliveryDate",
    "status",
    "zoneId",
    "requiresRefrigeration",
];

/// Decodes an uploaded tabular blob into a finite ordered sequence of `Row`.
/// Structural failures (missing/mismatched header, no data rows) abort the
/// whole batch before any idempotency reservation occurs.
pub fn parse(bytes: &[u8]) -> Result<Vec<Row>, IngestError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| IngestError::FormatInvalid(format!("upload is not valid UTF-8: {e}")))?;

    let mut lines = text.lines();

    let header_line = lines
        .next()
        .ok_or_else(|| IngestError::FormatInvalid("upload is empty".to_owned()))?;
    let header_fields: Vec<&str> = header_line.split(',').map(|f| f.trim()).collect();
    if header_fields.len() != EXPECTED_HEADER.len() {
        return Err(IngestError::FormatInvalid(format!(
            "expected {} header columns, found {}",
            EXPECTED_HEADER.len(),
            header_fields.len()
        )));
    }
    if header_fields
        .iter()
        .zip(EXPECTED_HEADER.iter())
        .any(|(got, want)| got != want)
    {
        return Err(IngestError::FormatInvalid(format!(
            "header must be `{}`",
            EXPECTED_HEADER.join(",")
        )));
    }

    let mut rows = Vec::new();
    for (offset, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_number = offset + 2;
        let mut fields: Vec<String> = line.split(',').map(|f| f.trim().to_owned()).collect();
        while fields.len() < EXPECTED_HEADER.len() {
            fields.push(String::new());
        }
        rows.push(Row {
            line_number,
            order_number: fields[0].clone(),
            client_id: fields[1].clone(),
            delivery_date: fields[2].clone(),
            status: fields[3].clone(),
            zone_id: fields[4].clone(),
            requires_refrigeration: parse_bool(&fields[5]),
        });
    }

    if rows.is_empty() {
        return Err(IngestError::FormatInvalid(
            "upload contains a header but no data rows".to_owned(),
        ));
    }

    Ok(rows)
}

/// Liberal boolean parsing: case-insensitive, accepts `true|false|1|0|si|sí|no`.
/// Anything else is treated as `false` rather than rejected — the validator,
/// not the parser, is the place row-level correctness is judged.
fn parse_bool(field: &str) -> bool {
    matches!(field.to_lowercase().as_str(), "true" | "1" | "si" | "sí")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> &'static str {
        "orderNumber,clientId,deliveryDate,status,zoneId,requiresRefrigeration"
    }

    #[test]
    fn parses_happy_path() {
        let body = format!("{}\nP001,CLI-1,2099-01-01,PENDING,ZONA1,true\n", header());
        let rows = parse(body.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line_number, 2);
        assert_eq!(rows[0].order_number, "P001");
        assert!(rows[0].requires_refrigeration);
    }

    #[test]
    fn header_only_is_structural_failure() {
        let body = format!("{}\n", header());
        assert!(matches!(
            parse(body.as_bytes()),
            Err(IngestError::FormatInvalid(_))
        ));
    }

    #[test]
    fn wrong_column_count_fails() {
        let body = "orderNumber,clientId,deliveryDate\nP001,CLI-1,2099-01-01\n";
        assert!(matches!(
            parse(body.as_bytes()),
            Err(IngestError::FormatInvalid(_))
        ));
    }

    #[test]
    fn wrong_column_names_fail() {
        let body = "a,b,c,d,e,f\n1,2,3,4,5,6\n";
        assert!(matches!(
            parse(body.as_bytes()),
            Err(IngestError::FormatInvalid(_))
        ));
    }

    #[test]
    fn short_row_is_padded_not_rejected() {
        let body = format!("{}\nP001,CLI-1,2099-01-01,PENDING,ZONA1\n", header());
        let rows = parse(body.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].requires_refrigeration);
    }

    #[test]
    fn trailing_blank_lines_are_skipped() {
        let body = format!(
            "{}\nP001,CLI-1,2099-01-01,PENDING,ZONA1,true\n\n\n",
            header()
        );
        let rows = parse(body.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn boolean_parsing_is_liberal() {
        for (value, expected) in [
            ("true", true),
            ("TRUE", true),
            ("1", true),
            ("si", true),
            ("SI", true),
            ("sí", true),
            ("false", false),
            ("0", false),
            ("no", false),
            ("yes", false),
            ("y", false),
            ("on", false),
        ] {
            assert_eq!(parse_bool(value), expected, "value = {value}");
        }
    }

    #[test]
    fn fields_are_trimmed() {
        let body = format!(
            "{}\n  P001 , CLI-1 , 2099-01-01 , PENDING , ZONA1 , true \n",
            header()
        );
        let rows = parse(body.as_bytes()).unwrap();
        assert_eq!(rows[0].order_number, "P001");
        assert_eq!(rows[0].client_id, "CLI-1");
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let body = format!("{}\r\nP001,CLI-1,2099-01-01,PENDING,ZONA1,true\r\n", header());
        let rows = parse(body.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_number, "P001");
    }

    #[test]
    fn canonicalised_round_trip_reparses_identically() {
        let body = format!(
            "{}\nP001,CLI-1,2099-01-01,PENDING,ZONA1,true\nP002,CLI-2,2099-02-02,CONFIRMED,ZONA2,false\n",
            header()
        );
        let rows = parse(body.as_bytes()).unwrap();

        let mut reemitted = String::from(header());
        reemitted.push('\n');
        for row in &rows {
            reemitted.push_str(&format!(
                "{},{},{},{},{},{}\n",
                row.order_number,
                row.client_id,
                row.delivery_date,
                row.status,
                row.zone_id,
                row.requires_refrigeration
            ));
        }

        let reparsed = parse(reemitted.as_bytes()).unwrap();
        assert_eq!(rows, reparsed);
    }
}
