use crate::domain::row::{OrderStatus, Row, RowError, RowErrorCode, ValidatedOrder};
use crate::domain::snapshot::CatalogSnapshot;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static ORDER_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Validates one row against the catalog snapshot and the set of order
/// numbers already accepted earlier in this batch, applying the rules in
/// `spec.md` §4.D in order so that the first failure determines the
/// reported code. `seen` is initialised from `snapshot.existing_order_numbers`
/// by the caller and is mutated on success, so within a single batch the
/// first copy of a duplicate order number is accepted and the second is
/// rejected.
pub fn validate_row(
    row: &Row,
    snapshot: &CatalogSnapshot,
    seen: &mut HashSet<String>,
    today: NaiveDate,
) -> Result<ValidatedOrder, RowError> {
    let err = |code, message: String| RowError::new(row.line_number, code, message);

    if row.order_number.is_empty() || !ORDER_NUMBER_PATTERN.is_match(&row.order_number) {
        return Err(err(
            RowErrorCode::OrderNumberInvalid,
            format!("'{}' is not a valid order number", row.order_number),
        ));
    }

    if seen.contains(&row.order_number) {
        return Err(err(
            RowErrorCode::OrderDuplicate,
            format!("order number '{}' was already used", row.order_number),
        ));
    }

    if row.client_id.is_empty() || !snapshot.active_clients.contains(&row.client_id) {
        return Err(err(
            RowErrorCode::ClientNotFound,
            format!("client '{}' is not an active client", row.client_id),
        ));
    }

    let status: OrderStatus = row.status.parse().map_err(|_| {
        err(
            RowErrorCode::StatusInvalid,
            format!("'{}' is not a valid status", row.status),
        )
    })?;

    if row.zone_id.is_empty() {
        return Err(err(
            RowErrorCode::ZoneNotFound,
            format!("zone '{}' is not a known zone", row.zone_id),
        ));
    }
    let zone_supports_refrigeration = match snapshot.zones.get(&row.zone_id) {
        Some(supports_refrigeration) => *supports_refrigeration,
        None => {
            return Err(err(
                RowErrorCode::ZoneNotFound,
                format!("zone '{}' is not a known zone", row.zone_id),
            ))
        }
    };

    if row.requires_refrigeration && !zone_supports_refrigeration {
        return Err(err(
            RowErrorCode::ColdChainUnsupported,
            format!("zone '{}' does not support refrigeration", row.zone_id),
        ));
    }

    let delivery_date = NaiveDate::parse_from_str(&row.delivery_date, "%Y-%m-%d").map_err(|_| {
        err(
            RowErrorCode::DeliveryDatePast,
            format!("'{}' is not a valid date", row.delivery_date),
        )
    })?;

    if delivery_date < today {
        return Err(err(
            RowErrorCode::DeliveryDatePast,
            format!("delivery date {delivery_date} is in the past"),
        ));
    }

    seen.insert(row.order_number.clone());

    Ok(ValidatedOrder {
        order_number: row.order_number.clone(),
        client_id: row.client_id.clone(),
        delivery_date,
        status,
        zone_id: row.zone_id.clone(),
        requires_refrigeration: row.requires_refrigeration,
    })
}
