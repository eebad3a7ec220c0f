use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A single line of the uploaded batch, immutable after parsing. Line
/// numbers are 1-based and start at 2, since line 1 is the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line_number: usize,
    pub order_number: String,
    pub client_id: String,
    pub delivery_date: String,
    pub status: String,
    pub zone_id: String,
    pub requires_refrigeration: bool,
}

/// The three statuses a freshly-submitted order may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Delivered,
}

impl FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            _ => Err(()),
        }
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Delivered => "DELIVERED",
        }
    }
}

/// Produced only by a successful validation of a `Row`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrder {
    pub order_number: String,
    pub client_id: String,
    pub delivery_date: NaiveDate,
    pub status: OrderStatus,
    pub zone_id: String,
    pub requires_refrigeration: bool,
}

/// Stable, machine-readable row validation failure codes. Rules are applied
/// in the declared order of `domain::validator::validate_row`; the first
/// failing rule determines the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowErrorCode {
    OrderNumberInvalid,
    OrderDuplicate,
    ClientNotFound,
    StatusInvalid,
    ZoneNotFound,
    ColdChainUnsupported,
    DeliveryDatePast,
}

impl RowErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowErrorCode::OrderNumberInvalid => "ORDER_NUMBER_INVALID",
            RowErrorCode::OrderDuplicate => "ORDER_DUPLICATE",
            RowErrorCode::ClientNotFound => "CLIENT_NOT_FOUND",
            RowErrorCode::StatusInvalid => "STATUS_INVALID",
            RowErrorCode::ZoneNotFound => "ZONE_NOT_FOUND",
            RowErrorCode::ColdChainUnsupported => "COLD_CHAIN_UNSUPPORTED",
            RowErrorCode::DeliveryDatePast => "DELIVERY_DATE_PAST",
        }
    }
}

/// A single row-level validation failure. Collected, never raised; the
/// batch continues processing the remaining rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line_number: usize,
    pub code: RowErrorCode,
    pub message: String,
}

impl RowError {
    pub fn new(line_number: usize, code: RowErrorCode, message: impl Into<String>) -> Self {
        RowError {
            line_number,
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_parses_case_insensitively() {
        assert_eq!("pending".parse::<OrderStatus>(), Ok(OrderStatus::Pending));
        assert_eq!(
            "CONFIRMED".parse::<OrderStatus>(),
            Ok(OrderStatus::Confirmed)
        );
        assert_eq!(
            "DeLiVeReD".parse::<OrderStatus>(),
            Ok(OrderStatus::Delivered)
        );
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
