use std::fmt;

use chrono::{Datelike, Duration, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Declares a string-backed identifier newtype.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

pub mod blocked_slot;
pub mod listing;
pub mod notification;
pub mod order;
pub mod party;
pub mod quote;
pub mod reservation;
pub mod review;

/// The aggregates the engine reads and writes, used to label errors and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Listing,
    Quote,
    Reservation,
    Order,
    Delivery,
    BlockedSlot,
    Review,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Quote => "quote",
            Self::Reservation => "reservation",
            Self::Order => "order",
            Self::Delivery => "delivery",
            Self::BlockedSlot => "blocked_slot",
            Self::Review => "review",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest slot any booking or blocked period may cover (366 days).
pub const MAX_DURATION_MINUTES: u32 = 366 * 24 * 60;

/// Last calendar year a slot may reach; stores compute end times with SQL
/// date functions that stop at 9999-12-31.
pub const LAST_CALENDAR_YEAR: i32 = 9999;

/// Rejects empty slots, slots longer than [`MAX_DURATION_MINUTES`] and slots
/// ending after [`LAST_CALENDAR_YEAR`].
pub fn validate_slot(starts_at: NaiveDateTime, duration_minutes: u32) -> Result<(), DomainError> {
    if duration_minutes == 0 {
        return Err(DomainError::Validation("duration must be at least one minute".to_owned()));
    }
    if duration_minutes > MAX_DURATION_MINUTES {
        return Err(DomainError::Validation(format!(
            "duration of {duration_minutes} minutes exceeds the {MAX_DURATION_MINUTES} minute limit"
        )));
    }
    let ends_at = starts_at.checked_add_signed(Duration::minutes(i64::from(duration_minutes)));
    if starts_at.year() < 1 || ends_at.map_or(true, |end| end.year() > LAST_CALENDAR_YEAR) {
        return Err(DomainError::Validation(format!(
            "slot starting {starts_at} falls outside the supported calendar range"
        )));
    }
    Ok(())
}

pub(crate) fn validate_booking_terms(
    starts_at: NaiveDateTime,
    duration_minutes: u32,
    participants: u32,
) -> Result<(), DomainError> {
    validate_slot(starts_at, duration_minutes)?;
    if participants == 0 {
        return Err(DomainError::Validation("participant count must be at least one".to_owned()));
    }
    Ok(())
}

pub(crate) fn validate_price(amount: Decimal, deposit: Decimal) -> Result<(), DomainError> {
    if amount < Decimal::ZERO || deposit < Decimal::ZERO {
        return Err(DomainError::Validation("amount and deposit cannot be negative".to_owned()));
    }
    if deposit > amount {
        return Err(DomainError::Validation(format!(
            "deposit {deposit} cannot exceed the amount {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::{validate_slot, MAX_DURATION_MINUTES};
    use crate::errors::DomainError;

    fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn slot_length_is_bounded() {
        assert!(validate_slot(at(2025, 6, 1, 10), MAX_DURATION_MINUTES).is_ok());
        assert!(matches!(
            validate_slot(at(2025, 6, 1, 10), MAX_DURATION_MINUTES + 1),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(validate_slot(at(2025, 6, 1, 10), u32::MAX), Err(DomainError::Validation(_))));
        assert!(matches!(validate_slot(at(2025, 6, 1, 10), 0), Err(DomainError::Validation(_))));
    }

    #[test]
    fn slot_must_end_within_year_9999() {
        assert!(validate_slot(at(9999, 12, 31, 22), 60).is_ok());
        assert!(matches!(validate_slot(at(9999, 12, 31, 23), 120), Err(DomainError::Validation(_))));
    }
}
