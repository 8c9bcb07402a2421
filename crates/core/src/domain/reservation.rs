use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::listing::{Listing, ListingId};
use crate::domain::party::{ClientId, ProviderId};
use crate::domain::quote::QuoteId;
use crate::domain::{validate_booking_terms, validate_price, EntityKind};
use crate::errors::DomainError;

entity_id!(ReservationId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Created from an accepted quote, waiting for the provider.
    #[serde(rename = "tbc")]
    ToBeConfirmed,
    Pending,
    Confirmed,
    Refused,
    Cancelled,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationEvent {
    Confirm,
    Refuse,
    Cancel,
    Finish,
}

impl ReservationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Refuse => "refuse",
            Self::Cancel => "cancel",
            Self::Finish => "finish",
        }
    }
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToBeConfirmed => "tbc",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Refused => "refused",
            Self::Cancelled => "cancelled",
            Self::Finished => "finished",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tbc" => Some(Self::ToBeConfirmed),
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "refused" => Some(Self::Refused),
            "cancelled" => Some(Self::Cancelled),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Refused | Self::Cancelled | Self::Finished)
    }

    pub fn awaits_provider(&self) -> bool {
        matches!(self, Self::ToBeConfirmed | Self::Pending)
    }

    /// Whether the reservation still takes room in the provider's calendar.
    pub fn occupies_calendar(&self) -> bool {
        !matches!(self, Self::Refused | Self::Cancelled)
    }

    /// Whether the reservation is a firm commitment rather than a request.
    pub fn locks_slot(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Finished)
    }

    pub fn apply(self, event: ReservationEvent) -> Result<Self, DomainError> {
        use ReservationEvent::{Cancel, Confirm, Finish, Refuse};
        use ReservationStatus::{Cancelled, Confirmed, Finished, Pending, Refused, ToBeConfirmed};

        match (self, event) {
            (ToBeConfirmed | Pending, Confirm) => Ok(Confirmed),
            (ToBeConfirmed | Pending, Refuse) => Ok(Refused),
            (ToBeConfirmed | Pending, Cancel) => Ok(Cancelled),
            (Confirmed, Finish) => Ok(Finished),
            (status, event) => Err(DomainError::InvalidState {
                entity: EntityKind::Reservation,
                status: status.as_str(),
                action: event.as_str(),
            }),
        }
    }
}

/// A booking the provider enters directly, without a quote.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectBooking {
    pub client_id: ClientId,
    pub listing_id: ListingId,
    pub starts_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub place: String,
    pub participants: u32,
    pub amount: Decimal,
    pub deposit: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub client_id: ClientId,
    pub provider_id: ProviderId,
    pub listing_id: ListingId,
    pub quote_id: Option<QuoteId>,
    pub starts_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub place: String,
    pub participants: u32,
    pub photos: Vec<String>,
    pub amount: Decimal,
    pub deposit: Decimal,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Direct bookings are entered by the provider and are firm from the start.
    pub fn book_direct(
        id: ReservationId,
        listing: &Listing,
        booking: DirectBooking,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_booking_terms(booking.starts_at, booking.duration_minutes, booking.participants)?;
        validate_price(booking.amount, booking.deposit)?;

        Ok(Self {
            id,
            client_id: booking.client_id,
            provider_id: listing.provider_id.clone(),
            listing_id: listing.id.clone(),
            quote_id: None,
            starts_at: booking.starts_at,
            duration_minutes: booking.duration_minutes,
            place: booking.place,
            participants: booking.participants,
            photos: Vec::new(),
            amount: booking.amount,
            deposit: booking.deposit,
            status: ReservationStatus::Confirmed,
            created_at: now,
        })
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn apply(&mut self, event: ReservationEvent) -> Result<(), DomainError> {
        self.status = self.status.apply(event)?;
        Ok(())
    }
}
