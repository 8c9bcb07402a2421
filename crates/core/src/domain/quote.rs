use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::listing::{Listing, ListingId};
use crate::domain::party::{ClientId, ProviderId};
use crate::domain::reservation::{Reservation, ReservationId, ReservationStatus};
use crate::domain::{validate_booking_terms, validate_price, EntityKind};
use crate::errors::DomainError;

entity_id!(QuoteId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Answered,
    Accepted,
    Refused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteEvent {
    Respond,
    Accept,
    Refuse,
}

impl QuoteEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Respond => "respond to",
            Self::Accept => "accept",
            Self::Refuse => "refuse",
        }
    }
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Answered => "answered",
            Self::Accepted => "accepted",
            Self::Refused => "refused",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "answered" => Some(Self::Answered),
            "accepted" => Some(Self::Accepted),
            "refused" => Some(Self::Refused),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Refused)
    }

    pub fn apply(self, event: QuoteEvent) -> Result<Self, DomainError> {
        use QuoteEvent::{Accept, Refuse, Respond};
        use QuoteStatus::{Accepted, Answered, Pending, Refused};

        match (self, event) {
            (Pending, Respond) => Ok(Answered),
            (Answered, Accept) => Ok(Accepted),
            (Answered, Refuse) => Ok(Refused),
            (status, event) => Err(DomainError::InvalidState {
                entity: EntityKind::Quote,
                status: status.as_str(),
                action: event.as_str(),
            }),
        }
    }
}

/// What a client submits when asking a provider for a price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub listing_id: ListingId,
    pub starts_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub place: String,
    pub participants: u32,
    pub comment: Option<String>,
    pub photos: Vec<String>,
}

/// What a provider submits when pricing a pending quote.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub comment: Option<String>,
    pub amount: Decimal,
    pub deposit: Decimal,
}

/// Provider-owned half of a quote, present once the quote has been answered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteAnswer {
    pub comment: Option<String>,
    pub amount: Decimal,
    pub deposit: Decimal,
    /// Copied from the listing at answer time so later tariff edits do not
    /// change how the quote reads.
    pub tariff_unit: Option<String>,
    pub responded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub client_id: ClientId,
    pub provider_id: ProviderId,
    pub listing_id: ListingId,
    pub starts_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub place: String,
    pub participants: u32,
    pub client_comment: Option<String>,
    pub photos: Vec<String>,
    pub answer: Option<QuoteAnswer>,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
}

impl Quote {
    pub fn open(
        id: QuoteId,
        client_id: ClientId,
        listing: &Listing,
        request: QuoteRequest,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_booking_terms(request.starts_at, request.duration_minutes, request.participants)?;

        Ok(Self {
            id,
            client_id,
            provider_id: listing.provider_id.clone(),
            listing_id: listing.id.clone(),
            starts_at: request.starts_at,
            duration_minutes: request.duration_minutes,
            place: request.place,
            participants: request.participants,
            client_comment: request.comment,
            photos: request.photos,
            answer: None,
            status: QuoteStatus::Pending,
            created_at: now,
        })
    }

    pub fn respond(
        &mut self,
        response: QuoteResponse,
        tariff_unit: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let next = self.status.apply(QuoteEvent::Respond)?;
        validate_price(response.amount, response.deposit)?;

        self.answer = Some(QuoteAnswer {
            comment: response.comment,
            amount: response.amount,
            deposit: response.deposit,
            tariff_unit,
            responded_at: now,
        });
        self.status = next;
        Ok(())
    }

    /// Accepts the answered quote and returns the reservation it turns into.
    /// The quote is left untouched when the transition is not allowed.
    pub fn accept(
        &mut self,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<Reservation, DomainError> {
        let next = self.status.apply(QuoteEvent::Accept)?;
        let answer = self.answer.as_ref().ok_or(DomainError::InvalidState {
            entity: EntityKind::Quote,
            status: "answered without a price",
            action: QuoteEvent::Accept.as_str(),
        })?;

        let reservation = Reservation {
            id: reservation_id,
            client_id: self.client_id.clone(),
            provider_id: self.provider_id.clone(),
            listing_id: self.listing_id.clone(),
            quote_id: Some(self.id.clone()),
            starts_at: self.starts_at,
            duration_minutes: self.duration_minutes,
            place: self.place.clone(),
            participants: self.participants,
            photos: self.photos.clone(),
            amount: answer.amount,
            deposit: answer.deposit,
            status: ReservationStatus::ToBeConfirmed,
            created_at: now,
        };

        self.status = next;
        Ok(reservation)
    }

    pub fn refuse(&mut self) -> Result<(), DomainError> {
        self.status = self.status.apply(QuoteEvent::Refuse)?;
        Ok(())
    }
}
