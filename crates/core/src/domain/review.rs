use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderId;
use crate::domain::party::{ClientId, ProviderId};
use crate::domain::reservation::ReservationId;
use crate::domain::EntityKind;
use crate::errors::DomainError;

entity_id!(ReviewId);

/// A star rating between 1 and 5 inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 5;

    pub fn new(value: i32) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            // Range checked above, the cast cannot truncate.
            Ok(Self(value as u8))
        } else {
            Err(DomainError::InvalidRating(value))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i32> for Rating {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i32 {
    fn from(value: Rating) -> Self {
        i32::from(value.0)
    }
}

/// What a review is about. Exactly one of a reservation or an order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ReviewTarget {
    Reservation(ReservationId),
    Order(OrderId),
}

impl ReviewTarget {
    pub fn entity(&self) -> EntityKind {
        match self {
            Self::Reservation(_) => EntityKind::Reservation,
            Self::Order(_) => EntityKind::Order,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Reservation(id) => id.as_str(),
            Self::Order(id) => id.as_str(),
        }
    }

    /// Status the target must reach before it can be reviewed.
    pub fn qualifying_status(&self) -> &'static str {
        match self {
            Self::Reservation(_) => "finished",
            Self::Order(_) => "delivered",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub client_id: ClientId,
    pub provider_id: ProviderId,
    pub target: ReviewTarget,
    pub rating: Rating,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
