//! Boundaries the lifecycle engine talks through: the relational store and
//! the notification sink.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::calendar::Commitment;
use crate::domain::blocked_slot::{BlockedSlot, BlockedSlotId};
use crate::domain::listing::{Listing, ListingId};
use crate::domain::notification::Notification;
use crate::domain::order::{Delivery, Order, OrderId, OrderStatus};
use crate::domain::party::{ClientId, ProviderId};
use crate::domain::quote::{Quote, QuoteId, QuoteStatus};
use crate::domain::reservation::{Reservation, ReservationId, ReservationStatus};
use crate::domain::review::{Review, ReviewTarget};
use crate::domain::EntityKind;

/// One row-level write. Updates carry the status they expect to overwrite so
/// the store can refuse a write that lost a race.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
    InsertQuote(Quote),
    UpdateQuote { quote: Quote, expected: QuoteStatus },
    InsertReservation(Reservation),
    UpdateReservation { reservation: Reservation, expected: ReservationStatus },
    InsertOrder(Order),
    UpdateOrder { order: Order, expected: OrderStatus },
    UpsertDelivery(Delivery),
    InsertBlockedSlot(BlockedSlot),
    DeleteBlockedSlot(BlockedSlotId),
    InsertReview(Review),
}

impl Write {
    pub fn entity(&self) -> EntityKind {
        match self {
            Self::InsertQuote(_) | Self::UpdateQuote { .. } => EntityKind::Quote,
            Self::InsertReservation(_) | Self::UpdateReservation { .. } => EntityKind::Reservation,
            Self::InsertOrder(_) | Self::UpdateOrder { .. } => EntityKind::Order,
            Self::UpsertDelivery(_) => EntityKind::Delivery,
            Self::InsertBlockedSlot(_) | Self::DeleteBlockedSlot(_) => EntityKind::BlockedSlot,
            Self::InsertReview(_) => EntityKind::Review,
        }
    }
}

/// The writes of a single transition. A store applies the primary write and
/// then every dependent write inside one transaction: either all of them land
/// or none does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSet {
    pub primary: Write,
    pub dependents: Vec<Write>,
}

impl ChangeSet {
    pub fn single(primary: Write) -> Self {
        Self { primary, dependents: Vec::new() }
    }

    pub fn with_dependent(mut self, write: Write) -> Self {
        self.dependents.push(write);
        self
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A conditional update found a different status than expected.
    #[error("{entity} `{id}` is no longer `{expected}`")]
    Stale { entity: EntityKind, id: String, expected: &'static str },
    #[error("{entity} `{id}` does not exist")]
    Missing { entity: EntityKind, id: String },
    /// A uniqueness constraint rejected the primary write.
    #[error("duplicate {entity}")]
    Duplicate { entity: EntityKind },
    /// A dependent write failed; the transaction was rolled back.
    #[error("dependent {entity} write failed: {message}")]
    DependentWrite { entity: EntityKind, message: String },
    #[error("store backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_listing(&self, id: &ListingId) -> Result<Option<Listing>, StoreError>;
    async fn find_quote(&self, id: &QuoteId) -> Result<Option<Quote>, StoreError>;
    async fn find_reservation(&self, id: &ReservationId)
        -> Result<Option<Reservation>, StoreError>;
    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;
    async fn find_delivery(&self, order_id: &OrderId) -> Result<Option<Delivery>, StoreError>;
    async fn find_blocked_slot(&self, id: &BlockedSlotId)
        -> Result<Option<BlockedSlot>, StoreError>;
    async fn find_review(
        &self,
        client_id: &ClientId,
        target: &ReviewTarget,
    ) -> Result<Option<Review>, StoreError>;

    /// Reservations still holding their slot plus blocked slots of `provider`
    /// whose exact interval intersects `[from, to)`.
    async fn list_commitments(
        &self,
        provider_id: &ProviderId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Commitment>, StoreError>;

    async fn list_client_reservations(
        &self,
        client_id: &ClientId,
        status: ReservationStatus,
    ) -> Result<Vec<Reservation>, StoreError>;
    async fn list_client_orders(
        &self,
        client_id: &ClientId,
        status: OrderStatus,
    ) -> Result<Vec<Order>, StoreError>;
    async fn list_client_reviews(&self, client_id: &ClientId) -> Result<Vec<Review>, StoreError>;

    /// Confirmed reservations whose end is at or before `now`.
    async fn list_elapsed_reservations(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<Reservation>, StoreError>;

    async fn apply(&self, changes: ChangeSet) -> Result<(), StoreError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("notification could not be enqueued: {0}")]
pub struct NotifyError(pub String);

/// Fire-and-forget delivery of lifecycle notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn enqueue(&self, notification: Notification) -> Result<(), NotifyError>;
}
