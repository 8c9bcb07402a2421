use serde::{Deserialize, Serialize};

use crate::domain::party::{ClientId, ProviderId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Client(ClientId),
    Provider(ProviderId),
}

impl Recipient {
    pub fn id(&self) -> &str {
        match self {
            Self::Client(id) => id.as_str(),
            Self::Provider(id) => id.as_str(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::Client(_) => "client",
            Self::Provider(_) => "provider",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    QuoteRequested,
    QuoteAnswered,
    QuoteAccepted,
    QuoteRefused,
    ReservationBooked,
    ReservationConfirmed,
    ReservationRefused,
    ReservationCancelled,
    /// The "rate now" prompt sent once a reservation is over.
    ReservationFinished,
    OrderPlaced,
    OrderPaid,
    OrderConfirmed,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
    ReviewReceived,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 16] = [
        Self::QuoteRequested,
        Self::QuoteAnswered,
        Self::QuoteAccepted,
        Self::QuoteRefused,
        Self::ReservationBooked,
        Self::ReservationConfirmed,
        Self::ReservationRefused,
        Self::ReservationCancelled,
        Self::ReservationFinished,
        Self::OrderPlaced,
        Self::OrderPaid,
        Self::OrderConfirmed,
        Self::OrderShipped,
        Self::OrderDelivered,
        Self::OrderCancelled,
        Self::ReviewReceived,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteRequested => "quote_requested",
            Self::QuoteAnswered => "quote_answered",
            Self::QuoteAccepted => "quote_accepted",
            Self::QuoteRefused => "quote_refused",
            Self::ReservationBooked => "reservation_booked",
            Self::ReservationConfirmed => "reservation_confirmed",
            Self::ReservationRefused => "reservation_refused",
            Self::ReservationCancelled => "reservation_cancelled",
            Self::ReservationFinished => "reservation_finished",
            Self::OrderPlaced => "order_placed",
            Self::OrderPaid => "order_paid",
            Self::OrderConfirmed => "order_confirmed",
            Self::OrderShipped => "order_shipped",
            Self::OrderDelivered => "order_delivered",
            Self::OrderCancelled => "order_cancelled",
            Self::ReviewReceived => "review_received",
        }
    }
}

/// A message for the counterparty of a transition. `read` starts false; the
/// lifecycle never reads notifications back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub content: String,
    pub read: bool,
}

impl Notification {
    pub fn new(recipient: Recipient, kind: NotificationKind, content: impl Into<String>) -> Self {
        Self { recipient, kind, content: content.into(), read: false }
    }
}
