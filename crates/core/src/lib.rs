pub mod calendar;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod ports;

pub use calendar::{Availability, Commitment, CommitmentSource, DisplayHours, HourCell};
pub use domain::blocked_slot::{BlockedSlot, BlockedSlotId};
pub use domain::listing::{Listing, ListingId};
pub use domain::notification::{Notification, NotificationKind, Recipient};
pub use domain::order::{
    Delivery, DeliveryId, DeliveryStatus, ModelId, NewOrder, Order, OrderId, OrderLine,
    OrderStatus, Shipment,
};
pub use domain::party::{Actor, ClientId, ProviderId};
pub use domain::quote::{Quote, QuoteAnswer, QuoteId, QuoteRequest, QuoteResponse, QuoteStatus};
pub use domain::reservation::{DirectBooking, Reservation, ReservationId, ReservationStatus};
pub use domain::review::{Rating, Review, ReviewId, ReviewTarget};
pub use domain::EntityKind;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{CalendarPolicy, FinishReport, LifecycleEngine, SkippedReservation};
pub use ports::{BookingStore, ChangeSet, Notifier, NotifyError, StoreError, Write};
