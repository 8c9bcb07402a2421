use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::listing::{Listing, ListingId};
use crate::domain::party::{ClientId, ProviderId};
use crate::domain::EntityKind;
use crate::errors::DomainError;

entity_id!(OrderId);
entity_id!(DeliveryId);
entity_id!(
    /// A purchasable product model of a listing.
    ModelId
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
    RecordPayment,
    Confirm,
    Ship,
    Deliver,
    Cancel,
}

impl OrderEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecordPayment => "record payment for",
            Self::Confirm => "confirm",
            Self::Ship => "ship",
            Self::Deliver => "mark delivered",
            Self::Cancel => "cancel",
        }
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "confirmed" => Some(Self::Confirmed),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Position on the fulfilment path `pending < confirmed < shipped < delivered`.
    /// `cancelled` sits off the path.
    pub fn progress(&self) -> Option<u8> {
        match self {
            Self::Pending | Self::Paid => Some(0),
            Self::Confirmed => Some(1),
            Self::Shipped => Some(2),
            Self::Delivered => Some(3),
            Self::Cancelled => None,
        }
    }

    pub fn apply(self, event: OrderEvent) -> Result<Self, DomainError> {
        use OrderEvent::{Cancel, Confirm, Deliver, RecordPayment, Ship};
        use OrderStatus::{Cancelled, Confirmed, Delivered, Paid, Pending, Shipped};

        match (self, event) {
            (Pending, RecordPayment) => Ok(Paid),
            (Paid, Confirm) => Ok(Confirmed),
            (Confirmed, Ship) => Ok(Shipped),
            (Shipped, Deliver) => Ok(Delivered),
            (Delivered, Deliver) => Err(DomainError::AlreadyDelivered),
            (Pending | Paid | Confirmed | Shipped, Cancel) => Ok(Cancelled),
            (status, event) => Err(DomainError::InvalidState {
                entity: EntityKind::Order,
                status: status.as_str(),
                action: event.as_str(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    /// The delivery status an order status implies.
    pub fn mirroring(order: OrderStatus) -> Self {
        match order {
            OrderStatus::Pending | OrderStatus::Paid => Self::Pending,
            OrderStatus::Confirmed => Self::Confirmed,
            OrderStatus::Shipped => Self::Shipped,
            OrderStatus::Delivered => Self::Delivered,
            OrderStatus::Cancelled => Self::Cancelled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Shipped => Some(2),
            Self::Delivered => Some(3),
            Self::Cancelled => None,
        }
    }

    /// True when this delivery status is further along than `order` allows.
    pub fn is_ahead_of(&self, order: OrderStatus) -> bool {
        match (self.progress(), order.progress()) {
            (Some(delivery), Some(order)) => delivery > order,
            // A cancelled order only admits a cancelled delivery.
            (Some(_), None) => true,
            // A cancelled delivery must belong to a cancelled order.
            (None, Some(_)) => true,
            (None, None) => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub model_id: ModelId,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Optional photo the client attached for customisation.
    pub photo: Option<String>,
    pub message: Option<String>,
}

impl OrderLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub listing_id: ListingId,
    pub lines: Vec<OrderLine>,
    pub delivery_address: String,
    pub delivery_mode: String,
    pub delivery_fee: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client_id: ClientId,
    pub provider_id: ProviderId,
    pub listing_id: ListingId,
    pub lines: Vec<OrderLine>,
    pub delivery_address: String,
    pub delivery_mode: String,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn place(
        id: OrderId,
        client_id: ClientId,
        listing: &Listing,
        order: NewOrder,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if order.lines.is_empty() {
            return Err(DomainError::Validation("an order needs at least one line".to_owned()));
        }
        if let Some(line) = order.lines.iter().find(|line| line.quantity == 0) {
            return Err(DomainError::Validation(format!(
                "quantity for model `{}` must be at least one",
                line.model_id
            )));
        }
        if order.lines.iter().any(|line| line.unit_price < Decimal::ZERO)
            || order.delivery_fee < Decimal::ZERO
        {
            return Err(DomainError::Validation(
                "prices and delivery fee cannot be negative".to_owned(),
            ));
        }

        let total = order.lines.iter().map(OrderLine::subtotal).sum::<Decimal>() + order.delivery_fee;

        Ok(Self {
            id,
            client_id,
            provider_id: listing.provider_id.clone(),
            listing_id: listing.id.clone(),
            lines: order.lines,
            delivery_address: order.delivery_address,
            delivery_mode: order.delivery_mode,
            delivery_fee: order.delivery_fee,
            total,
            status: OrderStatus::Pending,
            created_at: now,
            delivered_at: None,
        })
    }

    pub fn apply(&mut self, event: OrderEvent, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.status = self.status.apply(event)?;
        if self.status == OrderStatus::Delivered {
            self.delivered_at = Some(now);
        }
        Ok(())
    }
}

/// Carrier details supplied when an order ships.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub tracking_number: String,
    pub carrier: Option<String>,
    pub estimated_date: Option<NaiveDate>,
}

impl Shipment {
    pub fn new(
        tracking_number: &str,
        carrier: Option<String>,
        estimated_date: Option<NaiveDate>,
    ) -> Result<Self, DomainError> {
        let tracking_number = tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(DomainError::Validation(
                "a tracking number is required to ship an order".to_owned(),
            ));
        }
        Ok(Self {
            tracking_number: tracking_number.to_owned(),
            carrier: carrier.map(|c| c.trim().to_owned()).filter(|c| !c.is_empty()),
            estimated_date,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub order_id: OrderId,
    pub status: DeliveryStatus,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub estimated_date: Option<NaiveDate>,
    pub delivered_on: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    /// Returns the delivery record as it must read after `order` moved,
    /// creating it when the order had none yet.
    pub fn follow(
        existing: Option<Delivery>,
        order: &Order,
        shipment: Option<&Shipment>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut delivery = existing.unwrap_or_else(|| Self {
            id: DeliveryId::generate(),
            order_id: order.id.clone(),
            status: DeliveryStatus::Pending,
            tracking_number: None,
            carrier: None,
            estimated_date: None,
            delivered_on: None,
            updated_at: now,
        });

        delivery.status = DeliveryStatus::mirroring(order.status);
        if let Some(shipment) = shipment {
            delivery.tracking_number = Some(shipment.tracking_number.clone());
            delivery.carrier = shipment.carrier.clone();
            delivery.estimated_date = shipment.estimated_date;
        }
        if let Some(delivered_at) = order.delivered_at {
            delivery.delivered_on = Some(delivered_at.date_naive());
        }
        delivery.updated_at = now;
        delivery
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{
        Delivery, DeliveryStatus, ModelId, NewOrder, Order, OrderEvent, OrderId, OrderLine,
        OrderStatus, Shipment,
    };
    use crate::domain::listing::{Listing, ListingId};
    use crate::domain::party::{ClientId, ProviderId};
    use crate::errors::DomainError;

    fn order() -> Order {
        Order::place(
            OrderId("O-1".to_owned()),
            ClientId("C-1".to_owned()),
            &Listing {
                id: ListingId("L-1".to_owned()),
                provider_id: ProviderId("P-1".to_owned()),
                title: "Cake toppers".to_owned(),
                tariff_unit: None,
            },
            NewOrder {
                listing_id: ListingId("L-1".to_owned()),
                lines: vec![
                    OrderLine {
                        model_id: ModelId("M-1".to_owned()),
                        quantity: 3,
                        unit_price: Decimal::new(1250, 2),
                        photo: None,
                        message: Some("Happy 30th".to_owned()),
                    },
                    OrderLine {
                        model_id: ModelId("M-2".to_owned()),
                        quantity: 1,
                        unit_price: Decimal::new(500, 2),
                        photo: Some("face.png".to_owned()),
                        message: None,
                    },
                ],
                delivery_address: "1 rue de la Paix, Paris".to_owned(),
                delivery_mode: "colissimo".to_owned(),
                delivery_fee: Decimal::new(490, 2),
            },
            Utc::now(),
        )
        .expect("place order")
    }

    #[test]
    fn total_includes_lines_and_delivery_fee() {
        assert_eq!(order().total, Decimal::new(4740, 2));
    }

    #[test]
    fn zero_quantity_lines_are_rejected() {
        let mut draft = order();
        draft.lines[0].quantity = 0;
        let error = Order::place(
            OrderId("O-2".to_owned()),
            draft.client_id.clone(),
            &Listing {
                id: draft.listing_id.clone(),
                provider_id: draft.provider_id.clone(),
                title: "x".to_owned(),
                tariff_unit: None,
            },
            NewOrder {
                listing_id: draft.listing_id.clone(),
                lines: draft.lines.clone(),
                delivery_address: draft.delivery_address.clone(),
                delivery_mode: draft.delivery_mode.clone(),
                delivery_fee: draft.delivery_fee,
            },
            Utc::now(),
        )
        .expect_err("zero quantity");

        assert!(matches!(error, DomainError::Validation(_)));
    }

    #[test]
    fn fulfilment_path_is_linear() {
        let mut order = order();
        let now = Utc::now();
        for event in
            [OrderEvent::RecordPayment, OrderEvent::Confirm, OrderEvent::Ship, OrderEvent::Deliver]
        {
            order.apply(event, now).expect("next step");
        }

        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.delivered_at, Some(now));
        assert!(matches!(
            OrderStatus::Paid.apply(OrderEvent::Ship),
            Err(DomainError::InvalidState { status: "paid", .. })
        ));
    }

    #[test]
    fn redelivery_is_reported_not_applied() {
        assert_eq!(
            OrderStatus::Delivered.apply(OrderEvent::Deliver),
            Err(DomainError::AlreadyDelivered)
        );
    }

    #[test]
    fn cancellation_is_absorbing_and_blocked_after_delivery() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
        ] {
            assert_eq!(status.apply(OrderEvent::Cancel), Ok(OrderStatus::Cancelled));
        }
        assert!(OrderStatus::Delivered.apply(OrderEvent::Cancel).is_err());
        for event in [
            OrderEvent::RecordPayment,
            OrderEvent::Confirm,
            OrderEvent::Ship,
            OrderEvent::Deliver,
            OrderEvent::Cancel,
        ] {
            assert!(OrderStatus::Cancelled.apply(event).is_err());
        }
    }

    #[test]
    fn delivery_follows_order_and_is_never_ahead() {
        let mut order = order();
        let mut delivery = None;
        let shipment = Shipment::new(" 6A123 ", Some("La Poste".to_owned()), None).expect("valid");

        for event in
            [OrderEvent::RecordPayment, OrderEvent::Confirm, OrderEvent::Ship, OrderEvent::Deliver]
        {
            order.apply(event, Utc::now()).expect("advance");
            let shipped = (event == OrderEvent::Ship).then_some(&shipment);
            let next = Delivery::follow(delivery.take(), &order, shipped, Utc::now());
            assert!(!next.status.is_ahead_of(order.status), "{:?}", order.status);
            delivery = Some(next);
        }

        let delivery = delivery.expect("delivery exists");
        assert_eq!(delivery.status, DeliveryStatus::Delivered);
        assert_eq!(delivery.tracking_number.as_deref(), Some("6A123"));
        assert!(delivery.delivered_on.is_some());
    }

    #[test]
    fn cancelling_without_delivery_creates_cancelled_record() {
        let mut order = order();
        order.apply(OrderEvent::Cancel, Utc::now()).expect("cancel pending order");
        let delivery = Delivery::follow(None, &order, None, Utc::now());

        assert_eq!(delivery.status, DeliveryStatus::Cancelled);
        assert_eq!(delivery.order_id, order.id);
    }

    #[test]
    fn blank_tracking_number_is_rejected() {
        let error = Shipment::new("   ", None, NaiveDate::from_ymd_opt(2025, 7, 3))
            .expect_err("blank tracking");
        assert!(matches!(error, DomainError::Validation(_)));
    }

    #[test]
    fn cancelled_delivery_is_ahead_of_live_order() {
        assert!(DeliveryStatus::Cancelled.is_ahead_of(OrderStatus::Confirmed));
        assert!(!DeliveryStatus::Cancelled.is_ahead_of(OrderStatus::Cancelled));
        assert!(DeliveryStatus::Shipped.is_ahead_of(OrderStatus::Confirmed));
    }
}
