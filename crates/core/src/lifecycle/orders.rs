use chrono::{NaiveDate, Utc};
use tracing::info;

use super::{ensure_client, ensure_party, ensure_provider, found, lookup_failure, LifecycleEngine};
use crate::domain::notification::{Notification, NotificationKind, Recipient};
use crate::domain::order::{
    Delivery, NewOrder, Order, OrderEvent, OrderId, OrderStatus, Shipment,
};
use crate::domain::party::{Actor, ClientId, ProviderId};
use crate::domain::EntityKind;
use crate::errors::{ApplicationError, DomainError};
use crate::ports::{BookingStore, ChangeSet, Notifier, Write};

impl<S, N> LifecycleEngine<S, N>
where
    S: BookingStore,
    N: Notifier,
{
    pub async fn place_order(
        &self,
        client: &ClientId,
        new_order: NewOrder,
    ) -> Result<Order, ApplicationError> {
        let listing = self.load_listing(&new_order.listing_id).await?;
        let order = Order::place(OrderId::generate(), client.clone(), &listing, new_order, Utc::now())?;

        self.commit(ChangeSet::single(Write::InsertOrder(order.clone())), "place").await?;
        info!(
            event_name = "order.placed",
            order_id = %order.id,
            client_id = %order.client_id,
            total = %order.total,
            "order placed"
        );

        self.notify(Notification::new(
            Recipient::Provider(order.provider_id.clone()),
            NotificationKind::OrderPlaced,
            format!("New order {} for \"{}\" ({})", order.id, listing.title, order.total),
        ))
        .await;
        Ok(order)
    }

    /// Payment confirmation from the payment side. Opens the delivery record.
    pub async fn record_payment(&self, order_id: &OrderId) -> Result<(Order, Delivery), ApplicationError> {
        let order = self.load_order(order_id).await?;
        let (order, delivery) = self.advance_order(order, OrderEvent::RecordPayment, None).await?;

        self.notify(Notification::new(
            Recipient::Provider(order.provider_id.clone()),
            NotificationKind::OrderPaid,
            format!("Order {} has been paid", order.id),
        ))
        .await;
        Ok((order, delivery))
    }

    pub async fn confirm_order(
        &self,
        provider: &ProviderId,
        order_id: &OrderId,
    ) -> Result<(Order, Delivery), ApplicationError> {
        let order = self.load_order(order_id).await?;
        ensure_provider(provider, &order.provider_id, EntityKind::Order, order_id.as_str())?;
        let (order, delivery) = self.advance_order(order, OrderEvent::Confirm, None).await?;

        self.notify(Notification::new(
            Recipient::Client(order.client_id.clone()),
            NotificationKind::OrderConfirmed,
            format!("Your order {} is being prepared", order.id),
        ))
        .await;
        Ok((order, delivery))
    }

    pub async fn ship_order(
        &self,
        provider: &ProviderId,
        order_id: &OrderId,
        tracking_number: &str,
        carrier: Option<String>,
        estimated_date: Option<NaiveDate>,
    ) -> Result<(Order, Delivery), ApplicationError> {
        let order = self.load_order(order_id).await?;
        ensure_provider(provider, &order.provider_id, EntityKind::Order, order_id.as_str())?;
        order.status.apply(OrderEvent::Ship)?;
        let shipment = Shipment::new(tracking_number, carrier, estimated_date)?;

        let (order, delivery) = self.advance_order(order, OrderEvent::Ship, Some(&shipment)).await?;

        let carrier = shipment.carrier.as_deref().unwrap_or("the carrier");
        self.notify(Notification::new(
            Recipient::Client(order.client_id.clone()),
            NotificationKind::OrderShipped,
            format!(
                "Your order {} was shipped with {carrier}, tracking number {}",
                order.id, shipment.tracking_number
            ),
        ))
        .await;
        Ok((order, delivery))
    }

    /// Either party may report the parcel as received. Reporting it twice is
    /// an error and writes nothing.
    pub async fn mark_delivered(
        &self,
        actor: &Actor,
        order_id: &OrderId,
    ) -> Result<(Order, Delivery), ApplicationError> {
        let order = self.load_order(order_id).await?;
        ensure_party(actor, &order.client_id, &order.provider_id, EntityKind::Order, order_id.as_str())?;
        let (order, delivery) = self.advance_order(order, OrderEvent::Deliver, None).await?;

        self.notify(Notification::new(
            counterparty(actor, &order),
            NotificationKind::OrderDelivered,
            format!("Order {} has been delivered", order.id),
        ))
        .await;
        Ok((order, delivery))
    }

    /// The provider may cancel any open order. The client only until the
    /// provider has started preparing it.
    pub async fn cancel_order(
        &self,
        actor: &Actor,
        order_id: &OrderId,
    ) -> Result<(Order, Delivery), ApplicationError> {
        let order = self.load_order(order_id).await?;
        match actor {
            Actor::Client(client) => {
                ensure_client(client, &order.client_id, EntityKind::Order, order_id.as_str())?;
                if !matches!(order.status, OrderStatus::Pending | OrderStatus::Paid) {
                    return Err(DomainError::InvalidState {
                        entity: EntityKind::Order,
                        status: order.status.as_str(),
                        action: OrderEvent::Cancel.as_str(),
                    }
                    .into());
                }
            }
            Actor::Provider(provider) => {
                ensure_provider(provider, &order.provider_id, EntityKind::Order, order_id.as_str())?;
            }
        }
        let (order, delivery) = self.advance_order(order, OrderEvent::Cancel, None).await?;

        self.notify(Notification::new(
            counterparty(actor, &order),
            NotificationKind::OrderCancelled,
            format!("Order {} was cancelled by the {}", order.id, actor.role()),
        ))
        .await;
        Ok((order, delivery))
    }

    /// Moves the order and its delivery record together.
    async fn advance_order(
        &self,
        mut order: Order,
        event: OrderEvent,
        shipment: Option<&Shipment>,
    ) -> Result<(Order, Delivery), ApplicationError> {
        let expected = order.status;
        let now = Utc::now();
        order.apply(event, now)?;

        let existing = self.store.find_delivery(&order.id).await.map_err(lookup_failure)?;
        let delivery = Delivery::follow(existing, &order, shipment, now);

        let changes = ChangeSet::single(Write::UpdateOrder { order: order.clone(), expected })
            .with_dependent(Write::UpsertDelivery(delivery.clone()));
        self.commit(changes, event.as_str()).await?;
        let event_name = format!("order.{}", order.status.as_str());
        info!(
            event_name = event_name.as_str(),
            order_id = %order.id,
            from = expected.as_str(),
            to = order.status.as_str(),
            delivery_status = delivery.status.as_str(),
            "order status changed"
        );
        Ok((order, delivery))
    }

    pub(super) async fn load_order(&self, id: &OrderId) -> Result<Order, ApplicationError> {
        let order = self.store.find_order(id).await.map_err(lookup_failure)?;
        found(order, EntityKind::Order, id.as_str())
    }
}

fn counterparty(actor: &Actor, order: &Order) -> Recipient {
    match actor {
        Actor::Client(_) => Recipient::Provider(order.provider_id.clone()),
        Actor::Provider(_) => Recipient::Client(order.client_id.clone()),
    }
}
