use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use festa_core::calendar::Commitment;
use festa_core::domain::blocked_slot::{BlockedSlot, BlockedSlotId};
use festa_core::domain::listing::{Listing, ListingId};
use festa_core::domain::notification::Notification;
use festa_core::domain::order::{Delivery, Order, OrderId, OrderStatus};
use festa_core::domain::party::{ClientId, ProviderId};
use festa_core::domain::quote::{Quote, QuoteId};
use festa_core::domain::reservation::{Reservation, ReservationId, ReservationStatus};
use festa_core::domain::review::{Review, ReviewTarget};
use festa_core::domain::EntityKind;
use festa_core::ports::{BookingStore, ChangeSet, Notifier, NotifyError, StoreError, Write};

#[derive(Clone, Default)]
struct Tables {
    listings: HashMap<String, Listing>,
    quotes: HashMap<String, Quote>,
    reservations: HashMap<String, Reservation>,
    orders: HashMap<String, Order>,
    /// Keyed by order id.
    deliveries: HashMap<String, Delivery>,
    blocked_slots: HashMap<String, BlockedSlot>,
    reviews: Vec<Review>,
}

/// A [`BookingStore`] kept in process memory. Change sets are applied to a
/// staged copy that replaces the tables only when every write succeeded.
#[derive(Default)]
pub struct InMemoryBookingStore {
    tables: RwLock<Tables>,
    failing: RwLock<HashSet<EntityKind>>,
}

impl InMemoryBookingStore {
    pub async fn insert_listing(&self, listing: Listing) {
        let mut tables = self.tables.write().await;
        tables.listings.insert(listing.id.0.clone(), listing);
    }

    /// Makes every subsequent write touching `entity` fail.
    pub async fn fail_writes_to(&self, entity: EntityKind) {
        self.failing.write().await.insert(entity);
    }

    pub async fn restore_writes(&self) {
        self.failing.write().await.clear();
    }
}

#[async_trait::async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn find_listing(&self, id: &ListingId) -> Result<Option<Listing>, StoreError> {
        Ok(self.tables.read().await.listings.get(&id.0).cloned())
    }

    async fn find_quote(&self, id: &QuoteId) -> Result<Option<Quote>, StoreError> {
        Ok(self.tables.read().await.quotes.get(&id.0).cloned())
    }

    async fn find_reservation(
        &self,
        id: &ReservationId,
    ) -> Result<Option<Reservation>, StoreError> {
        Ok(self.tables.read().await.reservations.get(&id.0).cloned())
    }

    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.get(&id.0).cloned())
    }

    async fn find_delivery(&self, order_id: &OrderId) -> Result<Option<Delivery>, StoreError> {
        Ok(self.tables.read().await.deliveries.get(&order_id.0).cloned())
    }

    async fn find_blocked_slot(
        &self,
        id: &BlockedSlotId,
    ) -> Result<Option<BlockedSlot>, StoreError> {
        Ok(self.tables.read().await.blocked_slots.get(&id.0).cloned())
    }

    async fn find_review(
        &self,
        client_id: &ClientId,
        target: &ReviewTarget,
    ) -> Result<Option<Review>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .iter()
            .find(|review| &review.client_id == client_id && &review.target == target)
            .cloned())
    }

    async fn list_commitments(
        &self,
        provider_id: &ProviderId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Commitment>, StoreError> {
        let tables = self.tables.read().await;
        let reservations = tables
            .reservations
            .values()
            .filter(|reservation| &reservation.provider_id == provider_id)
            .filter_map(Commitment::from_reservation);
        let blocked = tables
            .blocked_slots
            .values()
            .filter(|slot| &slot.provider_id == provider_id)
            .map(Commitment::from_blocked_slot);

        let mut commitments: Vec<Commitment> = reservations
            .chain(blocked)
            .filter(|commitment| commitment.starts_at < to && commitment.ends_at() > from)
            .collect();
        commitments.sort_by_key(|commitment| commitment.starts_at);
        Ok(commitments)
    }

    async fn list_client_reservations(
        &self,
        client_id: &ClientId,
        status: ReservationStatus,
    ) -> Result<Vec<Reservation>, StoreError> {
        let tables = self.tables.read().await;
        let mut reservations: Vec<Reservation> = tables
            .reservations
            .values()
            .filter(|reservation| &reservation.client_id == client_id && reservation.status == status)
            .cloned()
            .collect();
        reservations.sort_by_key(|reservation| reservation.starts_at);
        Ok(reservations)
    }

    async fn list_client_orders(
        &self,
        client_id: &ClientId,
        status: OrderStatus,
    ) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| &order.client_id == client_id && order.status == status)
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.created_at);
        Ok(orders)
    }

    async fn list_client_reviews(&self, client_id: &ClientId) -> Result<Vec<Review>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.reviews.iter().filter(|review| &review.client_id == client_id).cloned().collect())
    }

    async fn list_elapsed_reservations(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<Reservation>, StoreError> {
        let tables = self.tables.read().await;
        let mut elapsed: Vec<Reservation> = tables
            .reservations
            .values()
            .filter(|reservation| {
                reservation.status == ReservationStatus::Confirmed && reservation.ends_at() <= now
            })
            .cloned()
            .collect();
        elapsed.sort_by_key(|reservation| reservation.starts_at);
        Ok(elapsed)
    }

    async fn apply(&self, changes: ChangeSet) -> Result<(), StoreError> {
        let failing = self.failing.read().await.clone();
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();

        apply_write(&mut staged, &changes.primary, &failing)?;
        for write in &changes.dependents {
            if let Err(error) = apply_write(&mut staged, write, &failing) {
                return Err(StoreError::DependentWrite {
                    entity: write.entity(),
                    message: error.to_string(),
                });
            }
        }

        *tables = staged;
        Ok(())
    }
}

fn apply_write(
    tables: &mut Tables,
    write: &Write,
    failing: &HashSet<EntityKind>,
) -> Result<(), StoreError> {
    if failing.contains(&write.entity()) {
        return Err(StoreError::Backend(format!("writes to {} are disabled", write.entity())));
    }

    match write {
        Write::InsertQuote(quote) => {
            insert_new(&mut tables.quotes, &quote.id.0, quote.clone(), EntityKind::Quote)
        }
        Write::UpdateQuote { quote, expected } => {
            let current = existing(&tables.quotes, &quote.id.0, EntityKind::Quote)?;
            ensure_status(current.status == *expected, EntityKind::Quote, &quote.id.0, expected.as_str())?;
            tables.quotes.insert(quote.id.0.clone(), quote.clone());
            Ok(())
        }
        Write::InsertReservation(reservation) => insert_new(
            &mut tables.reservations,
            &reservation.id.0,
            reservation.clone(),
            EntityKind::Reservation,
        ),
        Write::UpdateReservation { reservation, expected } => {
            let current = existing(&tables.reservations, &reservation.id.0, EntityKind::Reservation)?;
            ensure_status(
                current.status == *expected,
                EntityKind::Reservation,
                &reservation.id.0,
                expected.as_str(),
            )?;
            tables.reservations.insert(reservation.id.0.clone(), reservation.clone());
            Ok(())
        }
        Write::InsertOrder(order) => {
            insert_new(&mut tables.orders, &order.id.0, order.clone(), EntityKind::Order)
        }
        Write::UpdateOrder { order, expected } => {
            let current = existing(&tables.orders, &order.id.0, EntityKind::Order)?;
            ensure_status(current.status == *expected, EntityKind::Order, &order.id.0, expected.as_str())?;
            tables.orders.insert(order.id.0.clone(), order.clone());
            Ok(())
        }
        Write::UpsertDelivery(delivery) => {
            tables.deliveries.insert(delivery.order_id.0.clone(), delivery.clone());
            Ok(())
        }
        Write::InsertBlockedSlot(slot) => {
            insert_new(&mut tables.blocked_slots, &slot.id.0, slot.clone(), EntityKind::BlockedSlot)
        }
        Write::DeleteBlockedSlot(id) => match tables.blocked_slots.remove(&id.0) {
            Some(_) => Ok(()),
            None => Err(StoreError::Missing { entity: EntityKind::BlockedSlot, id: id.0.clone() }),
        },
        Write::InsertReview(review) => {
            let duplicate = tables.reviews.iter().any(|stored| {
                stored.id == review.id
                    || (stored.client_id == review.client_id && stored.target == review.target)
            });
            if duplicate {
                return Err(StoreError::Duplicate { entity: EntityKind::Review });
            }
            tables.reviews.push(review.clone());
            Ok(())
        }
    }
}

fn insert_new<T>(
    table: &mut HashMap<String, T>,
    id: &str,
    value: T,
    entity: EntityKind,
) -> Result<(), StoreError> {
    if table.contains_key(id) {
        return Err(StoreError::Duplicate { entity });
    }
    table.insert(id.to_owned(), value);
    Ok(())
}

fn existing<'a, T>(
    table: &'a HashMap<String, T>,
    id: &str,
    entity: EntityKind,
) -> Result<&'a T, StoreError> {
    table.get(id).ok_or_else(|| StoreError::Missing { entity, id: id.to_owned() })
}

fn ensure_status(
    matches: bool,
    entity: EntityKind,
    id: &str,
    expected: &'static str,
) -> Result<(), StoreError> {
    if matches {
        Ok(())
    } else {
        Err(StoreError::Stale { entity, id: id.to_owned(), expected })
    }
}

/// Collects notifications instead of sending them.
#[derive(Default)]
pub struct InMemoryNotifier {
    sent: RwLock<Vec<Notification>>,
    failing: AtomicBool,
}

impl InMemoryNotifier {
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Notifier for InMemoryNotifier {
    async fn enqueue(&self, notification: Notification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("notification sink unavailable".to_owned()));
        }
        self.sent.write().await.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use festa_core::domain::listing::ListingId;
    use festa_core::domain::order::{
        Delivery, DeliveryId, DeliveryStatus, ModelId, Order, OrderId, OrderLine, OrderStatus,
    };
    use festa_core::domain::party::{ClientId, ProviderId};
    use festa_core::domain::EntityKind;
    use festa_core::ports::{BookingStore, ChangeSet, StoreError, Write};

    use super::InMemoryBookingStore;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId("O-1".to_owned()),
            client_id: ClientId("C-1".to_owned()),
            provider_id: ProviderId("P-1".to_owned()),
            listing_id: ListingId("L-1".to_owned()),
            lines: vec![OrderLine {
                model_id: ModelId("M-1".to_owned()),
                quantity: 2,
                unit_price: Decimal::new(1500, 2),
                photo: None,
                message: None,
            }],
            delivery_address: "1 rue des Lilas".to_owned(),
            delivery_mode: "post".to_owned(),
            delivery_fee: Decimal::new(5, 0),
            total: Decimal::new(35, 0),
            status,
            created_at: Utc::now(),
            delivered_at: None,
        }
    }

    fn delivery() -> Delivery {
        Delivery {
            id: DeliveryId("D-1".to_owned()),
            order_id: OrderId("O-1".to_owned()),
            status: DeliveryStatus::Pending,
            tracking_number: None,
            carrier: None,
            estimated_date: NaiveDate::from_ymd_opt(2025, 7, 3),
            delivered_on: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failed_dependent_leaves_primary_unwritten() {
        let store = InMemoryBookingStore::default();
        store
            .apply(ChangeSet::single(Write::InsertOrder(order(OrderStatus::Pending))))
            .await
            .expect("insert order");
        store.fail_writes_to(EntityKind::Delivery).await;

        let result = store
            .apply(
                ChangeSet::single(Write::UpdateOrder {
                    order: order(OrderStatus::Paid),
                    expected: OrderStatus::Pending,
                })
                .with_dependent(Write::UpsertDelivery(delivery())),
            )
            .await;

        assert!(matches!(
            result,
            Err(StoreError::DependentWrite { entity: EntityKind::Delivery, .. })
        ));
        let stored = store.find_order(&OrderId("O-1".to_owned())).await.expect("find");
        assert_eq!(stored.map(|o| o.status), Some(OrderStatus::Pending));
        assert_eq!(store.find_delivery(&OrderId("O-1".to_owned())).await.expect("find"), None);
    }

    #[tokio::test]
    async fn update_with_wrong_expected_status_is_stale() {
        let store = InMemoryBookingStore::default();
        store
            .apply(ChangeSet::single(Write::InsertOrder(order(OrderStatus::Paid))))
            .await
            .expect("insert order");

        let result = store
            .apply(ChangeSet::single(Write::UpdateOrder {
                order: order(OrderStatus::Paid),
                expected: OrderStatus::Pending,
            }))
            .await;

        assert!(matches!(result, Err(StoreError::Stale { entity: EntityKind::Order, .. })));
    }
}
