use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use tracing::debug;

use festa_core::calendar::{Commitment, CommitmentSource};
use festa_core::domain::blocked_slot::{BlockedSlot, BlockedSlotId};
use festa_core::domain::listing::{Listing, ListingId};
use festa_core::domain::order::{
    Delivery, DeliveryId, DeliveryStatus, ModelId, Order, OrderId, OrderLine, OrderStatus,
};
use festa_core::domain::party::{ClientId, ProviderId};
use festa_core::domain::quote::{Quote, QuoteAnswer, QuoteId, QuoteStatus};
use festa_core::domain::reservation::{Reservation, ReservationId, ReservationStatus};
use festa_core::domain::review::{Rating, Review, ReviewId, ReviewTarget};
use festa_core::domain::EntityKind;
use festa_core::ports::{BookingStore, ChangeSet, StoreError, Write};

use super::RepositoryError;
use crate::DbPool;

/// Event times are wall-clock and stored in the shape SQLite's `datetime()`
/// returns, so interval arithmetic can run in SQL.
const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqlBookingStore {
    pool: DbPool,
}

impl SqlBookingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Keeps the listing read model in step with the catalogue.
    pub async fn upsert_listing(&self, listing: &Listing) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO listing (id, provider_id, title, tariff_unit)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                provider_id = excluded.provider_id,
                title = excluded.title,
                tariff_unit = excluded.tariff_unit",
        )
        .bind(&listing.id.0)
        .bind(&listing.provider_id.0)
        .bind(&listing.title)
        .bind(listing.tariff_unit.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn order_lines(&self, order_id: &str) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT model_id, quantity, unit_price, photo, message
             FROM order_line
             WHERE order_id = ?
             ORDER BY line_number ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_line_from_row).collect()
    }

    async fn hydrate_order(&self, row: SqliteRow) -> Result<Order, RepositoryError> {
        let id: String = row.try_get("id")?;
        let lines = self.order_lines(&id).await?;
        order_from_row(&row, lines)
    }
}

#[async_trait::async_trait]
impl BookingStore for SqlBookingStore {
    async fn find_listing(&self, id: &ListingId) -> Result<Option<Listing>, StoreError> {
        let row = sqlx::query("SELECT id, provider_id, title, tariff_unit FROM listing WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(|row| listing_from_row(&row)).transpose()?)
    }

    async fn find_quote(&self, id: &QuoteId) -> Result<Option<Quote>, StoreError> {
        let row = sqlx::query(
            "SELECT
                id,
                client_id,
                provider_id,
                listing_id,
                starts_at,
                duration_minutes,
                place,
                participants,
                client_comment,
                photos_json,
                provider_comment,
                amount,
                deposit,
                tariff_unit,
                responded_at,
                status,
                created_at
             FROM quote
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(|row| quote_from_row(&row)).transpose()?)
    }

    async fn find_reservation(
        &self,
        id: &ReservationId,
    ) -> Result<Option<Reservation>, StoreError> {
        let row = sqlx::query(
            "SELECT
                id,
                client_id,
                provider_id,
                listing_id,
                quote_id,
                starts_at,
                duration_minutes,
                place,
                participants,
                photos_json,
                amount,
                deposit,
                status,
                created_at
             FROM reservation
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(|row| reservation_from_row(&row)).transpose()?)
    }

    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT
                id,
                client_id,
                provider_id,
                listing_id,
                delivery_address,
                delivery_mode,
                delivery_fee,
                total,
                status,
                created_at,
                delivered_at
             FROM orders
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => Ok(Some(self.hydrate_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_delivery(&self, order_id: &OrderId) -> Result<Option<Delivery>, StoreError> {
        let row = sqlx::query(
            "SELECT
                id,
                order_id,
                status,
                tracking_number,
                carrier,
                estimated_date,
                delivered_on,
                updated_at
             FROM delivery
             WHERE order_id = ?",
        )
        .bind(&order_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(|row| delivery_from_row(&row)).transpose()?)
    }

    async fn find_blocked_slot(
        &self,
        id: &BlockedSlotId,
    ) -> Result<Option<BlockedSlot>, StoreError> {
        let row = sqlx::query(
            "SELECT id, provider_id, starts_at, duration_minutes, reason, created_at
             FROM blocked_slot
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(|row| blocked_slot_from_row(&row)).transpose()?)
    }

    async fn find_review(
        &self,
        client_id: &ClientId,
        target: &ReviewTarget,
    ) -> Result<Option<Review>, StoreError> {
        let sql = match target {
            ReviewTarget::Reservation(_) => {
                "SELECT id, client_id, provider_id, reservation_id, order_id, rating, comment, created_at
                 FROM review
                 WHERE client_id = ? AND reservation_id = ?"
            }
            ReviewTarget::Order(_) => {
                "SELECT id, client_id, provider_id, reservation_id, order_id, rating, comment, created_at
                 FROM review
                 WHERE client_id = ? AND order_id = ?"
            }
        };
        let row = sqlx::query(sql)
            .bind(&client_id.0)
            .bind(target.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(|row| review_from_row(&row)).transpose()?)
    }

    async fn list_commitments(
        &self,
        provider_id: &ProviderId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Commitment>, StoreError> {
        let from = format_event_time(from);
        let to = format_event_time(to);

        let reservations = sqlx::query(
            "SELECT id, starts_at, duration_minutes, status
             FROM reservation
             WHERE provider_id = ?
               AND status IN ('tbc', 'pending', 'confirmed', 'finished')
               AND starts_at < ?
               AND datetime(starts_at, '+' || duration_minutes || ' minutes') > ?
             ORDER BY starts_at ASC",
        )
        .bind(&provider_id.0)
        .bind(&to)
        .bind(&from)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let blocked = sqlx::query(
            "SELECT id, starts_at, duration_minutes, reason
             FROM blocked_slot
             WHERE provider_id = ?
               AND starts_at < ?
               AND datetime(starts_at, '+' || duration_minutes || ' minutes') > ?
             ORDER BY starts_at ASC",
        )
        .bind(&provider_id.0)
        .bind(&to)
        .bind(&from)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut commitments = reservations
            .iter()
            .map(reservation_commitment_from_row)
            .chain(blocked.iter().map(blocked_commitment_from_row))
            .collect::<Result<Vec<_>, _>>()?;
        commitments.sort_by_key(|commitment| commitment.starts_at);
        Ok(commitments)
    }

    async fn list_client_reservations(
        &self,
        client_id: &ClientId,
        status: ReservationStatus,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query(
            "SELECT
                id,
                client_id,
                provider_id,
                listing_id,
                quote_id,
                starts_at,
                duration_minutes,
                place,
                participants,
                photos_json,
                amount,
                deposit,
                status,
                created_at
             FROM reservation
             WHERE client_id = ? AND status = ?
             ORDER BY starts_at ASC",
        )
        .bind(&client_id.0)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.iter().map(reservation_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_client_orders(
        &self,
        client_id: &ClientId,
        status: OrderStatus,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            "SELECT
                id,
                client_id,
                provider_id,
                listing_id,
                delivery_address,
                delivery_mode,
                delivery_fee,
                total,
                status,
                created_at,
                delivered_at
             FROM orders
             WHERE client_id = ? AND status = ?
             ORDER BY created_at ASC",
        )
        .bind(&client_id.0)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate_order(row).await?);
        }
        Ok(orders)
    }

    async fn list_client_reviews(&self, client_id: &ClientId) -> Result<Vec<Review>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, client_id, provider_id, reservation_id, order_id, rating, comment, created_at
             FROM review
             WHERE client_id = ?
             ORDER BY created_at ASC",
        )
        .bind(&client_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.iter().map(review_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_elapsed_reservations(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query(
            "SELECT
                id,
                client_id,
                provider_id,
                listing_id,
                quote_id,
                starts_at,
                duration_minutes,
                place,
                participants,
                photos_json,
                amount,
                deposit,
                status,
                created_at
             FROM reservation
             WHERE status = 'confirmed'
               AND datetime(starts_at, '+' || duration_minutes || ' minutes') <= ?
             ORDER BY starts_at ASC",
        )
        .bind(format_event_time(now))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.iter().map(reservation_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn apply(&self, changes: ChangeSet) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Returning early drops the transaction, which rolls it back.
        execute_write(&mut *tx, &changes.primary).await?;
        for write in &changes.dependents {
            if let Err(error) = execute_write(&mut *tx, write).await {
                return Err(StoreError::DependentWrite {
                    entity: write.entity(),
                    message: error.to_string(),
                });
            }
        }

        tx.commit().await.map_err(backend)?;
        debug!(
            event_name = "db.change_set_committed",
            primary = %changes.primary.entity(),
            dependents = changes.dependents.len(),
            "change set committed"
        );
        Ok(())
    }
}

async fn execute_write(conn: &mut SqliteConnection, write: &Write) -> Result<(), StoreError> {
    match write {
        Write::InsertQuote(quote) => insert_quote(conn, quote).await,
        Write::UpdateQuote { quote, expected } => update_quote(conn, quote, *expected).await,
        Write::InsertReservation(reservation) => insert_reservation(conn, reservation).await,
        Write::UpdateReservation { reservation, expected } => {
            let result = sqlx::query("UPDATE reservation SET status = ? WHERE id = ? AND status = ?")
                .bind(reservation.status.as_str())
                .bind(&reservation.id.0)
                .bind(expected.as_str())
                .execute(&mut *conn)
                .await
                .map_err(|error| write_failure(EntityKind::Reservation, error))?;
            ensure_updated(
                conn,
                EntityKind::Reservation,
                &reservation.id.0,
                expected.as_str(),
                result.rows_affected(),
            )
            .await
        }
        Write::InsertOrder(order) => insert_order(conn, order).await,
        Write::UpdateOrder { order, expected } => {
            let result = sqlx::query(
                "UPDATE orders SET status = ?, delivered_at = ? WHERE id = ? AND status = ?",
            )
            .bind(order.status.as_str())
            .bind(order.delivered_at.map(|value| value.to_rfc3339()))
            .bind(&order.id.0)
            .bind(expected.as_str())
            .execute(&mut *conn)
            .await
            .map_err(|error| write_failure(EntityKind::Order, error))?;
            ensure_updated(conn, EntityKind::Order, &order.id.0, expected.as_str(), result.rows_affected())
                .await
        }
        Write::UpsertDelivery(delivery) => upsert_delivery(conn, delivery).await,
        Write::InsertBlockedSlot(slot) => {
            sqlx::query(
                "INSERT INTO blocked_slot (id, provider_id, starts_at, duration_minutes, reason, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&slot.id.0)
            .bind(&slot.provider_id.0)
            .bind(format_event_time(slot.starts_at))
            .bind(i64::from(slot.duration_minutes))
            .bind(&slot.reason)
            .bind(slot.created_at.to_rfc3339())
            .execute(&mut *conn)
            .await
            .map_err(|error| write_failure(EntityKind::BlockedSlot, error))?;
            Ok(())
        }
        Write::DeleteBlockedSlot(id) => {
            let result = sqlx::query("DELETE FROM blocked_slot WHERE id = ?")
                .bind(&id.0)
                .execute(&mut *conn)
                .await
                .map_err(|error| write_failure(EntityKind::BlockedSlot, error))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::Missing { entity: EntityKind::BlockedSlot, id: id.0.clone() });
            }
            Ok(())
        }
        Write::InsertReview(review) => insert_review(conn, review).await,
    }
}

async fn insert_quote(conn: &mut SqliteConnection, quote: &Quote) -> Result<(), StoreError> {
    let answer = quote.answer.as_ref();
    sqlx::query(
        "INSERT INTO quote (
            id,
            client_id,
            provider_id,
            listing_id,
            starts_at,
            duration_minutes,
            place,
            participants,
            client_comment,
            photos_json,
            provider_comment,
            amount,
            deposit,
            tariff_unit,
            responded_at,
            status,
            created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&quote.id.0)
    .bind(&quote.client_id.0)
    .bind(&quote.provider_id.0)
    .bind(&quote.listing_id.0)
    .bind(format_event_time(quote.starts_at))
    .bind(i64::from(quote.duration_minutes))
    .bind(&quote.place)
    .bind(i64::from(quote.participants))
    .bind(quote.client_comment.as_deref())
    .bind(encode_photos(&quote.photos)?)
    .bind(answer.and_then(|a| a.comment.as_deref()))
    .bind(answer.map(|a| a.amount.to_string()))
    .bind(answer.map(|a| a.deposit.to_string()))
    .bind(answer.and_then(|a| a.tariff_unit.as_deref()))
    .bind(answer.map(|a| a.responded_at.to_rfc3339()))
    .bind(quote.status.as_str())
    .bind(quote.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(|error| write_failure(EntityKind::Quote, error))?;

    Ok(())
}

async fn update_quote(
    conn: &mut SqliteConnection,
    quote: &Quote,
    expected: QuoteStatus,
) -> Result<(), StoreError> {
    let answer = quote.answer.as_ref();
    let result = sqlx::query(
        "UPDATE quote SET
            provider_comment = ?,
            amount = ?,
            deposit = ?,
            tariff_unit = ?,
            responded_at = ?,
            status = ?
         WHERE id = ? AND status = ?",
    )
    .bind(answer.and_then(|a| a.comment.as_deref()))
    .bind(answer.map(|a| a.amount.to_string()))
    .bind(answer.map(|a| a.deposit.to_string()))
    .bind(answer.and_then(|a| a.tariff_unit.as_deref()))
    .bind(answer.map(|a| a.responded_at.to_rfc3339()))
    .bind(quote.status.as_str())
    .bind(&quote.id.0)
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await
    .map_err(|error| write_failure(EntityKind::Quote, error))?;

    ensure_updated(conn, EntityKind::Quote, &quote.id.0, expected.as_str(), result.rows_affected())
        .await
}

async fn insert_reservation(
    conn: &mut SqliteConnection,
    reservation: &Reservation,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO reservation (
            id,
            client_id,
            provider_id,
            listing_id,
            quote_id,
            starts_at,
            duration_minutes,
            place,
            participants,
            photos_json,
            amount,
            deposit,
            status,
            created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&reservation.id.0)
    .bind(&reservation.client_id.0)
    .bind(&reservation.provider_id.0)
    .bind(&reservation.listing_id.0)
    .bind(reservation.quote_id.as_ref().map(|id| id.0.as_str()))
    .bind(format_event_time(reservation.starts_at))
    .bind(i64::from(reservation.duration_minutes))
    .bind(&reservation.place)
    .bind(i64::from(reservation.participants))
    .bind(encode_photos(&reservation.photos)?)
    .bind(reservation.amount.to_string())
    .bind(reservation.deposit.to_string())
    .bind(reservation.status.as_str())
    .bind(reservation.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(|error| write_failure(EntityKind::Reservation, error))?;

    Ok(())
}

async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO orders (
            id,
            client_id,
            provider_id,
            listing_id,
            delivery_address,
            delivery_mode,
            delivery_fee,
            total,
            status,
            created_at,
            delivered_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&order.id.0)
    .bind(&order.client_id.0)
    .bind(&order.provider_id.0)
    .bind(&order.listing_id.0)
    .bind(&order.delivery_address)
    .bind(&order.delivery_mode)
    .bind(order.delivery_fee.to_string())
    .bind(order.total.to_string())
    .bind(order.status.as_str())
    .bind(order.created_at.to_rfc3339())
    .bind(order.delivered_at.map(|value| value.to_rfc3339()))
    .execute(&mut *conn)
    .await
    .map_err(|error| write_failure(EntityKind::Order, error))?;

    for (line_number, line) in order.lines.iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_line (order_id, line_number, model_id, quantity, unit_price, photo, message)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(line_number as i64)
        .bind(&line.model_id.0)
        .bind(i64::from(line.quantity))
        .bind(line.unit_price.to_string())
        .bind(line.photo.as_deref())
        .bind(line.message.as_deref())
        .execute(&mut *conn)
        .await
        .map_err(|error| write_failure(EntityKind::Order, error))?;
    }

    Ok(())
}

async fn upsert_delivery(conn: &mut SqliteConnection, delivery: &Delivery) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO delivery (
            id,
            order_id,
            status,
            tracking_number,
            carrier,
            estimated_date,
            delivered_on,
            updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            tracking_number = excluded.tracking_number,
            carrier = excluded.carrier,
            estimated_date = excluded.estimated_date,
            delivered_on = excluded.delivered_on,
            updated_at = excluded.updated_at",
    )
    .bind(&delivery.id.0)
    .bind(&delivery.order_id.0)
    .bind(delivery.status.as_str())
    .bind(delivery.tracking_number.as_deref())
    .bind(delivery.carrier.as_deref())
    .bind(delivery.estimated_date.map(|date| date.format(DATE_FORMAT).to_string()))
    .bind(delivery.delivered_on.map(|date| date.format(DATE_FORMAT).to_string()))
    .bind(delivery.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(|error| write_failure(EntityKind::Delivery, error))?;

    Ok(())
}

async fn insert_review(conn: &mut SqliteConnection, review: &Review) -> Result<(), StoreError> {
    let (reservation_id, order_id) = match &review.target {
        ReviewTarget::Reservation(id) => (Some(id.0.as_str()), None),
        ReviewTarget::Order(id) => (None, Some(id.0.as_str())),
    };
    sqlx::query(
        "INSERT INTO review (id, client_id, provider_id, reservation_id, order_id, rating, comment, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&review.id.0)
    .bind(&review.client_id.0)
    .bind(&review.provider_id.0)
    .bind(reservation_id)
    .bind(order_id)
    .bind(i64::from(review.rating.value()))
    .bind(review.comment.as_deref())
    .bind(review.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(|error| write_failure(EntityKind::Review, error))?;

    Ok(())
}

/// Turns a zero-row conditional update into `Missing` or `Stale`.
async fn ensure_updated(
    conn: &mut SqliteConnection,
    entity: EntityKind,
    id: &str,
    expected: &'static str,
    rows_affected: u64,
) -> Result<(), StoreError> {
    if rows_affected > 0 {
        return Ok(());
    }

    let table = match entity {
        EntityKind::Quote => "quote",
        EntityKind::Reservation => "reservation",
        EntityKind::Order => "orders",
        EntityKind::Delivery => "delivery",
        EntityKind::BlockedSlot => "blocked_slot",
        EntityKind::Review => "review",
        EntityKind::Listing => "listing",
    };
    let exists = sqlx::query(&format!("SELECT 1 FROM {table} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?
        .is_some();

    if exists {
        Err(StoreError::Stale { entity, id: id.to_owned(), expected })
    } else {
        Err(StoreError::Missing { entity, id: id.to_owned() })
    }
}

fn write_failure(entity: EntityKind, error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(database) = &error {
        if database.is_unique_violation() {
            return StoreError::Duplicate { entity };
        }
    }
    backend(error)
}

fn backend(error: sqlx::Error) -> StoreError {
    RepositoryError::from(error).into()
}

fn encode_photos(photos: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(photos).map_err(|error| StoreError::Backend(error.to_string()))
}

fn listing_from_row(row: &SqliteRow) -> Result<Listing, RepositoryError> {
    Ok(Listing {
        id: ListingId(row.try_get("id")?),
        provider_id: ProviderId(row.try_get("provider_id")?),
        title: row.try_get("title")?,
        tariff_unit: row.try_get("tariff_unit")?,
    })
}

fn quote_from_row(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = QuoteStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status `{status_raw}`")))?;

    let answer = match parse_optional_timestamp("responded_at", row.try_get("responded_at")?)? {
        Some(responded_at) => Some(QuoteAnswer {
            comment: row.try_get("provider_comment")?,
            amount: parse_required_decimal("amount", row.try_get("amount")?)?,
            deposit: parse_required_decimal("deposit", row.try_get("deposit")?)?,
            tariff_unit: row.try_get("tariff_unit")?,
            responded_at,
        }),
        None => None,
    };

    Ok(Quote {
        id: QuoteId(row.try_get("id")?),
        client_id: ClientId(row.try_get("client_id")?),
        provider_id: ProviderId(row.try_get("provider_id")?),
        listing_id: ListingId(row.try_get("listing_id")?),
        starts_at: parse_event_time("starts_at", row.try_get("starts_at")?)?,
        duration_minutes: parse_u32("duration_minutes", row.try_get("duration_minutes")?)?,
        place: row.try_get("place")?,
        participants: parse_u32("participants", row.try_get("participants")?)?,
        client_comment: row.try_get("client_comment")?,
        photos: decode_photos(row.try_get("photos_json")?)?,
        answer,
        status,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn reservation_from_row(row: &SqliteRow) -> Result<Reservation, RepositoryError> {
    Ok(Reservation {
        id: ReservationId(row.try_get("id")?),
        client_id: ClientId(row.try_get("client_id")?),
        provider_id: ProviderId(row.try_get("provider_id")?),
        listing_id: ListingId(row.try_get("listing_id")?),
        quote_id: row.try_get::<Option<String>, _>("quote_id")?.map(QuoteId),
        starts_at: parse_event_time("starts_at", row.try_get("starts_at")?)?,
        duration_minutes: parse_u32("duration_minutes", row.try_get("duration_minutes")?)?,
        place: row.try_get("place")?,
        participants: parse_u32("participants", row.try_get("participants")?)?,
        photos: decode_photos(row.try_get("photos_json")?)?,
        amount: parse_decimal("amount", row.try_get("amount")?)?,
        deposit: parse_decimal("deposit", row.try_get("deposit")?)?,
        status: parse_reservation_status(row.try_get("status")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn reservation_commitment_from_row(row: &SqliteRow) -> Result<Commitment, RepositoryError> {
    Ok(Commitment {
        source: CommitmentSource::Reservation {
            id: ReservationId(row.try_get("id")?),
            status: parse_reservation_status(row.try_get("status")?)?,
        },
        starts_at: parse_event_time("starts_at", row.try_get("starts_at")?)?,
        duration_minutes: parse_u32("duration_minutes", row.try_get("duration_minutes")?)?,
    })
}

fn blocked_commitment_from_row(row: &SqliteRow) -> Result<Commitment, RepositoryError> {
    Ok(Commitment {
        source: CommitmentSource::BlockedSlot {
            id: BlockedSlotId(row.try_get("id")?),
            reason: row.try_get("reason")?,
        },
        starts_at: parse_event_time("starts_at", row.try_get("starts_at")?)?,
        duration_minutes: parse_u32("duration_minutes", row.try_get("duration_minutes")?)?,
    })
}

fn order_from_row(row: &SqliteRow, lines: Vec<OrderLine>) -> Result<Order, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_raw}`")))?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        client_id: ClientId(row.try_get("client_id")?),
        provider_id: ProviderId(row.try_get("provider_id")?),
        listing_id: ListingId(row.try_get("listing_id")?),
        lines,
        delivery_address: row.try_get("delivery_address")?,
        delivery_mode: row.try_get("delivery_mode")?,
        delivery_fee: parse_decimal("delivery_fee", row.try_get("delivery_fee")?)?,
        total: parse_decimal("total", row.try_get("total")?)?,
        status,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        delivered_at: parse_optional_timestamp("delivered_at", row.try_get("delivered_at")?)?,
    })
}

fn order_line_from_row(row: &SqliteRow) -> Result<OrderLine, RepositoryError> {
    Ok(OrderLine {
        model_id: ModelId(row.try_get("model_id")?),
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        photo: row.try_get("photo")?,
        message: row.try_get("message")?,
    })
}

fn delivery_from_row(row: &SqliteRow) -> Result<Delivery, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = DeliveryStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown delivery status `{status_raw}`")))?;

    Ok(Delivery {
        id: DeliveryId(row.try_get("id")?),
        order_id: OrderId(row.try_get("order_id")?),
        status,
        tracking_number: row.try_get("tracking_number")?,
        carrier: row.try_get("carrier")?,
        estimated_date: parse_optional_date("estimated_date", row.try_get("estimated_date")?)?,
        delivered_on: parse_optional_date("delivered_on", row.try_get("delivered_on")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn blocked_slot_from_row(row: &SqliteRow) -> Result<BlockedSlot, RepositoryError> {
    Ok(BlockedSlot {
        id: BlockedSlotId(row.try_get("id")?),
        provider_id: ProviderId(row.try_get("provider_id")?),
        starts_at: parse_event_time("starts_at", row.try_get("starts_at")?)?,
        duration_minutes: parse_u32("duration_minutes", row.try_get("duration_minutes")?)?,
        reason: row.try_get("reason")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn review_from_row(row: &SqliteRow) -> Result<Review, RepositoryError> {
    let reservation_id: Option<String> = row.try_get("reservation_id")?;
    let order_id: Option<String> = row.try_get("order_id")?;
    let target = match (reservation_id, order_id) {
        (Some(id), None) => ReviewTarget::Reservation(ReservationId(id)),
        (None, Some(id)) => ReviewTarget::Order(OrderId(id)),
        _ => {
            return Err(RepositoryError::Decode(
                "review must reference exactly one reservation or order".to_owned(),
            ))
        }
    };

    let rating_raw: i64 = row.try_get("rating")?;
    let rating = i32::try_from(rating_raw)
        .ok()
        .and_then(|value| Rating::new(value).ok())
        .ok_or_else(|| RepositoryError::Decode(format!("invalid rating `{rating_raw}`")))?;

    Ok(Review {
        id: ReviewId(row.try_get("id")?),
        client_id: ClientId(row.try_get("client_id")?),
        provider_id: ProviderId(row.try_get("provider_id")?),
        target,
        rating,
        comment: row.try_get("comment")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn format_event_time(value: NaiveDateTime) -> String {
    value.format(EVENT_TIME_FORMAT).to_string()
}

fn parse_event_time(column: &str, value: String) -> Result<NaiveDateTime, RepositoryError> {
    NaiveDateTime::parse_from_str(&value, EVENT_TIME_FORMAT).map_err(|error| {
        RepositoryError::Decode(format!("invalid event time in `{column}`: `{value}` ({error})"))
    })
}

fn parse_reservation_status(value: String) -> Result<ReservationStatus, RepositoryError> {
    ReservationStatus::parse(&value)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown reservation status `{value}`")))
}

fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

fn parse_required_decimal(column: &str, value: Option<String>) -> Result<Decimal, RepositoryError> {
    let value =
        value.ok_or_else(|| RepositoryError::Decode(format!("missing value for `{column}`")))?;
    parse_decimal(column, value)
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

fn parse_optional_date(
    column: &str,
    value: Option<String>,
) -> Result<Option<NaiveDate>, RepositoryError> {
    value
        .map(|date| {
            NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|error| {
                RepositoryError::Decode(format!("invalid date in `{column}`: `{date}` ({error})"))
            })
        })
        .transpose()
}

fn decode_photos(value: String) -> Result<Vec<String>, RepositoryError> {
    serde_json::from_str(&value)
        .map_err(|error| RepositoryError::Decode(format!("invalid photos_json `{value}` ({error})")))
}
