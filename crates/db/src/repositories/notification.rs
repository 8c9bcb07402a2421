use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use festa_core::domain::notification::{Notification, NotificationKind, Recipient};
use festa_core::domain::party::{ClientId, ProviderId};
use festa_core::ports::{Notifier, NotifyError};

use super::RepositoryError;
use crate::DbPool;

/// Persists notifications in the `notification` table. Delivery to users is
/// left to whatever reads that table.
pub struct SqlNotifier {
    pool: DbPool,
}

impl SqlNotifier {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_for(&self, recipient: &Recipient) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT recipient_role, recipient_id, kind, content, is_read
             FROM notification
             WHERE recipient_role = ? AND recipient_id = ?
             ORDER BY id ASC",
        )
        .bind(recipient.role())
        .bind(recipient.id())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }
}

#[async_trait::async_trait]
impl Notifier for SqlNotifier {
    async fn enqueue(&self, notification: Notification) -> Result<(), NotifyError> {
        sqlx::query(
            "INSERT INTO notification (recipient_role, recipient_id, kind, content, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(notification.recipient.role())
        .bind(notification.recipient.id())
        .bind(notification.kind.as_str())
        .bind(&notification.content)
        .bind(i64::from(notification.read))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| NotifyError(error.to_string()))?;

        Ok(())
    }
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification, RepositoryError> {
    let role: String = row.try_get("recipient_role")?;
    let id: String = row.try_get("recipient_id")?;
    let recipient = match role.as_str() {
        "client" => Recipient::Client(ClientId(id)),
        "provider" => Recipient::Provider(ProviderId(id)),
        other => {
            return Err(RepositoryError::Decode(format!("unknown recipient role `{other}`")));
        }
    };
    let kind_raw: String = row.try_get("kind")?;
    let kind = NotificationKind::parse(&kind_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown notification kind `{kind_raw}`"))
    })?;

    Ok(Notification {
        recipient,
        kind,
        content: row.try_get("content")?,
        read: row.try_get::<i64, _>("is_read")? != 0,
    })
}

#[cfg(test)]
mod tests {
    use festa_core::domain::notification::{Notification, NotificationKind, Recipient};
    use festa_core::domain::party::ClientId;
    use festa_core::ports::Notifier;

    use super::SqlNotifier;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn enqueued_notifications_are_listed_per_recipient_unread() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let notifier = SqlNotifier::new(pool);
        let client = Recipient::Client(ClientId("C-1".to_owned()));

        notifier
            .enqueue(Notification::new(
                client.clone(),
                NotificationKind::ReservationConfirmed,
                "Your reservation is confirmed",
            ))
            .await
            .expect("enqueue");
        notifier
            .enqueue(Notification::new(
                Recipient::Client(ClientId("C-2".to_owned())),
                NotificationKind::OrderShipped,
                "Shipped",
            ))
            .await
            .expect("enqueue");

        let listed = notifier.list_for(&client).await.expect("list");

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].kind, NotificationKind::ReservationConfirmed);
        assert!(!listed[0].read);
    }
}
