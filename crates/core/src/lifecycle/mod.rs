//! The booking and fulfilment operations.
//!
//! Each operation loads what it needs, checks the actor, runs the domain
//! transition, hands the resulting writes to the store as one [`ChangeSet`]
//! and only then notifies the counterparty. Nothing is written when a check
//! or transition fails.

pub mod availability;
pub mod orders;
pub mod quotes;
pub mod reservations;
pub mod reviews;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::calendar::DisplayHours;
use crate::config::CalendarConfig;
use crate::domain::notification::Notification;
use crate::domain::party::{Actor, ClientId, ProviderId};
use crate::domain::{validate_slot, EntityKind};
use crate::errors::{ApplicationError, DomainError};
use crate::ports::{BookingStore, ChangeSet, Notifier, StoreError};

pub use reservations::{FinishReport, SkippedReservation};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalendarPolicy {
    pub enforce_on_confirm: bool,
    pub blocked_slot_minutes: u32,
    pub max_duration_minutes: u32,
    pub display_hours: DisplayHours,
}

impl CalendarPolicy {
    /// Slot shape every new quote, booking, block and availability query
    /// must satisfy.
    pub fn check_slot(
        &self,
        starts_at: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<(), DomainError> {
        validate_slot(starts_at, duration_minutes)?;
        if duration_minutes > self.max_duration_minutes {
            return Err(DomainError::Validation(format!(
                "duration of {duration_minutes} minutes exceeds the configured limit of {} minutes",
                self.max_duration_minutes
            )));
        }
        Ok(())
    }
}

impl Default for CalendarPolicy {
    fn default() -> Self {
        Self {
            enforce_on_confirm: true,
            blocked_slot_minutes: 60,
            max_duration_minutes: 7 * 24 * 60,
            display_hours: DisplayHours::default(),
        }
    }
}

impl From<&CalendarConfig> for CalendarPolicy {
    fn from(config: &CalendarConfig) -> Self {
        Self {
            enforce_on_confirm: config.enforce_on_confirm,
            blocked_slot_minutes: config.blocked_slot_minutes,
            max_duration_minutes: config.max_duration_minutes,
            display_hours: config.display_hours(),
        }
    }
}

pub struct LifecycleEngine<S, N> {
    store: S,
    notifier: N,
    calendar: CalendarPolicy,
}

impl<S, N> LifecycleEngine<S, N>
where
    S: BookingStore,
    N: Notifier,
{
    pub fn new(store: S, notifier: N) -> Self {
        Self { store, notifier, calendar: CalendarPolicy::default() }
    }

    pub fn with_calendar_policy(mut self, calendar: CalendarPolicy) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn calendar_policy(&self) -> CalendarPolicy {
        self.calendar
    }

    async fn commit(&self, changes: ChangeSet, action: &'static str) -> Result<(), ApplicationError> {
        self.store.apply(changes).await.map_err(|error| store_failure(error, action))
    }

    /// Notifications are best effort: a failure is logged and the already
    /// committed transition stands.
    async fn notify(&self, notification: Notification) {
        let recipient = notification.recipient.id().to_owned();
        let kind = notification.kind.as_str();
        if let Err(error) = self.notifier.enqueue(notification).await {
            warn!(
                event_name = "notification.enqueue_failed",
                recipient = %recipient,
                kind,
                error = %error,
                "notification dropped after committed transition"
            );
        }
    }
}

fn store_failure(error: StoreError, action: &'static str) -> ApplicationError {
    match error {
        StoreError::Stale { entity, .. } => ApplicationError::Domain(DomainError::InvalidState {
            entity,
            status: "changed by a concurrent update",
            action,
        }),
        StoreError::Missing { entity, id } => ApplicationError::NotFound { entity, id },
        StoreError::DependentWrite { entity, message } => {
            ApplicationError::DependentWriteFailed { entity, message }
        }
        error @ (StoreError::Duplicate { .. } | StoreError::Backend(_)) => {
            ApplicationError::Persistence(error.to_string())
        }
    }
}

fn lookup_failure(error: StoreError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn found<T>(value: Option<T>, entity: EntityKind, id: &str) -> Result<T, ApplicationError> {
    value.ok_or_else(|| ApplicationError::NotFound { entity, id: id.to_owned() })
}

fn ensure_client(
    actor: &ClientId,
    owner: &ClientId,
    entity: EntityKind,
    id: &str,
) -> Result<(), ApplicationError> {
    if actor == owner {
        return Ok(());
    }
    Err(ApplicationError::Unauthorized {
        entity,
        id: id.to_owned(),
        role: "client",
        actor: actor.to_string(),
    })
}

fn ensure_provider(
    actor: &ProviderId,
    owner: &ProviderId,
    entity: EntityKind,
    id: &str,
) -> Result<(), ApplicationError> {
    if actor == owner {
        return Ok(());
    }
    Err(ApplicationError::Unauthorized {
        entity,
        id: id.to_owned(),
        role: "provider",
        actor: actor.to_string(),
    })
}

fn ensure_party(
    actor: &Actor,
    client: &ClientId,
    provider: &ProviderId,
    entity: EntityKind,
    id: &str,
) -> Result<(), ApplicationError> {
    if actor.is_party_to(client, provider) {
        return Ok(());
    }
    Err(ApplicationError::Unauthorized {
        entity,
        id: id.to_owned(),
        role: actor.role(),
        actor: actor.id().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::store_failure;
    use crate::domain::EntityKind;
    use crate::errors::{ApplicationError, DomainError};
    use crate::ports::StoreError;

    #[test]
    fn lost_race_reads_as_invalid_state() {
        let mapped = store_failure(
            StoreError::Stale {
                entity: EntityKind::Reservation,
                id: "R-1".to_owned(),
                expected: "pending",
            },
            "confirm",
        );

        assert!(matches!(
            mapped,
            ApplicationError::Domain(DomainError::InvalidState {
                entity: EntityKind::Reservation,
                action: "confirm",
                ..
            })
        ));
    }

    #[test]
    fn dependent_failure_is_surfaced_as_such() {
        let mapped = store_failure(
            StoreError::DependentWrite {
                entity: EntityKind::Delivery,
                message: "constraint failed".to_owned(),
            },
            "ship",
        );

        assert!(matches!(
            mapped,
            ApplicationError::DependentWriteFailed { entity: EntityKind::Delivery, .. }
        ));
    }
}
