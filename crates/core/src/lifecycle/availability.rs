use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::info;

use super::{ensure_provider, found, lookup_failure, LifecycleEngine};
use crate::calendar::{self, Availability, Commitment, HourCell};
use crate::domain::blocked_slot::{BlockedSlot, BlockedSlotId};
use crate::domain::party::ProviderId;
use crate::domain::EntityKind;
use crate::errors::ApplicationError;
use crate::ports::{BookingStore, ChangeSet, Notifier, Write};

impl<S, N> LifecycleEngine<S, N>
where
    S: BookingStore,
    N: Notifier,
{
    /// Every commitment of `provider` overlapping the proposed slot, tentative
    /// ones included.
    pub async fn check_availability(
        &self,
        provider: &ProviderId,
        starts_at: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<Availability, ApplicationError> {
        self.calendar.check_slot(starts_at, duration_minutes)?;
        let ends_at = starts_at + Duration::minutes(i64::from(duration_minutes));
        let commitments = self.commitments_between(provider, starts_at, ends_at).await?;
        Ok(calendar::check_availability(&commitments, starts_at, duration_minutes)?)
    }

    /// The provider's hourly grid for `day`.
    pub async fn day_timeline(
        &self,
        provider: &ProviderId,
        day: NaiveDate,
    ) -> Result<Vec<HourCell>, ApplicationError> {
        let from = day.and_time(NaiveTime::MIN);
        // Cells round commitment ends up to the hour, so one ending up to 59
        // minutes before midnight can still cover the 00:00 cell.
        let commitments = self
            .commitments_between(provider, from - Duration::minutes(59), from + Duration::days(1))
            .await?;
        Ok(calendar::occupancy_timeline(&commitments, day, self.calendar.display_hours))
    }

    /// Marks a period unavailable. Without an explicit duration the
    /// configured default applies.
    pub async fn block_slot(
        &self,
        provider: &ProviderId,
        starts_at: NaiveDateTime,
        duration_minutes: Option<u32>,
        reason: &str,
    ) -> Result<BlockedSlot, ApplicationError> {
        let duration_minutes = duration_minutes.unwrap_or(self.calendar.blocked_slot_minutes);
        self.calendar.check_slot(starts_at, duration_minutes)?;

        let slot = BlockedSlot {
            id: BlockedSlotId::generate(),
            provider_id: provider.clone(),
            starts_at,
            duration_minutes,
            reason: reason.trim().to_owned(),
            created_at: Utc::now(),
        };
        self.commit(ChangeSet::single(Write::InsertBlockedSlot(slot.clone())), "block").await?;
        info!(
            event_name = "calendar.slot_blocked",
            blocked_slot_id = %slot.id,
            provider_id = %slot.provider_id,
            starts_at = %slot.starts_at,
            duration_minutes = slot.duration_minutes,
            "slot blocked"
        );
        Ok(slot)
    }

    pub async fn unblock_slot(
        &self,
        provider: &ProviderId,
        slot_id: &BlockedSlotId,
    ) -> Result<(), ApplicationError> {
        let slot = self.store.find_blocked_slot(slot_id).await.map_err(lookup_failure)?;
        let slot = found(slot, EntityKind::BlockedSlot, slot_id.as_str())?;
        ensure_provider(provider, &slot.provider_id, EntityKind::BlockedSlot, slot_id.as_str())?;

        self.commit(ChangeSet::single(Write::DeleteBlockedSlot(slot.id.clone())), "unblock").await?;
        info!(event_name = "calendar.slot_unblocked", blocked_slot_id = %slot.id, "slot unblocked");
        Ok(())
    }

    pub(super) async fn commitments_between(
        &self,
        provider: &ProviderId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Commitment>, ApplicationError> {
        self.store.list_commitments(provider, from, to).await.map_err(lookup_failure)
    }
}
