//! Provider calendar: commitments, conflict detection and the hourly
//! occupancy grid shown to providers.
//!
//! Conflict detection works on exact `[start, start + duration)` intervals.
//! The grid rounds each commitment up to whole hours and is clipped to the
//! configured display hours; neither rounding nor clipping affects conflicts.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::blocked_slot::{BlockedSlot, BlockedSlotId};
use crate::domain::reservation::{Reservation, ReservationId, ReservationStatus};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommitmentSource {
    Reservation { id: ReservationId, status: ReservationStatus },
    BlockedSlot { id: BlockedSlotId, reason: String },
    /// A slot being considered, not yet stored.
    Proposed,
}

impl std::fmt::Display for CommitmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reservation { id, status } => write!(f, "reservation {id} ({})", status.as_str()),
            Self::BlockedSlot { id, reason } if reason.is_empty() => write!(f, "blocked {id}"),
            Self::BlockedSlot { id, reason } => write!(f, "blocked {id}: {reason}"),
            Self::Proposed => f.write_str("proposed"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub source: CommitmentSource,
    pub starts_at: NaiveDateTime,
    pub duration_minutes: u32,
}

impl Commitment {
    /// `None` for reservations that no longer hold their slot.
    pub fn from_reservation(reservation: &Reservation) -> Option<Self> {
        reservation.status.occupies_calendar().then(|| Self {
            source: CommitmentSource::Reservation {
                id: reservation.id.clone(),
                status: reservation.status,
            },
            starts_at: reservation.starts_at,
            duration_minutes: reservation.duration_minutes,
        })
    }

    pub fn from_blocked_slot(slot: &BlockedSlot) -> Self {
        Self {
            source: CommitmentSource::BlockedSlot {
                id: slot.id.clone(),
                reason: slot.reason.clone(),
            },
            starts_at: slot.starts_at,
            duration_minutes: slot.duration_minutes,
        }
    }

    pub fn proposed(starts_at: NaiveDateTime, duration_minutes: u32) -> Self {
        Self { source: CommitmentSource::Proposed, starts_at, duration_minutes }
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// End of the commitment on the hourly grid: the duration rounded up to
    /// whole hours.
    pub fn display_ends_at(&self) -> NaiveDateTime {
        let hours = self.duration_minutes.div_ceil(60);
        self.starts_at + Duration::hours(i64::from(hours))
    }

    pub fn overlaps(&self, other: &Commitment) -> bool {
        self.starts_at < other.ends_at() && other.starts_at < self.ends_at()
    }

    pub fn occupies_calendar(&self) -> bool {
        match &self.source {
            CommitmentSource::Reservation { status, .. } => status.occupies_calendar(),
            CommitmentSource::BlockedSlot { .. } | CommitmentSource::Proposed => true,
        }
    }

    /// Firm commitments: blocked slots and confirmed or finished reservations.
    /// Requests still awaiting the provider are tentative.
    pub fn locks_slot(&self) -> bool {
        match &self.source {
            CommitmentSource::Reservation { status, .. } => status.locks_slot(),
            CommitmentSource::BlockedSlot { .. } => true,
            CommitmentSource::Proposed => false,
        }
    }

    pub fn reservation_id(&self) -> Option<&ReservationId> {
        match &self.source {
            CommitmentSource::Reservation { id, .. } => Some(id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub conflicts: Vec<Commitment>,
}

impl Availability {
    /// Fails when any conflict is a firm commitment. Used by transitions that
    /// lock a slot in; tentative overlaps are left to the provider.
    pub fn require_free(self) -> Result<(), DomainError> {
        let conflicts: Vec<Commitment> =
            self.conflicts.into_iter().filter(Commitment::locks_slot).collect();
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(DomainError::SlotUnavailable { conflicts })
        }
    }
}

/// Checks a proposed slot against a provider's commitments. Commitments that
/// no longer occupy the calendar are ignored even if passed in.
pub fn check_availability(
    commitments: &[Commitment],
    starts_at: NaiveDateTime,
    duration_minutes: u32,
) -> Result<Availability, DomainError> {
    if duration_minutes == 0 {
        return Err(DomainError::Validation("duration must be at least one minute".to_owned()));
    }

    let proposed = Commitment::proposed(starts_at, duration_minutes);
    let conflicts: Vec<Commitment> = commitments
        .iter()
        .filter(|commitment| commitment.occupies_calendar() && commitment.overlaps(&proposed))
        .cloned()
        .collect();

    Ok(Availability { available: conflicts.is_empty(), conflicts })
}

/// First and last (exclusive) hour shown on the provider's day grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for DisplayHours {
    fn default() -> Self {
        Self { start_hour: 8, end_hour: 19 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourCell {
    pub starts_at: NaiveDateTime,
    pub occupied_by: Vec<Commitment>,
}

impl HourCell {
    pub fn is_free(&self) -> bool {
        self.occupied_by.is_empty()
    }
}

/// One cell per display hour of `day`, each listing the commitments whose
/// rounded display interval covers it.
pub fn occupancy_timeline(
    commitments: &[Commitment],
    day: NaiveDate,
    hours: DisplayHours,
) -> Vec<HourCell> {
    (hours.start_hour..hours.end_hour.min(24))
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .map(|time| {
            let starts_at = day.and_time(time);
            let ends_at = starts_at + Duration::hours(1);
            let occupied_by = commitments
                .iter()
                .filter(|c| c.occupies_calendar())
                .filter(|c| c.starts_at < ends_at && starts_at < c.display_ends_at())
                .cloned()
                .collect();
            HourCell { starts_at, occupied_by }
        })
        .collect()
}
