use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::party::ProviderId;

entity_id!(BlockedSlotId);

/// A period a provider marked unavailable by hand. It has no lifecycle: it is
/// created and deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSlot {
    pub id: BlockedSlotId,
    pub provider_id: ProviderId,
    pub starts_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl BlockedSlot {
    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at + Duration::minutes(i64::from(self.duration_minutes))
    }
}
