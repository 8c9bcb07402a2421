use serde::{Deserialize, Serialize};

use crate::domain::party::ProviderId;

entity_id!(ListingId);

/// Read-only view of a provider's catalogue entry. Listings are managed
/// elsewhere; the lifecycle only needs the owner and the tariff unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub provider_id: ProviderId,
    pub title: String,
    /// Unit the listing's tariff is expressed in ("per hour", "per guest", ...).
    pub tariff_unit: Option<String>,
}
