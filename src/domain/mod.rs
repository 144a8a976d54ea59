//! Shared domain vocabulary used across the store, scoring engine,
//! identity matcher and orchestrator. These types carry no persistence
//! concerns of their own — see `crate::store::entities` for the
//! sea-orm models that back them.

mod claim;
mod ids;
mod media_type;
mod status;

pub use claim::{CanonicalValue, ExtractedClaim, MetadataClaim};
pub use ids::{AssetId, EditionId, EntityId, EntityKind, HubId, WorkId};
pub use media_type::MediaType;
pub use status::{AssetStatus, Disposition};
