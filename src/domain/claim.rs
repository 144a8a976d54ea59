use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EntityId;

/// An append-only atomic assertion from one provider about one field of
/// one entity. Claims are never deleted or edited; re-scoring replays
/// the full history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataClaim {
	pub id: Uuid,
	pub entity_id: EntityId,
	pub provider_id: String,
	pub claim_key: String,
	pub claim_value: String,
	pub confidence: f64,
	pub claimed_at: DateTime<Utc>,
	pub is_user_locked: bool,
}

impl MetadataClaim {
	/// Build a claim as it would be appended by a processor during
	/// ingestion: never user-locked, timestamped now.
	pub fn from_extracted(entity_id: EntityId, provider_id: impl Into<String>, claim: ExtractedClaim) -> Self {
		Self {
			id: Uuid::new_v4(),
			entity_id,
			provider_id: provider_id.into(),
			claim_key: claim.key,
			claim_value: claim.value,
			confidence: claim.confidence,
			claimed_at: Utc::now(),
			is_user_locked: false,
		}
	}

	/// Build a claim representing an explicit user override
	/// (`PATCH /metadata/lock-claim`): confidence is always 1.0 and the
	/// claim is permanently user-locked.
	pub fn user_lock(entity_id: EntityId, claim_key: impl Into<String>, claim_value: impl Into<String>) -> Self {
		Self {
			id: Uuid::new_v4(),
			entity_id,
			provider_id: "user".to_string(),
			claim_key: claim_key.into(),
			claim_value: claim_value.into(),
			confidence: 1.0,
			claimed_at: Utc::now(),
			is_user_locked: true,
		}
	}
}

/// A key/value/confidence triple produced by a format processor, not yet
/// attached to an entity or provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedClaim {
	pub key: String,
	pub value: String,
	pub confidence: f64,
}

impl ExtractedClaim {
	pub fn new(key: impl Into<String>, value: impl Into<String>, confidence: f64) -> Self {
		Self {
			key: key.into(),
			value: value.into(),
			confidence,
		}
	}
}

/// The scored winner for one (entity, key) pair. Replaced wholesale by
/// each re-scoring pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalValue {
	pub entity_id: EntityId,
	pub key: String,
	pub value: String,
	pub last_scored_at: DateTime<Utc>,
}
