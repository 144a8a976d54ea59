use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a `MediaAsset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssetStatus {
	Normal,
	Conflicted,
	Orphaned,
}

/// Verdict produced by the identity matcher / hub arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Disposition {
	AutoLinked,
	NeedsReview,
	Rejected,
}
