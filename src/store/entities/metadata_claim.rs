//! Append-only atomic metadata assertions. Never updated or deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "metadata_claims")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: String,
	/// Discriminator for the polymorphic target the database cannot
	/// enforce: `"work"` or `"edition"`.
	pub entity_kind: String,
	pub entity_id: String,
	pub provider_id: String,
	pub claim_key: String,
	pub claim_value: String,
	pub confidence: f64,
	pub claimed_at: DateTimeUtc,
	pub is_user_locked: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
