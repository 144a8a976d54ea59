//! The scored winner per (entity, claim_key). Replaced, not appended.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "canonical_values")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub entity_kind: String,
	#[sea_orm(primary_key, auto_increment = false)]
	pub entity_id: String,
	#[sea_orm(primary_key, auto_increment = false)]
	pub key: String,
	pub value: String,
	pub last_scored_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
