//! Append-only audit trail, pruned to a configured maximum row count.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_log")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i64,
	pub event_type: String,
	pub entity_type: String,
	pub entity_id: String,
	pub occurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
