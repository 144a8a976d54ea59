//! The narrative identity grouping every format of a single work.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "hubs")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: String,
	pub universe_id: Option<String>,
	pub display_name: String,
	pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::work::Entity")]
	Works,
}

impl Related<super::work::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Works.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
