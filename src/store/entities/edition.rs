//! A physical manifestation of a Work.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "editions")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: String,
	pub work_id: String,
	pub format_label: Option<String>,
	pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::work::Entity",
		from = "Column::WorkId",
		to = "super::work::Column::Id"
	)]
	Work,
	#[sea_orm(has_many = "super::media_asset::Entity")]
	Assets,
}

impl Related<super::work::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Work.def()
	}
}

impl Related<super::media_asset::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Assets.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
