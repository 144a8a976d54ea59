//! One intellectual title within a Hub.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "works")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: String,
	/// Nullable only so an orphaned Work can survive its Hub's deletion;
	/// every Work is created with a Hub attached.
	pub hub_id: Option<String>,
	pub media_type: String,
	pub sequence_index: Option<i32>,
	pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::hub::Entity",
		from = "Column::HubId",
		to = "super::hub::Column::Id"
	)]
	Hub,
	#[sea_orm(has_many = "super::edition::Entity")]
	Editions,
}

impl Related<super::hub::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Hub.def()
	}
}

impl Related<super::edition::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Editions.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
