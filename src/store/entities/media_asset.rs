//! A file on disk (or a manifest of files treated as one), identified by
//! its content hash.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "media_assets")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: String,
	pub edition_id: String,
	#[sea_orm(unique)]
	pub content_hash: String,
	pub file_path_root: String,
	pub status: String,
	/// JSON array of additional file paths when this asset is a
	/// multi-file manifest (e.g. a comic split across volumes).
	pub manifest: Option<Json>,
	pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::edition::Entity",
		from = "Column::EditionId",
		to = "super::edition::Column::Id"
	)]
	Edition,
}

impl Related<super::edition::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Edition.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
