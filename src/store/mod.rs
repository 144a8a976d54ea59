//! C1 — the append-only persistent catalogue: hubs, works, editions,
//! assets, claims and canonical values, backed by SQLite through
//! `sea-orm`. Single-writer-friendly: WAL mode, foreign keys on, a
//! startup integrity check that refuses to start on corruption.

pub mod entities;
pub mod error;
mod migration;

use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectOptions, ConnectionTrait,
	Database as SeaDatabase, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Statement,
};
use sea_orm_migration::MigratorTrait;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub use error::{StoreError, StoreResult};

use crate::domain::{
	AssetId, AssetStatus, CanonicalValue, EditionId, EntityId, EntityKind, HubId, MediaType,
	MetadataClaim, WorkId,
};

/// Outcome of `insert_asset`: duplicate content hashes are not an error,
/// they are a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
	Inserted,
	DuplicateHash,
}

/// A Work loaded with its canonical values, as returned by `list_hubs`.
#[derive(Debug, Clone)]
pub struct WorkWithCanonical {
	pub id: WorkId,
	pub media_type: MediaType,
	pub sequence_index: Option<i32>,
	pub canonical_values: Vec<(String, String)>,
}

/// A Hub loaded with all of its Works, as returned by `list_hubs`.
#[derive(Debug, Clone)]
pub struct HubWithWorks {
	pub id: HubId,
	pub display_name: String,
	pub created_at: chrono::DateTime<Utc>,
	pub works: Vec<WorkWithCanonical>,
}

/// A new asset ready to be inserted, prior to knowing whether its hash
/// collides with an existing row.
#[derive(Debug, Clone)]
pub struct NewAsset {
	pub id: AssetId,
	pub edition_id: EditionId,
	pub content_hash: String,
	pub file_path_root: String,
	pub manifest: Option<Vec<String>>,
}

pub struct Store {
	conn: DatabaseConnection,
}

impl Store {
	/// Open (creating if absent) the catalogue at `path`, apply
	/// pragmas, run migrations and verify integrity. Returns
	/// `StoreError::Corrupt` if `PRAGMA integrity_check` reports
	/// anything other than `"ok"` — the engine must refuse to start.
	pub async fn open(path: &Path) -> StoreResult<Self> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}

		let db_url = format!("sqlite://{}?mode=rwc", path.display());
		let mut opt = ConnectOptions::new(db_url);
		opt.max_connections(10)
			.min_connections(1)
			.connect_timeout(Duration::from_secs(8))
			.idle_timeout(Duration::from_secs(8))
			.sqlx_logging(false);

		let conn = SeaDatabase::connect(opt).await?;
		Self::apply_pragmas(&conn).await?;

		migration::Migrator::up(&conn, None).await?;
		info!("catalogue migrations applied at {:?}", path);

		let store = Self { conn };
		store.check_integrity().await?;
		Ok(store)
	}

	async fn apply_pragmas(conn: &DatabaseConnection) -> StoreResult<()> {
		for pragma in [
			"PRAGMA journal_mode=WAL",
			"PRAGMA synchronous=NORMAL",
			"PRAGMA foreign_keys=ON",
			"PRAGMA temp_store=MEMORY",
		] {
			conn.execute(Statement::from_string(sea_orm::DatabaseBackend::Sqlite, pragma))
				.await?;
		}
		Ok(())
	}

	async fn check_integrity(&self) -> StoreResult<()> {
		let result = self
			.conn
			.query_one(Statement::from_string(
				sea_orm::DatabaseBackend::Sqlite,
				"PRAGMA integrity_check",
			))
			.await?;

		let ok = result
			.and_then(|row| row.try_get::<String>("", "integrity_check").ok())
			.map(|s| s.eq_ignore_ascii_case("ok"))
			.unwrap_or(false);

		if ok {
			Ok(())
		} else {
			Err(StoreError::Corrupt(
				"PRAGMA integrity_check did not report ok".to_string(),
			))
		}
	}

	pub fn conn(&self) -> &DatabaseConnection {
		&self.conn
	}

	/// Idempotent Hub→Work→Edition reuse by case-insensitive
	/// `display_name` lookup. Returns the matching Hub if one exists.
	pub async fn find_hub_by_display_name(&self, display_name: &str) -> StoreResult<Option<entities::hub::Model>> {
		use sea_orm::sea_query::Expr;

		let hub = entities::hub::Entity::find()
			.filter(Expr::cust_with_values(
				"LOWER(display_name) = LOWER(?)",
				[display_name],
			))
			.one(&self.conn)
			.await?;
		Ok(hub)
	}

	pub async fn create_hub(&self, display_name: &str) -> StoreResult<entities::hub::Model> {
		let model = entities::hub::ActiveModel {
			id: Set(Uuid::new_v4().to_string()),
			universe_id: Set(None),
			display_name: Set(display_name.to_string()),
			created_at: Set(Utc::now()),
		};
		Ok(model.insert(&self.conn).await?)
	}

	pub async fn create_work(
		&self,
		hub_id: HubId,
		media_type: MediaType,
		sequence_index: Option<i32>,
	) -> StoreResult<entities::work::Model> {
		let model = entities::work::ActiveModel {
			id: Set(WorkId::new().to_string()),
			hub_id: Set(Some(hub_id.to_string())),
			media_type: Set(media_type.to_string()),
			sequence_index: Set(sequence_index),
			created_at: Set(Utc::now()),
		};
		Ok(model.insert(&self.conn).await?)
	}

	/// Creates an Edition under a pre-assigned id. The orchestrator
	/// pre-assigns the Edition id before the Hub→Work→Edition chain
	/// exists so that claims can be scoped to it during scoring before
	/// the chain is materialised.
	pub async fn create_edition_with_id(
		&self,
		edition_id: EditionId,
		work_id: WorkId,
		format_label: Option<String>,
	) -> StoreResult<entities::edition::Model> {
		let model = entities::edition::ActiveModel {
			id: Set(edition_id.to_string()),
			work_id: Set(work_id.to_string()),
			format_label: Set(format_label),
			created_at: Set(Utc::now()),
		};
		Ok(model.insert(&self.conn).await?)
	}

	pub async fn create_edition(
		&self,
		work_id: WorkId,
		format_label: Option<String>,
	) -> StoreResult<entities::edition::Model> {
		self.create_edition_with_id(EditionId::new(), work_id, format_label).await
	}

	/// Insert only if `content_hash` is new; duplicates are reported,
	/// not treated as an error.
	pub async fn insert_asset(&self, asset: NewAsset) -> StoreResult<InsertOutcome> {
		if self.find_asset_by_hash(&asset.content_hash).await?.is_some() {
			return Ok(InsertOutcome::DuplicateHash);
		}

		let manifest_json = asset
			.manifest
			.map(|paths| serde_json::to_value(paths).unwrap_or(serde_json::Value::Null));

		let model = entities::media_asset::ActiveModel {
			id: Set(asset.id.to_string()),
			edition_id: Set(asset.edition_id.to_string()),
			content_hash: Set(asset.content_hash),
			file_path_root: Set(asset.file_path_root),
			status: Set(AssetStatus::Normal.to_string()),
			manifest: Set(manifest_json),
			created_at: Set(Utc::now()),
		};

		match model.insert(&self.conn).await {
			Ok(_) => Ok(InsertOutcome::Inserted),
			// A racing insert of the same hash loses the unique-key
			// race rather than the pre-check above; treat it the same.
			Err(sea_orm::DbErr::RecordNotInserted) | Err(sea_orm::DbErr::Query(_)) => {
				Ok(InsertOutcome::DuplicateHash)
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Updates the stored root path for an asset after the organiser has
	/// moved it into place. `content_hash` remains the identity anchor —
	/// this only keeps the row's path in sync with reality.
	pub async fn update_asset_path(&self, asset_id: AssetId, new_path: &str) -> StoreResult<()> {
		if let Some(existing) = entities::media_asset::Entity::find_by_id(asset_id.to_string()).one(&self.conn).await? {
			let mut model: entities::media_asset::ActiveModel = existing.into();
			model.file_path_root = Set(new_path.to_string());
			model.update(&self.conn).await?;
		}
		Ok(())
	}

	pub async fn find_asset_by_hash(&self, hex: &str) -> StoreResult<Option<entities::media_asset::Model>> {
		Ok(entities::media_asset::Entity::find()
			.filter(entities::media_asset::Column::ContentHash.eq(hex))
			.one(&self.conn)
			.await?)
	}

	/// Claims are never updated or deleted — only ever appended.
	pub async fn append_claim(&self, claim: MetadataClaim) -> StoreResult<()> {
		let model = entities::metadata_claim::ActiveModel {
			id: Set(claim.id.to_string()),
			entity_kind: Set(claim.entity_id.kind.to_string()),
			entity_id: Set(claim.entity_id.id.to_string()),
			provider_id: Set(claim.provider_id),
			claim_key: Set(claim.claim_key),
			claim_value: Set(claim.claim_value),
			confidence: Set(claim.confidence),
			claimed_at: Set(claim.claimed_at),
			is_user_locked: Set(claim.is_user_locked),
		};
		model.insert(&self.conn).await?;
		Ok(())
	}

	/// All claims for an entity, unfiltered, in no particular order —
	/// the scoring engine is responsible for grouping and ordering.
	pub async fn list_claims(&self, entity_id: EntityId) -> StoreResult<Vec<MetadataClaim>> {
		let rows = entities::metadata_claim::Entity::find()
			.filter(entities::metadata_claim::Column::EntityKind.eq(entity_id.kind.to_string()))
			.filter(entities::metadata_claim::Column::EntityId.eq(entity_id.id.to_string()))
			.order_by_asc(entities::metadata_claim::Column::ClaimedAt)
			.all(&self.conn)
			.await?;

		Ok(rows
			.into_iter()
			.filter_map(|row| claim_from_row(row, entity_id))
			.collect())
	}

	/// Replace any prior canonical value with the same (entity, key).
	pub async fn upsert_canonical(&self, value: CanonicalValue) -> StoreResult<()> {
		use entities::canonical_value::{ActiveModel, Column, Entity};

		let existing = Entity::find()
			.filter(Column::EntityKind.eq(value.entity_id.kind.to_string()))
			.filter(Column::EntityId.eq(value.entity_id.id.to_string()))
			.filter(Column::Key.eq(value.key.clone()))
			.one(&self.conn)
			.await?;

		let model = ActiveModel {
			entity_kind: Set(value.entity_id.kind.to_string()),
			entity_id: Set(value.entity_id.id.to_string()),
			key: Set(value.key),
			value: Set(value.value),
			last_scored_at: Set(value.last_scored_at),
		};

		if existing.is_some() {
			model.update(&self.conn).await?;
		} else {
			model.insert(&self.conn).await?;
		}
		Ok(())
	}

	pub async fn list_canonical_values(&self, entity_id: EntityId) -> StoreResult<Vec<(String, String)>> {
		use entities::canonical_value::{Column, Entity};

		let rows = Entity::find()
			.filter(Column::EntityKind.eq(entity_id.kind.to_string()))
			.filter(Column::EntityId.eq(entity_id.id.to_string()))
			.all(&self.conn)
			.await?;
		Ok(rows.into_iter().map(|r| (r.key, r.value)).collect())
	}

	/// Loads every Hub with its Works, avoiding N+1 by running exactly
	/// two follow-up queries: one LEFT JOIN for hubs+works ordered by
	/// creation, then one `IN (...)` query for canonical values over the
	/// collected Work ids.
	pub async fn list_hubs(&self) -> StoreResult<Vec<HubWithWorks>> {
		let hubs = entities::hub::Entity::find()
			.order_by_asc(entities::hub::Column::CreatedAt)
			.all(&self.conn)
			.await?;

		let works = entities::work::Entity::find()
			.filter(
				entities::work::Column::HubId.is_in(hubs.iter().map(|h| h.id.clone()).collect::<Vec<_>>()),
			)
			.order_by_asc(entities::work::Column::CreatedAt)
			.all(&self.conn)
			.await?;

		let work_ids: Vec<String> = works.iter().map(|w| w.id.clone()).collect();
		let canonical_rows = entities::canonical_value::Entity::find()
			.filter(entities::canonical_value::Column::EntityKind.eq(EntityKind::Work.to_string()))
			.filter(entities::canonical_value::Column::EntityId.is_in(work_ids))
			.all(&self.conn)
			.await?;

		let mut canonical_by_work: HashMap<String, Vec<(String, String)>> = HashMap::new();
		for row in canonical_rows {
			canonical_by_work
				.entry(row.entity_id)
				.or_default()
				.push((row.key, row.value));
		}

		let mut works_by_hub: HashMap<String, Vec<WorkWithCanonical>> = HashMap::new();
		for work in works {
			let media_type = work.media_type.parse().unwrap_or_default();
			let canonical_values = canonical_by_work.remove(&work.id).unwrap_or_default();
			let Some(hub_id) = work.hub_id.clone() else {
				continue;
			};
			works_by_hub.entry(hub_id).or_default().push(WorkWithCanonical {
				id: work.id.parse().map(WorkId).unwrap_or_default(),
				media_type,
				sequence_index: work.sequence_index,
				canonical_values,
			});
		}

		Ok(hubs
			.into_iter()
			.map(|hub| HubWithWorks {
				id: hub.id.parse().map(HubId).unwrap_or_default(),
				created_at: hub.created_at,
				works: works_by_hub.remove(&hub.id).unwrap_or_default(),
				display_name: hub.display_name,
			})
			.collect())
	}

	pub async fn log_event(&self, event_type: &str, entity_type: &str, entity_id: &str) -> StoreResult<()> {
		let model = entities::transaction_log::ActiveModel {
			id: sea_orm::ActiveValue::NotSet,
			event_type: Set(event_type.to_string()),
			entity_type: Set(entity_type.to_string()),
			entity_id: Set(entity_id.to_string()),
			occurred_at: Set(Utc::now()),
		};
		model.insert(&self.conn).await?;
		Ok(())
	}

	/// Deletes the oldest rows over `max_entries`, via a
	/// DELETE-with-subquery (no DELETE-LIMIT required by SQLite).
	pub async fn prune_log(&self, max_entries: u64) -> StoreResult<()> {
		let sql = "DELETE FROM transaction_log WHERE id IN ( \
			SELECT id FROM transaction_log ORDER BY occurred_at DESC LIMIT -1 OFFSET ? \
		)";
		self.conn
			.execute(Statement::from_sql_and_values(
				sea_orm::DatabaseBackend::Sqlite,
				sql,
				[max_entries.into()],
			))
			.await?;
		Ok(())
	}
}

fn claim_from_row(row: entities::metadata_claim::Model, entity_id: EntityId) -> Option<MetadataClaim> {
	let id = Uuid::parse_str(&row.id).ok()?;
	Some(MetadataClaim {
		id,
		entity_id,
		provider_id: row.provider_id,
		claim_key: row.claim_key,
		claim_value: row.claim_value,
		confidence: row.confidence,
		claimed_at: row.claimed_at,
		is_user_locked: row.is_user_locked,
	})
}
