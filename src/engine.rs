//! Engine facade: the single entry point an embedding host —
//! a CLI, a future HTTP layer, a test harness — drives. Owns every
//! component's lifetime and wires C1–C10 together; nothing outside this
//! module touches more than one component directly.

use crate::config::AppConfig;
use crate::domain::{CanonicalValue, EntityId, MetadataClaim};
use crate::events::{BroadcastEventPublisher, EngineEvent, EventPublisher};
use crate::hasher::{BufferPool, Hasher};
use crate::identity::arbiter::HubArbiter;
use crate::orchestrator::enrichment::{EnrichmentSink, NullEnrichmentSink};
use crate::orchestrator::organiser::{Organiser, TemplatedOrganiser};
use crate::orchestrator::{IngestionOrchestrator, OrchestratorError};
use crate::processor::{FilenameFallbackProcessor, ProcessorRegistry};
use crate::scoring::{ScoringContext, ScoringEngine};
use crate::store::{HubWithWorks, Store, StoreError, StoreResult};
use crate::watcher::debounce::DebounceConfig;
use crate::watcher::{Candidate, DebounceQueue, FileEvent, FileEventKind, FileWatcher, IgnoreSet, LoggingErrorSink};
use crate::worker::{BoundedWorker, Handler};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
	#[error(transparent)]
	Store(#[from] StoreError),

	#[error("failed to start file watcher: {0}")]
	Watch(#[from] notify::Error),

	#[error(transparent)]
	Orchestrator(#[from] OrchestratorError),

	#[error("could not prepare engine directories: {0}")]
	Setup(#[from] anyhow::Error),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStatus {
	pub status: &'static str,
	pub version: &'static str,
}

/// One pending operation `scan_dry_run` would perform if it actually
/// ingested the file.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOperation {
	WouldIngest { path: PathBuf, content_hash: String },
	WouldSkipDuplicate { path: PathBuf, content_hash: String },
}

/// Wires a `Candidate` through the orchestrator for the Bounded Worker.
struct CandidateHandler {
	orchestrator: Arc<IngestionOrchestrator>,
}

#[async_trait]
impl Handler<Candidate> for CandidateHandler {
	async fn handle(&self, candidate: Candidate) {
		let cancel = CancellationToken::new();
		let path = candidate.path.clone();
		match self.orchestrator.ingest(candidate, &cancel).await {
			Ok(outcome) => info!("candidate {:?} resolved to {:?}", path, outcome),
			Err(err) => error!("ingestion failed for {:?}: {err}", path),
		}
	}
}

pub struct Engine {
	store: Arc<Store>,
	config: AppConfig,
	broadcast: Arc<BroadcastEventPublisher>,
	orchestrator: Arc<IngestionOrchestrator>,
	hasher: Arc<Hasher>,
	worker: Arc<BoundedWorker>,
	ignore: Arc<IgnoreSet>,
	_watcher: Option<FileWatcher>,
}

impl Engine {
	/// Opens the catalogue and wires every component, but does not start
	/// watching the filesystem — call [`Engine::start_watching`]
	/// separately so headless callers (e.g. one-shot CLI invocations of
	/// `scan_dry_run`) never pay for a live watcher.
	pub async fn open(config: AppConfig) -> Result<Self, EngineError> {
		config.ensure_directories()?;

		let store = Arc::new(Store::open(&config.database_path).await?);
		let broadcast = Arc::new(BroadcastEventPublisher::default());
		let events: Arc<dyn EventPublisher> = broadcast.clone();

		let fallback = Arc::new(FilenameFallbackProcessor::default());
		let processors = Arc::new(ProcessorRegistry::discover(fallback));
		let hasher = Arc::new(Hasher::new(Arc::new(BufferPool::new(80 * 1024))));
		let arbiter = Arc::new(HubArbiter::new(store.clone(), events.clone()));
		let organiser: Arc<dyn Organiser> = Arc::new(TemplatedOrganiser::new(config.data_root.clone()));
		let enrichment: Arc<dyn EnrichmentSink> = Arc::new(NullEnrichmentSink);

		let orchestrator = Arc::new(IngestionOrchestrator::new(
			store.clone(),
			hasher.clone(),
			processors,
			arbiter,
			organiser,
			enrichment,
			events,
			config.clone(),
		));

		let concurrency = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
		let worker = Arc::new(BoundedWorker::new(256, concurrency));

		Ok(Self {
			store,
			config,
			broadcast,
			orchestrator,
			hasher,
			worker,
			ignore: Arc::new(IgnoreSet::default()),
			_watcher: None,
		})
	}

	/// Subscribes to the engine's lifecycle event stream (`MediaAdded`,
	/// `WorkAutoLinked`, ...) — the hook a future real-time API layer
	/// would forward to connected clients.
	pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
		self.broadcast.subscribe()
	}

	/// Starts the live file watcher over `config.watch_root`, replays a
	/// differential scan of anything already sitting there at startup,
	/// then begins dispatching debounced candidates into the Bounded
	/// Worker.
	pub async fn start_watching(&mut self) -> Result<(), EngineError> {
		let (queue, mut candidates) = DebounceQueue::new(DebounceConfig::default());

		let mut watcher = FileWatcher::watch(&self.config.watch_root, Arc::new(LoggingErrorSink))?;
		self.replay_existing_files(&queue).await;

		let forward_queue = queue.clone();
		let forward_ignore = self.ignore.clone();
		let mut raw_events = std::mem::replace(&mut watcher.events, tokio::sync::mpsc::unbounded_channel().1);
		tokio::spawn(async move {
			while let Some(event) = raw_events.recv().await {
				if forward_ignore.is_ignored(&event.path) {
					continue;
				}
				forward_queue.enqueue(event).await;
			}
		});
		self._watcher = Some(watcher);

		let handler: Arc<dyn Handler<Candidate>> = Arc::new(CandidateHandler { orchestrator: self.orchestrator.clone() });
		let worker = self.worker.clone();
		tokio::spawn(async move {
			while let Some(candidate) = candidates.recv().await {
				if worker.enqueue(candidate, handler.clone()).await.is_err() {
					warn!("bounded worker rejected a candidate after shutdown");
				}
			}
		});

		Ok(())
	}

	async fn replay_existing_files(&self, queue: &DebounceQueue) {
		let mut stack = vec![self.config.watch_root.clone()];
		while let Some(dir) = stack.pop() {
			let mut entries = match tokio::fs::read_dir(&dir).await {
				Ok(entries) => entries,
				Err(err) => {
					warn!("differential scan could not read {:?}: {err}", dir);
					continue;
				}
			};

			while let Ok(Some(entry)) = entries.next_entry().await {
				let path = entry.path();
				if self.ignore.is_ignored(&path) {
					continue;
				}
				match entry.file_type().await {
					Ok(file_type) if file_type.is_dir() => stack.push(path),
					Ok(file_type) if file_type.is_file() => {
						queue
							.enqueue(FileEvent { path, old_path: None, kind: FileEventKind::Created, occurred_at: Utc::now() })
							.await;
					}
					_ => {}
				}
			}
		}
	}

	pub async fn list_hubs(&self) -> StoreResult<Vec<HubWithWorks>> {
		self.store.list_hubs().await
	}

	/// Up to 20 results, minimum 2-character query, matching on
	/// `display_name` case-insensitively.
	pub async fn search_hubs(&self, query: &str) -> StoreResult<Vec<HubWithWorks>> {
		if query.trim().chars().count() < 2 {
			return Ok(Vec::new());
		}
		let needle = query.trim().to_lowercase();
		let hubs = self.store.list_hubs().await?;
		Ok(hubs.into_iter().filter(|hub| hub.display_name.to_lowercase().contains(&needle)).take(20).collect())
	}

	/// Walks the watch root and reports what ingestion would do to each
	/// file found, without writing anything to the catalogue.
	pub async fn scan_dry_run(&self) -> Result<Vec<PendingOperation>, EngineError> {
		let cancel = CancellationToken::new();
		let mut operations = Vec::new();
		let mut stack = vec![self.config.watch_root.clone()];

		while let Some(dir) = stack.pop() {
			let mut entries = match tokio::fs::read_dir(&dir).await {
				Ok(entries) => entries,
				Err(err) => {
					warn!("dry-run scan could not read {:?}: {err}", dir);
					continue;
				}
			};

			while let Ok(Some(entry)) = entries.next_entry().await {
				let path = entry.path();
				if self.ignore.is_ignored(&path) {
					continue;
				}
				let Ok(file_type) = entry.file_type().await else { continue };
				if file_type.is_dir() {
					stack.push(path);
					continue;
				}
				if !file_type.is_file() {
					continue;
				}

				let Ok(outcome) = self.hasher.hash_file(&path, &cancel).await else {
					continue;
				};
				let operation = match self.store.find_asset_by_hash(&outcome.hex_lowercase).await? {
					Some(_) => PendingOperation::WouldSkipDuplicate { path, content_hash: outcome.hex_lowercase },
					None => PendingOperation::WouldIngest { path, content_hash: outcome.hex_lowercase },
				};
				operations.push(operation);
			}
		}

		Ok(operations)
	}

	/// Manual canonical-value override: replaces the current canonical
	/// value directly, without appending a
	/// claim. A subsequent re-score (e.g. a later ingestion touching the
	/// same entity) may supersede this override — for a durable override
	/// use [`Engine::lock_claim`] instead.
	pub async fn resolve_metadata(&self, entity_id: EntityId, key: impl Into<String>, value: impl Into<String>) -> StoreResult<()> {
		self.store
			.upsert_canonical(CanonicalValue { entity_id, key: key.into(), value: value.into(), last_scored_at: Utc::now() })
			.await
	}

	/// Appends a permanent user-locked claim and immediately re-scores
	/// the entity so the override takes effect without waiting on the
	/// next ingestion pass.
	pub async fn lock_claim(&self, entity_id: EntityId, key: impl Into<String>, value: impl Into<String>) -> StoreResult<()> {
		let claim = MetadataClaim::user_lock(entity_id, key, value);
		self.store.append_claim(claim).await?;

		let claims = self.store.list_claims(entity_id).await?;
		let ctx = ScoringContext {
			entity_id,
			claims,
			provider_weights: self.config.provider_weights(),
			provider_field_weights: self.config.provider_field_weights(),
			config: self.config.scoring,
		};
		let result = ScoringEngine::score(&ctx);

		for field in &result.field_scores {
			self.store
				.upsert_canonical(CanonicalValue {
					entity_id,
					key: field.key.clone(),
					value: field.value.clone(),
					last_scored_at: result.scored_at,
				})
				.await?;
		}

		self.broadcast.publish(EngineEvent::MetadataHarvested { entity_id, overall_confidence: result.overall_confidence });
		Ok(())
	}

	pub fn status(&self) -> EngineStatus {
		EngineStatus { status: "ok", version: env!("CARGO_PKG_VERSION") }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::WorkId;
	use pretty_assertions::assert_eq;
	use tempfile::tempdir;

	async fn open_engine(tmp: &tempfile::TempDir) -> Engine {
		let config_path = tmp.path().join("config.json");
		let mut config = AppConfig::load_or_create(&config_path).unwrap();
		config.database_path = tmp.path().join("catalogue.db");
		config.data_root = tmp.path().join("library");
		config.watch_root = tmp.path().join("inbox");
		Engine::open(config).await.unwrap()
	}

	#[tokio::test]
	async fn status_reports_ok() {
		let tmp = tempdir().unwrap();
		let engine = open_engine(&tmp).await;
		assert_eq!(engine.status().status, "ok");
	}

	#[tokio::test]
	async fn search_hubs_requires_two_characters() {
		let tmp = tempdir().unwrap();
		let engine = open_engine(&tmp).await;
		assert!(engine.search_hubs("d").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn search_hubs_matches_case_insensitively_and_caps_at_twenty() {
		let tmp = tempdir().unwrap();
		let engine = open_engine(&tmp).await;
		for i in 0..25 {
			engine.store.create_hub(&format!("Dune Book {i}")).await.unwrap();
		}
		engine.store.create_hub("Unrelated Title").await.unwrap();

		let results = engine.search_hubs("dune").await.unwrap();
		assert_eq!(results.len(), 20);
	}

	#[tokio::test]
	async fn lock_claim_rescopes_canonical_value_immediately() {
		// Scenario 3 from spec §8.
		let tmp = tempdir().unwrap();
		let engine = open_engine(&tmp).await;
		let entity_id = EntityId::work(WorkId::new());

		engine
			.store
			.append_claim(MetadataClaim::from_extracted(
				entity_id,
				"local-filesystem",
				crate::domain::ExtractedClaim::new("title", "Dune", 1.0),
			))
			.await
			.unwrap();

		engine.lock_claim(entity_id, "title", "Dune (Special Edition)").await.unwrap();

		let values = engine.store.list_canonical_values(entity_id).await.unwrap();
		assert_eq!(values, vec![("title".to_string(), "Dune (Special Edition)".to_string())]);
	}

	#[tokio::test]
	async fn resolve_metadata_upserts_without_appending_a_claim() {
		let tmp = tempdir().unwrap();
		let engine = open_engine(&tmp).await;
		let entity_id = EntityId::work(WorkId::new());

		engine.resolve_metadata(entity_id, "title", "Manually Set Title").await.unwrap();
		assert!(engine.store.list_claims(entity_id).await.unwrap().is_empty());

		let values = engine.store.list_canonical_values(entity_id).await.unwrap();
		assert_eq!(values, vec![("title".to_string(), "Manually Set Title".to_string())]);
	}

	#[tokio::test]
	async fn scan_dry_run_never_mutates_the_catalogue() {
		let tmp = tempdir().unwrap();
		let engine = open_engine(&tmp).await;
		tokio::fs::create_dir_all(&engine.config.watch_root).await.unwrap();
		tokio::fs::write(engine.config.watch_root.join("book.epub"), b"contents").await.unwrap();

		let operations = engine.scan_dry_run().await.unwrap();
		assert_eq!(operations.len(), 1);
		assert!(matches!(operations[0], PendingOperation::WouldIngest { .. }));
		assert!(engine.store.list_hubs().await.unwrap().is_empty());
	}
}
