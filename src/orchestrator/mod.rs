//! Ingestion Orchestrator (C9): drives a candidate through
//! hashed → processed → scored → chained → stored → organised. Steps
//! within one candidate are strictly sequential; candidates run in
//! parallel up to the Bounded Worker's concurrency cap. Organiser and
//! enrichment are external collaborators reached only by trait, the
//! same pattern used elsewhere of depending on
//! `ActionHandler`/`JobHandler` trait objects rather than concrete
//! types.

pub mod enrichment;
pub mod organiser;
pub mod sidecar;

use crate::chain::ChainFactory;
use crate::config::AppConfig;
use crate::domain::{EntityId, MediaType, MetadataClaim};
use crate::events::{EngineEvent, EventPublisher};
use crate::hasher::{Hasher, HasherError};
use crate::identity::arbiter::{CandidateHub, HubArbiter};
use crate::processor::{ProcessorError, ProcessorRegistry};
use crate::scoring::{ScoringContext, ScoringEngine};
use crate::store::{NewAsset, Store, StoreError};
use crate::watcher::Candidate;
use enrichment::{EnrichmentRequest, EnrichmentSink};
use organiser::{Organiser, OrganiseRequest, OrganiserError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
	#[error(transparent)]
	Store(#[from] StoreError),

	#[error(transparent)]
	Processor(#[from] ProcessorError),

	#[error(transparent)]
	Hasher(#[from] HasherError),

	#[error(transparent)]
	Organiser(#[from] OrganiserError),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

/// Terminal state of one candidate's pass through the pipeline, for
/// testability.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
	Library { asset_file_path: PathBuf, organised: bool },
	DuplicateSkipped,
	Corrupt { reason: String },
	Rejected { reason: String },
	LockTimeout { reason: String },
}

pub struct IngestionOrchestrator {
	store: Arc<Store>,
	hasher: Arc<Hasher>,
	processors: Arc<ProcessorRegistry>,
	chain_factory: Arc<ChainFactory>,
	arbiter: Arc<HubArbiter>,
	organiser: Arc<dyn Organiser>,
	enrichment: Arc<dyn EnrichmentSink>,
	events: Arc<dyn EventPublisher>,
	config: AppConfig,
	rejection_dir: PathBuf,
	provider_id: String,
}

impl IngestionOrchestrator {
	pub fn new(
		store: Arc<Store>,
		hasher: Arc<Hasher>,
		processors: Arc<ProcessorRegistry>,
		arbiter: Arc<HubArbiter>,
		organiser: Arc<dyn Organiser>,
		enrichment: Arc<dyn EnrichmentSink>,
		events: Arc<dyn EventPublisher>,
		config: AppConfig,
	) -> Self {
		let rejection_dir = config.data_root.join("_Quarantine");
		let chain_factory = Arc::new(ChainFactory::new(store.clone()));
		Self {
			store,
			hasher,
			processors,
			chain_factory,
			arbiter,
			organiser,
			enrichment,
			events,
			config,
			rejection_dir,
			provider_id: "local-filesystem".to_string(),
		}
	}

	/// Runs one candidate to completion. Long-running steps accept a
	/// cancellation token; cancellation of one candidate never affects
	/// others in flight.
	pub async fn ingest(&self, candidate: Candidate, cancel: &CancellationToken) -> Result<IngestOutcome, OrchestratorError> {
		if candidate.is_failed {
			let reason = candidate.failure_reason.unwrap_or_else(|| "lock probe failed".to_string());
			warn!("candidate {:?} failed before ingestion: {reason}", candidate.path);
			self.publish_failure(&candidate.path, &reason);
			return Ok(IngestOutcome::LockTimeout { reason });
		}

		if !tokio::fs::try_exists(&candidate.path).await.unwrap_or(false) {
			let reason = "file missing at ingestion time".to_string();
			self.publish_failure(&candidate.path, &reason);
			return Ok(IngestOutcome::LockTimeout { reason });
		}

		let hash_outcome = self.hasher.hash_file(&candidate.path, cancel).await?;

		if self.store.find_asset_by_hash(&hash_outcome.hex_lowercase).await?.is_some() {
			self.events.publish(EngineEvent::DuplicateSkipped { content_hash: hash_outcome.hex_lowercase });
			return Ok(IngestOutcome::DuplicateSkipped);
		}

		let processed = self.processors.process(&candidate.path).await?;

		if processed.is_corrupt {
			let reason = processed.corrupt_reason.unwrap_or_else(|| "processor reported corrupt input".to_string());
			self.quarantine(&candidate.path).await?;
			self.events.publish(EngineEvent::AssetCorrupt { file_path: candidate.path.clone(), reason: reason.clone() });
			return Ok(IngestOutcome::Corrupt { reason });
		}

		// Pre-assign the Edition id so claims can be scoped to it
		// before the Hub→Work→Edition chain exists.
		let edition_id = crate::domain::EditionId::new();
		let entity_id = EntityId::edition(edition_id);

		for claim in processed.claims {
			let claim = MetadataClaim::from_extracted(entity_id, &self.provider_id, claim);
			self.store.append_claim(claim).await?;
		}

		let claims = self.store.list_claims(entity_id).await?;
		let scoring_ctx = ScoringContext {
			entity_id,
			claims,
			provider_weights: self.config.provider_weights(),
			provider_field_weights: self.config.provider_field_weights(),
			config: self.config.scoring,
		};
		let scoring_result = ScoringEngine::score(&scoring_ctx);

		for field in &scoring_result.field_scores {
			self.store
				.upsert_canonical(crate::domain::CanonicalValue {
					entity_id,
					key: field.key.clone(),
					value: field.value.clone(),
					last_scored_at: scoring_result.scored_at,
				})
				.await?;
		}

		let metadata: HashMap<String, String> = scoring_result.field_scores.iter().map(|f| (f.key.clone(), f.value.clone())).collect();
		let media_type = if processed.detected_type == MediaType::Unknown {
			MediaType::Unknown
		} else {
			processed.detected_type
		};

		let chain = self.chain_factory.ensure_chain(media_type, &metadata, edition_id).await?;
		self.run_arbiter(&chain, &metadata).await?;

		let is_user_locked = scoring_ctx.claims_locked();
		let asset_id = crate::domain::AssetId::new();
		self.store
			.insert_asset(NewAsset {
				id: asset_id,
				edition_id: chain.edition_id,
				content_hash: hash_outcome.hex_lowercase.clone(),
				file_path_root: candidate.path.to_string_lossy().to_string(),
				manifest: None,
			})
			.await?;

		let should_organise = scoring_result.overall_confidence >= self.config.scoring.auto_link_threshold || is_user_locked;

		let (final_path, organised) = if should_organise {
			let request = self.build_organise_request(&candidate.path, &chain, media_type, &metadata);
			let destination = self.organiser.organise(request).await?;

			self.store.update_asset_path(asset_id, &destination.to_string_lossy()).await?;
			self.write_sidecar(&destination, &chain, &hash_outcome.hex_lowercase, asset_id, &metadata, media_type).await;
			(destination, true)
		} else {
			(candidate.path.clone(), false)
		};

		self.enrichment
			.enqueue(EnrichmentRequest { entity_id, media_type_hint: media_type.to_string() })
			.await;

		self.events.publish(EngineEvent::MediaAdded {
			asset_id,
			edition_id: chain.edition_id,
			file_path: final_path.clone(),
		});
		self.events.publish(EngineEvent::MetadataHarvested {
			entity_id,
			overall_confidence: scoring_result.overall_confidence,
		});

		info!("ingested {:?} into hub {} (organised={organised})", candidate.path, chain.hub_id);
		Ok(IngestOutcome::Library { asset_file_path: final_path, organised })
	}

	async fn run_arbiter(&self, chain: &crate::chain::Chain, metadata: &HashMap<String, String>) -> Result<(), OrchestratorError> {
		let hubs = self.store.list_hubs().await?;
		let candidates: Vec<CandidateHub> = hubs
			.into_iter()
			.map(|hub| CandidateHub {
				hub_id: hub.id,
				member_works: hub
					.works
					.into_iter()
					.map(|work| (work.id, work.canonical_values.into_iter().collect::<HashMap<_, _>>()))
					.collect(),
			})
			.collect();

		self.arbiter
			.decide(chain.work_id, metadata, &candidates, &self.config.scoring)
			.await?;
		Ok(())
	}

	fn build_organise_request(
		&self,
		source_path: &Path,
		chain: &crate::chain::Chain,
		media_type: MediaType,
		metadata: &HashMap<String, String>,
	) -> OrganiseRequest {
		let extension = source_path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
		OrganiseRequest {
			source_path: source_path.to_path_buf(),
			category: media_type.to_string(),
			hub_name: metadata.get("title").cloned().unwrap_or_else(|| "Unknown".to_string()),
			year: metadata.get("year").cloned(),
			format: metadata.get("format").cloned().unwrap_or_else(|| "Unknown".to_string()),
			edition_label: format!("Edition {}", chain.edition_id),
			extension,
		}
	}

	async fn write_sidecar(
		&self,
		destination: &Path,
		chain: &crate::chain::Chain,
		content_hash: &str,
		asset_id: crate::domain::AssetId,
		metadata: &HashMap<String, String>,
		media_type: MediaType,
	) {
		let descriptor = sidecar::SidecarDescriptor {
			asset_id: asset_id.to_string(),
			content_hash: content_hash.to_string(),
			hub_id: chain.hub_id.to_string(),
			hub_display_name: metadata.get("title").cloned().unwrap_or_else(|| "Unknown".to_string()),
			work_id: chain.work_id.to_string(),
			media_type: media_type.to_string(),
			edition_id: chain.edition_id.to_string(),
			format_label: metadata.get("format").cloned(),
			canonical_values: sidecar::CanonicalValueList {
				entries: metadata
					.iter()
					.map(|(key, value)| sidecar::CanonicalValueEntry { key: key.clone(), value: value.clone() })
					.collect(),
			},
		};

		if let Err(err) = sidecar::write_sidecar(destination, &descriptor).await {
			warn!("failed to write sidecar for {:?}: {err}", destination);
		}
	}

	async fn quarantine(&self, path: &Path) -> Result<(), OrchestratorError> {
		tokio::fs::create_dir_all(&self.rejection_dir).await?;
		if let Some(file_name) = path.file_name() {
			let destination = self.rejection_dir.join(file_name);
			if let Err(err) = tokio::fs::rename(path, &destination).await {
				warn!("failed to quarantine {:?}: {err}", path);
			}
		}
		Ok(())
	}

	fn publish_failure(&self, path: &Path, reason: &str) {
		self.events.publish(EngineEvent::IngestionFailed { file_path: path.to_path_buf(), reason: reason.to_string() });
	}
}

impl ScoringContext {
	fn claims_locked(&self) -> bool {
		self.claims.iter().any(|c| c.is_user_locked)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::ExtractedClaim;
	use crate::events::NullEventPublisher;
	use crate::hasher::BufferPool;
	use pretty_assertions::assert_eq;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicBool, Ordering};
	use tempfile::tempdir;

	struct FixedClaimsProcessor {
		claims: Vec<ExtractedClaim>,
	}

	#[async_trait]
	impl crate::processor::Processor for FixedClaimsProcessor {
		fn supported_type(&self) -> MediaType {
			MediaType::Epub
		}
		fn priority(&self) -> i32 {
			100
		}
		async fn can_process(&self, _path: &Path) -> bool {
			true
		}
		async fn process(&self, _path: &Path) -> Result<crate::processor::ProcessorResult, ProcessorError> {
			Ok(crate::processor::ProcessorResult {
				detected_type: MediaType::Epub,
				claims: self.claims.clone(),
				..Default::default()
			})
		}
	}

	struct RenameOrganiser {
		data_root: PathBuf,
		invoked: AtomicBool,
	}

	#[async_trait]
	impl Organiser for RenameOrganiser {
		async fn organise(&self, request: OrganiseRequest) -> Result<PathBuf, OrganiserError> {
			self.invoked.store(true, Ordering::SeqCst);
			let destination = self.data_root.join(format!("{}{}", request.hub_name, request.extension));
			tokio::fs::rename(&request.source_path, &destination).await.map_err(|source| OrganiserError::Io {
				path: destination.clone(),
				source,
			})?;
			Ok(destination)
		}
	}

	async fn orchestrator(
		tmp: &tempfile::TempDir,
		claims: Vec<ExtractedClaim>,
	) -> (IngestionOrchestrator, Arc<RenameOrganiser>) {
		let store = Arc::new(Store::open(&tmp.path().join("catalogue.db")).await.unwrap());
		let hasher = Arc::new(Hasher::new(Arc::new(BufferPool::new(8192))));
		let processors = Arc::new(ProcessorRegistry::new(
			vec![Arc::new(FixedClaimsProcessor { claims })],
			Arc::new(crate::processor::FilenameFallbackProcessor::default()),
		));
		let events: Arc<dyn EventPublisher> = Arc::new(NullEventPublisher);
		let arbiter = Arc::new(HubArbiter::new(store.clone(), events.clone()));
		let organiser = Arc::new(RenameOrganiser {
			data_root: tmp.path().join("library"),
			invoked: AtomicBool::new(false),
		});

		let mut config = AppConfig::load_or_create(&tmp.path().join("config.json")).unwrap();
		config.data_root = tmp.path().join("library");

		let orchestrator = IngestionOrchestrator::new(
			store,
			hasher,
			processors,
			arbiter,
			organiser.clone(),
			Arc::new(crate::orchestrator::enrichment::NullEnrichmentSink),
			events,
			config,
		);
		(orchestrator, organiser)
	}

	fn candidate(path: PathBuf) -> Candidate {
		let now = chrono::Utc::now();
		Candidate {
			path,
			is_failed: false,
			failure_reason: None,
			detected_at: now,
			ready_at: now,
		}
	}

	async fn write_book(tmp: &tempfile::TempDir, name: &str, contents: &[u8]) -> PathBuf {
		let path = tmp.path().join(name);
		tokio::fs::write(&path, contents).await.unwrap();
		path
	}

	#[tokio::test]
	async fn single_epub_ingestion_produces_hub_work_edition_asset_and_organises() {
		// Scenario 1 from spec §8.
		let tmp = tempdir().unwrap();
		let claims = vec![
			ExtractedClaim::new("title", "Dune", 1.0),
			ExtractedClaim::new("author", "Frank Herbert", 1.0),
			ExtractedClaim::new("isbn", "9780441013593", 1.0),
		];
		let (orchestrator, organiser) = orchestrator(&tmp, claims).await;
		let path = write_book(&tmp, "dune.epub", b"epub contents").await;

		let outcome = orchestrator.ingest(candidate(path), &CancellationToken::new()).await.unwrap();
		match outcome {
			IngestOutcome::Library { organised, .. } => assert!(organised),
			other => panic!("expected Library outcome, got {other:?}"),
		}
		assert!(organiser.invoked.load(Ordering::SeqCst));

		let hubs = orchestrator.store.list_hubs().await.unwrap();
		assert_eq!(hubs.len(), 1);
		assert_eq!(hubs[0].display_name, "Dune");
		assert_eq!(hubs[0].works.len(), 1);
		assert_eq!(hubs[0].works[0].canonical_values.len(), 3);
	}

	#[tokio::test]
	async fn duplicate_hash_is_skipped_without_a_second_asset() {
		// Scenario 4 from spec §8.
		let tmp = tempdir().unwrap();
		let claims = vec![ExtractedClaim::new("title", "Dune", 1.0)];
		let (orchestrator, _organiser) = orchestrator(&tmp, claims).await;

		let first = write_book(&tmp, "dune.epub", b"identical contents").await;
		let first_outcome = orchestrator.ingest(candidate(first), &CancellationToken::new()).await.unwrap();
		assert!(matches!(first_outcome, IngestOutcome::Library { .. }));

		let second = write_book(&tmp, "dune-copy.epub", b"identical contents").await;
		let second_outcome = orchestrator.ingest(candidate(second), &CancellationToken::new()).await.unwrap();
		assert_eq!(second_outcome, IngestOutcome::DuplicateSkipped);

		let hubs = orchestrator.store.list_hubs().await.unwrap();
		assert_eq!(hubs.len(), 1);
		assert_eq!(hubs[0].works.len(), 1);
	}

	#[tokio::test]
	async fn corrupt_processor_result_quarantines_without_storing_claims() {
		struct CorruptProcessor;
		#[async_trait]
		impl crate::processor::Processor for CorruptProcessor {
			fn supported_type(&self) -> MediaType {
				MediaType::Epub
			}
			fn priority(&self) -> i32 {
				100
			}
			async fn can_process(&self, _path: &Path) -> bool {
				true
			}
			async fn process(&self, _path: &Path) -> Result<crate::processor::ProcessorResult, ProcessorError> {
				Ok(crate::processor::ProcessorResult {
					is_corrupt: true,
					corrupt_reason: Some("truncated archive".to_string()),
					..Default::default()
				})
			}
		}

		let tmp = tempdir().unwrap();
		let store = Arc::new(Store::open(&tmp.path().join("catalogue.db")).await.unwrap());
		let hasher = Arc::new(Hasher::new(Arc::new(BufferPool::new(8192))));
		let processors = Arc::new(ProcessorRegistry::new(
			vec![Arc::new(CorruptProcessor)],
			Arc::new(crate::processor::FilenameFallbackProcessor::default()),
		));
		let events: Arc<dyn EventPublisher> = Arc::new(NullEventPublisher);
		let arbiter = Arc::new(HubArbiter::new(store.clone(), events.clone()));
		let organiser = Arc::new(RenameOrganiser {
			data_root: tmp.path().join("library"),
			invoked: AtomicBool::new(false),
		});
		let mut config = AppConfig::load_or_create(&tmp.path().join("config.json")).unwrap();
		config.data_root = tmp.path().join("library");

		let orchestrator = IngestionOrchestrator::new(
			store.clone(),
			hasher,
			processors,
			arbiter,
			organiser,
			Arc::new(crate::orchestrator::enrichment::NullEnrichmentSink),
			events,
			config,
		);

		let path = write_book(&tmp, "broken.epub", b"garbage").await;
		let outcome = orchestrator.ingest(candidate(path.clone()), &CancellationToken::new()).await.unwrap();
		assert_eq!(outcome, IngestOutcome::Corrupt { reason: "truncated archive".to_string() });
		assert!(!path.exists());
		assert!(store.list_hubs().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn missing_file_yields_lock_timeout_without_touching_the_store() {
		let tmp = tempdir().unwrap();
		let (orchestrator, _organiser) = orchestrator(&tmp, vec![]).await;
		let missing = tmp.path().join("never-written.epub");

		let outcome = orchestrator.ingest(candidate(missing), &CancellationToken::new()).await.unwrap();
		assert!(matches!(outcome, IngestOutcome::LockTimeout { .. }));
		assert!(orchestrator.store.list_hubs().await.unwrap().is_empty());
	}
}
