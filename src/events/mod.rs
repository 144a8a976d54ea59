//! Event publisher (C10): broadcasts engine lifecycle events to any
//! number of subscribers. `publish` never fails, even with zero
//! subscribers, the same `EventBus::emit` semantics used elsewhere in
//! this codebase.

use crate::domain::{AssetId, EditionId, EntityId, HubId, WorkId};
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Lifecycle events emitted by the orchestrator and arbiter.
#[derive(Debug, Clone)]
pub enum EngineEvent {
	MediaAdded {
		asset_id: AssetId,
		edition_id: EditionId,
		file_path: PathBuf,
	},
	MetadataHarvested {
		entity_id: EntityId,
		overall_confidence: f64,
	},
	DuplicateSkipped {
		content_hash: String,
	},
	AssetCorrupt {
		file_path: PathBuf,
		reason: String,
	},
	IngestionFailed {
		file_path: PathBuf,
		reason: String,
	},
	WorkAutoLinked {
		work_id: WorkId,
		hub_id: HubId,
		reason: String,
	},
	WorkNeedsReview {
		work_id: WorkId,
		hub_id: HubId,
		score: f64,
	},
	WorkLinkRejected {
		work_id: WorkId,
		reason: String,
	},
	ConfigChanged,
}

/// Contract for publishing engine events; a no-op implementation is
/// explicitly permitted for headless hosts.
pub trait EventPublisher: Send + Sync {
	fn publish(&self, event: EngineEvent);
}

/// Default publisher: a broadcast channel, identical in shape to the
/// teacher's `EventBus`.
pub struct BroadcastEventPublisher {
	sender: broadcast::Sender<EngineEvent>,
}

impl BroadcastEventPublisher {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
		self.sender.subscribe()
	}
}

impl Default for BroadcastEventPublisher {
	fn default() -> Self {
		Self::new(1024)
	}
}

impl EventPublisher for BroadcastEventPublisher {
	fn publish(&self, event: EngineEvent) {
		let _ = self.sender.send(event);
	}
}

/// Discards every event. Useful for tests and headless embeddings.
pub struct NullEventPublisher;

impl EventPublisher for NullEventPublisher {
	fn publish(&self, _event: EngineEvent) {}
}
