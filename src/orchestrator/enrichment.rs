//! Background enrichment: an external collaborator reached through the
//! same enqueue-through-an-interface pattern external metadata
//! providers use to contribute claims. Failures here never fail
//! ingestion.

use crate::domain::EntityId;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
	pub entity_id: EntityId,
	pub media_type_hint: String,
}

#[async_trait]
pub trait EnrichmentSink: Send + Sync {
	async fn enqueue(&self, request: EnrichmentRequest);
}

/// Discards every request. The default when no external enrichment
/// provider is configured — ingestion must never block on this.
pub struct NullEnrichmentSink;

#[async_trait]
impl EnrichmentSink for NullEnrichmentSink {
	async fn enqueue(&self, _request: EnrichmentRequest) {}
}
