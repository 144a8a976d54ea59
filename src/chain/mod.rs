//! Chain Factory (C4): idempotently ensures a Hub→Work→Edition chain
//! exists for a newly hashed asset. No merging of Works/Editions in
//! this version — redundancy under a reused Hub is accepted (an open
//! question resolved this way; see DESIGN.md).

use crate::domain::{EditionId, HubId, MediaType, WorkId};
use crate::store::{Store, StoreResult};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Chain {
	pub hub_id: HubId,
	pub hub_reused: bool,
	pub work_id: WorkId,
	pub edition_id: EditionId,
}

pub struct ChainFactory {
	store: Arc<Store>,
}

impl ChainFactory {
	pub fn new(store: Arc<Store>) -> Self {
		Self { store }
	}

	/// Builds (or reuses) the chain for one newly processed asset.
	/// `metadata` is keyed by claim key — only `title`, `series_index`
	/// and `format` are consulted here. `edition_id` is the id the
	/// orchestrator pre-assigned before scoring, so the Edition this
	/// chain creates carries the same id the claims were already scoped
	/// to.
	pub async fn ensure_chain(
		&self,
		media_type: MediaType,
		metadata: &HashMap<String, String>,
		edition_id: EditionId,
	) -> StoreResult<Chain> {
		let title = metadata
			.get("title")
			.map(|t| t.trim().to_string())
			.filter(|t| !t.is_empty())
			.unwrap_or_else(|| "Unknown".to_string());

		let (hub_id, hub_reused) = match self.store.find_hub_by_display_name(&title).await? {
			Some(existing) => (existing.id.parse().unwrap_or_default(), true),
			None => {
				let created = self.store.create_hub(&title).await?;
				(created.id.parse().unwrap_or_default(), false)
			}
		};

		let sequence_index = metadata.get("series_index").and_then(|v| v.trim().parse::<i32>().ok());
		let work = self.store.create_work(hub_id, media_type, sequence_index).await?;
		let work_id: WorkId = work.id.parse().unwrap_or_default();

		let format_label = metadata.get("format").map(|f| f.trim().to_string()).filter(|f| !f.is_empty());
		self.store.create_edition_with_id(edition_id, work_id, format_label).await?;

		Ok(Chain {
			hub_id,
			hub_reused,
			work_id,
			edition_id,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use tempfile::tempdir;

	async fn store() -> Arc<Store> {
		let dir = tempdir().unwrap();
		Arc::new(Store::open(&dir.path().join("catalogue.db")).await.unwrap())
	}

	#[tokio::test]
	async fn reuses_hub_by_case_insensitive_title() {
		let store = store().await;
		let factory = ChainFactory::new(store);

		let mut metadata = HashMap::new();
		metadata.insert("title".to_string(), "Dune".to_string());
		let first = factory.ensure_chain(MediaType::Epub, &metadata, EditionId::new()).await.unwrap();
		assert!(!first.hub_reused);

		metadata.insert("title".to_string(), "dune".to_string());
		let second = factory.ensure_chain(MediaType::Audiobook, &metadata, EditionId::new()).await.unwrap();
		assert!(second.hub_reused);
		assert_eq!(first.hub_id, second.hub_id);
		assert_ne!(first.work_id, second.work_id);
	}

	#[tokio::test]
	async fn defaults_title_to_unknown_when_absent() {
		let store = store().await;
		let factory = ChainFactory::new(store.clone());
		let chain = factory.ensure_chain(MediaType::Movie, &HashMap::new(), EditionId::new()).await.unwrap();
		let hub = store.find_hub_by_display_name("Unknown").await.unwrap().unwrap();
		assert_eq!(hub.id, chain.hub_id.to_string());
	}
}
