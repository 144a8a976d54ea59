//! Processor Registry (C6): an interface boundary. Format-specific
//! parsers (EPUB, video, comic) are external collaborators; this crate
//! only owns the `Processor` trait, the priority-ordered registry that
//! dispatches to one, and the always-present fallback.
//!
//! Registered via the same `inventory`-based auto-registration
//! pattern as `operations/actions/registry.rs`, generalised to sort by
//! descending `priority` rather than an unordered `HashMap`.

mod error;
mod fallback;

pub use error::ProcessorError;
pub use fallback::FilenameFallbackProcessor;

use crate::domain::{ExtractedClaim, MediaType};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Priority the fallback processor is always registered at; no other
/// processor may claim this slot — the minimum integer priority.
pub const FALLBACK_PRIORITY: i32 = i32::MIN;

#[derive(Debug, Clone, Default)]
pub struct ProcessorResult {
	pub detected_type: MediaType,
	pub claims: Vec<ExtractedClaim>,
	pub cover_bytes: Option<Vec<u8>>,
	pub cover_mime: Option<String>,
	pub is_corrupt: bool,
	pub corrupt_reason: Option<String>,
}

/// A stateless format handler. Implementations must not mutate the
/// file they're given.
#[async_trait]
pub trait Processor: Send + Sync {
	fn supported_type(&self) -> MediaType;
	fn priority(&self) -> i32;

	/// Magic-byte inspection; must read at most 16 bytes.
	async fn can_process(&self, path: &Path) -> bool;

	async fn process(&self, path: &Path) -> Result<ProcessorResult, ProcessorError>;
}

/// Registration record collected via `inventory::submit!` at startup —
/// no dynamic code loading.
pub struct ProcessorRegistration {
	pub create_fn: fn() -> Arc<dyn Processor>,
}

inventory::collect!(ProcessorRegistration);

/// Registers a concrete `Processor` type for auto-discovery at startup.
#[macro_export]
macro_rules! register_processor {
	($processor_type:ty) => {
		inventory::submit! {
			$crate::processor::ProcessorRegistration {
				create_fn: || std::sync::Arc::new(<$processor_type>::default()) as std::sync::Arc<dyn $crate::processor::Processor>,
			}
		}
	};
}

/// Dispatches a file to the highest-priority matching processor, with a
/// semaphore bounding concurrent `process()` calls to cap memory use
/// under parallel ingestion.
pub struct ProcessorRegistry {
	processors: Vec<Arc<dyn Processor>>,
	fallback: Arc<dyn Processor>,
	semaphore: Arc<Semaphore>,
}

impl ProcessorRegistry {
	/// Builds the registry from every `inventory`-collected processor
	/// plus an explicit fallback, sorted by descending priority. The
	/// fallback is never taken from `inventory` — it is always the
	/// caller-supplied instance, guaranteeing it is unconditionally
	/// last regardless of what other crates register.
	pub fn discover(fallback: Arc<dyn Processor>) -> Self {
		let mut processors: Vec<Arc<dyn Processor>> = inventory::iter::<ProcessorRegistration>()
			.map(|registration| (registration.create_fn)())
			.collect();
		processors.sort_by(|a, b| b.priority().cmp(&a.priority()));

		info!("discovered {} format processor(s)", processors.len());
		Self::new(processors, fallback)
	}

	pub fn new(mut processors: Vec<Arc<dyn Processor>>, fallback: Arc<dyn Processor>) -> Self {
		processors.sort_by(|a, b| b.priority().cmp(&a.priority()));
		Self {
			processors,
			fallback,
			semaphore: Arc::new(Semaphore::new(
				std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
			)),
		}
	}

	/// Scans processors in descending-priority order, returning the
	/// first whose `can_process` is true. The fallback's `can_process`
	/// is never invoked.
	pub async fn resolve(&self, path: &Path) -> Arc<dyn Processor> {
		for processor in &self.processors {
			if processor.can_process(path).await {
				return processor.clone();
			}
		}
		debug!("no processor claimed {:?}, using fallback", path);
		self.fallback.clone()
	}

	/// Resolves and invokes the matching processor under the
	/// concurrency-bounding semaphore.
	pub async fn process(&self, path: &Path) -> Result<ProcessorResult, ProcessorError> {
		let processor = self.resolve(path).await;
		let _permit = self
			.semaphore
			.acquire()
			.await
			.map_err(|_| ProcessorError::RegistryClosed)?;
		processor.process(path).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use tempfile::NamedTempFile;

	struct AlwaysProcessor {
		media_type: MediaType,
		priority: i32,
	}

	#[async_trait]
	impl Processor for AlwaysProcessor {
		fn supported_type(&self) -> MediaType {
			self.media_type
		}
		fn priority(&self) -> i32 {
			self.priority
		}
		async fn can_process(&self, _path: &Path) -> bool {
			true
		}
		async fn process(&self, _path: &Path) -> Result<ProcessorResult, ProcessorError> {
			Ok(ProcessorResult {
				detected_type: self.media_type,
				..Default::default()
			})
		}
	}

	#[tokio::test]
	async fn resolves_highest_priority_matching_processor() {
		let low = Arc::new(AlwaysProcessor { media_type: MediaType::Comic, priority: 1 });
		let high = Arc::new(AlwaysProcessor { media_type: MediaType::Epub, priority: 10 });
		let fallback = Arc::new(FilenameFallbackProcessor::default());
		let registry = ProcessorRegistry::new(vec![low, high], fallback);

		let file = NamedTempFile::new().unwrap();
		let resolved = registry.resolve(file.path()).await;
		assert_eq!(resolved.supported_type(), MediaType::Epub);
	}

	#[tokio::test]
	async fn falls_back_when_nothing_claims_the_file() {
		let fallback = Arc::new(FilenameFallbackProcessor::default());
		let registry = ProcessorRegistry::new(vec![], fallback);

		let file = NamedTempFile::new().unwrap();
		let resolved = registry.resolve(file.path()).await;
		assert_eq!(resolved.priority(), FALLBACK_PRIORITY);
	}
}
