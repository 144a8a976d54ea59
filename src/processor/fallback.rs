//! The unconditional fallback processor: registered at
//! `FALLBACK_PRIORITY`, its `can_process` is never invoked, and it is
//! dispatched whenever no real format processor claims a file. It
//! extracts only what the filesystem itself can tell us — the file
//! stem as a low-confidence title claim — so that ingestion never
//! stalls on an unrecognised format.

use super::{FALLBACK_PRIORITY, Processor, ProcessorError, ProcessorResult};
use crate::domain::{ExtractedClaim, MediaType};
use async_trait::async_trait;
use std::path::Path;

#[derive(Default)]
pub struct FilenameFallbackProcessor;

#[async_trait]
impl Processor for FilenameFallbackProcessor {
	fn supported_type(&self) -> MediaType {
		MediaType::Unknown
	}

	fn priority(&self) -> i32 {
		FALLBACK_PRIORITY
	}

	async fn can_process(&self, _path: &Path) -> bool {
		// Never invoked by the registry; present only to satisfy the
		// trait.
		true
	}

	async fn process(&self, path: &Path) -> Result<ProcessorResult, ProcessorError> {
		let title = path
			.file_stem()
			.map(|s| s.to_string_lossy().to_string())
			.unwrap_or_else(|| "Unknown".to_string());

		Ok(ProcessorResult {
			detected_type: MediaType::Unknown,
			claims: vec![ExtractedClaim::new("title", title, 0.3)],
			cover_bytes: None,
			cover_mime: None,
			is_corrupt: false,
			corrupt_reason: None,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use std::path::PathBuf;

	#[tokio::test]
	async fn derives_title_from_file_stem() {
		let processor = FilenameFallbackProcessor::default();
		let result = processor.process(&PathBuf::from("/watch/Dune.epub")).await.unwrap();
		assert_eq!(result.claims[0].key, "title");
		assert_eq!(result.claims[0].value, "Dune");
		assert!(result.claims[0].confidence < 0.5);
	}
}
