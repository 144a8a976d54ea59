//! The organiser: an external collaborator reached only through a
//! trait, the same pattern used elsewhere of depending on
//! `ActionHandler`/`JobHandler` trait objects rather than concrete
//! types. Resolves the templated destination path and collision-safely
//! renames the ingested file into place.

use async_trait::async_trait;
use backoff::{future::retry, Error as BackoffError, ExponentialBackoffBuilder};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct OrganiseRequest {
	pub source_path: PathBuf,
	pub category: String,
	pub hub_name: String,
	pub year: Option<String>,
	pub format: String,
	pub edition_label: String,
	pub extension: String,
}

#[derive(Debug, Error)]
pub enum OrganiserError {
	#[error("io error organising {path:?}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("retries exhausted organising {path:?}")]
	RetriesExhausted { path: PathBuf },
}

#[async_trait]
pub trait Organiser: Send + Sync {
	async fn organise(&self, request: OrganiseRequest) -> Result<PathBuf, OrganiserError>;
}

/// Default template:
/// `{Category}/{HubName} ({Year})/{Format}/{HubName} ({Edition}){Ext}`,
/// dropping the `(Year)` segment entirely when no year claim exists.
pub struct TemplatedOrganiser {
	pub data_root: PathBuf,
	pub max_attempts: u32,
}

impl TemplatedOrganiser {
	pub fn new(data_root: PathBuf) -> Self {
		Self { data_root, max_attempts: 5 }
	}

	fn resolve_destination_dir(&self, request: &OrganiseRequest) -> PathBuf {
		let hub_with_year = match &request.year {
			Some(year) if !year.is_empty() => format!("{} ({})", request.hub_name, year),
			_ => request.hub_name.clone(),
		};
		self.data_root.join(&request.category).join(hub_with_year).join(&request.format)
	}

	fn resolve_file_name(&self, request: &OrganiseRequest) -> String {
		format!("{} ({}){}", request.hub_name, request.edition_label, request.extension)
	}

	/// Appends ` (2)`, ` (3)`, ... before the extension until an unused
	/// name is found. Never overwrites an existing file.
	fn next_available_path(dir: &Path, file_name: &str) -> PathBuf {
		let candidate = dir.join(file_name);
		if !candidate.exists() {
			return candidate;
		}

		let (stem, ext) = match file_name.rsplit_once('.') {
			Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
			None => (file_name.to_string(), String::new()),
		};

		for suffix in 2.. {
			let attempt = dir.join(format!("{stem} ({suffix}){ext}"));
			if !attempt.exists() {
				return attempt;
			}
		}
		unreachable!("infinite suffix search")
	}
}

#[async_trait]
impl Organiser for TemplatedOrganiser {
	/// Retries a transient rename failure (another process briefly
	/// holding the source open, a destination mid-creation by a sibling
	/// task) with the same exponential-backoff policy used elsewhere in
	/// this codebase — `backoff`'s `ExponentialBackoff` driving
	/// `backoff::future::retry` rather than a hand-rolled sleep loop.
	async fn organise(&self, request: OrganiseRequest) -> Result<PathBuf, OrganiserError> {
		let dir = self.resolve_destination_dir(&request);
		let file_name = self.resolve_file_name(&request);

		tokio::fs::create_dir_all(&dir).await.map_err(|source| OrganiserError::Io {
			path: dir.clone(),
			source,
		})?;

		let policy = ExponentialBackoffBuilder::new()
			.with_initial_interval(Duration::from_millis(100))
			.with_max_interval(Duration::from_secs(5))
			.with_max_elapsed_time(Some(Duration::from_millis(100) * 2u32.pow(self.max_attempts)))
			.build();

		let attempt = std::sync::atomic::AtomicU32::new(0);
		let source_path = request.source_path.clone();
		let max_attempts = self.max_attempts;

		retry(policy, || {
			let destination = Self::next_available_path(&dir, &file_name);
			let source_path = source_path.clone();
			let attempt_no = attempt.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;

			async move {
				match tokio::fs::rename(&source_path, &destination).await {
					Ok(()) => {
						info!("organised {:?} -> {:?}", source_path, destination);
						Ok(destination)
					}
					Err(source) if attempt_no < max_attempts => {
						warn!("transient error organising {:?} (attempt {attempt_no}/{max_attempts}): {source}", source_path);
						Err(BackoffError::transient(OrganiserError::Io { path: destination, source }))
					}
					Err(source) => Err(BackoffError::permanent(OrganiserError::Io { path: destination, source })),
				}
			}
		})
		.await
		.map_err(|_| OrganiserError::RetriesExhausted {
			path: request.source_path.clone(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	fn request(source: PathBuf, year: Option<&str>) -> OrganiseRequest {
		OrganiseRequest {
			source_path: source,
			category: "Epub".to_string(),
			hub_name: "Dune".to_string(),
			year: year.map(|y| y.to_string()),
			format: "Epub".to_string(),
			edition_label: "Edition 1".to_string(),
			extension: ".epub".to_string(),
		}
	}

	#[tokio::test]
	async fn organises_into_templated_path_with_year() {
		let root = tempdir().unwrap();
		let source_dir = tempdir().unwrap();
		let source = source_dir.path().join("book.epub");
		tokio::fs::write(&source, b"content").await.unwrap();

		let organiser = TemplatedOrganiser::new(root.path().to_path_buf());
		let destination = organiser.organise(request(source, Some("1965"))).await.unwrap();

		assert!(destination.starts_with(root.path().join("Epub").join("Dune (1965)").join("Epub")));
		assert!(destination.exists());
	}

	#[tokio::test]
	async fn drops_year_segment_when_absent() {
		let root = tempdir().unwrap();
		let source_dir = tempdir().unwrap();
		let source = source_dir.path().join("book.epub");
		tokio::fs::write(&source, b"content").await.unwrap();

		let organiser = TemplatedOrganiser::new(root.path().to_path_buf());
		let destination = organiser.organise(request(source, None)).await.unwrap();

		assert!(destination.starts_with(root.path().join("Epub").join("Dune").join("Epub")));
	}

	#[tokio::test]
	async fn never_overwrites_existing_destination() {
		let root = tempdir().unwrap();
		let organiser = TemplatedOrganiser::new(root.path().to_path_buf());

		let first_source_dir = tempdir().unwrap();
		let first_source = first_source_dir.path().join("a.epub");
		tokio::fs::write(&first_source, b"one").await.unwrap();
		let first_destination = organiser.organise(request(first_source, Some("1965"))).await.unwrap();

		let second_source_dir = tempdir().unwrap();
		let second_source = second_source_dir.path().join("b.epub");
		tokio::fs::write(&second_source, b"two").await.unwrap();
		let second_destination = organiser.organise(request(second_source, Some("1965"))).await.unwrap();

		assert_ne!(first_destination, second_destination);
		assert!(second_destination.to_string_lossy().contains("(2)"));
	}
}
