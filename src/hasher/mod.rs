//! Hasher (C5): streaming content-addressable digest over a file.
//!
//! Unlike `ContentHashGenerator` (`domain/content_identity.rs`), which
//! samples beginning/middle/end for large files, an asset's identity
//! anchor here needs a full streaming hash with no sampling — every
//! byte is fed through the digest. That divergence is deliberate (see
//! DESIGN.md), not an oversight.

mod pool;

pub use pool::BufferPool;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// Chunk size the hasher reads in, ~80 KB at a time.
const CHUNK_SIZE: usize = 80 * 1024;

#[derive(Debug, Error)]
pub enum HasherError {
	#[error("io error hashing {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("hashing of {path} was cancelled")]
	Cancelled { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct HashOutcome {
	pub file_path: PathBuf,
	pub hex_lowercase: String,
	pub byte_count: u64,
	pub elapsed: Duration,
}

/// Streams a file through an incremental BLAKE3 digest using chunks
/// drawn from a shared buffer pool, returning the buffer on every exit
/// path (success, error, or cancellation) via the pool guard's `Drop`.
pub struct Hasher {
	pool: Arc<BufferPool>,
}

impl Hasher {
	pub fn new(pool: Arc<BufferPool>) -> Self {
		Self { pool }
	}

	/// Hashes `path` to completion unless `cancel` fires first, in which
	/// case the stream is aborted promptly, the buffer is released, and
	/// `HasherError::Cancelled` is returned.
	pub async fn hash_file(&self, path: &Path, cancel: &CancellationToken) -> Result<HashOutcome, HasherError> {
		let started = Instant::now();
		let mut file = File::open(path).await.map_err(|source| HasherError::Io {
			path: path.to_path_buf(),
			source,
		})?;

		let mut guard = self.pool.acquire();
		let buffer = guard.as_mut_slice();
		let mut hasher = blake3::Hasher::new();
		let mut byte_count: u64 = 0;

		loop {
			if cancel.is_cancelled() {
				return Err(HasherError::Cancelled { path: path.to_path_buf() });
			}

			let read = tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					return Err(HasherError::Cancelled { path: path.to_path_buf() });
				}
				result = file.read(buffer) => result.map_err(|source| HasherError::Io {
					path: path.to_path_buf(),
					source,
				})?,
			};

			if read == 0 {
				break;
			}

			hasher.update(&buffer[..read]);
			byte_count += read as u64;
		}

		let digest = hasher.finalize();
		Ok(HashOutcome {
			file_path: path.to_path_buf(),
			hex_lowercase: digest.to_hex().to_lowercase(),
			byte_count,
			elapsed: started.elapsed(),
		})
	}
}

impl Default for Hasher {
	fn default() -> Self {
		Self::new(Arc::new(BufferPool::new(CHUNK_SIZE)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use tempfile::NamedTempFile;
	use tokio::io::AsyncWriteExt;

	async fn write_temp(contents: &[u8]) -> NamedTempFile {
		let file = NamedTempFile::new().unwrap();
		let mut handle = tokio::fs::File::create(file.path()).await.unwrap();
		handle.write_all(contents).await.unwrap();
		handle.flush().await.unwrap();
		file
	}

	#[tokio::test]
	async fn hashes_match_for_identical_content() {
		let a = write_temp(b"dune by frank herbert").await;
		let b = write_temp(b"dune by frank herbert").await;
		let hasher = Hasher::default();
		let cancel = CancellationToken::new();

		let ha = hasher.hash_file(a.path(), &cancel).await.unwrap();
		let hb = hasher.hash_file(b.path(), &cancel).await.unwrap();

		assert_eq!(ha.hex_lowercase, hb.hex_lowercase);
		assert_eq!(ha.byte_count, 22);
	}

	#[tokio::test]
	async fn differing_content_hashes_differ() {
		let a = write_temp(b"dune").await;
		let b = write_temp(b"dune messiah").await;
		let hasher = Hasher::default();
		let cancel = CancellationToken::new();

		let ha = hasher.hash_file(a.path(), &cancel).await.unwrap();
		let hb = hasher.hash_file(b.path(), &cancel).await.unwrap();

		assert_ne!(ha.hex_lowercase, hb.hex_lowercase);
	}

	#[tokio::test]
	async fn cancellation_aborts_before_starting() {
		let a = write_temp(&vec![0u8; CHUNK_SIZE * 4]).await;
		let hasher = Hasher::default();
		let cancel = CancellationToken::new();
		cancel.cancel();

		let err = hasher.hash_file(a.path(), &cancel).await.unwrap_err();
		assert!(matches!(err, HasherError::Cancelled { .. }));
	}

	#[tokio::test]
	async fn large_file_spans_multiple_chunks() {
		let contents = vec![7u8; CHUNK_SIZE * 3 + 17];
		let file = write_temp(&contents).await;
		let hasher = Hasher::default();
		let cancel = CancellationToken::new();

		let outcome = hasher.hash_file(file.path(), &cancel).await.unwrap();
		assert_eq!(outcome.byte_count, contents.len() as u64);
	}
}
