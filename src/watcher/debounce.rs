//! Per-path settle/probe queue. For every canonicalised
//! path, only the most recently-started settle task ever reaches its
//! wake point — a newer event cancels whatever settle or probe task is
//! currently running for that path.

use super::{FileEvent, FileEventKind};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct DebounceConfig {
	pub settle_delay: Duration,
	pub probe_interval: Duration,
	pub max_probe_delay: Duration,
	pub max_probe_attempts: u32,
	pub output_capacity: usize,
}

impl Default for DebounceConfig {
	fn default() -> Self {
		Self {
			settle_delay: Duration::from_secs(2),
			probe_interval: Duration::from_secs(1),
			max_probe_delay: Duration::from_secs(30),
			max_probe_attempts: 8,
			output_capacity: 512,
		}
	}
}

#[derive(Debug, Clone)]
pub struct Candidate {
	pub path: PathBuf,
	pub is_failed: bool,
	pub failure_reason: Option<String>,
	pub detected_at: DateTime<Utc>,
	pub ready_at: DateTime<Utc>,
}

struct PathState {
	latest_kind: FileEventKind,
	first_seen_at: DateTime<Utc>,
	token: CancellationToken,
}

struct Inner {
	paths: Mutex<HashMap<String, PathState>>,
	output: mpsc::Sender<Candidate>,
	config: DebounceConfig,
}

/// Thread-safe for concurrent enqueue from multiple producers — does
/// not assume a single producer.
#[derive(Clone)]
pub struct DebounceQueue {
	inner: Arc<Inner>,
}

impl DebounceQueue {
	pub fn new(config: DebounceConfig) -> (Self, mpsc::Receiver<Candidate>) {
		let (tx, rx) = mpsc::channel(config.output_capacity);
		let queue = Self {
			inner: Arc::new(Inner {
				paths: Mutex::new(HashMap::new()),
				output: tx,
				config,
			}),
		};
		(queue, rx)
	}

	/// Canonicalises a path: full path, trailing separator stripped,
	/// upper-cased — so that the same
	/// logical path always maps to the same debounce key regardless of
	/// how a given OS event happens to spell it.
	pub fn canonical_key(path: &Path) -> String {
		let raw = path.to_string_lossy();
		let trimmed = raw.trim_end_matches(['/', '\\']);
		trimmed.to_uppercase()
	}

	/// Records `event` as the latest known event for its path, cancels
	/// any in-flight settle/probe task for that path, and starts a
	/// fresh settle task.
	pub async fn enqueue(&self, event: FileEvent) {
		let key = Self::canonical_key(&event.path);
		let new_token = CancellationToken::new();
		let first_seen_at = {
			let mut paths = self.inner.paths.lock().await;
			let first_seen_at = match paths.get(&key) {
				Some(existing) => {
					existing.token.cancel();
					existing.first_seen_at
				}
				None => event.occurred_at,
			};
			paths.insert(
				key.clone(),
				PathState {
					latest_kind: event.kind,
					first_seen_at,
					token: new_token.clone(),
				},
			);
			first_seen_at
		};

		let inner = self.inner.clone();
		let path = event.path.clone();
		tokio::spawn(async move {
			Self::settle(inner, key, path, first_seen_at, new_token).await;
		});
	}

	async fn settle(inner: Arc<Inner>, key: String, path: PathBuf, first_seen_at: DateTime<Utc>, token: CancellationToken) {
		tokio::select! {
			_ = token.cancelled() => {
				trace!("settle task for {:?} superseded before waking", path);
				return;
			}
			_ = tokio::time::sleep(inner.config.settle_delay) => {}
		}

		let latest_kind = {
			let paths = inner.paths.lock().await;
			match paths.get(&key) {
				Some(state) => state.latest_kind,
				// Entry vanished entirely: nothing to settle.
				None => return,
			}
		};

		if latest_kind == FileEventKind::Deleted {
			Self::emit(&inner, &key, path, first_seen_at, false, None).await;
			return;
		}

		Self::probe(inner, key, path, first_seen_at, token).await;
	}

	async fn probe(inner: Arc<Inner>, key: String, path: PathBuf, first_seen_at: DateTime<Utc>, token: CancellationToken) {
		let config = &inner.config;

		for attempt in 1..=config.max_probe_attempts {
			if token.is_cancelled() {
				trace!("probe for {:?} abandoned: superseded", path);
				return;
			}

			match tokio::fs::File::open(&path).await {
				Ok(_) => {
					Self::emit(&inner, &key, path, first_seen_at, false, None).await;
					return;
				}
				Err(err) => {
					if attempt == config.max_probe_attempts {
						let reason = format!("lock probe exhausted after {attempt} attempts: {err}");
						Self::emit(&inner, &key, path, first_seen_at, true, Some(reason)).await;
						return;
					}

					let backoff = config.probe_interval.saturating_mul(1 << (attempt - 1)).min(config.max_probe_delay);
					debug!("probe attempt {attempt} for {:?} failed ({err}), backing off {:?}", path, backoff);

					tokio::select! {
						_ = token.cancelled() => {
							trace!("probe for {:?} abandoned during backoff: superseded", path);
							return;
						}
						_ = tokio::time::sleep(backoff) => {}
					}
				}
			}
		}
	}

	async fn emit(inner: &Arc<Inner>, key: &str, path: PathBuf, detected_at: DateTime<Utc>, is_failed: bool, failure_reason: Option<String>) {
		inner.paths.lock().await.remove(key);

		let candidate = Candidate {
			path,
			is_failed,
			failure_reason,
			detected_at,
			ready_at: Utc::now(),
		};

		// Bounded, wait-on-full: back-pressures upstream.
		let _ = inner.output.send(candidate).await;
	}
}
