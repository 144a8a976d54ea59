//! File Watcher + Debounce Queue (C7). OS events arrive raw from
//! `notify` and are coalesced by [`debounce::DebounceQueue`] into
//! lock-probed ingestion candidates.
//!
//! Per-path state lives in a plain `HashMap` guarded by a single lock —
//! the same shape as `PathDebouncer`
//! (`services/location_watcher/utils.rs`), generalised here into
//! cancellable settle tasks plus an exponential-backoff lock probe that
//! that debouncer does not implement.

pub mod debounce;

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcherTrait};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

pub use debounce::{Candidate, DebounceConfig, DebounceQueue};

/// Glob-based exclusion list consulted before a raw `FileEvent` is ever
/// handed to the debounce queue, so sidecar descriptors the organiser
/// just wrote, and in-progress downloads, never get re-ingested as
/// candidates of their own.
pub struct IgnoreSet {
	set: GlobSet,
}

impl IgnoreSet {
	pub fn new(patterns: impl IntoIterator<Item = String>) -> Result<Self, globset::Error> {
		let mut builder = GlobSetBuilder::new();
		for pattern in patterns {
			builder.add(Glob::new(&pattern)?);
		}
		Ok(Self { set: builder.build()? })
	}

	pub fn is_ignored(&self, path: &Path) -> bool {
		self.set.is_match(path)
	}
}

impl Default for IgnoreSet {
	fn default() -> Self {
		Self::new(DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string())).expect("default ignore patterns are valid globs")
	}
}

/// Files the watcher must never surface as ingestion candidates:
/// sidecar descriptors, hidden files, and common partial-download
/// suffixes left by browsers and download managers.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &["**/*.sidecar.xml", "**/.*", "**/*.part", "**/*.crdownload", "**/*.tmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
	Created,
	Modified,
	Deleted,
	Renamed,
}

#[derive(Debug, Clone)]
pub struct FileEvent {
	pub path: PathBuf,
	pub old_path: Option<PathBuf>,
	pub kind: FileEventKind,
	pub occurred_at: DateTime<Utc>,
}

/// Sink for non-overflow watch errors: reported, never fatal — recovery
/// is the caller's responsibility.
pub trait WatchErrorSink: Send + Sync {
	fn report(&self, error: notify::Error);
}

pub struct LoggingErrorSink;

impl WatchErrorSink for LoggingErrorSink {
	fn report(&self, error: notify::Error) {
		warn!("file watcher error: {error}");
	}
}

/// Thin wrapper over `notify::RecommendedWatcher`: forwards raw events
/// into an unbounded channel the debounce queue consumes. Callbacks
/// registered with `notify` must not block, so the OS event thread only
/// ever does a non-blocking `send`.
pub struct FileWatcher {
	_inner: RecommendedWatcher,
	pub events: mpsc::UnboundedReceiver<FileEvent>,
}

impl FileWatcher {
	pub fn watch(root: &Path, error_sink: Arc<dyn WatchErrorSink>) -> notify::Result<Self> {
		let (tx, rx) = mpsc::unbounded_channel();

		let mut watcher = notify::recommended_watcher(move |res: notify::Result<NotifyEvent>| match res {
			Ok(event) => {
				for file_event in translate(event) {
					// Unbounded + non-blocking: the notify callback
					// must never block.
					let _ = tx.send(file_event);
				}
			}
			Err(err) => error_sink.report(err),
		})?;

		watcher.watch(root, RecursiveMode::Recursive)?;

		Ok(Self { _inner: watcher, events: rx })
	}
}

fn translate(event: NotifyEvent) -> Vec<FileEvent> {
	let occurred_at = Utc::now();
	let kind = match event.kind {
		EventKind::Create(_) => FileEventKind::Created,
		EventKind::Modify(notify::event::ModifyKind::Name(_)) => FileEventKind::Renamed,
		EventKind::Modify(_) => FileEventKind::Modified,
		EventKind::Remove(_) => FileEventKind::Deleted,
		_ => return Vec::new(),
	};

	if kind == FileEventKind::Renamed && event.paths.len() == 2 {
		return vec![FileEvent {
			path: event.paths[1].clone(),
			old_path: Some(event.paths[0].clone()),
			kind,
			occurred_at,
		}];
	}

	event
		.paths
		.into_iter()
		.map(|path| FileEvent {
			path,
			old_path: None,
			kind,
			occurred_at,
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use notify::event::{CreateKind, ModifyKind, RenameMode};
	use pretty_assertions::assert_eq;

	#[test]
	fn translates_create_event() {
		let event = NotifyEvent::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/a"));
		let translated = translate(event);
		assert_eq!(translated.len(), 1);
		assert_eq!(translated[0].kind, FileEventKind::Created);
	}

	#[test]
	fn translates_rename_pair_into_single_event_with_old_path() {
		let event = NotifyEvent::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
			.add_path(PathBuf::from("/old"))
			.add_path(PathBuf::from("/new"));
		let translated = translate(event);
		assert_eq!(translated.len(), 1);
		assert_eq!(translated[0].kind, FileEventKind::Renamed);
		assert_eq!(translated[0].path, PathBuf::from("/new"));
		assert_eq!(translated[0].old_path, Some(PathBuf::from("/old")));
	}

	#[test]
	fn ignores_unmapped_event_kinds() {
		let event = NotifyEvent::new(EventKind::Access(notify::event::AccessKind::Any));
		assert!(translate(event).is_empty());
	}

	#[test]
	fn default_ignore_set_excludes_sidecars_and_hidden_files() {
		let ignore = IgnoreSet::default();
		assert!(ignore.is_ignored(Path::new("/watch/Dune.sidecar.xml")));
		assert!(ignore.is_ignored(Path::new("/watch/.DS_Store")));
		assert!(ignore.is_ignored(Path::new("/watch/Dune.epub.part")));
		assert!(!ignore.is_ignored(Path::new("/watch/Dune.epub")));
	}
}
