//! Sidecar descriptor: one XML document per asset, written alongside
//! the organised file, carrying enough detail to reconstruct Hub
//! identity and canonical values on disaster recovery. The "great
//! inhale" rebuilds the catalogue by walking the data root and reading
//! these back.
//!
//! `quick-xml`'s `serialize` feature drives both directions, a natural
//! fit for serde-driven XML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename = "sidecar")]
pub struct SidecarDescriptor {
	pub asset_id: String,
	pub content_hash: String,
	pub hub_id: String,
	pub hub_display_name: String,
	pub work_id: String,
	pub media_type: String,
	pub edition_id: String,
	pub format_label: Option<String>,
	pub canonical_values: CanonicalValueList,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CanonicalValueList {
	#[serde(rename = "value", default)]
	pub entries: Vec<CanonicalValueEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalValueEntry {
	#[serde(rename = "@key")]
	pub key: String,
	#[serde(rename = "$text")]
	pub value: String,
}

#[derive(Debug, Error)]
pub enum SidecarError {
	#[error("io error at {path:?}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("xml serialisation error: {0}")]
	Serialize(#[from] quick_xml::se::SeError),

	#[error("xml deserialisation error: {0}")]
	Deserialize(#[from] quick_xml::de::DeError),
}

/// Sidecar path for an organised media file: same stem, `.sidecar.xml`
/// extension, co-located with the media.
pub fn sidecar_path_for(media_path: &Path) -> PathBuf {
	let mut path = media_path.to_path_buf();
	let file_name = media_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
	path.set_file_name(format!("{file_name}.sidecar.xml"));
	path
}

pub async fn write_sidecar(media_path: &Path, descriptor: &SidecarDescriptor) -> Result<PathBuf, SidecarError> {
	let xml = quick_xml::se::to_string(descriptor)?;
	let path = sidecar_path_for(media_path);
	tokio::fs::write(&path, xml).await.map_err(|source| SidecarError::Io { path: path.clone(), source })?;
	Ok(path)
}

pub async fn read_sidecar(path: &Path) -> Result<SidecarDescriptor, SidecarError> {
	let contents = tokio::fs::read_to_string(path)
		.await
		.map_err(|source| SidecarError::Io { path: path.to_path_buf(), source })?;
	Ok(quick_xml::de::from_str(&contents)?)
}

/// The "great inhale": walks `data_root` recursively and reads back
/// every sidecar found, for catalogue reconciliation after disaster
/// recovery.
pub async fn great_inhale(data_root: &Path) -> Result<Vec<(PathBuf, SidecarDescriptor)>, SidecarError> {
	let mut results = Vec::new();
	let mut stack = vec![data_root.to_path_buf()];

	while let Some(dir) = stack.pop() {
		let mut entries = tokio::fs::read_dir(&dir).await.map_err(|source| SidecarError::Io { path: dir.clone(), source })?;

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|source| SidecarError::Io { path: dir.clone(), source })?
		{
			let path = entry.path();
			let file_type = entry.file_type().await.map_err(|source| SidecarError::Io { path: path.clone(), source })?;

			if file_type.is_dir() {
				stack.push(path);
			} else if path.to_string_lossy().ends_with(".sidecar.xml") {
				match read_sidecar(&path).await {
					Ok(descriptor) => results.push((path, descriptor)),
					Err(err) => tracing::warn!("skipping unreadable sidecar {:?}: {err}", path),
				}
			}
		}
	}

	Ok(results)
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use tempfile::tempdir;

	fn sample() -> SidecarDescriptor {
		SidecarDescriptor {
			asset_id: "asset-1".to_string(),
			content_hash: "abc123".to_string(),
			hub_id: "hub-1".to_string(),
			hub_display_name: "Dune".to_string(),
			work_id: "work-1".to_string(),
			media_type: "epub".to_string(),
			edition_id: "edition-1".to_string(),
			format_label: Some("Epub".to_string()),
			canonical_values: CanonicalValueList {
				entries: vec![CanonicalValueEntry { key: "title".to_string(), value: "Dune".to_string() }],
			},
		}
	}

	#[tokio::test]
	async fn round_trips_through_xml() {
		let dir = tempdir().unwrap();
		let media_path = dir.path().join("Dune.epub");
		tokio::fs::write(&media_path, b"content").await.unwrap();

		let descriptor = sample();
		let sidecar = write_sidecar(&media_path, &descriptor).await.unwrap();
		let read_back = read_sidecar(&sidecar).await.unwrap();

		assert_eq!(read_back, descriptor);
	}

	#[tokio::test]
	async fn great_inhale_finds_sidecars_in_nested_directories() {
		let dir = tempdir().unwrap();
		let nested = dir.path().join("Epub").join("Dune");
		tokio::fs::create_dir_all(&nested).await.unwrap();
		let media_path = nested.join("Dune.epub");
		tokio::fs::write(&media_path, b"content").await.unwrap();
		write_sidecar(&media_path, &sample()).await.unwrap();

		let found = great_inhale(dir.path()).await.unwrap();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].1.hub_display_name, "Dune");
	}
}
