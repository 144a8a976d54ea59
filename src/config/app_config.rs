//! On-disk engine configuration: JSON, with a `.bak` fallback
//! and first-run default creation. Saves rotate the primary file to
//! `.bak` before overwriting so a crash mid-write never loses both
//! copies at once.

use super::migration::Migrate;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Domain a provider specialises in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ProviderDomain {
	Ebook,
	Audiobook,
	Video,
	Universal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
	pub name: String,
	pub version: String,
	pub enabled: bool,
	pub weight: f64,
	pub domain: ProviderDomain,
	#[serde(default)]
	pub capability_tags: Vec<String>,
	#[serde(default)]
	pub field_weights: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
	pub max_transaction_log_entries: u64,
	pub vacuum_on_startup: bool,
}

impl Default for MaintenanceConfig {
	fn default() -> Self {
		Self {
			max_transaction_log_entries: 100_000,
			vacuum_on_startup: false,
		}
	}
}

/// Weighted-voter scoring configuration, shared by the scoring engine
/// and the identity matcher / arbiter thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringConfig {
	pub auto_link_threshold: f64,
	pub conflict_threshold: f64,
	pub conflict_epsilon: f64,
	pub stale_claim_decay_days: u32,
	pub stale_claim_decay_factor: f64,
}

impl Default for ScoringConfig {
	fn default() -> Self {
		Self {
			auto_link_threshold: 0.85,
			conflict_threshold: 0.60,
			conflict_epsilon: 0.05,
			stale_claim_decay_days: 90,
			stale_claim_decay_factor: 0.8,
		}
	}
}

/// Top-level engine configuration as loaded from `<config>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
	pub schema_version: u32,
	pub database_path: PathBuf,
	pub data_root: PathBuf,
	/// The inbox directory the file watcher observes. Distinct from
	/// `data_root`, which is where the organiser files ingested media
	/// away to — the two may not overlap.
	#[serde(default = "default_watch_root")]
	pub watch_root: PathBuf,
	#[serde(default)]
	pub providers: Vec<ProviderConfig>,
	#[serde(default)]
	pub provider_endpoints: HashMap<String, String>,
	pub maintenance: MaintenanceConfig,
	pub scoring: ScoringConfig,
}

fn default_watch_root() -> PathBuf {
	PathBuf::from("inbox")
}

impl AppConfig {
	fn default_with_paths(database_path: PathBuf, data_root: PathBuf, watch_root: PathBuf) -> Self {
		Self {
			schema_version: Self::target_version(),
			database_path,
			data_root,
			watch_root,
			providers: vec![ProviderConfig {
				name: "local-filesystem".to_string(),
				version: "1".to_string(),
				enabled: true,
				weight: 1.0,
				domain: ProviderDomain::Universal,
				capability_tags: vec!["embedded-metadata".to_string()],
				field_weights: HashMap::new(),
			}],
			provider_endpoints: HashMap::new(),
			maintenance: MaintenanceConfig::default(),
			scoring: ScoringConfig::default(),
		}
	}

	/// Load order: primary file, then `.bak` (restoring the primary on
	/// success), then a first-run default that is created and persisted.
	pub fn load_or_create(config_path: &Path) -> Result<Self> {
		match Self::read_json(config_path) {
			Ok(config) => return Self::migrated(config, config_path),
			Err(primary_err) => {
				warn!("primary config unreadable at {:?}: {}", config_path, primary_err);
			}
		}

		let backup_path = Self::backup_path(config_path);
		match Self::read_json(&backup_path) {
			Ok(config) => {
				info!("restored config from backup {:?}", backup_path);
				config.save(config_path)?;
				return Self::migrated(config, config_path);
			}
			Err(backup_err) => {
				warn!("backup config unreadable at {:?}: {}", backup_path, backup_err);
			}
		}

		info!("no usable config found, creating default at {:?}", config_path);
		let data_root = config_path
			.parent()
			.map(|p| p.join("library"))
			.unwrap_or_else(|| PathBuf::from("library"));
		let watch_root = config_path
			.parent()
			.map(|p| p.join("inbox"))
			.unwrap_or_else(|| PathBuf::from("inbox"));
		let database_path = config_path
			.parent()
			.map(|p| p.join("catalogue.db"))
			.unwrap_or_else(|| PathBuf::from("catalogue.db"));
		let config = Self::default_with_paths(database_path, data_root, watch_root);
		config.save(config_path)?;
		Ok(config)
	}

	fn migrated(mut config: Self, config_path: &Path) -> Result<Self> {
		if config.needs_migration() {
			info!(
				"migrating config from v{} to v{}",
				config.current_version(),
				Self::target_version()
			);
			config.migrate()?;
			config.save(config_path)?;
		}
		Ok(config)
	}

	fn read_json(path: &Path) -> Result<Self> {
		let json = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
		let config: Self = serde_json::from_str(&json).with_context(|| format!("parsing {:?}", path))?;
		Ok(config)
	}

	fn backup_path(config_path: &Path) -> PathBuf {
		let mut backup = config_path.as_os_str().to_owned();
		backup.push(".bak");
		PathBuf::from(backup)
	}

	/// Rotate the existing primary to `.bak`, then write the new
	/// primary. Directory creation covers first-run.
	pub fn save(&self, config_path: &Path) -> Result<()> {
		if let Some(parent) = config_path.parent() {
			fs::create_dir_all(parent)?;
		}

		if config_path.exists() {
			fs::rename(config_path, Self::backup_path(config_path))?;
		}

		let json = serde_json::to_string_pretty(self)?;
		fs::write(config_path, json)?;
		Ok(())
	}

	pub fn ensure_directories(&self) -> Result<()> {
		fs::create_dir_all(&self.data_root)?;
		fs::create_dir_all(&self.watch_root)?;
		if let Some(db_parent) = self.database_path.parent() {
			fs::create_dir_all(db_parent)?;
		}
		Ok(())
	}

	pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
		self.providers.iter().filter(|p| p.enabled)
	}

	pub fn provider_weights(&self) -> HashMap<String, f64> {
		self.enabled_providers().map(|p| (p.name.clone(), p.weight)).collect()
	}

	pub fn provider_field_weights(&self) -> HashMap<String, HashMap<String, f64>> {
		self.enabled_providers()
			.map(|p| (p.name.clone(), p.field_weights.clone()))
			.collect()
	}
}

impl Migrate for AppConfig {
	fn current_version(&self) -> u32 {
		self.schema_version
	}

	fn target_version() -> u32 {
		1
	}

	fn migrate(&mut self) -> Result<()> {
		match self.schema_version {
			0 => {
				self.schema_version = 1;
				Ok(())
			}
			1 => Ok(()),
			v => Err(anyhow!("unknown config schema version: {}", v)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use tempfile::tempdir;

	#[test]
	fn first_run_creates_a_default_config_and_persists_it() {
		let dir = tempdir().unwrap();
		let config_path = dir.path().join("config.json");
		assert!(!config_path.exists());

		let config = AppConfig::load_or_create(&config_path).unwrap();
		assert!(config_path.exists());
		assert_eq!(config.scoring.auto_link_threshold, 0.85);
		assert_eq!(config.providers.len(), 1);
		assert_eq!(config.providers[0].name, "local-filesystem");
	}

	#[test]
	fn save_rotates_the_primary_to_backup_before_overwriting() {
		let dir = tempdir().unwrap();
		let config_path = dir.path().join("config.json");
		let backup_path = dir.path().join("config.json.bak");

		let mut config = AppConfig::load_or_create(&config_path).unwrap();
		assert!(!backup_path.exists());

		config.database_path = PathBuf::from("changed.db");
		config.save(&config_path).unwrap();
		assert!(backup_path.exists());

		let reloaded = AppConfig::load_or_create(&config_path).unwrap();
		assert_eq!(reloaded.database_path, PathBuf::from("changed.db"));
	}

	#[test]
	fn corrupt_primary_falls_back_to_backup_and_restores_it() {
		let dir = tempdir().unwrap();
		let config_path = dir.path().join("config.json");

		let config = AppConfig::load_or_create(&config_path).unwrap();
		config.save(&dir.path().join("config.json.bak")).unwrap();
		fs::write(&config_path, "{ not valid json").unwrap();

		let recovered = AppConfig::load_or_create(&config_path).unwrap();
		assert_eq!(recovered.schema_version, config.schema_version);
		// The primary is restored from the backup on successful recovery.
		let primary_contents = fs::read_to_string(&config_path).unwrap();
		assert!(serde_json::from_str::<AppConfig>(&primary_contents).is_ok());
	}

	#[test]
	fn old_schema_version_is_migrated_to_target() {
		let dir = tempdir().unwrap();
		let config_path = dir.path().join("config.json");
		let mut config = AppConfig::load_or_create(&config_path).unwrap();
		config.schema_version = 0;
		config.save(&config_path).unwrap();

		let migrated = AppConfig::load_or_create(&config_path).unwrap();
		assert_eq!(migrated.schema_version, AppConfig::target_version());
	}

	#[test]
	fn provider_weights_only_include_enabled_providers() {
		let mut config = AppConfig::default_with_paths(
			PathBuf::from("db"),
			PathBuf::from("data"),
			PathBuf::from("inbox"),
		);
		config.providers.push(ProviderConfig {
			name: "disabled-provider".to_string(),
			version: "1".to_string(),
			enabled: false,
			weight: 5.0,
			domain: ProviderDomain::Universal,
			capability_tags: vec![],
			field_weights: HashMap::new(),
		});

		let weights = config.provider_weights();
		assert!(weights.contains_key("local-filesystem"));
		assert!(!weights.contains_key("disabled-provider"));
	}
}
