//! Engine configuration: schema, `.bak`-fallback persistence, and the
//! versioned migration trait that persistence relies on.

pub mod app_config;
pub mod migration;

pub use app_config::{AppConfig, MaintenanceConfig, ProviderConfig, ProviderDomain, ScoringConfig};
pub use migration::Migrate;

use std::path::PathBuf;

/// Where the config lives when the caller doesn't pass an explicit
/// path — a sensible platform default keeps ad-hoc `Engine::open`
/// calls short.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let base = dirs::data_dir().ok_or_else(|| anyhow::anyhow!("no platform data directory available"))?;
	Ok(base.join("hubkeeper").join("config.json"))
}
