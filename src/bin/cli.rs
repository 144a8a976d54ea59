//! hubkeeperd — the engine's own command-line front end.
//!
//! Thin shell over [`hubkeeper::Engine`]: every subcommand opens the
//! catalogue, does one thing, and exits (except `serve`, which keeps
//! the watcher running until interrupted).

use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use hubkeeper::config::AppConfig;
use hubkeeper::domain::{EditionId, EntityId, WorkId};
use hubkeeper::{Engine, PendingOperation};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hubkeeperd", about = "Local-first media-library ingestion engine")]
struct Cli {
	/// Path to the engine's JSON config file; created with defaults on
	/// first run if absent.
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Start the file watcher and ingest until interrupted.
	Serve,
	/// List every Hub and its Works.
	Hubs,
	/// Search Hubs by display name (minimum 2 characters).
	Search { query: String },
	/// Walk the watch root and report what ingestion would do, without
	/// mutating the catalogue.
	Scan,
	/// Manually override a canonical value for an entity.
	Resolve {
		/// `work:<uuid>` or `edition:<uuid>`
		entity: String,
		key: String,
		value: String,
	},
	/// Append a permanent user-locked claim and re-score immediately.
	Lock {
		/// `work:<uuid>` or `edition:<uuid>`
		entity: String,
		key: String,
		value: String,
	},
	/// Print engine status.
	Status,
}

fn parse_entity(raw: &str) -> anyhow::Result<EntityId> {
	let (kind, id) = raw.split_once(':').ok_or_else(|| anyhow::anyhow!("expected `work:<uuid>` or `edition:<uuid>`, got {raw:?}"))?;
	match kind {
		"work" => Ok(EntityId::work(WorkId::from_str(id)?)),
		"edition" => Ok(EntityId::edition(EditionId::from_str(id)?)),
		other => Err(anyhow::anyhow!("unknown entity kind {other:?}, expected `work` or `edition`")),
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

	let cli = Cli::parse();
	let config_path = match cli.config {
		Some(path) => path,
		None => hubkeeper::config::default_config_path()?,
	};
	let config = AppConfig::load_or_create(&config_path)?;

	match cli.command {
		Command::Serve => run_serve(config).await,
		Command::Hubs => run_hubs(config).await,
		Command::Search { query } => run_search(config, &query).await,
		Command::Scan => run_scan(config).await,
		Command::Resolve { entity, key, value } => run_resolve(config, &entity, key, value).await,
		Command::Lock { entity, key, value } => run_lock(config, &entity, key, value).await,
		Command::Status => run_status(config).await,
	}
}

async fn run_serve(config: AppConfig) -> anyhow::Result<()> {
	let watch_root = config.watch_root.clone();
	let mut engine = Engine::open(config).await?;
	engine.start_watching().await?;
	tracing::info!("watching {:?}; press Ctrl-C to stop", watch_root);
	tokio::signal::ctrl_c().await?;
	Ok(())
}

async fn run_hubs(config: AppConfig) -> anyhow::Result<()> {
	let engine = Engine::open(config).await?;
	let hubs = engine.list_hubs().await?;
	print_hubs(&hubs);
	Ok(())
}

async fn run_search(config: AppConfig, query: &str) -> anyhow::Result<()> {
	let engine = Engine::open(config).await?;
	let hubs = engine.search_hubs(query).await?;
	print_hubs(&hubs);
	Ok(())
}

fn print_hubs(hubs: &[hubkeeper::store::HubWithWorks]) {
	let mut table = Table::new();
	table.load_preset(UTF8_FULL).set_header(vec!["Hub", "Works", "Created"]);
	for hub in hubs {
		table.add_row(vec![hub.display_name.clone(), hub.works.len().to_string(), hub.created_at.to_rfc3339()]);
	}
	println!("{table}");
}

async fn run_scan(config: AppConfig) -> anyhow::Result<()> {
	let engine = Engine::open(config).await?;
	let spinner = ProgressBar::new_spinner();
	spinner.set_style(ProgressStyle::with_template("{spinner} scanning watch root...").unwrap());
	spinner.enable_steady_tick(std::time::Duration::from_millis(100));
	let operations = engine.scan_dry_run().await?;
	spinner.finish_and_clear();

	let mut table = Table::new();
	table.load_preset(UTF8_FULL).set_header(vec!["Path", "Content Hash", "Operation"]);
	for op in &operations {
		let (path, hash, label) = match op {
			PendingOperation::WouldIngest { path, content_hash } => (path, content_hash, "ingest"),
			PendingOperation::WouldSkipDuplicate { path, content_hash } => (path, content_hash, "skip (duplicate)"),
		};
		table.add_row(vec![path.display().to_string(), hash[..12.min(hash.len())].to_string(), label.to_string()]);
	}
	println!("{table}");
	println!("{} pending operation(s)", operations.len());
	Ok(())
}

async fn run_resolve(config: AppConfig, entity: &str, key: String, value: String) -> anyhow::Result<()> {
	let entity_id = parse_entity(entity)?;
	let engine = Engine::open(config).await?;
	engine.resolve_metadata(entity_id, key, value).await?;
	println!("canonical value updated for {entity_id}");
	Ok(())
}

async fn run_lock(config: AppConfig, entity: &str, key: String, value: String) -> anyhow::Result<()> {
	let entity_id = parse_entity(entity)?;
	let engine = Engine::open(config).await?;
	engine.lock_claim(entity_id, key, value).await?;
	println!("claim locked and entity {entity_id} re-scored");
	Ok(())
}

async fn run_status(config: AppConfig) -> anyhow::Result<()> {
	let engine = Engine::open(config).await?;
	let status = engine.status();
	println!("status: {}\nversion: {}", status.status, status.version);
	Ok(())
}
