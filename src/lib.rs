//! hubkeeper — a local-first media-library ingestion and cataloguing
//! engine.
//!
//! Observes a filesystem inbox for new media files, fingerprints each
//! one by content, extracts and reconciles embedded metadata from
//! competing providers into authoritative canonical values, groups
//! files into logical Hubs (one per intellectual work across formats),
//! and organises files on disk under a templated directory structure.
//!
//! [`Engine`] is the sole entry point embedding hosts should drive.

pub mod chain;
pub mod config;
pub mod domain;
pub mod engine;
pub mod events;
pub mod hasher;
pub mod identity;
pub mod orchestrator;
pub mod processor;
pub mod scoring;
pub mod store;
pub mod watcher;
pub mod worker;

pub use engine::{Engine, EngineError, EngineStatus, PendingOperation};
