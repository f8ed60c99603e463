//! # Realmsweep - Realm Retirement Tool for World Servers
//!
//! Realmsweep is an administrative command-line tool for multiplayer world servers.
//! It retires (deregisters) player-owned "realm" worlds that have gone stale: realms
//! whose map file has not been written for a configurable number of days and whose
//! moderation log records no block changes at all.
//!
//! ## Features
//!
//! - **Guarded Retirement**: A realm is only removed when it is idle past the
//!   configured threshold *and* has zero recorded block changes.
//! - **Safety Margin**: The map file on disk is never deleted; the operator is told
//!   to remove it manually after the world has left the registry.
//! - **Explicit Outcomes**: Every invocation ends in exactly one observable outcome
//!   with its own message and process exit code, including the "realm still has
//!   activity" case.
//! - **Audit Trail**: Successful removals are written to a dedicated audit log in
//!   addition to the operational log.
//! - **Testable Core**: The retirement policy talks to the world list, the
//!   moderation log, and the filesystem through narrow traits, so it runs against
//!   in-memory fakes in tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use realmsweep::config::Config;
//! use realmsweep::modlog::BlockLogStore;
//! use realmsweep::registry::WorldRegistry;
//! use realmsweep::retire::{ConsoleNotifier, RetirementPolicy, SystemFileStat};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!
//!     let mut registry = WorldRegistry::load(config.world_list_path())?;
//!     let modlog = BlockLogStore::open(config.modlog_path())?;
//!     let policy = RetirementPolicy::new(config.retirement.min_idle_days, config.maps_path());
//!
//!     let outcome = policy.evaluate(
//!         &mut registry,
//!         &modlog,
//!         &SystemFileStat,
//!         &mut ConsoleNotifier::default(),
//!         "Bob",
//!         "console",
//!         Utc::now(),
//!     );
//!     std::process::exit(outcome.exit_code());
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`retire`] - The retirement policy, its capability traits, and outcomes
//! - [`registry`] - World list persistence and removal semantics
//! - [`modlog`] - Sled-backed per-world block-change (moderation) log
//! - [`config`] - Configuration management and validation
//! - [`validation`] - World-name validation
//! - [`logutil`] - Log sanitization helpers

pub mod config;
pub mod logutil;
pub mod modlog;
pub mod registry;
pub mod retire;
pub mod validation;
