//! # World Registry - World List Persistence
//!
//! The registry mirrors the host server's world list: the set of registered
//! worlds, plus the designated main world. It is loaded from a JSON file in the
//! server's data directory, mutated in memory, and written back as a whole with
//! an exclusive advisory lock so concurrent invocations against the same data
//! directory serialize on persist.
//!
//! Removal semantics match the host: the main world can never be removed, and
//! removing a world that is not in the list reports it as already unloaded.
//! Map files on disk are never touched by this module.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bump when the world list file layout changes incompatibly.
pub const WORLD_LIST_SCHEMA_VERSION: u8 = 1;

/// Errors that can arise while loading or persisting the world list.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Wrapper around IO errors (reading, locking, rewriting the list file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around serde_json errors.
    #[error("world list format error: {0}")]
    Json(#[from] serde_json::Error),

    /// Returned when the list file carries an unexpected schema version.
    #[error("schema mismatch for world list: expected {expected}, got {found}")]
    SchemaMismatch { expected: u8, found: u8 },
}

/// Refusals from [`WorldRegistry::remove_world`]. These are administrator-
/// correctable conditions, not operational failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorldOpError {
    /// The world is the server's designated main world; a new main world must be
    /// assigned before it can be removed.
    #[error("world is set as the main world")]
    MainWorld,

    /// The world is not present in the live registry.
    #[error("world is already unloaded")]
    NotLoaded,
}

/// A registered world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub name: String,
    /// True for player-owned realms; statically configured shared worlds are false.
    #[serde(default)]
    pub is_realm: bool,
    /// Map file name, relative to the maps directory.
    pub map_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WorldListFile {
    #[serde(default = "current_schema_version")]
    schema_version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    main_world: Option<String>,
    #[serde(default)]
    worlds: Vec<World>,
}

fn current_schema_version() -> u8 {
    WORLD_LIST_SCHEMA_VERSION
}

/// In-memory view of the world list file.
pub struct WorldRegistry {
    path: PathBuf,
    main_world: Option<String>,
    worlds: Vec<World>,
}

impl WorldRegistry {
    /// Load the world list from `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        let file: WorldListFile = serde_json::from_str(&content)?;
        if file.schema_version != WORLD_LIST_SCHEMA_VERSION {
            return Err(RegistryError::SchemaMismatch {
                expected: WORLD_LIST_SCHEMA_VERSION,
                found: file.schema_version,
            });
        }
        Ok(Self {
            path,
            main_world: file.main_world,
            worlds: file.worlds,
        })
    }

    /// Create an empty world list file at `path` (used by `init`). Fails if a
    /// list already exists so a live registry is never clobbered.
    pub fn create_empty(path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(RegistryError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("world list already exists: {}", path.display()),
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = WorldListFile {
            schema_version: WORLD_LIST_SCHEMA_VERSION,
            main_world: None,
            worlds: Vec::new(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Find a world by exact name. The match is case-insensitive but must cover
    /// the whole name, mirroring the host server's `FindWorldExact`.
    pub fn find_world_exact(&self, name: &str) -> Option<&World> {
        self.worlds
            .iter()
            .find(|w| w.name.eq_ignore_ascii_case(name))
    }

    /// Name of the server's designated main world, if one is set.
    pub fn main_world(&self) -> Option<&str> {
        self.main_world.as_deref()
    }

    /// All registered worlds.
    pub fn worlds(&self) -> &[World] {
        &self.worlds
    }

    /// Remove a world from the in-memory registry and return its record.
    ///
    /// The map file is not touched and the list file is not rewritten; callers
    /// persist explicitly via [`WorldRegistry::save_world_list`].
    pub fn remove_world(&mut self, name: &str) -> Result<World, WorldOpError> {
        if let Some(main) = &self.main_world {
            if main.eq_ignore_ascii_case(name) {
                return Err(WorldOpError::MainWorld);
            }
        }
        let idx = self
            .worlds
            .iter()
            .position(|w| w.name.eq_ignore_ascii_case(name))
            .ok_or(WorldOpError::NotLoaded)?;
        Ok(self.worlds.remove(idx))
    }

    /// Persist the current world list.
    ///
    /// Takes an exclusive advisory lock on the list file, writes the new content
    /// to a sibling temp file, and renames it into place so readers never see a
    /// half-written list.
    pub fn save_world_list(&self) -> Result<(), RegistryError> {
        let file = WorldListFile {
            schema_version: WORLD_LIST_SCHEMA_VERSION,
            main_world: self.main_world.clone(),
            worlds: self.worlds.clone(),
        };
        let serialized = serde_json::to_string_pretty(&file)?;

        let lock = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;
        lock.lock_exclusive()?;

        let tmp_path = self.path.with_extension("json.tmp");
        let result = (|| -> Result<(), RegistryError> {
            let mut tmp = std::fs::File::create(&tmp_path)?;
            tmp.write_all(serialized.as_bytes())?;
            tmp.sync_all()?;
            std::fs::rename(&tmp_path, &self.path)?;
            Ok(())
        })();

        let _ = lock.unlock();
        result
    }
}
