use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::IVec;

use crate::modlog::errors::ModLogError;

pub const BLOCK_LOG_SCHEMA_VERSION: u8 = 1;

const TREE_ENTRIES: &str = "modlog_entries";
const TREE_COUNTERS: &str = "modlog_counters";

/// One recorded block change. Entry ids are per world, monotonic, starting at 1,
/// so "any entry with id >= 1" is equivalent to "any entry at all".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockLogEntry {
    pub schema_version: u8,
    pub id: u64,
    pub world: String,
    pub actor: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub old_block: u8,
    pub new_block: u8,
    pub timestamp: DateTime<Utc>,
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct BlockLogStoreBuilder {
    path: PathBuf,
}

impl BlockLogStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<BlockLogStore, ModLogError> {
        BlockLogStore::open(self.path)
    }
}

/// Sled-backed persistence for per-world block-change entries.
pub struct BlockLogStore {
    _db: sled::Db,
    entries: sled::Tree,
    counters: sled::Tree,
}

impl BlockLogStore {
    /// Open (or create) the moderation-log store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ModLogError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let entries = db.open_tree(TREE_ENTRIES)?;
        let counters = db.open_tree(TREE_COUNTERS)?;
        Ok(Self {
            _db: db,
            entries,
            counters,
        })
    }

    fn entry_key(world: &str, id: u64) -> Vec<u8> {
        // Zero-padded ids keep lexicographic scan order equal to numeric order.
        format!("entries:{}:{:020}", world.to_ascii_lowercase(), id).into_bytes()
    }

    fn world_prefix(world: &str) -> Vec<u8> {
        format!("entries:{}:", world.to_ascii_lowercase()).into_bytes()
    }

    fn counter_key(world: &str) -> Vec<u8> {
        format!("counters:{}", world.to_ascii_lowercase()).into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ModLogError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, ModLogError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    /// Append a block-change entry for `world` and return its assigned id.
    pub fn append(
        &self,
        world: &str,
        actor: &str,
        coords: (i32, i32, i32),
        old_block: u8,
        new_block: u8,
    ) -> Result<u64, ModLogError> {
        let counter_key = Self::counter_key(world);
        let next_id = match self.counters.get(&counter_key)? {
            Some(bytes) => Self::deserialize::<u64>(bytes)? + 1,
            None => 1,
        };

        let entry = BlockLogEntry {
            schema_version: BLOCK_LOG_SCHEMA_VERSION,
            id: next_id,
            world: world.to_string(),
            actor: actor.to_string(),
            x: coords.0,
            y: coords.1,
            z: coords.2,
            old_block,
            new_block,
            timestamp: Utc::now(),
        };

        self.entries
            .insert(Self::entry_key(world, next_id), Self::serialize(&entry)?)?;
        self.counters
            .insert(counter_key, Self::serialize(&next_id)?)?;
        self.entries.flush()?;
        Ok(next_id)
    }

    /// Fetch all entries for `world` with id >= `min_id`, in id order.
    pub fn lookup(&self, world: &str, min_id: u64) -> Result<Vec<BlockLogEntry>, ModLogError> {
        let mut results = Vec::new();
        for item in self.entries.scan_prefix(Self::world_prefix(world)) {
            let (_, bytes) = item?;
            let entry: BlockLogEntry = Self::deserialize(bytes)?;
            if entry.schema_version != BLOCK_LOG_SCHEMA_VERSION {
                return Err(ModLogError::SchemaMismatch {
                    entity: "block log entry",
                    expected: BLOCK_LOG_SCHEMA_VERSION,
                    found: entry.schema_version,
                });
            }
            if entry.id >= min_id {
                results.push(entry);
            }
        }
        Ok(results)
    }

    /// Count of entries for `world` with id >= `min_id`, without materializing
    /// the entries themselves.
    pub fn entry_count_since(&self, world: &str, min_id: u64) -> Result<usize, ModLogError> {
        let mut count = 0usize;
        for item in self.entries.scan_prefix(Self::world_prefix(world)) {
            let (key, _) = item?;
            let text = String::from_utf8_lossy(&key);
            let id = text
                .rsplit(':')
                .next()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0);
            if id >= min_id {
                count += 1;
            }
        }
        Ok(count)
    }
}
