//! Moderation log: the append-only record of block-level change events per world.
//!
//! The host server writes one entry per block change (who, where, what changed).
//! Realmsweep only ever appends in tests and tooling; its real interest is the
//! read side, where "any entry with id >= 1" means the realm has recorded
//! activity and must not be retired.

mod errors;
mod store;

pub use errors::ModLogError;
pub use store::{BlockLogEntry, BlockLogStore, BlockLogStoreBuilder, BLOCK_LOG_SCHEMA_VERSION};
