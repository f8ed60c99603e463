//! Test utilities & fixtures.
//! Builds throwaway server data directories (world list + maps + moderation log)
//! for the integration tests.

use std::fs::{File, FileTimes};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// One world to seed into the fixture's world list.
pub struct FixtureWorld {
    pub name: &'static str,
    pub is_realm: bool,
    /// Age of the map file in days (its mtime is pushed back this far).
    pub idle_days: u64,
}

/// A temp data directory shaped like a server's: `worlds.json`, `maps/`, `modlog/`.
pub struct DataDirFixture {
    pub tmp: tempfile::TempDir,
}

impl DataDirFixture {
    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn world_list_path(&self) -> PathBuf {
        self.root().join("worlds.json")
    }

    pub fn maps_path(&self) -> PathBuf {
        self.root().join("maps")
    }

    pub fn modlog_path(&self) -> PathBuf {
        self.root().join("modlog")
    }

    pub fn map_file(&self, world: &str) -> PathBuf {
        self.maps_path().join(format!("{world}.map"))
    }
}

/// Build a fixture with the given worlds and optional main world. Every world
/// gets a small map file whose mtime is pushed `idle_days` into the past.
pub fn build_data_dir(worlds: &[FixtureWorld], main_world: Option<&str>) -> DataDirFixture {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    std::fs::create_dir_all(root.join("maps")).unwrap();

    let world_entries: Vec<serde_json::Value> = worlds
        .iter()
        .map(|w| {
            serde_json::json!({
                "name": w.name,
                "is_realm": w.is_realm,
                "map_file": format!("{}.map", w.name),
            })
        })
        .collect();
    let list = serde_json::json!({
        "schema_version": 1,
        "main_world": main_world,
        "worlds": world_entries,
    });
    std::fs::write(
        root.join("worlds.json"),
        serde_json::to_string_pretty(&list).unwrap(),
    )
    .unwrap();

    for w in worlds {
        let path = root.join("maps").join(format!("{}.map", w.name));
        std::fs::write(&path, b"map data").unwrap();
        age_file(&path, w.idle_days);
    }

    DataDirFixture { tmp }
}

/// Push a file's modification time `days` into the past.
pub fn age_file(path: &Path, days: u64) {
    if days == 0 {
        return;
    }
    let mtime = SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60);
    let file = File::options().write(true).open(path).unwrap();
    file.set_times(FileTimes::new().set_modified(mtime))
        .unwrap();
}
