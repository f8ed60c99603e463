//! Realm retirement policy.
//!
//! A realm may be retired (removed from the world list) only when all of the
//! following hold:
//!
//! * the name resolves to a registered world,
//! * the world is a player-owned realm,
//! * its map file has not been written for longer than the configured idle
//!   threshold, and
//! * the moderation log records no block changes for it at all.
//!
//! The decision chain runs once per invocation and every terminal outcome is
//! reported through the [`Notifier`], so nothing ends silently. Removal never
//! deletes the map file; that is left to the operator as a safety margin
//! against irreversible loss from an automated decision.
//!
//! The policy reaches the world list, the moderation log, and the filesystem
//! through the narrow traits below, so it can be exercised against in-memory
//! fakes without a data directory.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info};

use crate::logutil::escape_log;
use crate::modlog::{BlockLogStore, ModLogError};
use crate::registry::{RegistryError, World, WorldOpError, WorldRegistry};

/// Access to the world list.
pub trait WorldStore {
    fn find_world_exact(&self, name: &str) -> Option<World>;
    fn remove_world(&mut self, name: &str) -> Result<World, WorldOpError>;
    fn save_world_list(&self) -> Result<(), RegistryError>;
}

impl WorldStore for WorldRegistry {
    fn find_world_exact(&self, name: &str) -> Option<World> {
        WorldRegistry::find_world_exact(self, name).cloned()
    }

    fn remove_world(&mut self, name: &str) -> Result<World, WorldOpError> {
        WorldRegistry::remove_world(self, name)
    }

    fn save_world_list(&self) -> Result<(), RegistryError> {
        WorldRegistry::save_world_list(self)
    }
}

/// Read access to the moderation log.
pub trait ActivityLog {
    fn entry_count_since(&self, world: &str, min_id: u64) -> Result<usize, ModLogError>;
}

impl ActivityLog for BlockLogStore {
    fn entry_count_since(&self, world: &str, min_id: u64) -> Result<usize, ModLogError> {
        BlockLogStore::entry_count_since(self, world, min_id)
    }
}

/// File metadata access, injected so tests control timestamps.
pub trait FileStat {
    fn last_write_time_utc(&self, path: &Path) -> io::Result<DateTime<Utc>>;
}

/// [`FileStat`] backed by the real filesystem.
pub struct SystemFileStat;

impl FileStat for SystemFileStat {
    fn last_write_time_utc(&self, path: &Path) -> io::Result<DateTime<Utc>> {
        let modified = std::fs::metadata(path)?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }
}

/// Delivery of outcome messages to the invoking operator and, for successful
/// removals, to the server-wide audience.
pub trait Notifier {
    fn reply(&mut self, message: &str);
    fn broadcast(&mut self, message: &str);
}

/// [`Notifier`] that prints to stdout, for CLI use.
#[derive(Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn reply(&mut self, message: &str) {
        println!("{}", message);
    }

    fn broadcast(&mut self, message: &str) {
        println!("[broadcast] {}", message);
    }
}

/// Terminal outcome of one retirement invocation. Exactly one is produced per
/// call; there are no retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetirementOutcome {
    /// The realm was removed from the world list and the list was persisted.
    Removed { world: String, map_file: String },
    /// The realm met every guard but `--dry-run` stopped short of removal.
    EligibleDryRun { world: String },
    /// No registered world matched the given name.
    NotFound { name: String },
    /// The world exists but is not a player realm.
    NotARealm { world: String },
    /// The map file was written within the idle threshold.
    TooRecent { world: String, idle_days: i64 },
    /// The moderation log records block changes for this realm.
    HasActivity { world: String, entries: usize },
    /// Removal refused: the world is the server's main world.
    RefusedMainWorld { world: String },
    /// Removal refused: the world is already absent from the registry.
    RefusedAlreadyUnloaded { world: String },
    /// Unexpected failure (metadata read, log query, or persist).
    Failed { world: String, details: String },
}

impl RetirementOutcome {
    /// Process exit code for the CLI surface.
    pub fn exit_code(&self) -> i32 {
        match self {
            RetirementOutcome::Removed { .. } | RetirementOutcome::EligibleDryRun { .. } => 0,
            RetirementOutcome::NotFound { .. } => 1,
            RetirementOutcome::NotARealm { .. } => 2,
            RetirementOutcome::TooRecent { .. } => 3,
            RetirementOutcome::HasActivity { .. } => 4,
            RetirementOutcome::RefusedMainWorld { .. }
            | RetirementOutcome::RefusedAlreadyUnloaded { .. } => 5,
            RetirementOutcome::Failed { .. } => 6,
        }
    }

    /// True when the registry was mutated and persisted.
    pub fn removed(&self) -> bool {
        matches!(self, RetirementOutcome::Removed { .. })
    }

    /// True when the CLI should follow the outcome message with its usage text.
    /// An unknown world name is treated like a bad argument.
    pub fn shows_usage(&self) -> bool {
        matches!(self, RetirementOutcome::NotFound { .. })
    }
}

/// Snapshot of one realm's staleness, for the `list` surface.
#[derive(Debug, Clone)]
pub struct RealmStatus {
    pub name: String,
    pub owner: Option<String>,
    /// None when the map file's metadata could not be read.
    pub idle_days: Option<i64>,
    pub log_entries: Option<usize>,
    pub eligible: bool,
}

/// The retirement decision procedure plus its removal side effects.
pub struct RetirementPolicy {
    min_idle: Duration,
    maps_dir: PathBuf,
    dry_run: bool,
}

impl RetirementPolicy {
    pub fn new(min_idle_days: i64, maps_dir: impl Into<PathBuf>) -> Self {
        Self {
            min_idle: Duration::days(min_idle_days),
            maps_dir: maps_dir.into(),
            dry_run: false,
        }
    }

    /// Evaluate guards but stop before removal.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn min_idle_days(&self) -> i64 {
        self.min_idle.num_days()
    }

    fn map_path(&self, world: &World) -> PathBuf {
        self.maps_dir.join(&world.map_file)
    }

    /// Run the full decision chain for `name`, invoked by `actor` at `now`.
    ///
    /// `now` is injected rather than read from the clock so the age guard is
    /// deterministic under test.
    pub fn evaluate(
        &self,
        worlds: &mut dyn WorldStore,
        activity: &dyn ActivityLog,
        filestat: &dyn FileStat,
        notifier: &mut dyn Notifier,
        name: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> RetirementOutcome {
        let Some(world) = worlds.find_world_exact(name) else {
            notifier.reply(&format!("No world named \"{}\" is registered.", name));
            return RetirementOutcome::NotFound {
                name: name.to_string(),
            };
        };

        if !world.is_realm {
            notifier.reply(&format!("World {} is not a realm.", world.name));
            return RetirementOutcome::NotARealm { world: world.name };
        }

        let map_path = self.map_path(&world);
        let last_write = match filestat.last_write_time_utc(&map_path) {
            Ok(ts) => ts,
            Err(e) => {
                error!(
                    "retire: failed to read map file metadata for world {} ({}): {}",
                    escape_log(&world.name),
                    map_path.display(),
                    e
                );
                notifier.reply(&format!(
                    "Could not read map file metadata for {}.",
                    world.name
                ));
                return RetirementOutcome::Failed {
                    world: world.name,
                    details: e.to_string(),
                };
            }
        };

        let idle = now.signed_duration_since(last_write);
        if idle <= self.min_idle {
            notifier.reply(&format!(
                "Realm {} was last written {} day(s) ago; the idle requirement is more than {} days.",
                world.name,
                idle.num_days().max(0),
                self.min_idle.num_days()
            ));
            return RetirementOutcome::TooRecent {
                world: world.name,
                idle_days: idle.num_days(),
            };
        }

        // Entry ids start at 1, so min_id 1 asks for "any entry at all".
        let entries = match activity.entry_count_since(&world.name, 1) {
            Ok(n) => n,
            Err(e) => {
                error!(
                    "retire: moderation log query failed for world {}: {}",
                    escape_log(&world.name),
                    e
                );
                notifier.reply(&format!(
                    "Could not query the moderation log for {}.",
                    world.name
                ));
                return RetirementOutcome::Failed {
                    world: world.name,
                    details: e.to_string(),
                };
            }
        };
        if entries > 0 {
            notifier.reply(&format!(
                "Realm {} has {} recorded block change(s); leaving it in place.",
                world.name, entries
            ));
            return RetirementOutcome::HasActivity {
                world: world.name,
                entries,
            };
        }

        if self.dry_run {
            notifier.reply(&format!(
                "Realm {} is eligible for retirement (dry run; nothing was changed).",
                world.name
            ));
            return RetirementOutcome::EligibleDryRun { world: world.name };
        }

        let removed = match worlds.remove_world(&world.name) {
            Ok(w) => w,
            Err(WorldOpError::MainWorld) => {
                notifier.reply(&format!(
                    "World {} is set as the main world. Assign a new main world before retiring it.",
                    world.name
                ));
                return RetirementOutcome::RefusedMainWorld { world: world.name };
            }
            Err(WorldOpError::NotLoaded) => {
                notifier.reply(&format!("World {} is already unloaded.", world.name));
                return RetirementOutcome::RefusedAlreadyUnloaded { world: world.name };
            }
        };

        if let Err(e) = worlds.save_world_list() {
            error!(
                "retire: failed to persist world list after removing {}: {}",
                escape_log(&removed.name),
                e
            );
            notifier.reply(&format!(
                "Unexpected error while saving the world list after removing {}.",
                removed.name
            ));
            return RetirementOutcome::Failed {
                world: removed.name,
                details: e.to_string(),
            };
        }

        notifier.broadcast(&format!(
            "{} removed {} from the world list.",
            actor, removed.name
        ));
        notifier.reply(&format!(
            "Removed {} from the world list. You can now delete the map file ({}) manually.",
            removed.name, removed.map_file
        ));
        info!(
            target: "audit",
            "{} removed \"{}\" from the world list.",
            escape_log(actor),
            escape_log(&removed.name)
        );
        // The in-memory record is dropped here; the host plugin's advisory GC
        // request has no analog beyond that.
        debug!(
            "retire: released in-memory record for world {}",
            escape_log(&removed.name)
        );

        RetirementOutcome::Removed {
            world: removed.name,
            map_file: removed.map_file,
        }
    }

    /// Survey every realm in `worlds` for the `list` surface: idle days, log
    /// entries, and whether it currently passes all retirement guards. Sorted
    /// most idle first. Never mutates anything.
    pub fn survey(
        &self,
        worlds: &[World],
        activity: &dyn ActivityLog,
        filestat: &dyn FileStat,
        now: DateTime<Utc>,
    ) -> Vec<RealmStatus> {
        let mut results: Vec<RealmStatus> = worlds
            .iter()
            .filter(|w| w.is_realm)
            .map(|world| {
                let idle = filestat
                    .last_write_time_utc(&self.map_path(world))
                    .ok()
                    .map(|ts| now.signed_duration_since(ts));
                let idle_days = idle.map(|d| d.num_days());
                let log_entries = activity.entry_count_since(&world.name, 1).ok();
                let eligible =
                    matches!(idle, Some(d) if d > self.min_idle) && log_entries == Some(0);
                RealmStatus {
                    name: world.name.clone(),
                    owner: world.owner.clone(),
                    idle_days,
                    log_entries,
                    eligible,
                }
            })
            .collect();
        results.sort_by(|a, b| b.idle_days.cmp(&a.idle_days));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MemoryWorlds {
        worlds: Vec<World>,
        main_world: Option<String>,
        remove_calls: usize,
        save_calls: std::cell::Cell<usize>,
    }

    impl MemoryWorlds {
        fn new(worlds: Vec<World>, main_world: Option<&str>) -> Self {
            Self {
                worlds,
                main_world: main_world.map(str::to_string),
                remove_calls: 0,
                save_calls: std::cell::Cell::new(0),
            }
        }
    }

    impl WorldStore for MemoryWorlds {
        fn find_world_exact(&self, name: &str) -> Option<World> {
            self.worlds
                .iter()
                .find(|w| w.name.eq_ignore_ascii_case(name))
                .cloned()
        }

        fn remove_world(&mut self, name: &str) -> Result<World, WorldOpError> {
            self.remove_calls += 1;
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

        fn save_world_list(&self) -> Result<(), RegistryError> {
            self.save_calls.set(self.save_calls.get() + 1);
            Ok(())
        }
    }

    struct FixedActivity(HashMap<String, usize>);

    impl ActivityLog for FixedActivity {
        fn entry_count_since(&self, world: &str, _min_id: u64) -> Result<usize, ModLogError> {
            Ok(*self.0.get(&world.to_ascii_lowercase()).unwrap_or(&0))
        }
    }

    struct FixedStat(DateTime<Utc>);

    impl FileStat for FixedStat {
        fn last_write_time_utc(&self, _path: &Path) -> io::Result<DateTime<Utc>> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        replies: Vec<String>,
        broadcasts: Vec<String>,
    }

    impl Notifier for RecordingNotifier {
        fn reply(&mut self, message: &str) {
            self.replies.push(message.to_string());
        }

        fn broadcast(&mut self, message: &str) {
            self.broadcasts.push(message.to_string());
        }
    }

    fn realm(name: &str) -> World {
        World {
            name: name.to_string(),
            is_realm: true,
            map_file: format!("{name}.map"),
            owner: None,
            created: None,
        }
    }

    fn shared_world(name: &str) -> World {
        World {
            is_realm: false,
            ..realm(name)
        }
    }

    fn policy() -> RetirementPolicy {
        RetirementPolicy::new(30, "/maps")
    }

    #[test]
    fn unknown_world_is_not_found_and_never_removes() {
        let mut worlds = MemoryWorlds::new(vec![realm("Bob")], None);
        let mut notifier = RecordingNotifier::default();
        let outcome = policy().evaluate(
            &mut worlds,
            &FixedActivity(HashMap::new()),
            &FixedStat(Utc::now()),
            &mut notifier,
            "Nope",
            "console",
            Utc::now(),
        );
        assert_eq!(
            outcome,
            RetirementOutcome::NotFound {
                name: "Nope".into()
            }
        );
        assert_eq!(worlds.remove_calls, 0);
        assert_eq!(notifier.replies.len(), 1);
    }

    #[test]
    fn non_realms_are_never_removed() {
        let mut worlds = MemoryWorlds::new(vec![shared_world("Hub")], None);
        let mut notifier = RecordingNotifier::default();
        let now = Utc::now();
        let outcome = policy().evaluate(
            &mut worlds,
            &FixedActivity(HashMap::new()),
            &FixedStat(now - Duration::days(400)),
            &mut notifier,
            "Hub",
            "console",
            now,
        );
        assert_eq!(
            outcome,
            RetirementOutcome::NotARealm {
                world: "Hub".into()
            }
        );
        assert_eq!(worlds.remove_calls, 0);
        assert_eq!(worlds.save_calls.get(), 0);
    }

    #[test]
    fn recent_write_blocks_removal() {
        let mut worlds = MemoryWorlds::new(vec![realm("Bob")], None);
        let mut notifier = RecordingNotifier::default();
        let now = Utc::now();
        let outcome = policy().evaluate(
            &mut worlds,
            &FixedActivity(HashMap::new()),
            &FixedStat(now - Duration::days(2)),
            &mut notifier,
            "Bob",
            "console",
            now,
        );
        assert!(matches!(
            outcome,
            RetirementOutcome::TooRecent { idle_days: 2, .. }
        ));
        assert_eq!(worlds.remove_calls, 0);
    }

    #[test]
    fn idle_exactly_at_threshold_is_too_recent() {
        // The guard requires strictly older than the threshold.
        let mut worlds = MemoryWorlds::new(vec![realm("Bob")], None);
        let mut notifier = RecordingNotifier::default();
        let now = Utc::now();
        let outcome = policy().evaluate(
            &mut worlds,
            &FixedActivity(HashMap::new()),
            &FixedStat(now - Duration::days(30)),
            &mut notifier,
            "Bob",
            "console",
            now,
        );
        assert!(matches!(outcome, RetirementOutcome::TooRecent { .. }));
    }

    #[test]
    fn recorded_activity_blocks_removal_with_message() {
        let mut worlds = MemoryWorlds::new(vec![realm("Bob")], None);
        let mut notifier = RecordingNotifier::default();
        let now = Utc::now();
        let activity = FixedActivity(HashMap::from([("bob".to_string(), 7)]));
        let outcome = policy().evaluate(
            &mut worlds,
            &activity,
            &FixedStat(now - Duration::days(45)),
            &mut notifier,
            "Bob",
            "console",
            now,
        );
        assert_eq!(
            outcome,
            RetirementOutcome::HasActivity {
                world: "Bob".into(),
                entries: 7
            }
        );
        assert_eq!(worlds.remove_calls, 0);
        // The silent branch of the original now reports explicitly.
        assert!(notifier.replies[0].contains("7 recorded block change"));
    }

    #[test]
    fn eligible_realm_is_removed_and_saved_once() {
        let mut worlds = MemoryWorlds::new(vec![realm("Bob")], None);
        let mut notifier = RecordingNotifier::default();
        let now = Utc::now();
        let outcome = policy().evaluate(
            &mut worlds,
            &FixedActivity(HashMap::new()),
            &FixedStat(now - Duration::days(45)),
            &mut notifier,
            "Bob",
            "alice",
            now,
        );
        assert_eq!(
            outcome,
            RetirementOutcome::Removed {
                world: "Bob".into(),
                map_file: "Bob.map".into()
            }
        );
        assert!(worlds.worlds.is_empty());
        assert_eq!(worlds.save_calls.get(), 1);
        assert_eq!(notifier.broadcasts.len(), 1);
        assert!(notifier.broadcasts[0].contains("alice removed Bob"));
        assert!(notifier.replies[0].contains("delete the map file (Bob.map) manually"));
    }

    #[test]
    fn main_world_is_refused_even_when_otherwise_eligible() {
        let mut worlds = MemoryWorlds::new(vec![realm("Bob")], Some("Bob"));
        let mut notifier = RecordingNotifier::default();
        let now = Utc::now();
        let outcome = policy().evaluate(
            &mut worlds,
            &FixedActivity(HashMap::new()),
            &FixedStat(now - Duration::days(45)),
            &mut notifier,
            "Bob",
            "console",
            now,
        );
        assert_eq!(
            outcome,
            RetirementOutcome::RefusedMainWorld {
                world: "Bob".into()
            }
        );
        // Refusal leaves the registry untouched and unsaved.
        assert_eq!(worlds.worlds.len(), 1);
        assert_eq!(worlds.save_calls.get(), 0);
    }

    #[test]
    fn world_unloaded_between_lookup_and_removal_is_refused() {
        // The world list can change under us between resolve and remove; the
        // store then reports the world as already unloaded.
        struct VanishingWorlds {
            save_calls: usize,
        }

        impl WorldStore for VanishingWorlds {
            fn find_world_exact(&self, name: &str) -> Option<World> {
                Some(realm(name))
            }

            fn remove_world(&mut self, _name: &str) -> Result<World, WorldOpError> {
                Err(WorldOpError::NotLoaded)
            }

            fn save_world_list(&self) -> Result<(), RegistryError> {
                unreachable!("a refused removal must not persist the world list")
            }
        }

        let mut worlds = VanishingWorlds { save_calls: 0 };
        let mut notifier = RecordingNotifier::default();
        let now = Utc::now();
        let outcome = policy().evaluate(
            &mut worlds,
            &FixedActivity(HashMap::new()),
            &FixedStat(now - Duration::days(45)),
            &mut notifier,
            "Bob",
            "console",
            now,
        );
        assert_eq!(
            outcome,
            RetirementOutcome::RefusedAlreadyUnloaded {
                world: "Bob".into()
            }
        );
        assert_eq!(outcome.exit_code(), 5);
        assert_eq!(worlds.save_calls, 0);
        assert!(notifier.replies[0].contains("already unloaded"));
        assert!(notifier.broadcasts.is_empty());
    }

    #[test]
    fn only_not_found_requests_the_usage_text() {
        assert!(RetirementOutcome::NotFound { name: "w".into() }.shows_usage());
        for outcome in [
            RetirementOutcome::Removed {
                world: "w".into(),
                map_file: "w.map".into(),
            },
            RetirementOutcome::EligibleDryRun { world: "w".into() },
            RetirementOutcome::NotARealm { world: "w".into() },
            RetirementOutcome::TooRecent {
                world: "w".into(),
                idle_days: 1,
            },
            RetirementOutcome::HasActivity {
                world: "w".into(),
                entries: 1,
            },
            RetirementOutcome::RefusedMainWorld { world: "w".into() },
            RetirementOutcome::RefusedAlreadyUnloaded { world: "w".into() },
            RetirementOutcome::Failed {
                world: "w".into(),
                details: "boom".into(),
            },
        ] {
            assert!(!outcome.shows_usage(), "{outcome:?} should not show usage");
        }
    }

    #[test]
    fn dry_run_stops_before_removal() {
        let mut worlds = MemoryWorlds::new(vec![realm("Bob")], None);
        let mut notifier = RecordingNotifier::default();
        let now = Utc::now();
        let outcome = policy().dry_run(true).evaluate(
            &mut worlds,
            &FixedActivity(HashMap::new()),
            &FixedStat(now - Duration::days(45)),
            &mut notifier,
            "Bob",
            "console",
            now,
        );
        assert_eq!(
            outcome,
            RetirementOutcome::EligibleDryRun {
                world: "Bob".into()
            }
        );
        assert_eq!(worlds.remove_calls, 0);
        assert_eq!(worlds.save_calls.get(), 0);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn exit_codes_match_the_documented_surface() {
        let cases = [
            (
                RetirementOutcome::Removed {
                    world: "w".into(),
                    map_file: "w.map".into(),
                },
                0,
            ),
            (RetirementOutcome::NotFound { name: "w".into() }, 1),
            (RetirementOutcome::NotARealm { world: "w".into() }, 2),
            (
                RetirementOutcome::TooRecent {
                    world: "w".into(),
                    idle_days: 1,
                },
                3,
            ),
            (
                RetirementOutcome::HasActivity {
                    world: "w".into(),
                    entries: 1,
                },
                4,
            ),
            (RetirementOutcome::RefusedMainWorld { world: "w".into() }, 5),
            (
                RetirementOutcome::RefusedAlreadyUnloaded { world: "w".into() },
                5,
            ),
            (
                RetirementOutcome::Failed {
                    world: "w".into(),
                    details: "boom".into(),
                },
                6,
            ),
        ];
        for (outcome, code) in cases {
            assert_eq!(outcome.exit_code(), code);
        }
    }

    #[test]
    fn survey_reports_eligibility_consistent_with_evaluate() {
        let now = Utc::now();
        let worlds = vec![realm("Stale"), realm("Fresh"), shared_world("Hub")];
        let activity = FixedActivity(HashMap::new());

        struct PerWorldStat(DateTime<Utc>);
        impl FileStat for PerWorldStat {
            fn last_write_time_utc(&self, path: &Path) -> io::Result<DateTime<Utc>> {
                if path.to_string_lossy().contains("Stale") {
                    Ok(self.0 - Duration::days(45))
                } else {
                    Ok(self.0 - Duration::days(2))
                }
            }
        }

        let statuses = policy().survey(&worlds, &activity, &PerWorldStat(now), now);
        assert_eq!(statuses.len(), 2); // shared world excluded
        assert_eq!(statuses[0].name, "Stale");
        assert!(statuses[0].eligible);
        assert_eq!(statuses[1].name, "Fresh");
        assert!(!statuses[1].eligible);
    }
}
