//! Binary entrypoint for the realmsweep CLI.
//!
//! Commands:
//! - `retire <world> [--actor NAME] [--dry-run]` - retire an inactive, empty realm
//! - `list` - show every realm with idle days, log entries, and eligibility
//! - `init` - create a starter `config.toml` and the data directory skeleton
//!
//! Exit codes for `retire`: 0 removed (or dry-run eligible), 1 usage error or
//! unknown world, 2 not a realm, 3 too recent, 4 has recorded activity,
//! 5 removal refused (main world / already unloaded), 6 removal failed.
//!
//! See the library crate docs for module-level details: `realmsweep::`.
use anyhow::Result;
use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use log::info;

use realmsweep::config::Config;
use realmsweep::modlog::BlockLogStore;
use realmsweep::registry::WorldRegistry;
use realmsweep::retire::{ConsoleNotifier, RetirementPolicy, SystemFileStat};
use realmsweep::validation::validate_world_name;

#[derive(Parser)]
#[command(name = "realmsweep")]
#[command(about = "Retires inactive, empty player realms from a world server's world list")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Retire a realm if it is idle past the threshold and has no recorded activity
    Retire {
        /// Name of the realm to retire
        world: String,

        /// Actor named in the broadcast and audit log (defaults to the configured operator)
        #[arg(long)]
        actor: Option<String>,

        /// Evaluate the guards but stop before removal
        #[arg(long)]
        dry_run: bool,
    },
    /// List all realms with idle days, moderation-log entries, and eligibility
    List,
    /// Initialize a new configuration and data directory skeleton
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init which writes it later)
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Retire {
            world,
            actor,
            dry_run,
        } => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };

            if let Err(e) = validate_world_name(&world) {
                eprintln!("Error: {}", e);
                eprintln!();
                let _ = Cli::command().print_help();
                std::process::exit(1);
            }

            let mut registry = WorldRegistry::load(config.world_list_path())?;
            let modlog = BlockLogStore::open(config.modlog_path())?;
            let policy = RetirementPolicy::new(config.retirement.min_idle_days, config.maps_path())
                .dry_run(dry_run);
            let actor = actor.unwrap_or_else(|| config.server.operator.clone());

            let outcome = policy.evaluate(
                &mut registry,
                &modlog,
                &SystemFileStat,
                &mut ConsoleNotifier::default(),
                &world,
                &actor,
                Utc::now(),
            );
            if outcome.shows_usage() {
                eprintln!();
                let _ = Cli::command().print_help();
            }
            std::process::exit(outcome.exit_code());
        }
        Commands::List => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            let registry = WorldRegistry::load(config.world_list_path())?;
            let modlog = BlockLogStore::open(config.modlog_path())?;
            let policy = RetirementPolicy::new(config.retirement.min_idle_days, config.maps_path());

            let statuses = policy.survey(registry.worlds(), &modlog, &SystemFileStat, Utc::now());
            if statuses.is_empty() {
                println!("No realms registered.");
                return Ok(());
            }
            println!(
                "{} realm(s); idle requirement is more than {} days:",
                statuses.len(),
                policy.min_idle_days()
            );
            for status in statuses {
                let idle = match status.idle_days {
                    Some(d) => format!("{} day(s) idle", d),
                    None => "map file unreadable".to_string(),
                };
                let entries = match status.log_entries {
                    Some(n) => format!("{} log entr{}", n, if n == 1 { "y" } else { "ies" }),
                    None => "log unavailable".to_string(),
                };
                println!(
                    "  {} | owner: {} | {} | {} | {}",
                    status.name,
                    status.owner.as_deref().unwrap_or("-"),
                    idle,
                    entries,
                    if status.eligible {
                        "ELIGIBLE"
                    } else {
                        "not eligible"
                    }
                );
            }
        }
        Commands::Init => {
            info!("Initializing realmsweep configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);

            let config = Config::load(&cli.config).await?;
            tokio::fs::create_dir_all(config.maps_path()).await?;
            tokio::fs::create_dir_all(config.modlog_path()).await?;
            let world_list = config.world_list_path();
            if world_list.exists() {
                info!("World list already present at {}", world_list.display());
            } else {
                WorldRegistry::create_empty(&world_list)?;
                info!("Empty world list created at {}", world_list.display());
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity; config level applies when not overridden
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    if let Some(cfg) = config {
        let audit_path = cfg.logging.audit_file.clone();
        if let Some(ref file) = cfg.logging.file {
            if let Ok(f) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
            {
                let mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
                let write_mutex = mutex.clone();

                // If stdout is not a terminal the operator is capturing output;
                // keep the console free of log lines in that case.
                let is_tty = atty::is(atty::Stream::Stdout);

                builder.format(move |fmt, record| {
                    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                    let line = format!("{} [{}] {}", ts, record.level(), record.args());

                    // Always write to log file
                    if let Ok(mut guard) = write_mutex.lock() {
                        let _ = writeln!(guard, "{}", line);
                    }

                    // Route audit-target records to the dedicated audit file
                    if record.target() == "audit" {
                        if let Some(ref audit) = audit_path {
                            if let Ok(mut af) = std::fs::OpenOptions::new()
                                .create(true)
                                .append(true)
                                .open(audit)
                            {
                                let _ = writeln!(af, "{}", line);
                            }
                        }
                    }

                    if is_tty {
                        writeln!(fmt, "{}", line)
                    } else {
                        Ok(())
                    }
                });
            } else {
                builder.format(|fmt, record| {
                    writeln!(
                        fmt,
                        "{} [{}] {}",
                        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                        record.level(),
                        record.args()
                    )
                });
            }
        } else {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
