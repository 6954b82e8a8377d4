use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use listenlog::config::{self, AppConfig};
use listenlog::db::Database;
use listenlog::db::models::PlayCount;
use listenlog::load::{self, LoadOptions};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "listenlog", version, about = "Listening-history importer")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the export and load it into the database
    Load {
        /// Export directory (defaults to $PATH_TO_DATADIR, then config data_dir)
        data_dir: Option<PathBuf>,

        /// Also write the normalized entries as JSON
        #[arg(long)]
        json: bool,

        /// Where --json writes (defaults to config json_output)
        #[arg(long, requires = "json")]
        json_path: Option<PathBuf>,

        /// Delete the existing database before loading
        #[arg(long)]
        fresh: bool,
    },

    /// Normalize the export to JSON without touching the database
    Normalize {
        /// Export directory (defaults to $PATH_TO_DATADIR, then config data_dir)
        data_dir: Option<PathBuf>,

        /// Output file (defaults to config json_output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show library statistics
    Stats,

    /// Show the most played tracks or episodes
    Top {
        /// Rank podcast episodes instead of tracks
        #[arg(long)]
        episodes: bool,

        /// Number of results
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli.db_path
        .or(config.db_path.clone())
        .unwrap_or_else(config::default_db_path);

    match cli.command {
        Commands::Load { data_dir, json, json_path, fresh } => {
            let opts = LoadOptions {
                data_dir: resolve_data_dir(data_dir, &config),
                write_json: json.then(|| json_path.unwrap_or_else(|| config.json_output())),
            };

            // Read the input before a --fresh run throws the old database away
            let (entries, stats) = load::read_entries(&opts.data_dir)
                .with_context(|| format!("Cannot load history from {}", opts.data_dir.display()))?;

            let db = open_db(&db_path, fresh)?;
            let result = load::store_entries(&entries, stats, &opts, &db).context("Load failed")?;

            println!(
                "Load complete: {} events read, {} kept, {} filtered, {} duplicates",
                result.normalize.total,
                result.normalize.kept,
                result.normalize.filtered,
                result.normalize.duplicates
            );
            println!(
                "Stored {} playbacks ({} without track or episode), {} failed",
                result.persist.persisted, result.persist.unlinked, result.persist.failed
            );
            if let Some(path) = result.snapshot {
                println!("Wrote normalized entries to {}", path.display());
            }
        }

        Commands::Normalize { data_dir, output } => {
            let data_dir = resolve_data_dir(data_dir, &config);
            let output = output.unwrap_or_else(|| config.json_output());

            let (entries, stats) = load::read_entries(&data_dir)
                .with_context(|| format!("Cannot load history from {}", data_dir.display()))?;
            listenlog::history::write_snapshot(&entries, &output)
                .context("Failed to write snapshot")?;

            println!(
                "Normalized {} of {} events ({} filtered, {} duplicates) into {}",
                stats.kept,
                stats.total,
                stats.filtered,
                stats.duplicates,
                output.display()
            );
        }

        Commands::Stats => {
            let db = open_db(&db_path, false)?;
            let stats = db.stats().context("Query failed")?;

            println!("Database: {}", db_path.display());
            println!();
            println!("  Tracks:          {:>8}", stats.tracks);
            println!("  Episodes:        {:>8}", stats.episodes);
            println!("  Playbacks:       {:>8}", stats.playbacks);
            println!("  Activity links:  {:>8}", stats.activity_links);
            println!("  Listening time:  {:>8.1} h", stats.total_ms_played as f64 / 3_600_000.0);
            if let (Some(first), Some(last)) = (&stats.first_played_at, &stats.last_played_at) {
                println!("  Span:            {} .. {}", first, last);
            }
        }

        Commands::Top { episodes, limit } => {
            let db = open_db(&db_path, false)?;
            let (results, label, by) = if episodes {
                (db.top_episodes(limit).context("Query failed")?, "episodes", "Show")
            } else {
                (db.top_tracks(limit).context("Query failed")?, "tracks", "Artist")
            };

            if results.is_empty() {
                println!("No plays recorded. Run `listenlog load` first.");
                return Ok(());
            }

            println!("Top {} {} by plays:", results.len(), label);
            println!();
            print_play_counts(&results, by);
        }
    }

    Ok(())
}

fn resolve_data_dir(cli: Option<PathBuf>, config: &AppConfig) -> PathBuf {
    config::resolve_data_dir(cli, std::env::var_os(listenlog::DATA_DIR_ENV), config)
}

fn open_db(path: &Path, fresh: bool) -> Result<Database> {
    log::info!("Database: {}", path.display());
    let db = if fresh {
        Database::recreate(path)
    } else {
        Database::open(path)
    };
    db.context("Failed to open database")
}

fn print_play_counts(results: &[PlayCount], by: &str) {
    println!("{:<40} {:<25} {:>6} {:>8}", "Title", by, "Plays", "Minutes");
    println!("{}", "-".repeat(82));

    for r in results {
        println!(
            "{:<40} {:<25} {:>6} {:>8.1}",
            truncate(r.name.as_deref().unwrap_or(&r.id), 40),
            truncate(r.by.as_deref().unwrap_or("-"), 25),
            r.plays,
            r.ms_played as f64 / 60_000.0,
        );
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let cut: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
