use anyhow::Context;
use clap::{Parser, Subcommand};
use periodic_core::PeriodicConfig;
use periodic_registry::TaskRegistry;
use periodic_sync::{PeriodicStore, SqliteStore, StartupSync, SyncSummary};
use tracing::{info, warn};

mod manifest;

/// Keep the periodic task tables in step with the configured task manifest.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: $PERIODIC_CONFIG or ~/.periodic/periodic.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
enum Command {
    /// Reconcile the database with the manifest (default)
    #[default]
    Sync,
    /// Print the task rows managed by periodic sync
    List,
    /// Validate the manifest without touching the database
    Check,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "periodic_beat=info,periodic_sync=info".into()),
        )
        .init();

    run(Args::parse())
}

fn run(args: Args) -> anyhow::Result<()> {
    // explicit flag > PERIODIC_CONFIG env > ~/.periodic/periodic.toml
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("PERIODIC_CONFIG").ok());
    let config = load_config(config_path.as_deref())?;

    let registry = TaskRegistry::new();
    manifest::register_all(&registry, &config.tasks)?;

    match args.command.unwrap_or_default() {
        Command::Check => {
            info!(tasks = registry.len(), "manifest is valid");
            Ok(())
        }
        Command::Sync => {
            if let Some(summary) = sync(&config, &registry)? {
                info!(%summary, "sync finished");
            }
            Ok(())
        }
        Command::List => list(&config),
    }
}

/// A missing file means defaults. A file that is present but does not parse
/// aborts before any database work: an empty manifest would sweep every
/// managed row.
fn load_config(path: Option<&str>) -> anyhow::Result<PeriodicConfig> {
    if let Some(path) = path {
        if !std::path::Path::new(path).exists() {
            warn!(path, "config file not found, using defaults");
        }
    }
    PeriodicConfig::load(path).context("failed to load periodic config")
}

fn open_store(config: &PeriodicConfig) -> anyhow::Result<SqliteStore> {
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(SqliteStore::new(conn))
}

fn sync(config: &PeriodicConfig, registry: &TaskRegistry) -> anyhow::Result<Option<SyncSummary>> {
    if !config.sync.on_startup {
        info!("startup sync disabled in config; nothing to do");
        return Ok(None);
    }

    let store = open_store(config)?;
    let hook = StartupSync::from_config(&config.sync);
    let summary = hook.run(&store, registry)?;
    if summary.is_none() {
        warn!("sync skipped: periodic task tables are missing and migration is disabled");
    }
    Ok(summary)
}

fn list(config: &PeriodicConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    if !store.schema_ready()? {
        warn!("periodic task tables do not exist yet");
        return Ok(());
    }

    for row in store.list_owned_tasks()? {
        let schedule = store.describe_schedule(row.schedule)?.to_string();
        let state = if row.enabled { "enabled" } else { "disabled" };
        println!("{:<40} {:<28} {:<8} {}", row.name, schedule, state, row.task);
    }
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, tasks: &str) -> String {
        let db = dir.path().join("beat.db");
        let path = dir.path().join("periodic.toml");
        let body = format!("[database]\npath = {:?}\n\n{tasks}", db.display().to_string());
        std::fs::write(&path, body).expect("write config");
        path.display().to_string()
    }

    fn sync_args(config: &str) -> Args {
        Args::parse_from(["periodic-beat", "--config", config, "sync"])
    }

    fn managed_rows(config: &str) -> Vec<String> {
        let config = PeriodicConfig::load(Some(config)).expect("load config");
        open_store(&config)
            .expect("open store")
            .list_owned_tasks()
            .expect("list rows")
            .into_iter()
            .map(|row| row.name)
            .collect()
    }

    const TWO_TASKS: &str = r#"
[[tasks]]
task = "billing::send_invoices"
interval = 60

[[tasks]]
task = "reports::weekly"
crontab = "0 3 * * mon"
"#;

    #[test]
    fn sync_creates_manifest_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_config(&dir, TWO_TASKS);

        run(sync_args(&config)).expect("first sync");
        assert_eq!(
            managed_rows(&config),
            ["billing::send_invoices", "reports::weekly"]
        );
    }

    #[test]
    fn malformed_manifest_aborts_and_keeps_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_config(&dir, TWO_TASKS);
        run(sync_args(&config)).expect("first sync");

        let broken = TWO_TASKS.replace("interval = 60", "interval = \"60s\"");
        let config = write_config(&dir, &broken);
        let err = run(sync_args(&config)).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load periodic config"));

        let config = write_config(&dir, TWO_TASKS);
        assert_eq!(managed_rows(&config).len(), 2);
    }

    #[test]
    fn invalid_schedule_aborts_before_sweep() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_config(&dir, TWO_TASKS);
        run(sync_args(&config)).expect("first sync");

        let broken = TWO_TASKS.replace("0 3 * * mon", "0 3 * *");
        let config = write_config(&dir, &broken);
        assert!(run(sync_args(&config)).is_err());

        let config = write_config(&dir, TWO_TASKS);
        assert_eq!(managed_rows(&config).len(), 2);
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.toml").display().to_string();
        let config = load_config(Some(&path)).expect("defaults");
        assert!(config.tasks.is_empty());
        assert!(config.sync.on_startup);
    }

    #[test]
    fn on_startup_false_skips_the_pass() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_config(&dir, &format!("[sync]\non_startup = false\n{TWO_TASKS}"));

        run(sync_args(&config)).expect("sync");
        let loaded = PeriodicConfig::load(Some(&config)).expect("load config");
        assert!(!std::path::Path::new(&loaded.database.path).exists());
    }
}
