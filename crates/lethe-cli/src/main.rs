use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lethe::config::Config;
use lethe::storage::LanceLifecycleStore;
use lethe_cli::commands::{ConfigCommand, ForgetCommand, MemoryCommand, StatsCommand};
use lethe_cli::error::CliResult;
use lethe_cli::output::OutputFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lethe-cli")]
#[command(about = "Lethe CLI - Memory lifecycle and forgetting management")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'd', global = true, help = "Path to data directory")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Run a forgetting pass for a user")]
    Forget(ForgetCommand),

    #[clap(about = "Memory management commands")]
    Memory(MemoryCommand),

    #[clap(about = "Show lifecycle statistics")]
    Stats(StatsCommand),

    #[clap(about = "Configuration commands")]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        if let Some(hint) = e.hint() {
            eprintln!("Hint: {hint}");
        }
        std::process::exit(e.exit_code());
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,lethe=info"));

    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }

    match &cli.command {
        Command::Config(cmd) => cmd.execute(&config, cli.config.as_deref(), format).await,
        Command::Forget(cmd) => cmd.execute(&open_store(&config).await?, &config, format).await,
        Command::Memory(cmd) => cmd.execute(&open_store(&config).await?, format).await,
        Command::Stats(cmd) => cmd.execute(&open_store(&config).await?, format).await,
    }
}

async fn open_store(config: &Config) -> CliResult<LanceLifecycleStore> {
    let data_dir = &config.storage.data_dir;
    tracing::debug!(data_dir = %data_dir.display(), "Opening lifecycle store");
    std::fs::create_dir_all(data_dir)?;
    Ok(LanceLifecycleStore::open_or_create(data_dir).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lethe::memory::types::ForgettingStage;
    use lethe::storage::LifecycleStore;
    use lethe_cli::commands::memory::MemorySubcommand;

    #[test]
    fn test_parse_forget_dry_run() {
        let cli = Cli::try_parse_from(["lethe-cli", "--json", "forget", "alice", "--dry-run"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Forget(cmd) => {
                assert_eq!(cmd.user_id, "alice");
                assert!(cmd.dry_run);
            }
            _ => panic!("expected forget command"),
        }
    }

    #[test]
    fn test_parse_memory_add_with_options() {
        let cli = Cli::try_parse_from([
            "lethe-cli",
            "-d",
            "/tmp/lethe",
            "memory",
            "add",
            "alice",
            "Alice likes tea",
            "--importance",
            "0.8",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/lethe")));
        assert!(matches!(cli.command, Command::Memory(_)));
    }

    #[test]
    fn test_parse_memory_list_stages() {
        let cli = Cli::try_parse_from([
            "lethe-cli",
            "memory",
            "list",
            "alice",
            "--stage",
            "archived,forgotten",
        ])
        .unwrap();
        let Command::Memory(cmd) = cli.command else {
            panic!("expected memory command");
        };
        let MemorySubcommand::List(args) = cmd.command else {
            panic!("expected list subcommand");
        };
        assert_eq!(
            args.stage,
            vec![ForgettingStage::Archived, ForgettingStage::Forgotten]
        );

        assert!(Cli::try_parse_from(["lethe-cli", "memory", "list", "alice", "--stage", "lost"]).is_err());
    }

    #[tokio::test]
    async fn test_open_store_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("nested").join("data");

        let store = open_store(&config).await.unwrap();
        assert!(config.storage.data_dir.is_dir());
        assert!(store.list_user_memories("alice").await.unwrap().is_empty());
    }

    #[test]
    fn test_forget_requires_user() {
        assert!(Cli::try_parse_from(["lethe-cli", "forget"]).is_err());
    }
}
