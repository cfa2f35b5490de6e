//! Terminal host for the quiz engine.
//!
//! Environment:
//!   QUIZ_DB_URL      : SQLite URL or path (default "sqlite://quiz.sqlite3")
//!   QUIZ_CATALOG_DIR : extra directory of `*.toml` modules
//!   LOG_LEVEL        : tracing filter directives
//!   LOG_FORMAT       : "pretty" (default) or "json"

mod db;
mod play;
mod telemetry;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quiz_core::model::{ModuleId, ParseIdError, Reward};
use services::{Clock, CompletionHistoryService, QuizLoopService};
use storage::repository::RewardOverrideRepository;
use storage::{Catalog, Storage};
use tracing::{debug, info};

/// Short decision-making quizzes with coin and XP rewards
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// SQLite database URL or file path
    #[clap(long, env = "QUIZ_DB_URL", default_value = "sqlite://quiz.sqlite3")]
    db: String,

    /// directory with additional module files (*.toml)
    #[clap(long, env = "QUIZ_CATALOG_DIR")]
    catalog_dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// list available modules
    List,
    /// play a module interactively
    Play {
        #[clap(value_parser = parse_module_id)]
        module_id: ModuleId,
    },
    /// show recent completions for a module
    History {
        #[clap(value_parser = parse_module_id)]
        module_id: ModuleId,
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: u32,
    },
    /// set the full-completion reward for a game-data key
    SetReward {
        key: String,
        #[clap(long)]
        coins: u32,
        #[clap(long)]
        xp: u32,
    },
}

fn parse_module_id(raw: &str) -> Result<ModuleId, ParseIdError> {
    raw.parse()
}

fn load_catalog(dir: Option<&PathBuf>) -> Result<Catalog, Box<dyn std::error::Error>> {
    let mut catalog = Catalog::builtin()?;
    if let Some(dir) = dir {
        let added = catalog.load_dir(dir)?;
        info!(dir = %dir.display(), added, "loaded extra modules");
    }
    Ok(catalog)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_url = db::normalize_sqlite_url(&cli.db)?;
    let catalog = load_catalog(cli.catalog_dir.as_ref())?;

    // Open + migrate SQLite here so core/services stay storage-agnostic.
    db::prepare_sqlite_file(&db_url)?;
    let storage = Storage::sqlite(&db_url, catalog).await?;
    debug!(db = %db_url, "storage ready");

    let clock = Clock::default();
    match cli.command {
        Command::List => {
            let svc = QuizLoopService::from_storage(clock, &storage);
            for module in svc.list_modules().await? {
                println!(
                    "{:<28} {:>2} stages  {}",
                    module.id().as_str(),
                    module.total_stages(),
                    module.title()
                );
            }
        }
        Command::Play { module_id } => {
            let svc = QuizLoopService::from_storage(clock, &storage);
            let mut input = tokio::io::BufReader::new(tokio::io::stdin());
            let mut out = std::io::stdout();
            play::run(&svc, &module_id, &mut input, &mut out).await?;
        }
        Command::History { module_id, limit } => {
            let history = CompletionHistoryService::new(storage.completions.clone());
            let items = history.list_recent(&module_id, limit).await?;
            if items.is_empty() {
                println!("no completions for {module_id}");
            }
            for item in items {
                println!(
                    "#{:<4} {}  {}/{}  {:>3} coins  {:>3} xp  {}s",
                    item.id,
                    item.completed_at.format("%Y-%m-%d %H:%M"),
                    item.correct,
                    item.total,
                    item.coins,
                    item.xp,
                    item.duration_secs
                );
            }
        }
        Command::SetReward { key, coins, xp } => {
            storage
                .overrides
                .set_override(&key, Reward::new(coins, xp))
                .await?;
            info!(%key, coins, xp, "reward override saved");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    telemetry::init_tracing();
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from([
            "quiz",
            "--db",
            "sqlite::memory:",
            "history",
            "BudgetingBasics",
            "-n",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.db, "sqlite::memory:");
        match cli.command {
            Command::History { module_id, limit } => {
                assert_eq!(module_id.as_str(), "BudgetingBasics");
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn blank_module_id_is_rejected() {
        assert!(Cli::try_parse_from(["quiz", "play", "  "]).is_err());
        assert!(Cli::try_parse_from(["quiz", "history", ""]).is_err());
    }

    #[test]
    fn padded_module_id_is_trimmed() {
        let cli = Cli::try_parse_from(["quiz", "play", " AvoidingPanicDecisions "]).unwrap();
        match cli.command {
            Command::Play { module_id } => {
                assert_eq!(module_id.as_str(), "AvoidingPanicDecisions");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
