//! Turnstack - maintenance CLI
//!
//! Applies migrations and inspects revision history, stacks, ratings and
//! statistics in a SQLite game database.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;
use turnstack::store::{DocKey, RevisionStore, StoreExt};
use turnstack::{EloRecord, EngineConfig, GameId, SqliteStore, Stack, UStat, Uid};

fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store = SqliteStore::new(config.db_path().clone(), *config.busy_timeout_ms());

    match cli.command {
        Command::Migrate => migrate(&store),
        Command::Revisions { game } => revisions(&store, GameId(game)),
        Command::Stack { game, user } => stack(&store, GameId(game), Uid(user)),
        Command::Rating { user } => rating(&store, Uid(user)),
        Command::Stats { user } => stats(&store, Uid(user)),
    }
}

/// Reads the config file if present, then applies command-line overrides.
#[instrument(skip(cli))]
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let config = if cli.config.exists() {
        EngineConfig::from_file(&cli.config)?
    } else {
        info!(path = %cli.config.display(), "No config file; using defaults");
        EngineConfig::default()
    };
    Ok(match &cli.db_path {
        Some(path) => config.with_db_path(path.clone()),
        None => config,
    })
}

fn migrate(store: &SqliteStore) -> Result<()> {
    let applied = store.migrate()?;
    println!("Applied {} migration(s) to {}", applied, store.db_path());
    Ok(())
}

fn revisions(store: &SqliteStore, game: GameId) -> Result<()> {
    let revs = RevisionStore::new(store).list(game)?;
    if revs.is_empty() {
        println!("Game {} has no recorded revisions", game);
    }
    for rev in revs {
        println!("{}", rev);
    }
    Ok(())
}

fn stack(store: &SqliteStore, game: GameId, user: Uid) -> Result<()> {
    match store.load::<Stack>(&DocKey::stack(game, user))? {
        Some(stack) => println!(
            "committed={} current={} updated={}",
            stack.committed(),
            stack.current(),
            stack.updated()
        ),
        None => println!("User {} has no speculative state in game {}", user, game),
    }
    Ok(())
}

fn rating(store: &SqliteStore, user: Uid) -> Result<()> {
    match store.load::<EloRecord>(&DocKey::elo(user))? {
        Some(record) => {
            println!("User {} rating {:.1}", user, record.rating());
            for entry in record.history() {
                println!(
                    "  {} game {}: {:.1}",
                    entry.recorded_at().format("%Y-%m-%d %H:%M"),
                    entry.game_id(),
                    entry.rating()
                );
            }
        }
        None => println!("User {} has no rated games", user),
    }
    Ok(())
}

fn stats(store: &SqliteStore, user: Uid) -> Result<()> {
    let Some(stat) = store.load::<UStat>(&DocKey::ustat(user))? else {
        println!("User {} has no finished games", user);
        return Ok(());
    };
    for (players, bucket) in stat.buckets() {
        let label = if *players == turnstack::ALL_COUNTS {
            "all".to_string()
        } else {
            format!("{}p", players)
        };
        println!(
            "{:>4}: played={} won={} win%={:.1} avg_score={:.1} avg_moves={:.1}",
            label,
            bucket.played(),
            bucket.won(),
            bucket.win_percentage(),
            bucket.average_score(),
            bucket.average_moves()
        );
    }
    Ok(())
}
