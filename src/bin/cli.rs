use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sports_odds_engine::api::college_football_data::CollegeFootballDataClient;
use sports_odds_engine::api::odds_api::OddsApiClient;
use sports_odds_engine::config::EngineConfig;
use sports_odds_engine::orchestrator::AttemptOutcome;
use sports_odds_engine::utils::data::{save_odds_to_csv, save_odds_to_json};
use sports_odds_engine::{GameOdds, OddsEngine, SyncResult};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "odds-cli", about = "Resolve and cache sports odds")]
struct Cli {
    /// SQLite cache location
    #[arg(long, env = "ODDS_CACHE_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Odds for one sport and date (cache first, then providers)
    Get {
        /// nfl, nba, nhl, mlb, ncaaf (cfb), ncaab (cbb), nascar
        sport: String,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Write the games to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Write the games to a JSON file
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Force a resync of every tracked sport, or just one
    Sync {
        #[arg(long)]
        sport: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Resync only the sports whose cache is stale
    StartupSync,
    /// Show whether a sport's cache is stale
    Stale { sport: String },
    /// Cache totals
    Stats,
    /// Remaining quota on the paid APIs
    Usage,
}

fn format_price(price: Option<i32>) -> String {
    price.map_or_else(|| "-".to_string(), |p| format!("{:+}", p))
}

fn format_line(line: Option<f64>) -> String {
    line.map_or_else(|| "-".to_string(), |l| format!("{:+.1}", l))
}

fn print_game(i: usize, game: &GameOdds) {
    let odds = &game.odds;
    println!(
        "{}. {} ({}) [{}]",
        i + 1,
        game.matchup(),
        game.start_time.format("%Y-%m-%d %H:%M UTC"),
        game.source
    );
    println!(
        "     ML {} / {}   Spread {} ({} / {})   Total {} (o {} / u {})",
        format_price(odds.moneyline.away),
        format_price(odds.moneyline.home),
        format_line(odds.spread.line),
        format_price(odds.spread.away),
        format_price(odds.spread.home),
        odds.total.line.map_or_else(|| "-".to_string(), |t| format!("{:.1}", t)),
        format_price(odds.total.over),
        format_price(odds.total.under),
    );
}

fn print_sync_result(result: &SyncResult) {
    println!(
        "{:<7} {}  inserted {:>3}  updated {:>3}  {}ms  {}",
        result.sport.title(),
        result.date,
        result.games_inserted,
        result.games_updated,
        result.duration_ms,
        result.source.as_deref().unwrap_or("-"),
    );
    for error in &result.errors {
        println!("        ! {}", error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,sports_odds_engine=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    let engine = OddsEngine::from_config(config).await?;

    match cli.command {
        Command::Get {
            sport,
            date,
            csv,
            json,
        } => {
            let resolution = engine.resolve(&sport, date.as_deref()).await;

            for attempt in &resolution.attempts {
                if let AttemptOutcome::Failed { reason, .. } = &attempt.outcome {
                    eprintln!("  {} failed: {}", attempt.provider, reason);
                }
            }

            if resolution.games.is_empty() {
                println!("No odds found for {}.", sport);
            } else {
                println!(
                    "{} games for {} (source: {:?})\n",
                    resolution.games.len(),
                    sport,
                    resolution.source
                );
                for (i, game) in resolution.games.iter().enumerate() {
                    print_game(i, game);
                }
            }

            if let Some(path) = csv {
                save_odds_to_csv(&resolution.games, &path)?;
                println!("\nSaved odds to {}", path.display());
            }
            if let Some(path) = json {
                save_odds_to_json(&resolution.games, &path)?;
                println!("\nSaved odds to {}", path.display());
            }
        }
        Command::Sync { sport, date } => {
            let results = match sport {
                Some(sport) => vec![engine.sync_sport(&sport, date.as_deref()).await?],
                None => engine.sync_all_sports(date.as_deref()).await?,
            };
            for result in &results {
                print_sync_result(result);
            }
        }
        Command::StartupSync => {
            let report = engine.startup_sync().await;
            for result in &report.results {
                print_sync_result(result);
            }
            println!(
                "\n{} synced, {} skipped",
                report.synced.len(),
                report.skipped.len()
            );
        }
        Command::Stale { sport } => {
            let stale = engine.is_stale(&sport).await?;
            println!("{}: {}", sport, if stale { "stale" } else { "fresh" });
        }
        Command::Stats => {
            let stats = engine.stats().await?;
            println!("Total cached games: {}", stats.total_games);
            if let (Some(oldest), Some(newest)) = (stats.oldest_game_date, stats.newest_game_date) {
                println!("Game dates: {} to {}", oldest, newest);
            }
            for count in &stats.sports {
                println!("  {:<7} {}", count.sport, count.count);
            }
        }
        Command::Usage => {
            let config = engine.config();

            if config.odds_api_key.is_some() {
                let client = OddsApiClient::new(engine.settings().clone(), config.provider_timeout)?;
                let usage = client.check_usage().await.context("Odds API usage check failed")?;
                println!(
                    "Odds API requests remaining: {}, used: {}",
                    usage.remaining.as_deref().unwrap_or("?"),
                    usage.used.as_deref().unwrap_or("?")
                );
            } else {
                println!("ODDS_API_KEY not set");
            }

            if config.college_football_data_key.is_some() {
                let client = CollegeFootballDataClient::new(
                    engine.settings().clone(),
                    config.provider_timeout,
                )?;
                let info = client.check_usage().await.context("CFBD usage check failed")?;
                println!("CFB Data API requests remaining: {}", info.remaining_calls);
            } else {
                println!("COLLEGE_FOOTBALL_DATA_API_KEY not set");
            }
        }
    }

    Ok(())
}
