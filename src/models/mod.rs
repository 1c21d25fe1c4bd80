use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sports tracked by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nfl,
    Nba,
    Nhl,
    Mlb,
    Ncaaf,
    Ncaab,
    Nascar,
}

impl Sport {
    pub const ALL: [Sport; 7] = [
        Sport::Nfl,
        Sport::Nba,
        Sport::Nhl,
        Sport::Mlb,
        Sport::Ncaaf,
        Sport::Ncaab,
        Sport::Nascar,
    ];

    /// Team sports quoted as home/away matchups
    pub const TEAM_SPORTS: [Sport; 6] = [
        Sport::Nfl,
        Sport::Nba,
        Sport::Nhl,
        Sport::Mlb,
        Sport::Ncaaf,
        Sport::Ncaab,
    ];

    /// Key used for storage and the query interface
    pub fn key(&self) -> &'static str {
        match self {
            Sport::Nfl => "nfl",
            Sport::Nba => "nba",
            Sport::Nhl => "nhl",
            Sport::Mlb => "mlb",
            Sport::Ncaaf => "ncaaf",
            Sport::Ncaab => "ncaab",
            Sport::Nascar => "nascar",
        }
    }

    /// Parse a caller-supplied sport key. Accepts the college aliases
    /// `cfb`/`cbb` and is case-insensitive.
    pub fn from_key(key: &str) -> Option<Sport> {
        match key.trim().to_ascii_lowercase().as_str() {
            "nfl" => Some(Sport::Nfl),
            "nba" => Some(Sport::Nba),
            "nhl" => Some(Sport::Nhl),
            "mlb" => Some(Sport::Mlb),
            "ncaaf" | "cfb" => Some(Sport::Ncaaf),
            "ncaab" | "cbb" => Some(Sport::Ncaab),
            "nascar" => Some(Sport::Nascar),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Sport::Nfl => "NFL",
            Sport::Nba => "NBA",
            Sport::Nhl => "NHL",
            Sport::Mlb => "MLB",
            Sport::Ncaaf => "NCAAF",
            Sport::Ncaab => "NCAAB",
            Sport::Nascar => "NASCAR",
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A price as quoted by an upstream provider, before normalization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "value", rename_all = "lowercase")]
pub enum PriceQuote {
    /// American odds (e.g., -110, +150)
    American(i32),
    /// Decimal odds (e.g., 1.91, 2.50)
    Decimal(f64),
}

/// Market fields of a provider game, still in the provider's price format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderMarkets {
    pub moneyline_home: Option<PriceQuote>,
    pub moneyline_away: Option<PriceQuote>,
    /// Home team handicap (e.g., -1.5)
    pub spread_line: Option<f64>,
    pub spread_home: Option<PriceQuote>,
    pub spread_away: Option<PriceQuote>,
    pub total_line: Option<f64>,
    pub total_over: Option<PriceQuote>,
    pub total_under: Option<PriceQuote>,
}

impl ProviderMarkets {
    pub fn is_empty(&self) -> bool {
        *self == ProviderMarkets::default()
    }
}

/// One game as validated at an adapter boundary. Team names are raw and
/// prices keep the provider's format; the normalizer turns this into `GameOdds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderGame {
    pub external_id: String,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
    pub venue: Option<String>,
    pub bookmaker: Option<String>,
    pub markets: ProviderMarkets,
}

/// Moneyline prices (American)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoneylineOdds {
    pub home: Option<i32>,
    pub away: Option<i32>,
}

/// Spread prices (American) and the home team's line
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpreadOdds {
    pub home: Option<i32>,
    pub away: Option<i32>,
    pub line: Option<f64>,
}

/// Total line and over/under prices (American)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalOdds {
    pub line: Option<f64>,
    pub over: Option<i32>,
    pub under: Option<i32>,
}

/// Canonical odds payload. Every leaf is independently nullable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OddsLines {
    pub moneyline: MoneylineOdds,
    pub spread: SpreadOdds,
    pub total: TotalOdds,
}

/// One resolved game's odds from one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOdds {
    pub external_id: String,
    pub source: String,
    pub game_date: NaiveDate,
    pub sport: Sport,
    pub home_team: String,
    pub away_team: String,
    pub home_team_normalized: String,
    pub away_team_normalized: String,
    pub start_time: DateTime<Utc>,
    pub venue: Option<String>,
    pub bookmaker: Option<String>,
    pub odds: OddsLines,
    pub fetched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameOdds {
    /// The cache upsert key
    pub fn cache_key(&self) -> (&str, &str, NaiveDate) {
        (&self.external_id, &self.source, self.game_date)
    }

    pub fn matchup(&self) -> String {
        format!("{} @ {}", self.away_team_normalized, self.home_team_normalized)
    }
}

/// Outcome of resyncing one sport for one date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub sport: Sport,
    pub date: NaiveDate,
    pub source: Option<String>,
    pub games_inserted: usize,
    pub games_updated: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SyncResult {
    pub fn total_written(&self) -> usize {
        self.games_inserted + self.games_updated
    }
}

/// Outcome of the startup freshness pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartupSyncReport {
    pub synced: Vec<Sport>,
    pub skipped: Vec<Sport>,
    pub results: Vec<SyncResult>,
}

/// Row counts per sport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SportCount {
    pub sport: String,
    pub count: i64,
}

/// Summary of what the cache currently holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_games: i64,
    pub oldest_game_date: Option<NaiveDate>,
    pub newest_game_date: Option<NaiveDate>,
    pub sports: Vec<SportCount>,
}
