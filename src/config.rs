//! Engine configuration.
//!
//! Everything comes from environment variables (optionally via `.env`).
//! Provider credentials are additionally served through `SettingsCache`, so a
//! rotated key is picked up without a restart.

use crate::models::Sport;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://cache/odds_cache.db";
pub const DEFAULT_WEB_ADDR: &str = "127.0.0.1:3000";

/// Ten years; anything longer is a typo
pub const MAX_STALE_AFTER_HOURS: i64 = 24 * 365 * 10;
/// One week
pub const MAX_SYNC_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

pub const API_SPORTS_KEY: &str = "API_SPORTS_KEY";
pub const ODDS_API_KEY: &str = "ODDS_API_KEY";
pub const COLLEGE_FOOTBALL_DATA_API_KEY: &str = "COLLEGE_FOOTBALL_DATA_API_KEY";

/// How the orchestrator decides whether cached rows can be served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessScope {
    /// Newest `fetched_at` among the requested date's rows
    Date,
    /// Newest `fetched_at` among all of the sport's rows
    Sport,
}

impl FromStr for FreshnessScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(FreshnessScope::Date),
            "sport" => Ok(FreshnessScope::Sport),
            other => anyhow::bail!("Unknown freshness scope: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub api_sports_key: Option<String>,
    pub odds_api_key: Option<String>,
    pub college_football_data_key: Option<String>,
    /// Per-call budget for one provider request
    pub provider_timeout: Duration,
    /// Concurrent calls allowed against one provider
    pub provider_max_concurrency: usize,
    pub stale_after_hours: i64,
    pub freshness_scope: FreshnessScope,
    /// Sports covered by scheduled syncs, in sync order
    pub tracked_sports: Vec<Sport>,
    pub sync_delay: Duration,
    pub startup_sync_delay: Duration,
    pub settings_ttl: Duration,
    pub sync_interval: Option<Duration>,
    pub web_addr: String,
    pub draftkings_base_url: Option<String>,
    pub vegas_insider_base_url: Option<String>,
    pub nascar_odds_base_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api_sports_key: None,
            odds_api_key: None,
            college_football_data_key: None,
            provider_timeout: Duration::from_secs(15),
            provider_max_concurrency: 2,
            stale_after_hours: 24,
            freshness_scope: FreshnessScope::Date,
            tracked_sports: vec![
                Sport::Nhl,
                Sport::Nba,
                Sport::Nfl,
                Sport::Mlb,
                Sport::Ncaab,
                Sport::Ncaaf,
            ],
            sync_delay: Duration::from_millis(500),
            startup_sync_delay: Duration::from_millis(200),
            settings_ttl: Duration::from_secs(60),
            sync_interval: None,
            web_addr: DEFAULT_WEB_ADDR.to_string(),
            draftkings_base_url: None,
            vegas_insider_base_url: None,
            nascar_odds_base_url: None,
        }
    }
}

impl EngineConfig {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let tracked_sports = match get("ODDS_TRACKED_SPORTS") {
            Some(list) => parse_sport_list(&list)?,
            None => defaults.tracked_sports,
        };

        Ok(Self {
            database_url: get("ODDS_CACHE_DATABASE_URL").unwrap_or(defaults.database_url),
            api_sports_key: get(API_SPORTS_KEY),
            odds_api_key: get(ODDS_API_KEY),
            college_football_data_key: get(COLLEGE_FOOTBALL_DATA_API_KEY),
            provider_timeout: Duration::from_secs(
                parse_or(&get, "ODDS_PROVIDER_TIMEOUT_SECS", 15u64)?,
            ),
            provider_max_concurrency: parse_or(&get, "ODDS_PROVIDER_MAX_CONCURRENCY", 2usize)?
                .max(1),
            stale_after_hours: parse_stale_after_hours(&get)?,
            freshness_scope: parse_or(&get, "ODDS_FRESHNESS_SCOPE", FreshnessScope::Date)?,
            tracked_sports,
            sync_delay: Duration::from_millis(parse_or(&get, "ODDS_SYNC_DELAY_MS", 500u64)?),
            startup_sync_delay: Duration::from_millis(parse_or(
                &get,
                "ODDS_STARTUP_SYNC_DELAY_MS",
                200u64,
            )?),
            settings_ttl: Duration::from_secs(parse_or(&get, "ODDS_SETTINGS_TTL_SECS", 60u64)?),
            sync_interval: parse_sync_interval(&get)?,
            web_addr: get("ODDS_WEB_ADDR").unwrap_or(defaults.web_addr),
            draftkings_base_url: get("DRAFTKINGS_BASE_URL"),
            vegas_insider_base_url: get("VEGAS_INSIDER_BASE_URL"),
            nascar_odds_base_url: get("NASCAR_ODDS_BASE_URL"),
        })
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.stale_after_hours.clamp(0, MAX_STALE_AFTER_HOURS))
    }
}

fn parse_stale_after_hours(get: &impl Fn(&str) -> Option<String>) -> Result<i64> {
    let hours = parse_or(get, "ODDS_STALE_AFTER_HOURS", 24i64)?;
    if !(1..=MAX_STALE_AFTER_HOURS).contains(&hours) {
        anyhow::bail!(
            "ODDS_STALE_AFTER_HOURS must be between 1 and {}, got {}",
            MAX_STALE_AFTER_HOURS,
            hours
        );
    }
    Ok(hours)
}

/// `0` or unset disables the periodic sync
fn parse_sync_interval(get: &impl Fn(&str) -> Option<String>) -> Result<Option<Duration>> {
    let minutes = parse_or(get, "ODDS_SYNC_INTERVAL_MINUTES", 0u64)?;
    if minutes > MAX_SYNC_INTERVAL_MINUTES {
        anyhow::bail!(
            "ODDS_SYNC_INTERVAL_MINUTES must be at most {}, got {}",
            MAX_SYNC_INTERVAL_MINUTES,
            minutes
        );
    }
    Ok(minutes
        .checked_mul(60)
        .filter(|&secs| secs > 0)
        .map(Duration::from_secs))
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {} ({}): {}", key, raw, e)),
        None => Ok(default),
    }
}

/// Parse a comma-separated sport list such as `nhl,nba,cfb`
pub fn parse_sport_list(list: &str) -> Result<Vec<Sport>> {
    let mut sports = Vec::new();
    for key in list.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        let sport = Sport::from_key(key).with_context(|| format!("Unknown sport: {}", key))?;
        if !sports.contains(&sport) {
            sports.push(sport);
        }
    }
    Ok(sports)
}

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Short-lived cache in front of settings lookups (API keys and the like).
/// Values, including "not set", are kept for `ttl`.
pub struct SettingsCache {
    ttl: Duration,
    lookup: Lookup,
    entries: RwLock<HashMap<String, (Instant, Option<String>)>>,
}

impl SettingsCache {
    /// Cache over the process environment
    pub fn from_env(ttl: Duration) -> Self {
        Self::with_lookup(ttl, |key| {
            std::env::var(key).ok().filter(|v| !v.trim().is_empty())
        })
    }

    pub fn with_lookup(
        ttl: Duration,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            ttl,
            lookup: Arc::new(lookup),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some((loaded_at, value)) = self.entries.read().get(key) {
            if loaded_at.elapsed() < self.ttl {
                return value.clone();
            }
        }

        let value = (self.lookup)(key);
        debug!(key, present = value.is_some(), "Refreshed setting");
        self.entries
            .write()
            .insert(key.to_string(), (Instant::now(), value.clone()));
        value
    }
}
