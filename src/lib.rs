pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod plugins;
pub mod scrapers;
pub mod sync;
pub mod utils;

pub use models::*;

use anyhow::{Context, Result};
use api::api_sports::ApiSportsClient;
use api::college_football_data::CollegeFootballDataClient;
use api::odds_api::OddsApiClient;
use cache::OddsCacheStore;
use config::{EngineConfig, SettingsCache};
use orchestrator::{Freshness, OddsOrchestrator, OrchestratorSettings, Resolution};
use plugins::PluginRegistry;
use scrapers::draftkings::DraftKingsScraper;
use scrapers::nascar::NascarOddsScraper;
use scrapers::vegas_insider::VegasInsiderScraper;
use std::sync::Arc;
use sync::{SyncScheduler, SyncSettings};
use tracing::info;
use utils::dates::{parse_query_date, today};

/// Register every adapter the configuration allows. Paid APIs are only
/// registered when their key is configured.
pub fn build_registry(config: &EngineConfig, settings: Arc<SettingsCache>) -> Result<PluginRegistry> {
    let timeout = config.provider_timeout;
    let mut registry = PluginRegistry::new();

    if config.api_sports_key.is_some() {
        let client = ApiSportsClient::new(settings.clone(), timeout)
            .context("Failed to build API-Sports client")?;
        registry.register(Arc::new(client));
    }

    if config.odds_api_key.is_some() {
        registry.register(Arc::new(OddsApiClient::new(settings.clone(), timeout)?));
    }

    let mut draftkings = DraftKingsScraper::new(timeout)?;
    if let Some(url) = &config.draftkings_base_url {
        draftkings = draftkings.with_base_url(url.clone());
    }
    registry.register(Arc::new(draftkings));

    let mut vegas_insider = VegasInsiderScraper::new(timeout)?;
    if let Some(url) = &config.vegas_insider_base_url {
        vegas_insider = vegas_insider.with_base_url(url.clone());
    }
    registry.register(Arc::new(vegas_insider));

    let mut nascar = NascarOddsScraper::new(timeout)?;
    if let Some(url) = &config.nascar_odds_base_url {
        nascar = nascar.with_url(url.clone());
    }
    registry.register(Arc::new(nascar));

    if config.college_football_data_key.is_some() {
        registry.register_last_resort(
            Sport::Ncaaf,
            Arc::new(CollegeFootballDataClient::new(settings, timeout)?),
        );
    }

    Ok(registry)
}

/// Everything wired together: cache store, adapter registry, orchestrator
/// and sync scheduler.
pub struct OddsEngine {
    config: EngineConfig,
    settings: Arc<SettingsCache>,
    orchestrator: Arc<OddsOrchestrator>,
    scheduler: Arc<SyncScheduler>,
}

impl OddsEngine {
    pub async fn from_config(config: EngineConfig) -> Result<Self> {
        let settings = Arc::new(SettingsCache::from_env(config.settings_ttl));
        let registry = build_registry(&config, settings.clone())?;
        let store = OddsCacheStore::connect(&config.database_url, config.stale_after())
            .await
            .with_context(|| format!("Failed to open odds cache at {}", config.database_url))?;

        info!(providers = ?registry.names(), "Odds engine ready");
        Ok(Self::with_parts(config, settings, registry, store))
    }

    /// Assemble an engine from already-built parts
    pub fn with_parts(
        config: EngineConfig,
        settings: Arc<SettingsCache>,
        registry: PluginRegistry,
        store: OddsCacheStore,
    ) -> Self {
        let orchestrator = Arc::new(OddsOrchestrator::new(
            Arc::new(registry),
            Arc::new(store),
            OrchestratorSettings::from(&config),
        ));
        let scheduler = Arc::new(SyncScheduler::new(
            orchestrator.clone(),
            SyncSettings::from(&config),
        ));

        Self {
            config,
            settings,
            orchestrator,
            scheduler,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn settings(&self) -> &Arc<SettingsCache> {
        &self.settings
    }

    pub fn scheduler(&self) -> Arc<SyncScheduler> {
        self.scheduler.clone()
    }

    pub fn orchestrator(&self) -> &Arc<OddsOrchestrator> {
        &self.orchestrator
    }

    /// Odds for a sport on a `YYYY-MM-DD` date (default today). Never fails:
    /// bad input or a total outage gives an empty list.
    pub async fn get_odds(&self, sport: &str, date: Option<&str>) -> Vec<GameOdds> {
        self.orchestrator.get_odds(sport, date).await
    }

    pub async fn resolve(&self, sport: &str, date: Option<&str>) -> Resolution {
        self.orchestrator.resolve(sport, date).await
    }

    pub async fn startup_sync(&self) -> StartupSyncReport {
        self.scheduler.startup_sync().await
    }

    pub async fn sync_all_sports(&self, date: Option<&str>) -> Result<Vec<SyncResult>> {
        let date = parse_date_arg(date)?;
        Ok(self.scheduler.sync_all_sports(Some(date)).await)
    }

    pub async fn sync_sport(&self, sport: &str, date: Option<&str>) -> Result<SyncResult> {
        let sport = parse_sport_arg(sport)?;
        let date = parse_date_arg(date)?;
        Ok(self.scheduler.sync_sport(sport, date).await)
    }

    pub async fn check_and_sync(&self) -> bool {
        self.scheduler.check_and_sync().await
    }

    /// Sport-wide staleness, as used by the startup sync
    pub async fn is_stale(&self, sport: &str) -> Result<bool> {
        let sport = parse_sport_arg(sport)?;
        Ok(self.orchestrator.store().is_stale(sport).await)
    }

    pub async fn freshness(&self, sport: &str, date: Option<&str>) -> Result<Freshness> {
        let sport = parse_sport_arg(sport)?;
        let date = parse_date_arg(date)?;
        Ok(self.orchestrator.freshness(sport, date).await)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.orchestrator
            .store()
            .stats()
            .await
            .context("Failed to read cache stats")
    }
}

fn parse_sport_arg(sport: &str) -> Result<Sport> {
    Sport::from_key(sport).with_context(|| format!("Unknown sport: {}", sport))
}

fn parse_date_arg(date: Option<&str>) -> Result<chrono::NaiveDate> {
    match date {
        None => Ok(today()),
        Some(text) => {
            parse_query_date(text).with_context(|| format!("Invalid date (want YYYY-MM-DD): {}", text))
        }
    }
}
