//! Fallback orchestration: cache first, then adapters in priority order, then
//! the sport's last-resort adapters. A query never fails; the worst answer is
//! an empty list.

use crate::cache::{OddsCacheStore, UpsertSummary};
use crate::config::{EngineConfig, FreshnessScope};
use crate::error::ProviderError;
use crate::models::{GameOdds, ProviderGame, Sport, SyncResult};
use crate::plugins::{OddsSourcePlugin, PluginRegistry};
use crate::utils::dates::{parse_query_date, today};
use crate::utils::normalizer::Normalizer;
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub provider_timeout: Duration,
    pub provider_max_concurrency: usize,
    pub freshness_scope: FreshnessScope,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for OrchestratorSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            provider_timeout: config.provider_timeout,
            provider_max_concurrency: config.provider_max_concurrency,
            freshness_scope: config.freshness_scope,
        }
    }
}

/// Where a resolution's rows came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Fresh cached rows
    Cache,
    Provider(String),
    LastResort(String),
    /// Every provider came up empty; previously cached rows were served
    StaleCache,
    /// Nothing anywhere
    Exhausted,
    /// The query itself was invalid
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Games for the requested date
    Games { count: usize },
    /// Answered, but nothing for the requested date
    Empty { returned: usize },
    Failed { kind: String, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

/// Result of one query, with the trail of providers that were tried
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub sport: Option<Sport>,
    pub date: Option<NaiveDate>,
    pub source: ResolutionSource,
    pub attempts: Vec<ProviderAttempt>,
    pub games: Vec<GameOdds>,
}

impl Resolution {
    fn rejected() -> Self {
        Self {
            sport: None,
            date: None,
            source: ResolutionSource::Rejected,
            attempts: vec![],
            games: vec![],
        }
    }
}

/// Cache state for one (sport, date)
#[derive(Debug, Clone, Serialize)]
pub struct Freshness {
    pub sport: Sport,
    pub date: NaiveDate,
    pub cached_games: i64,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub is_stale: bool,
}

struct ProviderHit {
    provider: String,
    last_resort: bool,
    games: Vec<GameOdds>,
}

pub struct OddsOrchestrator {
    registry: Arc<PluginRegistry>,
    store: Arc<OddsCacheStore>,
    normalizer: Normalizer,
    limits: HashMap<String, Arc<Semaphore>>,
    settings: OrchestratorSettings,
}

impl OddsOrchestrator {
    pub fn new(
        registry: Arc<PluginRegistry>,
        store: Arc<OddsCacheStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        let permits = settings.provider_max_concurrency.max(1);
        let limits = registry
            .all()
            .iter()
            .map(|p| (p.name().to_string(), Arc::new(Semaphore::new(permits))))
            .collect();

        Self {
            registry,
            store,
            normalizer: Normalizer::new(),
            limits,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<OddsCacheStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Odds for a sport key and optional `YYYY-MM-DD` date (default today)
    pub async fn get_odds(&self, sport: &str, date: Option<&str>) -> Vec<GameOdds> {
        self.resolve(sport, date).await.games
    }

    /// Like `get_odds`, keeping the provenance of the answer
    pub async fn resolve(&self, sport: &str, date: Option<&str>) -> Resolution {
        let Some(sport_key) = Sport::from_key(sport) else {
            warn!(sport, "Unknown sport requested");
            return Resolution::rejected();
        };
        let date = match date {
            None => today(),
            Some(text) => match parse_query_date(text) {
                Some(date) => date,
                None => {
                    warn!(sport, date = text, "Invalid date requested");
                    return Resolution::rejected();
                }
            },
        };

        self.resolve_for(sport_key, date).await
    }

    pub async fn resolve_for(&self, sport: Sport, date: NaiveDate) -> Resolution {
        let cached = match self.store.get_for_date(sport, date).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(sport = %sport, %date, "Cache read failed, treating as miss: {}", e);
                vec![]
            }
        };

        if !cached.is_empty() && !self.cache_is_stale(sport, date).await {
            debug!(sport = %sport, %date, games = cached.len(), "Serving cached odds");
            return Resolution {
                sport: Some(sport),
                date: Some(date),
                source: ResolutionSource::Cache,
                attempts: vec![],
                games: cached,
            };
        }

        let mut attempts = Vec::new();
        let (source, games) = match self.fetch_from_providers(sport, date, &mut attempts).await {
            Some(hit) => {
                self.persist(&hit.games).await;
                let source = if hit.last_resort {
                    ResolutionSource::LastResort(hit.provider)
                } else {
                    ResolutionSource::Provider(hit.provider)
                };
                (source, hit.games)
            }
            None if !cached.is_empty() => {
                warn!(sport = %sport, %date, "All providers empty, serving stale cache");
                (ResolutionSource::StaleCache, cached)
            }
            None => {
                warn!(sport = %sport, %date, "No odds from any provider");
                (ResolutionSource::Exhausted, vec![])
            }
        };

        Resolution {
            sport: Some(sport),
            date: Some(date),
            source,
            attempts,
            games,
        }
    }

    /// Skip the cache check and pull from providers, reporting what was written
    pub async fn refresh(&self, sport: Sport, date: NaiveDate) -> SyncResult {
        let started = Instant::now();
        info!(sport = %sport, %date, "Starting odds sync");

        let mut attempts = Vec::new();
        let hit = self.fetch_from_providers(sport, date, &mut attempts).await;

        let mut errors: Vec<String> = attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Failed { reason, .. } => Some(format!("{}: {}", a.provider, reason)),
                _ => None,
            })
            .collect();

        let (source, summary) = match hit {
            Some(hit) => {
                let summary = self.persist(&hit.games).await;
                (Some(hit.provider), summary)
            }
            None => {
                errors.push("No games found".to_string());
                (None, UpsertSummary::default())
            }
        };
        errors.extend(summary.errors);

        let result = SyncResult {
            sport,
            date,
            source,
            games_inserted: summary.inserted,
            games_updated: summary.updated,
            errors,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            sport = %sport,
            %date,
            inserted = result.games_inserted,
            updated = result.games_updated,
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "Sync complete"
        );
        result
    }

    pub async fn freshness(&self, sport: Sport, date: NaiveDate) -> Freshness {
        let now = Utc::now();
        let cached_games = self.store.count_for_date(sport, date).await.unwrap_or_else(|e| {
            warn!(sport = %sport, %date, "Cache count failed: {}", e);
            0
        });
        let last_fetched_at = self
            .store
            .last_fetched_at_for_date(sport, date)
            .await
            .unwrap_or_else(|e| {
                warn!(sport = %sport, %date, "Cache freshness lookup failed: {}", e);
                None
            });

        Freshness {
            sport,
            date,
            cached_games,
            last_fetched_at,
            is_stale: crate::cache::is_stale_since(last_fetched_at, now, self.store.stale_after()),
        }
    }

    async fn cache_is_stale(&self, sport: Sport, date: NaiveDate) -> bool {
        match self.settings.freshness_scope {
            FreshnessScope::Date => self.store.is_stale_for_date(sport, date).await,
            FreshnessScope::Sport => self.store.is_stale(sport).await,
        }
    }

    async fn fetch_from_providers(
        &self,
        sport: Sport,
        date: NaiveDate,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Option<ProviderHit> {
        let tiers = [
            (false, self.registry.plugins_for(sport)),
            (true, self.registry.last_resort_for(sport)),
        ];

        for (last_resort, plugins) in tiers {
            for plugin in plugins {
                let started = Instant::now();
                let result = self.call_plugin(plugin.as_ref(), sport, date).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let provider = plugin.name().to_string();

                let outcome = match result {
                    Ok(raw) => {
                        let returned = raw.len();
                        let games = self.normalize_for_date(sport, date, &provider, raw);
                        if games.is_empty() {
                            debug!(provider = %provider, sport = %sport, %date, returned, "Provider had no games for date");
                            AttemptOutcome::Empty { returned }
                        } else {
                            info!(provider = %provider, sport = %sport, %date, games = games.len(), "Resolved odds");
                            attempts.push(ProviderAttempt {
                                provider: provider.clone(),
                                outcome: AttemptOutcome::Games { count: games.len() },
                                elapsed_ms,
                            });
                            return Some(ProviderHit {
                                provider,
                                last_resort,
                                games,
                            });
                        }
                    }
                    Err(e) => {
                        warn!(provider = %provider, sport = %sport, %date, kind = e.kind(), "Provider failed: {}", e);
                        AttemptOutcome::Failed {
                            kind: e.kind().to_string(),
                            reason: e.to_string(),
                        }
                    }
                };

                attempts.push(ProviderAttempt {
                    provider,
                    outcome,
                    elapsed_ms,
                });
            }
        }

        None
    }

    async fn call_plugin(
        &self,
        plugin: &dyn OddsSourcePlugin,
        sport: Sport,
        date: NaiveDate,
    ) -> Result<Vec<ProviderGame>, ProviderError> {
        let _permit = match self.limits.get(plugin.name()) {
            Some(limit) => Some(
                limit
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| ProviderError::unavailable(plugin.name(), e))?,
            ),
            None => None,
        };

        match tokio::time::timeout(self.settings.provider_timeout, plugin.fetch_odds(sport, date))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::unavailable(
                plugin.name(),
                format!("timed out after {:?}", self.settings.provider_timeout),
            )),
        }
    }

    /// Normalize a provider batch and keep the requested date, ordered like
    /// cache reads.
    fn normalize_for_date(
        &self,
        sport: Sport,
        date: NaiveDate,
        provider: &str,
        raw: Vec<ProviderGame>,
    ) -> Vec<GameOdds> {
        // Stored timestamps carry microseconds
        let fetched_at = Utc::now().trunc_subsecs(6);
        let mut games: Vec<GameOdds> = self
            .normalizer
            .normalize(sport, provider, raw, fetched_at)
            .into_iter()
            .filter(|g| g.game_date == date)
            .collect();
        games.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        games
    }

    async fn persist(&self, games: &[GameOdds]) -> UpsertSummary {
        let summary = self.store.upsert_all(games).await;
        if !summary.errors.is_empty() {
            warn!(failed = summary.errors.len(), "Some odds rows were not cached");
        }
        summary
    }
}
