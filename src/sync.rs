//! Scheduled resyncs. Everything here runs one sport at a time with a pause
//! between sports to stay under upstream rate limits.

use crate::config::EngineConfig;
use crate::models::{Sport, StartupSyncReport, SyncResult};
use crate::orchestrator::OddsOrchestrator;
use crate::utils::dates::today;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub tracked_sports: Vec<Sport>,
    /// Pause between sports in a full sync
    pub sync_delay: Duration,
    /// Pause between sports in the startup pass
    pub startup_delay: Duration,
}

impl From<&EngineConfig> for SyncSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            tracked_sports: config.tracked_sports.clone(),
            sync_delay: config.sync_delay,
            startup_delay: config.startup_sync_delay,
        }
    }
}

pub struct SyncScheduler {
    orchestrator: Arc<OddsOrchestrator>,
    settings: SyncSettings,
}

impl SyncScheduler {
    pub fn new(orchestrator: Arc<OddsOrchestrator>, settings: SyncSettings) -> Self {
        Self {
            orchestrator,
            settings,
        }
    }

    pub fn tracked_sports(&self) -> &[Sport] {
        &self.settings.tracked_sports
    }

    /// Resync each tracked sport whose cache has gone stale, skip the rest
    pub async fn startup_sync(&self) -> StartupSyncReport {
        info!("Checking odds freshness on startup...");
        let mut report = StartupSyncReport::default();
        let date = today();

        for (i, &sport) in self.settings.tracked_sports.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settings.startup_delay).await;
            }

            if self.orchestrator.store().is_stale(sport).await {
                info!(sport = %sport, "Odds are stale, syncing");
                let result = self.orchestrator.refresh(sport, date).await;
                report.results.push(result);
                report.synced.push(sport);
            } else {
                report.skipped.push(sport);
            }
        }

        info!(
            synced = report.synced.len(),
            skipped = report.skipped.len(),
            "Startup sync complete"
        );
        report
    }

    pub async fn sync_sport(&self, sport: Sport, date: NaiveDate) -> SyncResult {
        self.orchestrator.refresh(sport, date).await
    }

    /// Resync every tracked sport for `date` (default today), regardless of freshness
    pub async fn sync_all_sports(&self, date: Option<NaiveDate>) -> Vec<SyncResult> {
        let date = date.unwrap_or_else(today);
        info!(%date, "Starting full sync");

        let mut results = Vec::with_capacity(self.settings.tracked_sports.len());
        for (i, &sport) in self.settings.tracked_sports.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settings.sync_delay).await;
            }
            results.push(self.sync_sport(sport, date).await);
        }

        let inserted: usize = results.iter().map(|r| r.games_inserted).sum();
        let updated: usize = results.iter().map(|r| r.games_updated).sum();
        let errors: usize = results.iter().map(|r| r.errors.len()).sum();
        info!(%date, inserted, updated, errors, "Full sync complete");

        results
    }

    /// Run a full sync for today unless the first tracked sport already has
    /// rows for today. Returns whether a sync ran.
    pub async fn check_and_sync(&self) -> bool {
        let Some(&first) = self.settings.tracked_sports.first() else {
            return false;
        };
        let date = today();

        match self.orchestrator.store().has_for_date(first, date).await {
            Ok(true) => {
                info!(sport = %first, %date, "Already synced for today, skipping");
                return false;
            }
            Ok(false) => {}
            Err(e) => warn!("Could not check today's odds, syncing anyway: {}", e),
        }

        self.sync_all_sports(Some(date)).await;
        true
    }

    /// Run a full sync on a fixed interval, forever
    pub async fn run_periodic(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; startup sync already covered it.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            info!("Running scheduled odds sync");
            self.sync_all_sports(None).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::OddsCacheStore;
    use crate::error::ProviderError;
    use crate::models::{ProviderGame, ProviderMarkets};
    use crate::orchestrator::OrchestratorSettings;
    use crate::plugins::{OddsSourcePlugin, PluginRegistry, SupportedSports};
    use crate::utils::dates::date_window;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One game per sport on whatever date is asked for
    struct OneGamePerDay {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl OddsSourcePlugin for OneGamePerDay {
        fn name(&self) -> &str {
            "one-game"
        }

        fn priority(&self) -> u32 {
            1
        }

        fn supported_sports(&self) -> SupportedSports {
            SupportedSports::All
        }

        async fn fetch_odds(
            &self,
            sport: Sport,
            date: NaiveDate,
        ) -> Result<Vec<ProviderGame>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (start, _) = date_window(date);
            Ok(vec![ProviderGame {
                external_id: format!("{}-{}", sport, date),
                home_team: "Home".to_string(),
                away_team: "Away".to_string(),
                start_time: start + chrono::Duration::hours(19),
                venue: None,
                bookmaker: None,
                markets: ProviderMarkets::default(),
            }])
        }
    }

    async fn scheduler(sports: Vec<Sport>) -> (SyncScheduler, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(OneGamePerDay {
            calls: calls.clone(),
        }));
        let store = OddsCacheStore::in_memory(chrono::Duration::hours(24))
            .await
            .unwrap();
        let orchestrator = OddsOrchestrator::new(
            Arc::new(registry),
            Arc::new(store),
            OrchestratorSettings::default(),
        );
        let settings = SyncSettings {
            tracked_sports: sports,
            sync_delay: Duration::ZERO,
            startup_delay: Duration::ZERO,
        };
        (SyncScheduler::new(Arc::new(orchestrator), settings), calls)
    }

    #[tokio::test]
    async fn test_sync_all_sports_twice_updates_instead_of_inserting() {
        let (scheduler, _) = scheduler(vec![Sport::Nhl, Sport::Nba]).await;
        let date = NaiveDate::from_ymd_opt(2025, 2, 14).unwrap();

        let first = scheduler.sync_all_sports(Some(date)).await;
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|r| r.games_inserted == 1 && r.games_updated == 0));

        let second = scheduler.sync_all_sports(Some(date)).await;
        assert!(second.iter().all(|r| r.games_inserted == 0 && r.games_updated == 1));

        let stats = scheduler.orchestrator.store().stats().await.unwrap();
        assert_eq!(stats.total_games, 2);
    }

    #[tokio::test]
    async fn test_startup_sync_skips_fresh_sports() {
        let (scheduler, calls) = scheduler(vec![Sport::Nhl, Sport::Mlb]).await;
        scheduler.sync_sport(Sport::Nhl, today()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let report = scheduler.startup_sync().await;
        assert_eq!(report.synced, vec![Sport::Mlb]);
        assert_eq!(report.skipped, vec![Sport::Nhl]);
        assert_eq!(report.results.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_check_and_sync_runs_once_per_day() {
        let (scheduler, calls) = scheduler(vec![Sport::Nhl, Sport::Nba]).await;

        assert!(scheduler.check_and_sync().await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(!scheduler.check_and_sync().await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
