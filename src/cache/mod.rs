//! Persistent odds cache.
//!
//! One SQLite table keyed by `(external_id, source, game_date)`. Writes go
//! through `upsert`, which inserts and falls back to an in-place update when
//! the unique constraint fires, so concurrent writers racing on the same key
//! converge on one row. Rows are never deleted.

pub mod schema;

use crate::error::{CacheError, CacheResult};
use crate::models::{
    CacheStats, GameOdds, MoneylineOdds, OddsLines, Sport, SportCount, SpreadOdds, TotalOdds,
};
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Default freshness window
pub const DEFAULT_STALE_AFTER_HOURS: i64 = 24;

/// Whether a write created a row or replaced one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Totals for a batch of upserts
#[derive(Debug, Clone, Default)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub errors: Vec<String>,
}

/// Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`)
/// so that SQL string ordering and `MAX()` agree with time ordering.
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// True once more than `stale_after` has passed since `last_fetch`, or when
/// nothing was ever fetched.
pub fn is_stale_since(
    last_fetch: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> bool {
    match last_fetch {
        None => true,
        Some(fetched_at) => now.signed_duration_since(fetched_at) > stale_after,
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OddsCacheRow {
    external_id: String,
    source: String,
    game_date: String,
    sport: String,
    home_team: String,
    away_team: String,
    home_team_normalized: String,
    away_team_normalized: String,
    commence_time: String,
    venue: Option<String>,
    bookmaker: Option<String>,
    home_moneyline: Option<i32>,
    away_moneyline: Option<i32>,
    spread_line: Option<f64>,
    home_spread_price: Option<i32>,
    away_spread_price: Option<i32>,
    total_line: Option<f64>,
    over_price: Option<i32>,
    under_price: Option<i32>,
    fetched_at: String,
    updated_at: String,
}

impl TryFrom<OddsCacheRow> for GameOdds {
    type Error = CacheError;

    fn try_from(row: OddsCacheRow) -> CacheResult<Self> {
        let corrupt = |reason: &str| CacheError::CorruptRow {
            external_id: row.external_id.clone(),
            reason: reason.to_string(),
        };

        let sport = Sport::from_key(&row.sport).ok_or_else(|| corrupt("unknown sport"))?;
        let game_date = NaiveDate::parse_from_str(&row.game_date, "%Y-%m-%d")
            .map_err(|_| corrupt("bad game_date"))?;
        let start_time =
            decode_timestamp(&row.commence_time).ok_or_else(|| corrupt("bad commence_time"))?;
        let fetched_at =
            decode_timestamp(&row.fetched_at).ok_or_else(|| corrupt("bad fetched_at"))?;
        let updated_at =
            decode_timestamp(&row.updated_at).ok_or_else(|| corrupt("bad updated_at"))?;

        Ok(GameOdds {
            external_id: row.external_id,
            source: row.source,
            game_date,
            sport,
            home_team: row.home_team,
            away_team: row.away_team,
            home_team_normalized: row.home_team_normalized,
            away_team_normalized: row.away_team_normalized,
            start_time,
            venue: row.venue,
            bookmaker: row.bookmaker,
            odds: OddsLines {
                moneyline: MoneylineOdds {
                    home: row.home_moneyline,
                    away: row.away_moneyline,
                },
                spread: SpreadOdds {
                    home: row.home_spread_price,
                    away: row.away_spread_price,
                    line: row.spread_line,
                },
                total: TotalOdds {
                    line: row.total_line,
                    over: row.over_price,
                    under: row.under_price,
                },
            },
            fetched_at,
            updated_at,
        })
    }
}

/// Odds cache backed by SQLite
pub struct OddsCacheStore {
    pool: SqlitePool,
    stale_after: Duration,
}

impl OddsCacheStore {
    /// Open (or create) the cache database and initialize its schema
    pub async fn connect(database_url: &str, stale_after: Duration) -> CacheResult<Self> {
        info!("Connecting to odds cache: {}", database_url);

        if let Some(parent) = database_file(database_url).and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::with_pool(pool, stale_after).await
    }

    /// Private in-memory cache; used by tests and dry runs
    pub async fn in_memory(stale_after: Duration) -> CacheResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to `:memory:` is its own database, so pin one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool, stale_after).await
    }

    async fn with_pool(pool: SqlitePool, stale_after: Duration) -> CacheResult<Self> {
        schema::initialize_schema(&pool).await?;
        debug!("Odds cache schema ready");
        Ok(Self { pool, stale_after })
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Whether any rows exist for a sport on a game date
    pub async fn has_for_date(&self, sport: Sport, date: NaiveDate) -> CacheResult<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM odds_cache WHERE sport = ? AND game_date = ?)",
        )
        .bind(sport.key())
        .bind(date.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    /// Cached rows for a sport on a game date, earliest start first
    pub async fn get_for_date(&self, sport: Sport, date: NaiveDate) -> CacheResult<Vec<GameOdds>> {
        let rows = sqlx::query_as::<_, OddsCacheRow>(
            r#"
            SELECT external_id, source, game_date, sport, home_team, away_team,
                   home_team_normalized, away_team_normalized, commence_time, venue, bookmaker,
                   home_moneyline, away_moneyline, spread_line, home_spread_price,
                   away_spread_price, total_line, over_price, under_price, fetched_at, updated_at
            FROM odds_cache
            WHERE sport = ? AND game_date = ?
            ORDER BY commence_time ASC, source ASC, external_id ASC
            "#,
        )
        .bind(sport.key())
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GameOdds::try_from).collect()
    }

    pub async fn count_for_date(&self, sport: Sport, date: NaiveDate) -> CacheResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM odds_cache WHERE sport = ? AND game_date = ?")
                .bind(sport.key())
                .bind(date.to_string())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Insert a row; if its `(external_id, source, game_date)` already exists,
    /// replace the mutable fields in place. `fetched_at` never moves backwards.
    pub async fn upsert(&self, record: &GameOdds) -> CacheResult<UpsertOutcome> {
        let (external_id, source, game_date) = record.cache_key();
        let game_date = game_date.to_string();
        let fetched_at = encode_timestamp(record.fetched_at);
        let updated_at = encode_timestamp(record.updated_at);
        let commence_time = encode_timestamp(record.start_time);

        let inserted = sqlx::query(
            r#"
            INSERT INTO odds_cache (
                external_id, source, game_date, sport, home_team, away_team,
                home_team_normalized, away_team_normalized, commence_time, venue, bookmaker,
                home_moneyline, away_moneyline, spread_line, home_spread_price, away_spread_price,
                total_line, over_price, under_price, fetched_at, updated_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(external_id)
        .bind(source)
        .bind(&game_date)
        .bind(record.sport.key())
        .bind(&record.home_team)
        .bind(&record.away_team)
        .bind(&record.home_team_normalized)
        .bind(&record.away_team_normalized)
        .bind(&commence_time)
        .bind(&record.venue)
        .bind(&record.bookmaker)
        .bind(record.odds.moneyline.home)
        .bind(record.odds.moneyline.away)
        .bind(record.odds.spread.line)
        .bind(record.odds.spread.home)
        .bind(record.odds.spread.away)
        .bind(record.odds.total.line)
        .bind(record.odds.total.over)
        .bind(record.odds.total.under)
        .bind(&fetched_at)
        .bind(&updated_at)
        .bind(&updated_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(UpsertOutcome::Inserted),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                sqlx::query(
                    r#"
                    UPDATE odds_cache SET
                        sport = ?, home_team = ?, away_team = ?,
                        home_team_normalized = ?, away_team_normalized = ?,
                        commence_time = ?, venue = ?, bookmaker = ?,
                        home_moneyline = ?, away_moneyline = ?, spread_line = ?,
                        home_spread_price = ?, away_spread_price = ?,
                        total_line = ?, over_price = ?, under_price = ?,
                        fetched_at = MAX(fetched_at, ?),
                        updated_at = ?
                    WHERE external_id = ? AND source = ? AND game_date = ?
                    "#,
                )
                .bind(record.sport.key())
                .bind(&record.home_team)
                .bind(&record.away_team)
                .bind(&record.home_team_normalized)
                .bind(&record.away_team_normalized)
                .bind(&commence_time)
                .bind(&record.venue)
                .bind(&record.bookmaker)
                .bind(record.odds.moneyline.home)
                .bind(record.odds.moneyline.away)
                .bind(record.odds.spread.line)
                .bind(record.odds.spread.home)
                .bind(record.odds.spread.away)
                .bind(record.odds.total.line)
                .bind(record.odds.total.over)
                .bind(record.odds.total.under)
                .bind(&fetched_at)
                .bind(&updated_at)
                .bind(external_id)
                .bind(source)
                .bind(&game_date)
                .execute(&self.pool)
                .await?;

                Ok(UpsertOutcome::Updated)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Upsert a batch, collecting per-row failures instead of stopping
    pub async fn upsert_all(&self, records: &[GameOdds]) -> UpsertSummary {
        let mut summary = UpsertSummary::default();

        for record in records {
            match self.upsert(record).await {
                Ok(UpsertOutcome::Inserted) => summary.inserted += 1,
                Ok(UpsertOutcome::Updated) => summary.updated += 1,
                Err(e) => {
                    warn!(
                        external_id = %record.external_id,
                        source = %record.source,
                        "Cache write failed: {}",
                        e
                    );
                    summary
                        .errors
                        .push(format!("Write failed for {}: {}", record.external_id, e));
                }
            }
        }

        debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            "Upserted odds batch"
        );
        summary
    }

    /// Most recent `fetched_at` across every date for a sport
    pub async fn last_fetched_at(&self, sport: Sport) -> CacheResult<Option<DateTime<Utc>>> {
        let last: Option<String> =
            sqlx::query_scalar("SELECT MAX(fetched_at) FROM odds_cache WHERE sport = ?")
                .bind(sport.key())
                .fetch_one(&self.pool)
                .await?;

        Ok(last.as_deref().and_then(decode_timestamp))
    }

    /// Most recent `fetched_at` for one sport on one game date
    pub async fn last_fetched_at_for_date(
        &self,
        sport: Sport,
        date: NaiveDate,
    ) -> CacheResult<Option<DateTime<Utc>>> {
        let last: Option<String> = sqlx::query_scalar(
            "SELECT MAX(fetched_at) FROM odds_cache WHERE sport = ? AND game_date = ?",
        )
        .bind(sport.key())
        .bind(date.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(last.as_deref().and_then(decode_timestamp))
    }

    /// Sport-wide staleness: the newest row of the sport, on any date, is
    /// older than the freshness window (or there are no rows).
    pub async fn is_stale(&self, sport: Sport) -> bool {
        self.is_stale_at(sport, Utc::now()).await
    }

    pub async fn is_stale_at(&self, sport: Sport, now: DateTime<Utc>) -> bool {
        match self.last_fetched_at(sport).await {
            Ok(last) => {
                if let Some(last) = last {
                    debug!(
                        sport = %sport,
                        hours = now.signed_duration_since(last).num_minutes() as f64 / 60.0,
                        "Last fetch age"
                    );
                }
                is_stale_since(last, now, self.stale_after)
            }
            Err(e) => {
                warn!(sport = %sport, "Error checking odds freshness: {}", e);
                true
            }
        }
    }

    /// Staleness of one sport's rows for one game date
    pub async fn is_stale_for_date(&self, sport: Sport, date: NaiveDate) -> bool {
        self.is_stale_for_date_at(sport, date, Utc::now()).await
    }

    pub async fn is_stale_for_date_at(
        &self,
        sport: Sport,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> bool {
        match self.last_fetched_at_for_date(sport, date).await {
            Ok(last) => is_stale_since(last, now, self.stale_after),
            Err(e) => {
                warn!(sport = %sport, %date, "Error checking odds freshness: {}", e);
                true
            }
        }
    }

    pub async fn stats(&self) -> CacheResult<CacheStats> {
        let total_games: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM odds_cache")
            .fetch_one(&self.pool)
            .await?;

        let (oldest, newest): (Option<String>, Option<String>) =
            sqlx::query_as("SELECT MIN(game_date), MAX(game_date) FROM odds_cache")
                .fetch_one(&self.pool)
                .await?;

        let by_sport: Vec<(String, i64)> = sqlx::query_as(
            "SELECT sport, COUNT(*) FROM odds_cache GROUP BY sport ORDER BY sport ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let parse_date = |d: Option<String>| {
            d.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
        };

        Ok(CacheStats {
            total_games,
            oldest_game_date: parse_date(oldest),
            newest_game_date: parse_date(newest),
            sports: by_sport
                .into_iter()
                .map(|(sport, count)| SportCount { sport, count })
                .collect(),
        })
    }
}

/// Filesystem path of a `sqlite:` URL, if it names a file
fn database_file(database_url: &str) -> Option<&Path> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(Path::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SubsecRound;
    use std::sync::Arc;

    fn game(external_id: &str, source: &str, fetched_at: DateTime<Utc>) -> GameOdds {
        let mut odds = OddsLines::default();
        odds.moneyline.home = Some(-130);
        odds.moneyline.away = Some(110);
        odds.spread.line = Some(-1.5);
        odds.total.line = Some(6.0);

        GameOdds {
            external_id: external_id.to_string(),
            source: source.to_string(),
            game_date: NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(),
            sport: Sport::Nhl,
            home_team: "Boston Bruins".to_string(),
            away_team: "NY Rangers".to_string(),
            home_team_normalized: "Boston Bruins".to_string(),
            away_team_normalized: "New York Rangers".to_string(),
            start_time: "2025-02-15T00:00:00Z".parse().unwrap(),
            venue: Some("TD Garden".to_string()),
            bookmaker: None,
            odds,
            fetched_at,
            updated_at: fetched_at,
        }
    }

    async fn store() -> OddsCacheStore {
        OddsCacheStore::in_memory(Duration::hours(DEFAULT_STALE_AFTER_HOURS))
            .await
            .unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 14).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_same_key_updates_in_place() {
        let store = store().await;
        let now = Utc::now().trunc_subsecs(6);

        let first = game("E1", "provider-a", now);
        assert_eq!(store.upsert(&first).await.unwrap(), UpsertOutcome::Inserted);

        let mut second = game("E1", "provider-a", now + Duration::minutes(5));
        second.odds.moneyline.home = Some(-150);
        second.odds.moneyline.away = Some(130);
        assert_eq!(store.upsert(&second).await.unwrap(), UpsertOutcome::Updated);

        let rows = store.get_for_date(Sport::Nhl, date()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].odds.moneyline.home, Some(-150));
        assert_eq!(rows[0].odds.moneyline.away, Some(130));
        assert_eq!(rows[0].updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn test_same_external_id_from_two_sources_is_two_rows() {
        let store = store().await;
        let now = Utc::now().trunc_subsecs(6);

        store.upsert(&game("E1", "provider-a", now)).await.unwrap();
        store.upsert(&game("E1", "provider-b", now)).await.unwrap();

        assert_eq!(store.count_for_date(Sport::Nhl, date()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fetched_at_never_moves_backwards() {
        let store = store().await;
        let now = Utc::now().trunc_subsecs(6);

        store.upsert(&game("E1", "provider-a", now)).await.unwrap();
        store
            .upsert(&game("E1", "provider-a", now - Duration::hours(2)))
            .await
            .unwrap();

        let rows = store.get_for_date(Sport::Nhl, date()).await.unwrap();
        assert_eq!(rows[0].fetched_at, now);
        assert_eq!(rows[0].updated_at, now - Duration::hours(2));
    }

    #[tokio::test]
    async fn test_round_trip_preserves_record() {
        let store = store().await;
        let record = game("E7", "provider-a", Utc::now().trunc_subsecs(6));
        store.upsert(&record).await.unwrap();

        let rows = store.get_for_date(Sport::Nhl, date()).await.unwrap();
        assert_eq!(rows, vec![record]);
    }

    #[tokio::test]
    async fn test_has_for_date() {
        let store = store().await;
        assert!(!store.has_for_date(Sport::Nhl, date()).await.unwrap());

        store
            .upsert(&game("E1", "provider-a", Utc::now()))
            .await
            .unwrap();

        assert!(store.has_for_date(Sport::Nhl, date()).await.unwrap());
        assert!(!store.has_for_date(Sport::Nba, date()).await.unwrap());
        assert!(!store
            .has_for_date(Sport::Nhl, date().succ_opt().unwrap())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_staleness_boundary() {
        let store = store().await;
        assert!(store.is_stale(Sport::Nhl).await, "no rows means stale");

        let fetched_at = Utc::now().trunc_subsecs(6);
        store
            .upsert(&game("E1", "provider-a", fetched_at))
            .await
            .unwrap();

        let just_fresh = fetched_at + Duration::hours(23) + Duration::minutes(59) + Duration::seconds(59);
        let just_stale = fetched_at + Duration::hours(24) + Duration::seconds(1);

        assert!(!store.is_stale_at(Sport::Nhl, just_fresh).await);
        assert!(!store.is_stale_at(Sport::Nhl, fetched_at + Duration::hours(24)).await);
        assert!(store.is_stale_at(Sport::Nhl, just_stale).await);
    }

    #[tokio::test]
    async fn test_sport_staleness_spans_dates_but_date_staleness_does_not() {
        let store = store().await;
        let now = Utc::now().trunc_subsecs(6);

        let mut yesterday = game("OLD", "provider-a", now - Duration::hours(30));
        yesterday.game_date = date().pred_opt().unwrap();
        store.upsert(&yesterday).await.unwrap();
        store.upsert(&game("NEW", "provider-a", now)).await.unwrap();

        assert!(!store.is_stale_at(Sport::Nhl, now).await);
        assert!(
            store
                .is_stale_for_date_at(Sport::Nhl, yesterday.game_date, now)
                .await
        );
        assert!(!store.is_stale_for_date_at(Sport::Nhl, date(), now).await);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = store().await;
        let now = Utc::now();
        store.upsert(&game("E1", "a", now)).await.unwrap();
        store.upsert(&game("E2", "a", now)).await.unwrap();

        let mut nba = game("B1", "a", now);
        nba.sport = Sport::Nba;
        nba.game_date = date().succ_opt().unwrap();
        store.upsert(&nba).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_games, 3);
        assert_eq!(stats.oldest_game_date, Some(date()));
        assert_eq!(stats.newest_game_date, date().succ_opt());
        assert_eq!(stats.sports.len(), 2);
        assert_eq!(stats.sports[0].sport, "nba");
        assert_eq!(stats.sports[0].count, 1);
        assert_eq!(stats.sports[1].count, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_on_one_key_leave_one_row() {
        let path = std::env::temp_dir().join(format!("odds_cache_race_{}.db", std::process::id()));
        let remove_files = || {
            for suffix in ["", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
            }
        };
        remove_files();

        let url = format!("sqlite://{}", path.display());
        let store = Arc::new(
            OddsCacheStore::connect(&url, Duration::hours(DEFAULT_STALE_AFTER_HOURS))
                .await
                .unwrap(),
        );
        let now = Utc::now().trunc_subsecs(6);

        let writers: Vec<_> = (0..64)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut row = game("E1", "provider-a", now + Duration::seconds(i));
                    row.odds.moneyline.home = Some(-100 - i as i32);
                    store.upsert(&row).await
                })
            })
            .collect();

        let mut inserted = 0;
        for writer in writers {
            if writer.await.unwrap().unwrap() == UpsertOutcome::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(store.count_for_date(Sport::Nhl, date()).await.unwrap(), 1);
        assert_eq!(
            store.last_fetched_at_for_date(Sport::Nhl, date()).await.unwrap(),
            Some(now + Duration::seconds(63))
        );

        drop(store);
        remove_files();
    }

    #[test]
    fn test_database_file() {
        assert_eq!(
            database_file("sqlite://cache/odds_cache.db"),
            Some(Path::new("cache/odds_cache.db"))
        );
        assert_eq!(
            database_file("sqlite:cache/odds.db?mode=rwc"),
            Some(Path::new("cache/odds.db"))
        );
        assert_eq!(database_file("sqlite::memory:"), None);
    }
}
