use sqlx::SqlitePool;

/// Create the odds cache table and its indexes
pub async fn initialize_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS odds_cache (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL,
            source TEXT NOT NULL,
            game_date TEXT NOT NULL,
            sport TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_team_normalized TEXT NOT NULL,
            away_team_normalized TEXT NOT NULL,
            commence_time TEXT NOT NULL,
            venue TEXT,
            bookmaker TEXT,
            home_moneyline INTEGER,
            away_moneyline INTEGER,
            spread_line REAL,
            home_spread_price INTEGER,
            away_spread_price INTEGER,
            total_line REAL,
            over_price INTEGER,
            under_price INTEGER,
            fetched_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (external_id, source, game_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_odds_cache_sport_date ON odds_cache(sport, game_date)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_odds_cache_sport_fetched ON odds_cache(sport, fetched_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
