use crate::models::GameOdds;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Flat CSV row for one game
#[derive(Debug, Serialize)]
struct OddsCsvRow<'a> {
    game_date: String,
    sport: &'a str,
    source: &'a str,
    external_id: &'a str,
    start_time: String,
    away_team: &'a str,
    home_team: &'a str,
    home_moneyline: Option<i32>,
    away_moneyline: Option<i32>,
    spread_line: Option<f64>,
    home_spread_price: Option<i32>,
    away_spread_price: Option<i32>,
    total_line: Option<f64>,
    over_price: Option<i32>,
    under_price: Option<i32>,
    bookmaker: Option<&'a str>,
    fetched_at: String,
}

impl<'a> From<&'a GameOdds> for OddsCsvRow<'a> {
    fn from(game: &'a GameOdds) -> Self {
        Self {
            game_date: game.game_date.to_string(),
            sport: game.sport.key(),
            source: &game.source,
            external_id: &game.external_id,
            start_time: game.start_time.to_rfc3339(),
            away_team: &game.away_team_normalized,
            home_team: &game.home_team_normalized,
            home_moneyline: game.odds.moneyline.home,
            away_moneyline: game.odds.moneyline.away,
            spread_line: game.odds.spread.line,
            home_spread_price: game.odds.spread.home,
            away_spread_price: game.odds.spread.away,
            total_line: game.odds.total.line,
            over_price: game.odds.total.over,
            under_price: game.odds.total.under,
            bookmaker: game.bookmaker.as_deref(),
            fetched_at: game.fetched_at.to_rfc3339(),
        }
    }
}

/// Save resolved odds to CSV
pub fn save_odds_to_csv(games: &[GameOdds], filename: impl AsRef<Path>) -> Result<()> {
    let filename = filename.as_ref();
    let mut writer = csv::Writer::from_path(filename)
        .with_context(|| format!("Failed to create CSV file {}", filename.display()))?;

    for game in games {
        writer
            .serialize(OddsCsvRow::from(game))
            .context("Failed to write CSV row")?;
    }

    writer.flush().context("Failed to flush CSV file")?;
    Ok(())
}

/// Save resolved odds to a JSON file
pub fn save_odds_to_json(games: &[GameOdds], filename: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(games).context("Failed to serialize odds data")?;
    std::fs::write(filename.as_ref(), json).context("Failed to write JSON file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OddsLines, Sport};
    use chrono::{NaiveDate, Utc};

    fn sample_game() -> GameOdds {
        let now = Utc::now();
        let mut odds = OddsLines::default();
        odds.moneyline.home = Some(-140);
        odds.moneyline.away = Some(120);
        odds.total.line = Some(6.5);

        GameOdds {
            external_id: "401".to_string(),
            source: "the-odds-api".to_string(),
            game_date: NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(),
            sport: Sport::Nhl,
            home_team: "Boston Bruins".to_string(),
            away_team: "Florida Panthers".to_string(),
            home_team_normalized: "Boston Bruins".to_string(),
            away_team_normalized: "Florida Panthers".to_string(),
            start_time: now,
            venue: None,
            bookmaker: Some("DraftKings".to_string()),
            odds,
            fetched_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_save_odds_to_csv_writes_header_and_rows() {
        let path = std::env::temp_dir().join(format!("odds_export_{}.csv", std::process::id()));
        save_odds_to_csv(&[sample_game()], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("game_date,sport,source,external_id"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("2025-02-14,nhl,the-odds-api,401"));
        assert!(row.contains(",-140,120,"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_json_snapshot_loads_back() {
        let path = std::env::temp_dir().join(format!("odds_export_{}.json", std::process::id()));
        let game = sample_game();
        save_odds_to_json(std::slice::from_ref(&game), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: Vec<GameOdds> = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded, vec![game]);
        std::fs::remove_file(&path).ok();
    }
}
