use crate::api::{fetch_text, http_client};
use crate::config::{SettingsCache, COLLEGE_FOOTBALL_DATA_API_KEY};
use crate::error::ProviderError;
use crate::models::{PriceQuote, ProviderGame, ProviderMarkets, Sport};
use crate::plugins::{OddsSourcePlugin, SupportedSports};
use crate::utils::dates::{game_date_for, season_year};
use crate::utils::odds_format::american_from_f64;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://api.collegefootballdata.com";

pub const NAME: &str = "college-football-data";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameLines {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    home_team: Option<String>,
    #[serde(default)]
    away_team: Option<String>,
    #[serde(default)]
    lines: Vec<Line>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Line {
    #[serde(default)]
    provider: Option<String>,
    /// Home team spread
    #[serde(default)]
    spread: Option<f64>,
    #[serde(default)]
    over_under: Option<f64>,
    #[serde(default)]
    home_moneyline: Option<f64>,
    #[serde(default)]
    away_moneyline: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InfoResult {
    pub patron_level: u32,
    pub remaining_calls: u32,
}

fn american(price: Option<f64>) -> Option<PriceQuote> {
    price.and_then(american_from_f64).map(PriceQuote::American)
}

impl Line {
    fn markets(&self) -> ProviderMarkets {
        ProviderMarkets {
            moneyline_home: american(self.home_moneyline),
            moneyline_away: american(self.away_moneyline),
            spread_line: self.spread,
            total_line: self.over_under,
            ..ProviderMarkets::default()
        }
    }
}

/// Parse a `/lines` body, keeping games on `date`. Each game is priced from
/// the first provider line that carries anything. Games without an id, both
/// teams or a start date are skipped.
pub fn parse_lines_response(body: &str, date: NaiveDate) -> Result<Vec<ProviderGame>, ProviderError> {
    let games: Vec<GameLines> =
        serde_json::from_str(body).map_err(|e| ProviderError::schema(NAME, e))?;

    Ok(games
        .into_iter()
        .filter_map(|game| {
            let id = game.id?;
            let start_time = game.start_date?;
            if game_date_for(start_time) != date {
                return None;
            }
            let home_team = game.home_team.filter(|t| !t.trim().is_empty())?;
            let away_team = game.away_team.filter(|t| !t.trim().is_empty())?;

            let priced = game
                .lines
                .iter()
                .map(|line| (line.provider.clone(), line.markets()))
                .find(|(_, markets)| !markets.is_empty());
            let (bookmaker, markets) = priced.unwrap_or_default();

            Some(ProviderGame {
                external_id: id.to_string(),
                home_team,
                away_team,
                start_time,
                venue: None,
                bookmaker,
                markets,
            })
        })
        .collect())
}

/// College Football Data lines, used when every other NCAAF source is empty
pub struct CollegeFootballDataClient {
    client: reqwest::Client,
    settings: Arc<SettingsCache>,
    base_url: String,
}

impl CollegeFootballDataClient {
    pub fn new(settings: Arc<SettingsCache>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout).context("Failed to build CFBD client")?,
            settings,
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_key(&self) -> Result<String, ProviderError> {
        self.settings
            .get(COLLEGE_FOOTBALL_DATA_API_KEY)
            .ok_or_else(|| ProviderError::unavailable(NAME, "COLLEGE_FOOTBALL_DATA_API_KEY not set"))
    }

    /// Check API usage/rate limits for College Football Data API
    pub async fn check_usage(&self) -> Result<InfoResult> {
        let url = format!("{}/info", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key()?))
            .send()
            .await
            .context("Failed to reach College Football Data API")?;

        response
            .json::<InfoResult>()
            .await
            .context("Failed to parse CFBD /info response")
    }
}

#[async_trait]
impl OddsSourcePlugin for CollegeFootballDataClient {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> u32 {
        u32::MAX
    }

    fn supported_sports(&self) -> SupportedSports {
        SupportedSports::Only(vec![Sport::Ncaaf])
    }

    async fn fetch_odds(
        &self,
        sport: Sport,
        date: NaiveDate,
    ) -> Result<Vec<ProviderGame>, ProviderError> {
        if sport != Sport::Ncaaf {
            return Err(ProviderError::unavailable(NAME, format!("{} not covered", sport)));
        }

        let url = format!("{}/lines", self.base_url);
        let body = fetch_text(
            NAME,
            self.client
                .get(&url)
                .header("Authorization", format!("Bearer {}", self.api_key()?))
                .query(&[
                    ("year", season_year(sport, date).to_string()),
                    ("seasonType", "both".to_string()),
                ]),
        )
        .await?;

        let games = parse_lines_response(&body, date)?;
        debug!(%date, games = games.len(), "CFBD lines");
        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINES: &str = r#"[
        {
            "id": 401628374,
            "season": 2024,
            "seasonType": "regular",
            "week": 1,
            "startDate": "2024-08-31T19:30:00.000Z",
            "homeTeam": "Georgia",
            "awayTeam": "Clemson",
            "lines": [
                {"provider": "Bovada", "spread": null, "overUnder": null, "homeMoneyline": null, "awayMoneyline": null},
                {"provider": "DraftKings", "spread": -13.5, "formattedSpread": "Georgia -13.5",
                 "overUnder": 48.5, "homeMoneyline": -520, "awayMoneyline": 390}
            ]
        },
        {
            "id": 401628375,
            "startDate": "2024-09-07T19:30:00.000Z",
            "homeTeam": "Texas",
            "awayTeam": "Michigan",
            "lines": []
        },
        {
            "id": 401628376,
            "startDate": "2024-08-31T23:00:00.000Z",
            "homeTeam": "Ohio State",
            "awayTeam": null,
            "lines": []
        }
    ]"#;

    #[test]
    fn test_parse_lines_filters_to_date_and_first_priced_line() {
        let date = NaiveDate::from_ymd_opt(2024, 8, 31).unwrap();
        let games = parse_lines_response(LINES, date).unwrap();

        assert_eq!(games.len(), 1);
        let game = &games[0];
        assert_eq!(game.external_id, "401628374");
        assert_eq!(game.bookmaker.as_deref(), Some("DraftKings"));
        assert_eq!(game.markets.moneyline_home, Some(PriceQuote::American(-520)));
        assert_eq!(game.markets.moneyline_away, Some(PriceQuote::American(390)));
        assert_eq!(game.markets.spread_line, Some(-13.5));
        assert_eq!(game.markets.total_line, Some(48.5));
        assert!(game.markets.spread_home.is_none());
    }

    #[test]
    fn test_game_without_id_is_skipped() {
        let body = r#"[
            {"startDate": "2024-08-31T19:30:00.000Z", "homeTeam": "Georgia", "awayTeam": "Clemson",
             "lines": [{"provider": "ESPN Bet", "homeMoneyline": -500}]},
            {"id": 401628380, "startDate": "2024-08-31T16:00:00.000Z", "homeTeam": "Penn State",
             "awayTeam": "West Virginia",
             "lines": [{"provider": "ESPN Bet", "homeMoneyline": -3000000000, "awayMoneyline": 310}]}
        ]"#;
        let date = NaiveDate::from_ymd_opt(2024, 8, 31).unwrap();
        let games = parse_lines_response(body, date).unwrap();

        assert_eq!(games.len(), 1);
        assert_eq!(games[0].external_id, "401628380");
        assert_eq!(games[0].markets.moneyline_home, None);
        assert_eq!(games[0].markets.moneyline_away, Some(PriceQuote::American(310)));
    }

    #[test]
    fn test_not_a_list_is_schema_error() {
        let date = NaiveDate::from_ymd_opt(2024, 8, 31).unwrap();
        let err = parse_lines_response(r#"{"message":"Unauthorized"}"#, date).unwrap_err();
        assert_eq!(err.kind(), "schema");
    }

    #[tokio::test]
    #[ignore]
    async fn test_check_usage() {
        dotenv::dotenv().ok();
        let settings = Arc::new(SettingsCache::from_env(Duration::from_secs(60)));
        let client = CollegeFootballDataClient::new(settings, Duration::from_secs(20)).unwrap();
        let info = client.check_usage().await.unwrap();
        println!("CFB Data API requests remaining: {}", info.remaining_calls);
    }
}
