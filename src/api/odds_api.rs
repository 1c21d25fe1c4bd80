use crate::api::{fetch_text, http_client};
use crate::config::{SettingsCache, ODDS_API_KEY};
use crate::error::ProviderError;
use crate::models::{PriceQuote, ProviderGame, ProviderMarkets, Sport};
use crate::plugins::{OddsSourcePlugin, SupportedSports};
use crate::utils::dates::date_window;
use crate::utils::odds_format::american_from_f64;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const ODDS_API_BASE_URL: &str = "https://api.the-odds-api.com/v4";

pub const NAME: &str = "the-odds-api";
pub const PRIORITY: u32 = 20;

/// The Odds API sport key
pub fn sport_key(sport: Sport) -> Option<&'static str> {
    match sport {
        Sport::Nfl => Some("americanfootball_nfl"),
        Sport::Nba => Some("basketball_nba"),
        Sport::Mlb => Some("baseball_mlb"),
        Sport::Nhl => Some("icehockey_nhl"),
        Sport::Ncaaf => Some("americanfootball_ncaaf"),
        Sport::Ncaab => Some("basketball_ncaab"),
        Sport::Nascar => None,
    }
}

/// Response from The Odds API for a single game. Every field is optional so
/// one drifted entry does not sink the rest of the body.
#[derive(Debug, Deserialize)]
struct OddsApiGame {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    commence_time: Option<DateTime<Utc>>,
    #[serde(default)]
    home_team: Option<String>,
    #[serde(default)]
    away_team: Option<String>,
    #[serde(default)]
    bookmakers: Vec<OddsApiBookmaker>,
}

/// Bookmaker data from The Odds API
#[derive(Debug, Deserialize)]
struct OddsApiBookmaker {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    markets: Vec<OddsApiMarket>,
}

/// Market data (h2h, spreads, totals)
#[derive(Debug, Deserialize)]
struct OddsApiMarket {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    outcomes: Vec<OddsApiOutcome>,
}

/// Outcome data for a team, or Over/Under for totals
#[derive(Debug, Deserialize)]
struct OddsApiOutcome {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    point: Option<f64>,
}

/// Request quota as reported in response headers
#[derive(Debug, Clone, Default)]
pub struct ApiUsage {
    pub remaining: Option<String>,
    pub used: Option<String>,
}

fn american(price: Option<f64>) -> Option<PriceQuote> {
    price.and_then(american_from_f64).map(PriceQuote::American)
}

fn find_market<'a>(bookmaker: &'a OddsApiBookmaker, key: &str) -> Option<&'a OddsApiMarket> {
    bookmaker
        .markets
        .iter()
        .find(|m| m.key.as_deref() == Some(key))
}

fn map_bookmaker(home_team: &str, away_team: &str, bookmaker: &OddsApiBookmaker) -> ProviderMarkets {
    let mut markets = ProviderMarkets::default();

    if let Some(h2h) = find_market(bookmaker, "h2h") {
        for outcome in &h2h.outcomes {
            match outcome.name.as_deref() {
                Some(name) if name == home_team => markets.moneyline_home = american(outcome.price),
                Some(name) if name == away_team => markets.moneyline_away = american(outcome.price),
                _ => {}
            }
        }
    }

    if let Some(spreads) = find_market(bookmaker, "spreads") {
        for outcome in &spreads.outcomes {
            match outcome.name.as_deref() {
                Some(name) if name == home_team => {
                    markets.spread_line = outcome.point;
                    markets.spread_home = american(outcome.price);
                }
                Some(name) if name == away_team => markets.spread_away = american(outcome.price),
                _ => {}
            }
        }
    }

    if let Some(totals) = find_market(bookmaker, "totals") {
        for outcome in &totals.outcomes {
            match outcome.name.as_deref() {
                Some("Over") => {
                    markets.total_line = outcome.point.or(markets.total_line);
                    markets.total_over = american(outcome.price);
                }
                Some("Under") => {
                    markets.total_line = markets.total_line.or(outcome.point);
                    markets.total_under = american(outcome.price);
                }
                _ => {}
            }
        }
    }

    markets
}

/// Parse an `/odds` body. Each game is priced from the first bookmaker that
/// quotes any of the three markets; games missing an id, a team or a start
/// time are skipped.
pub fn parse_odds_response(body: &str) -> Result<Vec<ProviderGame>, ProviderError> {
    let api_games: Vec<OddsApiGame> =
        serde_json::from_str(body).map_err(|e| ProviderError::schema(NAME, e))?;

    let mut games = Vec::with_capacity(api_games.len());
    for api_game in api_games {
        let (Some(id), Some(start_time), Some(home_team), Some(away_team)) = (
            api_game.id,
            api_game.commence_time,
            api_game.home_team,
            api_game.away_team,
        ) else {
            debug!("Skipping Odds API game without identity fields");
            continue;
        };

        let priced = api_game.bookmakers.iter().find_map(|bookmaker| {
            let markets = map_bookmaker(&home_team, &away_team, bookmaker);
            (!markets.is_empty()).then(|| (bookmaker.title.clone(), markets))
        });
        let (bookmaker, markets) = priced.unwrap_or_default();

        games.push(ProviderGame {
            external_id: id,
            home_team,
            away_team,
            start_time,
            venue: None,
            bookmaker,
            markets,
        });
    }

    Ok(games)
}

pub struct OddsApiClient {
    settings: Arc<SettingsCache>,
    client: reqwest::Client,
    base_url: String,
}

impl OddsApiClient {
    pub fn new(settings: Arc<SettingsCache>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            settings,
            client: http_client(timeout).context("Failed to build Odds API client")?,
            base_url: ODDS_API_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_key(&self) -> Result<String, ProviderError> {
        self.settings
            .get(ODDS_API_KEY)
            .ok_or_else(|| ProviderError::unavailable(NAME, "ODDS_API_KEY not set"))
    }

    /// Check how many API requests you have remaining
    pub async fn check_usage(&self) -> Result<ApiUsage> {
        let url = format!("{}/sports", self.base_url);
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", api_key.as_str())])
            .send()
            .await
            .context("Failed to reach The Odds API")?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Ok(ApiUsage {
            remaining: header("x-requests-remaining"),
            used: header("x-requests-used"),
        })
    }
}

#[async_trait]
impl OddsSourcePlugin for OddsApiClient {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn supported_sports(&self) -> SupportedSports {
        SupportedSports::Only(Sport::TEAM_SPORTS.to_vec())
    }

    /// Fetch games starting within the requested game date
    async fn fetch_odds(
        &self,
        sport: Sport,
        date: NaiveDate,
    ) -> Result<Vec<ProviderGame>, ProviderError> {
        let key = sport_key(sport)
            .ok_or_else(|| ProviderError::unavailable(NAME, format!("{} not covered", sport)))?;
        let api_key = self.api_key()?;
        let (from, to) = date_window(date);
        let url = format!("{}/sports/{}/odds", self.base_url, key);

        let body = fetch_text(
            NAME,
            self.client.get(&url).query(&[
                ("apiKey", api_key),
                ("regions", "us".to_string()),
                ("markets", "h2h,spreads,totals".to_string()),
                ("oddsFormat", "american".to_string()),
                ("commenceTimeFrom", from.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
                ("commenceTimeTo", to.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            ]),
        )
        .await?;

        let games = parse_odds_response(&body)?;
        debug!(sport = %sport, %date, games = games.len(), "Odds API games");
        Ok(games)
    }
}
