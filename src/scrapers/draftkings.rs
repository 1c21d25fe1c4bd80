//! DraftKings sportsbook league feed.
//!
//! The public sportscontent endpoint returns flat `events`, `markets` and
//! `selections` lists linked by id. Prices are American strings that use a
//! unicode minus sign.

use crate::api::{browser_client, fetch_text};
use crate::error::ProviderError;
use crate::models::{PriceQuote, ProviderGame, ProviderMarkets, Sport};
use crate::plugins::{OddsSourcePlugin, SupportedSports};
use crate::utils::odds_format::parse_american_odds;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const DRAFTKINGS_BASE_URL: &str =
    "https://sportsbook-nash.draftkings.com/api/sportscontent/dkusnj/v1/leagues";

pub const NAME: &str = "draftkings";
pub const PRIORITY: u32 = 30;

pub fn league_id(sport: Sport) -> Option<u32> {
    match sport {
        Sport::Nfl => Some(88808),
        Sport::Nba => Some(42648),
        Sport::Nhl => Some(42133),
        Sport::Mlb => Some(84240),
        Sport::Ncaaf => Some(87637),
        Sport::Ncaab => Some(92483),
        Sport::Nascar => None,
    }
}

#[derive(Debug, Deserialize)]
struct LeagueFeed {
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default)]
    markets: Vec<Market>,
    #[serde(default)]
    selections: Vec<Selection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Event {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    start_event_date: Option<String>,
    #[serde(default)]
    participants: Vec<Participant>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Participant {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    venue_role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Market {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    market_type: Option<MarketType>,
}

#[derive(Debug, Deserialize)]
struct MarketType {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Selection {
    #[serde(default)]
    market_id: Option<String>,
    #[serde(default)]
    display_odds: Option<DisplayOdds>,
    #[serde(default)]
    points: Option<f64>,
    #[serde(default)]
    outcome_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DisplayOdds {
    #[serde(default)]
    american: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MarketKind {
    Moneyline,
    Spread,
    Total,
}

fn market_kind(name: &str) -> Option<MarketKind> {
    match name {
        "Moneyline" => Some(MarketKind::Moneyline),
        "Spread" | "Puck Line" | "Run Line" => Some(MarketKind::Spread),
        "Total" | "Totals" => Some(MarketKind::Total),
        _ => None,
    }
}

fn parse_start(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn apply_selection(markets: &mut ProviderMarkets, kind: MarketKind, selection: &Selection) {
    let price = selection
        .display_odds
        .as_ref()
        .and_then(|o| o.american.as_deref())
        .and_then(parse_american_odds)
        .map(PriceQuote::American);
    let outcome = selection.outcome_type.as_deref().unwrap_or_default();

    match (kind, outcome) {
        (MarketKind::Moneyline, "Home") => markets.moneyline_home = price,
        (MarketKind::Moneyline, "Away") => markets.moneyline_away = price,
        (MarketKind::Spread, "Home") => {
            markets.spread_home = price;
            markets.spread_line = selection.points;
        }
        (MarketKind::Spread, "Away") => {
            markets.spread_away = price;
            if markets.spread_line.is_none() {
                markets.spread_line = selection.points.map(|p| -p);
            }
        }
        (MarketKind::Total, "Over") => {
            markets.total_over = price;
            markets.total_line = selection.points.or(markets.total_line);
        }
        (MarketKind::Total, "Under") => {
            markets.total_under = price;
            markets.total_line = markets.total_line.or(selection.points);
        }
        _ => {}
    }
}

/// Parse a league feed into one game per event with a home and away team
pub fn parse_league_response(body: &str) -> Result<Vec<ProviderGame>, ProviderError> {
    let feed: LeagueFeed =
        serde_json::from_str(body).map_err(|e| ProviderError::schema(NAME, e))?;

    // market id -> (event id, kind)
    let markets: HashMap<&str, (&str, MarketKind)> = feed
        .markets
        .iter()
        .filter_map(|m| {
            let kind = market_kind(m.market_type.as_ref()?.name.as_deref()?)?;
            Some((m.id.as_deref()?, (m.event_id.as_deref()?, kind)))
        })
        .collect();

    let mut by_event: HashMap<&str, ProviderMarkets> = HashMap::new();
    for selection in &feed.selections {
        let Some(market_id) = selection.market_id.as_deref() else {
            continue;
        };
        if let Some(&(event_id, kind)) = markets.get(market_id) {
            apply_selection(by_event.entry(event_id).or_default(), kind, selection);
        }
    }

    let mut games = Vec::new();
    for event in &feed.events {
        let role = |wanted: &str| {
            event
                .participants
                .iter()
                .find(|p| p.venue_role.as_deref() == Some(wanted))
                .and_then(|p| p.name.as_deref())
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        };
        let (Some(event_id), Some(home_team), Some(away_team), Some(start_time)) = (
            event.id.as_deref(),
            role("Home"),
            role("Away"),
            event.start_event_date.as_deref().and_then(parse_start),
        ) else {
            debug!(event_id = ?event.id, "Skipping DraftKings event without identity fields");
            continue;
        };

        games.push(ProviderGame {
            external_id: event_id.to_string(),
            home_team,
            away_team,
            start_time,
            venue: None,
            bookmaker: Some("DraftKings".to_string()),
            markets: by_event.remove(event_id).unwrap_or_default(),
        });
    }

    Ok(games)
}

pub struct DraftKingsScraper {
    client: reqwest::Client,
    base_url: String,
}

impl DraftKingsScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: browser_client(timeout).context("Failed to build DraftKings client")?,
            base_url: DRAFTKINGS_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl OddsSourcePlugin for DraftKingsScraper {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn supported_sports(&self) -> SupportedSports {
        SupportedSports::Only(Sport::TEAM_SPORTS.to_vec())
    }

    /// The feed lists every upcoming event; the orchestrator keeps the
    /// requested date.
    async fn fetch_odds(
        &self,
        sport: Sport,
        date: NaiveDate,
    ) -> Result<Vec<ProviderGame>, ProviderError> {
        let league = league_id(sport)
            .ok_or_else(|| ProviderError::unavailable(NAME, format!("{} not covered", sport)))?;
        let url = format!("{}/{}", self.base_url, league);

        let body = fetch_text(NAME, self.client.get(&url)).await?;
        let games = parse_league_response(&body)?;
        debug!(sport = %sport, %date, games = games.len(), "DraftKings events");
        Ok(games)
    }
}
