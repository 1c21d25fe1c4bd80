use crate::api::{browser_client, fetch_text};
use crate::error::ProviderError;
use crate::models::{PriceQuote, ProviderGame, ProviderMarkets, Sport};
use crate::plugins::{OddsSourcePlugin, SupportedSports};
use crate::utils::odds_format::{parse_american_odds, parse_line};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const VEGAS_INSIDER_BASE_URL: &str = "https://www.vegasinsider.com";

pub const NAME: &str = "vegas-insider";
pub const PRIORITY: u32 = 40;

pub fn sport_path(sport: Sport) -> Option<&'static str> {
    match sport {
        Sport::Nfl => Some("nfl"),
        Sport::Nba => Some("nba"),
        Sport::Nhl => Some("nhl"),
        Sport::Mlb => Some("mlb"),
        Sport::Ncaaf => Some("college-football"),
        Sport::Ncaab => Some("college-basketball"),
        Sport::Nascar => None,
    }
}

fn selector(css: &str) -> Result<Selector, ProviderError> {
    Selector::parse(css).map_err(|e| ProviderError::schema(NAME, format!("{:?}", e)))
}

fn cell_text(row: &ElementRef, selector: &Selector) -> Option<String> {
    row.select(selector)
        .next()
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// "-1.5 +150" -> (line, price)
fn split_line_and_price(text: &str) -> (Option<f64>, Option<i32>) {
    let mut parts = text.split_whitespace();
    let line = parts.next().and_then(parse_line);
    let price = parts.next().and_then(parse_american_odds);
    (line, price)
}

#[derive(Default)]
struct PartialGame {
    start_time: Option<DateTime<Utc>>,
    home_team: Option<String>,
    away_team: Option<String>,
    markets: ProviderMarkets,
}

/// Parse a Vegas Insider odds page. Each game is two `tr[data-game-id]`
/// rows, one per side, marked with `data-side`.
pub fn parse_odds_page(html: &str) -> Result<Vec<ProviderGame>, ProviderError> {
    let document = Html::parse_document(html);

    let row_selector = selector("table.odds-table tr[data-game-id]")?;
    let time_selector = selector("td.game-time")?;
    let team_selector = selector("td.game-team .team-name")?;
    let moneyline_selector = selector("td.odds-moneyline")?;
    let spread_selector = selector("td.odds-spread")?;
    let total_selector = selector("td.odds-total")?;

    let mut order: Vec<String> = Vec::new();
    let mut partials: HashMap<String, PartialGame> = HashMap::new();

    for row in document.select(&row_selector) {
        let Some(game_id) = row.value().attr("data-game-id").map(str::to_string) else {
            continue;
        };
        let side = row.value().attr("data-side").unwrap_or_default();
        if !partials.contains_key(&game_id) {
            order.push(game_id.clone());
        }
        let game = partials.entry(game_id).or_default();

        if let Some(start) = row
            .select(&time_selector)
            .next()
            .and_then(|cell| cell.value().attr("data-time"))
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        {
            game.start_time = Some(start.with_timezone(&Utc));
        }

        let team = cell_text(&row, &team_selector);
        let moneyline = cell_text(&row, &moneyline_selector)
            .and_then(|t| parse_american_odds(&t))
            .map(PriceQuote::American);
        let (spread_line, spread_price) = cell_text(&row, &spread_selector)
            .map(|t| split_line_and_price(&t))
            .unwrap_or_default();

        match side {
            "home" => {
                game.home_team = team;
                game.markets.moneyline_home = moneyline;
                game.markets.spread_home = spread_price.map(PriceQuote::American);
                if spread_line.is_some() {
                    game.markets.spread_line = spread_line;
                }
            }
            "away" => {
                game.away_team = team;
                game.markets.moneyline_away = moneyline;
                game.markets.spread_away = spread_price.map(PriceQuote::American);
                if game.markets.spread_line.is_none() {
                    game.markets.spread_line = spread_line.map(|l| -l);
                }
            }
            _ => continue,
        }

        if let Some(total) = cell_text(&row, &total_selector) {
            let over = total.starts_with(['o', 'O']);
            let under = total.starts_with(['u', 'U']);
            let (line, price) = split_line_and_price(&total);
            if over {
                game.markets.total_over = price.map(PriceQuote::American);
            } else if under {
                game.markets.total_under = price.map(PriceQuote::American);
            }
            if over || under {
                game.markets.total_line = game.markets.total_line.or(line);
            }
        }
    }

    let games = order
        .into_iter()
        .filter_map(|game_id| {
            let partial = partials.remove(&game_id)?;
            let game = ProviderGame {
                external_id: game_id,
                home_team: partial.home_team?,
                away_team: partial.away_team?,
                start_time: partial.start_time?,
                venue: None,
                bookmaker: None,
                markets: partial.markets,
            };
            Some(game)
        })
        .collect();

    Ok(games)
}

pub struct VegasInsiderScraper {
    client: reqwest::Client,
    base_url: String,
}

impl VegasInsiderScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: browser_client(timeout).context("Failed to build Vegas Insider client")?,
            base_url: VEGAS_INSIDER_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl OddsSourcePlugin for VegasInsiderScraper {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn supported_sports(&self) -> SupportedSports {
        SupportedSports::Only(Sport::TEAM_SPORTS.to_vec())
    }

    async fn fetch_odds(
        &self,
        sport: Sport,
        date: NaiveDate,
    ) -> Result<Vec<ProviderGame>, ProviderError> {
        let path = sport_path(sport)
            .ok_or_else(|| ProviderError::unavailable(NAME, format!("{} not covered", sport)))?;
        let url = format!("{}/{}/odds/las-vegas/", self.base_url, path);

        let html = fetch_text(NAME, self.client.get(&url)).await?;
        let games = parse_odds_page(&html)?;
        debug!(sport = %sport, %date, games = games.len(), "Vegas Insider games");
        Ok(games)
    }
}
