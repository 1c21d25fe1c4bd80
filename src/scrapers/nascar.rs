//! NASCAR race odds.
//!
//! Races have no home/away matchup, so each driver's outright price becomes
//! its own row: the driver is the "home" side priced against the field.

use crate::api::{browser_client, fetch_text};
use crate::error::ProviderError;
use crate::models::{PriceQuote, ProviderGame, ProviderMarkets, Sport};
use crate::plugins::{OddsSourcePlugin, SupportedSports};
use crate::utils::odds_format::parse_american_odds;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

const NASCAR_ODDS_URL: &str = "https://www.vegasinsider.com/nascar/odds/";

pub const NAME: &str = "nascar-odds";
pub const PRIORITY: u32 = 50;

/// Opponent name used for every driver row
pub const FIELD: &str = "Field";

fn selector(css: &str) -> Result<Selector, ProviderError> {
    Selector::parse(css).map_err(|e| ProviderError::schema(NAME, format!("{:?}", e)))
}

fn first_text(scope: &ElementRef, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Lowercase, hyphen-separated id fragment
pub fn slugify(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Parse a race odds page. Every `section.race-odds` block is one race.
pub fn parse_race_odds(html: &str) -> Result<Vec<ProviderGame>, ProviderError> {
    let document = Html::parse_document(html);

    let race_selector = selector("section.race-odds")?;
    let name_selector = selector(".race-name")?;
    let start_selector = selector("time.race-start")?;
    let venue_selector = selector(".race-venue")?;
    let row_selector = selector("table.odds-table tr")?;
    let driver_selector = selector("td.driver-name")?;
    let odds_selector = selector("td.odds")?;

    let mut games = Vec::new();

    for race in document.select(&race_selector) {
        let Some(race_name) = first_text(&race, &name_selector) else {
            continue;
        };
        let Some(start_time) = race
            .select(&start_selector)
            .next()
            .and_then(|el| el.value().attr("datetime"))
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|dt| dt.with_timezone(&Utc))
        else {
            debug!(race = %race_name, "Skipping race without a start time");
            continue;
        };
        let venue = first_text(&race, &venue_selector);
        let race_slug = race
            .value()
            .attr("data-race-id")
            .map(slugify)
            .unwrap_or_else(|| slugify(&race_name));

        for row in race.select(&row_selector) {
            let Some(driver) = first_text(&row, &driver_selector) else {
                continue;
            };
            let price = first_text(&row, &odds_selector)
                .and_then(|t| parse_american_odds(&t))
                .map(PriceQuote::American);

            games.push(ProviderGame {
                external_id: format!("{}-{}", race_slug, slugify(&driver)),
                home_team: driver,
                away_team: FIELD.to_string(),
                start_time,
                venue: venue.clone(),
                bookmaker: None,
                markets: ProviderMarkets {
                    moneyline_home: price,
                    ..ProviderMarkets::default()
                },
            });
        }
    }

    Ok(games)
}

pub struct NascarOddsScraper {
    client: reqwest::Client,
    url: String,
}

impl NascarOddsScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: browser_client(timeout).context("Failed to build NASCAR odds client")?,
            url: NASCAR_ODDS_URL.to_string(),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl OddsSourcePlugin for NascarOddsScraper {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn supported_sports(&self) -> SupportedSports {
        SupportedSports::Only(vec![Sport::Nascar])
    }

    async fn fetch_odds(
        &self,
        sport: Sport,
        date: NaiveDate,
    ) -> Result<Vec<ProviderGame>, ProviderError> {
        if sport != Sport::Nascar {
            return Err(ProviderError::unavailable(NAME, format!("{} not covered", sport)));
        }

        let html = fetch_text(NAME, self.client.get(&self.url)).await?;
        let games = parse_race_odds(&html)?;
        debug!(%date, drivers = games.len(), "NASCAR odds");
        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <section class="race-odds" data-race-id="Daytona 500 2025">
          <h2 class="race-name">Daytona 500</h2>
          <time class="race-start" datetime="2025-02-16T19:30:00Z">Feb 16</time>
          <span class="race-venue">Daytona International Speedway</span>
          <table class="odds-table">
            <thead><tr><th>Driver</th><th>Odds</th></tr></thead>
            <tbody>
              <tr><td class="driver-name">Kyle Larson</td><td class="odds">+450</td></tr>
              <tr><td class="driver-name">Denny Hamlin</td><td class="odds">+700</td></tr>
              <tr><td class="driver-name">Ricky Stenhouse Jr.</td><td class="odds">N/A</td></tr>
            </tbody>
          </table>
        </section>
        <section class="race-odds">
          <h2 class="race-name">TBD Exhibition</h2>
          <table class="odds-table"><tr><td class="driver-name">Nobody</td></tr></table>
        </section>
        </body></html>
    "#;

    #[test]
    fn test_parse_race_odds_driver_vs_field() {
        let games = parse_race_odds(PAGE).unwrap();
        assert_eq!(games.len(), 3);

        let larson = &games[0];
        assert_eq!(larson.external_id, "daytona-500-2025-kyle-larson");
        assert_eq!(larson.home_team, "Kyle Larson");
        assert_eq!(larson.away_team, FIELD);
        assert_eq!(larson.venue.as_deref(), Some("Daytona International Speedway"));
        assert_eq!(larson.markets.moneyline_home, Some(PriceQuote::American(450)));
        assert!(larson.markets.moneyline_away.is_none());

        assert_eq!(games[2].external_id, "daytona-500-2025-ricky-stenhouse-jr");
        assert!(games[2].markets.is_empty());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Coca-Cola 600 "), "coca-cola-600");
        assert_eq!(slugify("Martin Truex Jr."), "martin-truex-jr");
    }
}
