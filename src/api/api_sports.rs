//! API-Sports (api-sports.io) adapter.
//!
//! Each sport family lives on its own host. Games come from `/games` for the
//! requested date and prices from `/odds` for the league and season; the two
//! are joined on the game id. Prices are decimal strings.

use crate::api::{fetch_text, http_client};
use crate::config::{SettingsCache, API_SPORTS_KEY};
use crate::error::ProviderError;
use crate::models::{PriceQuote, ProviderGame, ProviderMarkets, Sport};
use crate::plugins::{OddsSourcePlugin, SupportedSports};
use crate::utils::dates::season_year;
use crate::utils::odds_format::{parse_decimal_odds, parse_line};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const NAME: &str = "api-sports";
pub const PRIORITY: u32 = 10;

const TIMEZONE: &str = "America/New_York";

/// Host for a sport's API family
pub fn base_url(sport: Sport) -> Option<&'static str> {
    match sport {
        Sport::Nhl => Some("https://v1.hockey.api-sports.io"),
        Sport::Nba | Sport::Ncaab => Some("https://v1.basketball.api-sports.io"),
        Sport::Nfl | Sport::Ncaaf => Some("https://v1.american-football.api-sports.io"),
        Sport::Mlb => Some("https://v1.baseball.api-sports.io"),
        Sport::Nascar => None,
    }
}

pub fn league_id(sport: Sport) -> Option<u32> {
    match sport {
        Sport::Nhl => Some(57),
        Sport::Nba => Some(12),
        Sport::Nfl => Some(1),
        Sport::Mlb => Some(1),
        Sport::Ncaab => Some(116),
        Sport::Ncaaf => Some(8),
        Sport::Nascar => None,
    }
}

/// Season parameter; basketball seasons are written "2024-2025"
pub fn season_param(sport: Sport, date: NaiveDate) -> String {
    let year = season_year(sport, date);
    match sport {
        Sport::Nba | Sport::Ncaab => format!("{}-{}", year, year + 1),
        _ => year.to_string(),
    }
}

/// Every API-Sports payload wraps its data this way. `errors` is `[]` when
/// all is well and an object of messages otherwise.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    errors: Value,
    #[serde(default = "Vec::new")]
    response: Vec<T>,
}

/// Game entry. Hockey, basketball and baseball put `id`/`timestamp` at the
/// top level; american football nests them under `game`.
#[derive(Debug, Deserialize)]
struct ApiSportsGame {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    game: Option<NestedGame>,
    #[serde(default)]
    teams: Option<Teams>,
    #[serde(default)]
    venue: Option<Value>,
    #[serde(default)]
    arena: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct NestedGame {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    date: Option<NestedDate>,
    #[serde(default)]
    venue: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct NestedDate {
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Teams {
    home: Option<Team>,
    away: Option<Team>,
}

#[derive(Debug, Deserialize)]
struct Team {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OddsEntry {
    game: Option<GameRef>,
    #[serde(default)]
    bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Deserialize)]
struct GameRef {
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Bookmaker {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    bets: Vec<Bet>,
}

#[derive(Debug, Deserialize)]
struct Bet {
    #[serde(default)]
    name: String,
    #[serde(default)]
    values: Vec<BetValue>,
}

#[derive(Debug, Deserialize)]
struct BetValue {
    #[serde(default)]
    value: Value,
    #[serde(default)]
    odd: Value,
}

/// A game with its identity fields validated
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledGame {
    pub id: i64,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
    pub venue: Option<String>,
}

/// Best-available markets for one game
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameMarkets {
    pub bookmaker: Option<String>,
    pub markets: ProviderMarkets,
}

fn envelope<T: serde::de::DeserializeOwned>(body: &str) -> Result<Vec<T>, ProviderError> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| ProviderError::schema(NAME, e))?;

    let has_errors = match &envelope.errors {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    };
    if has_errors {
        return Err(ProviderError::unavailable(NAME, envelope.errors));
    }

    Ok(envelope.response)
}

fn text_of(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Object(map)) => map
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string()),
        _ => None,
    }
}

/// Parse a `/games` body. Games missing an id, a team or a start time are skipped.
pub fn parse_games_response(body: &str) -> Result<Vec<ScheduledGame>, ProviderError> {
    let entries: Vec<ApiSportsGame> = envelope(body)?;
    let mut games = Vec::with_capacity(entries.len());

    for entry in entries {
        let nested = entry.game.as_ref();
        let id = entry.id.or_else(|| nested.and_then(|g| g.id));
        let timestamp = entry
            .timestamp
            .or_else(|| nested.and_then(|g| g.date.as_ref()).and_then(|d| d.timestamp));
        let team_name = |team: Option<&Team>| {
            team.and_then(|t| t.name.as_deref())
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
        };
        let home = team_name(entry.teams.as_ref().and_then(|t| t.home.as_ref()));
        let away = team_name(entry.teams.as_ref().and_then(|t| t.away.as_ref()));

        let (Some(id), Some(timestamp), Some(home_team), Some(away_team)) = (id, timestamp, home, away)
        else {
            debug!(?id, "Skipping API-Sports game without identity fields");
            continue;
        };
        let Some(start_time) = Utc.timestamp_opt(timestamp, 0).single() else {
            continue;
        };

        let venue = text_of(&entry.venue)
            .or_else(|| text_of(&entry.arena))
            .or_else(|| nested.and_then(|g| text_of(&g.venue)));

        games.push(ScheduledGame {
            id,
            home_team,
            away_team,
            start_time,
            venue,
        });
    }

    Ok(games)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decimal_quote(value: &Value) -> Option<PriceQuote> {
    value_text(value)
        .and_then(|s| parse_decimal_odds(&s))
        .map(PriceQuote::Decimal)
}

/// Fill markets from one bookmaker's bets. Only fields still empty are set,
/// so earlier bookmakers win.
fn apply_bets(markets: &mut ProviderMarkets, bets: &[Bet]) {
    for bet in bets {
        match bet.name.as_str() {
            "Home/Away" | "Moneyline" | "Money Line" => {
                for v in &bet.values {
                    let side = value_text(&v.value).unwrap_or_default();
                    let quote = decimal_quote(&v.odd);
                    match side.as_str() {
                        "Home" if markets.moneyline_home.is_none() => markets.moneyline_home = quote,
                        "Away" if markets.moneyline_away.is_none() => markets.moneyline_away = quote,
                        _ => {}
                    }
                }
            }
            "Asian Handicap" | "Handicap Result" | "Point Spread" => {
                if markets.spread_line.is_some() {
                    continue;
                }
                // Values look like "Home -1.5" / "Away +1.5"; take the first pair.
                let mut home: Option<(f64, Option<PriceQuote>)> = None;
                let mut away: Option<Option<PriceQuote>> = None;
                for v in &bet.values {
                    let label = value_text(&v.value).unwrap_or_default();
                    let mut parts = label.split_whitespace();
                    match (parts.next(), parts.next().and_then(parse_line)) {
                        (Some("Home"), Some(line)) if home.is_none() => {
                            home = Some((line, decimal_quote(&v.odd)));
                        }
                        (Some("Away"), Some(line)) if away.is_none() => {
                            if home.map_or(true, |(h, _)| h == -line) {
                                away = Some(decimal_quote(&v.odd));
                            }
                        }
                        _ => {}
                    }
                }
                if let Some((line, home_quote)) = home {
                    markets.spread_line = Some(line);
                    markets.spread_home = home_quote;
                    markets.spread_away = away.flatten();
                }
            }
            "Over/Under" | "Total" | "Totals" => {
                if markets.total_line.is_some() {
                    continue;
                }
                let mut line: Option<f64> = None;
                for v in &bet.values {
                    let label = value_text(&v.value).unwrap_or_default();
                    let mut parts = label.split_whitespace();
                    let (Some(side), Some(points)) = (parts.next(), parts.next().and_then(parse_line))
                    else {
                        continue;
                    };
                    if line.is_some_and(|l| l != points) {
                        continue;
                    }
                    match side {
                        "Over" if markets.total_over.is_none() => {
                            line = Some(points);
                            markets.total_over = decimal_quote(&v.odd);
                        }
                        "Under" if markets.total_under.is_none() => {
                            line = Some(points);
                            markets.total_under = decimal_quote(&v.odd);
                        }
                        _ => {}
                    }
                }
                markets.total_line = line;
            }
            _ => {}
        }
    }
}

/// Parse an `/odds` body into markets keyed by game id
pub fn parse_odds_response(body: &str) -> Result<HashMap<i64, GameMarkets>, ProviderError> {
    let entries: Vec<OddsEntry> = envelope(body)?;
    let mut by_game: HashMap<i64, GameMarkets> = HashMap::new();

    for entry in entries {
        let Some(id) = entry.game.and_then(|g| g.id) else {
            continue;
        };
        let game = by_game.entry(id).or_default();
        for bookmaker in &entry.bookmakers {
            let before = game.markets.clone();
            apply_bets(&mut game.markets, &bookmaker.bets);
            if game.bookmaker.is_none() && game.markets != before {
                game.bookmaker = bookmaker.name.clone();
            }
        }
    }

    Ok(by_game)
}

/// Join scheduled games with their markets. Games without any price are
/// still returned; the caller decides what to do with empty markets.
pub fn join_games(games: Vec<ScheduledGame>, mut odds: HashMap<i64, GameMarkets>) -> Vec<ProviderGame> {
    games
        .into_iter()
        .map(|game| {
            let markets = odds.remove(&game.id).unwrap_or_default();
            ProviderGame {
                external_id: game.id.to_string(),
                home_team: game.home_team,
                away_team: game.away_team,
                start_time: game.start_time,
                venue: game.venue,
                bookmaker: markets.bookmaker,
                markets: markets.markets,
            }
        })
        .collect()
}

pub struct ApiSportsClient {
    client: reqwest::Client,
    settings: Arc<SettingsCache>,
    base_url_override: Option<String>,
}

impl ApiSportsClient {
    pub fn new(settings: Arc<SettingsCache>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client(timeout)?,
            settings,
            base_url_override: None,
        })
    }

    /// Point every sport at one host (used against local mocks)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    fn host(&self, sport: Sport) -> Option<String> {
        self.base_url_override
            .clone()
            .or_else(|| base_url(sport).map(str::to_string))
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, ProviderError> {
        let api_key = self
            .settings
            .get(API_SPORTS_KEY)
            .ok_or_else(|| ProviderError::unavailable(NAME, "API_SPORTS_KEY not set"))?;

        fetch_text(
            NAME,
            self.client
                .get(url)
                .header("x-apisports-key", api_key)
                .query(query),
        )
        .await
    }
}

#[async_trait]
impl OddsSourcePlugin for ApiSportsClient {
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
        let (Some(host), Some(league)) = (self.host(sport), league_id(sport)) else {
            return Err(ProviderError::unavailable(NAME, format!("{} not covered", sport)));
        };

        let games_body = self
            .get(
                &format!("{}/games", host),
                &[
                    ("league", league.to_string()),
                    ("date", date.to_string()),
                    ("timezone", TIMEZONE.to_string()),
                ],
            )
            .await?;
        let games = parse_games_response(&games_body)?;
        if games.is_empty() {
            return Ok(vec![]);
        }

        let odds_body = self
            .get(
                &format!("{}/odds", host),
                &[
                    ("league", league.to_string()),
                    ("season", season_param(sport, date)),
                ],
            )
            .await?;
        let odds = parse_odds_response(&odds_body)?;

        let joined = join_games(games, odds);
        if joined.iter().all(|game| game.markets.is_empty()) {
            debug!(sport = %sport, %date, games = joined.len(), "API-Sports has no prices yet");
            return Ok(vec![]);
        }
        debug!(sport = %sport, %date, games = joined.len(), "API-Sports games");
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    const GAMES: &str = r#"{
        "get": "games",
        "errors": [],
        "results": 3,
        "response": [
            {
                "id": 401, "date": "2025-02-14T19:00:00-05:00", "timestamp": 1739577600,
                "arena": {"name": "TD Garden"},
                "teams": {"home": {"id": 1, "name": "Boston Bruins"}, "away": {"id": 2, "name": "Florida Panthers"}}
            },
            {
                "id": 402, "timestamp": 1739584800,
                "teams": {"home": {"name": "Seattle Kraken"}, "away": {"name": null}}
            },
            {
                "game": {"id": 77, "date": {"timestamp": 1739577600}, "venue": {"name": "Arrowhead"}},
                "teams": {"home": {"name": "Kansas City Chiefs"}, "away": {"name": "Denver Broncos"}}
            }
        ]
    }"#;

    const ODDS: &str = r#"{
        "errors": [],
        "response": [
            {
                "game": {"id": 401},
                "bookmakers": [
                    {"id": 1, "name": "Empty Book", "bets": []},
                    {"id": 2, "name": "Bet365", "bets": [
                        {"id": 1, "name": "Home/Away", "values": [
                            {"value": "Home", "odd": "1.77"},
                            {"value": "Away", "odd": "2.10"}
                        ]},
                        {"id": 3, "name": "Asian Handicap", "values": [
                            {"value": "Home -1.5", "odd": "2.60"},
                            {"value": "Away +1.5", "odd": "1.50"},
                            {"value": "Home +1.5", "odd": "1.25"}
                        ]},
                        {"id": 4, "name": "Over/Under", "values": [
                            {"value": "Over 5.5", "odd": "1.91"},
                            {"value": "Under 5.5", "odd": "1.91"},
                            {"value": "Over 6.5", "odd": "2.40"}
                        ]}
                    ]},
                    {"id": 3, "name": "Later Book", "bets": [
                        {"id": 1, "name": "Home/Away", "values": [
                            {"value": "Home", "odd": "1.50"}
                        ]}
                    ]}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_games_skips_incomplete_and_reads_nested_shape() {
        let games = parse_games_response(GAMES).unwrap();
        assert_eq!(games.len(), 2);

        assert_eq!(games[0].id, 401);
        assert_eq!(games[0].home_team, "Boston Bruins");
        assert_eq!(games[0].venue.as_deref(), Some("TD Garden"));
        assert_eq!(
            games[0].start_time,
            "2025-02-15T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );

        assert_eq!(games[1].id, 77);
        assert_eq!(games[1].venue.as_deref(), Some("Arrowhead"));
    }

    #[test]
    fn test_parse_odds_takes_first_priced_bookmaker() {
        let odds = parse_odds_response(ODDS).unwrap();
        let game = &odds[&401];

        assert_eq!(game.bookmaker.as_deref(), Some("Bet365"));
        assert_eq!(game.markets.moneyline_home, Some(PriceQuote::Decimal(1.77)));
        assert_eq!(game.markets.moneyline_away, Some(PriceQuote::Decimal(2.10)));
        assert_eq!(game.markets.spread_line, Some(-1.5));
        assert_eq!(game.markets.spread_home, Some(PriceQuote::Decimal(2.60)));
        assert_eq!(game.markets.spread_away, Some(PriceQuote::Decimal(1.50)));
        assert_eq!(game.markets.total_line, Some(5.5));
        assert_eq!(game.markets.total_over, Some(PriceQuote::Decimal(1.91)));
        assert_eq!(game.markets.total_under, Some(PriceQuote::Decimal(1.91)));
    }

    #[test]
    fn test_errors_object_is_unavailable() {
        let body = r#"{"errors": {"token": "Error/Missing application key."}, "response": []}"#;
        let err = parse_games_response(body).unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }

    #[test]
    fn test_garbage_is_schema_error() {
        let err = parse_games_response("<html>rate limited</html>").unwrap_err();
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn test_join_keeps_unpriced_games() {
        let games = parse_games_response(GAMES).unwrap();
        let odds = parse_odds_response(ODDS).unwrap();
        let joined = join_games(games, odds);

        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].external_id, "401");
        assert!(!joined[0].markets.is_empty());
        assert!(joined[1].markets.is_empty());
    }

    #[test]
    fn test_season_param() {
        let feb = NaiveDate::from_ymd_opt(2025, 2, 14).unwrap();
        assert_eq!(season_param(Sport::Nba, feb), "2024-2025");
        assert_eq!(season_param(Sport::Nhl, feb), "2024");
        assert_eq!(season_param(Sport::Mlb, feb), "2025");
    }

    /// Serve `GAMES` on `/games` and the given reply on `/odds` from a local port
    async fn local_host(odds_status: StatusCode, odds_body: &'static str) -> ApiSportsClient {
        let app = Router::new()
            .route("/games", get(|| async { GAMES }))
            .route("/odds", get(move || async move { (odds_status, odds_body) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let settings = Arc::new(SettingsCache::with_lookup(
            Duration::from_secs(60),
            |key: &str| (key == API_SPORTS_KEY).then(|| "test-key".to_string()),
        ));
        ApiSportsClient::new(settings, Duration::from_secs(5))
            .unwrap()
            .with_base_url(format!("http://{}", addr))
    }

    fn feb_14() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 14).unwrap()
    }

    #[tokio::test]
    async fn test_failed_odds_call_fails_the_fetch() {
        let client = local_host(StatusCode::INTERNAL_SERVER_ERROR, "oops").await;
        let err = client.fetch_odds(Sport::Nhl, feb_14()).await.unwrap_err();
        assert_eq!(err.kind(), "unavailable");

        let client = local_host(StatusCode::OK, "<html>maintenance</html>").await;
        let err = client.fetch_odds(Sport::Nhl, feb_14()).await.unwrap_err();
        assert_eq!(err.kind(), "schema");
    }

    #[tokio::test]
    async fn test_schedule_without_any_prices_is_empty() {
        let client = local_host(StatusCode::OK, r#"{"errors": [], "response": []}"#).await;
        let games = client.fetch_odds(Sport::Nhl, feb_14()).await.unwrap();
        assert!(games.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_joins_schedule_and_odds() {
        let client = local_host(StatusCode::OK, ODDS).await;
        let games = client.fetch_odds(Sport::Nhl, feb_14()).await.unwrap();

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].bookmaker.as_deref(), Some("Bet365"));
        assert!(games[1].markets.is_empty());
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_odds_live() {
        dotenv::dotenv().ok();
        let settings = Arc::new(SettingsCache::from_env(Duration::from_secs(60)));
        let client = ApiSportsClient::new(settings, Duration::from_secs(20)).unwrap();

        let games = client
            .fetch_odds(Sport::Nhl, crate::utils::dates::today())
            .await
            .unwrap();
        println!("{} games", games.len());
    }
}
