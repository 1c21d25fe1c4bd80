use crate::models::{
    GameOdds, MoneylineOdds, OddsLines, PriceQuote, ProviderGame, ProviderMarkets, Sport,
    SpreadOdds, TotalOdds,
};
use crate::utils::dates::game_date_for;
use crate::utils::odds_format::american_price;
use crate::utils::team_names::canonical_team_name;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Turns adapter output into canonical `GameOdds` rows: canonical team names,
/// American prices, and a game date derived from the start time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize_game(
        &self,
        sport: Sport,
        source: &str,
        game: ProviderGame,
        fetched_at: DateTime<Utc>,
    ) -> GameOdds {
        let home_team_normalized = canonical_team_name(sport, &game.home_team);
        let away_team_normalized = canonical_team_name(sport, &game.away_team);

        GameOdds {
            external_id: game.external_id,
            source: source.to_string(),
            game_date: game_date_for(game.start_time),
            sport,
            home_team: game.home_team,
            away_team: game.away_team,
            home_team_normalized,
            away_team_normalized,
            start_time: game.start_time,
            venue: game.venue.filter(|v| !v.trim().is_empty()),
            bookmaker: game.bookmaker,
            odds: map_markets(&game.markets),
            fetched_at,
            updated_at: fetched_at,
        }
    }

    /// Normalize one adapter batch. A provider listing the same game twice
    /// keeps only its last entry so the batch holds one row per cache key.
    pub fn normalize(
        &self,
        sport: Sport,
        source: &str,
        games: Vec<ProviderGame>,
        fetched_at: DateTime<Utc>,
    ) -> Vec<GameOdds> {
        let mut positions: HashMap<(String, NaiveDate), usize> = HashMap::new();
        let mut normalized: Vec<GameOdds> = Vec::with_capacity(games.len());

        for game in games {
            let odds = self.normalize_game(sport, source, game, fetched_at);
            let key = (odds.external_id.clone(), odds.game_date);
            match positions.get(&key) {
                Some(&index) => {
                    debug!(external_id = %odds.external_id, source, "Duplicate game in batch");
                    normalized[index] = odds;
                }
                None => {
                    positions.insert(key, normalized.len());
                    normalized.push(odds);
                }
            }
        }

        normalized
    }
}

fn price(quote: Option<PriceQuote>) -> Option<i32> {
    quote.and_then(american_price)
}

fn map_markets(markets: &ProviderMarkets) -> OddsLines {
    OddsLines {
        moneyline: MoneylineOdds {
            home: price(markets.moneyline_home),
            away: price(markets.moneyline_away),
        },
        spread: SpreadOdds {
            home: price(markets.spread_home),
            away: price(markets.spread_away),
            line: markets.spread_line.filter(|l| l.is_finite()),
        },
        total: TotalOdds {
            line: markets.total_line.filter(|l| l.is_finite()),
            over: price(markets.total_over),
            under: price(markets.total_under),
        },
    }
}
