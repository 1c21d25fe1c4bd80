//! Game-date policy.
//!
//! Every provider's start time is mapped to a calendar date at a fixed
//! UTC-05:00 offset (US Eastern standard time, no daylight saving). A 7:30pm
//! ET puck drop on February 14th is a February 14th game no matter which
//! provider reported it or whether it was quoted in UTC.

use crate::models::Sport;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Hours west of UTC used for every game-date derivation
pub const GAME_DATE_UTC_OFFSET_HOURS: i64 = 5;

/// Calendar date a game belongs to
pub fn game_date_for(start_time: DateTime<Utc>) -> NaiveDate {
    (start_time - Duration::hours(GAME_DATE_UTC_OFFSET_HOURS)).date_naive()
}

/// UTC instants bounding a game date, as `[start, end)`
pub fn date_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    let start = midnight + Duration::hours(GAME_DATE_UTC_OFFSET_HOURS);
    (start, start + Duration::days(1))
}

/// Today's game date
pub fn today() -> NaiveDate {
    game_date_for(Utc::now())
}

/// Parse a `YYYY-MM-DD` query date
pub fn parse_query_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

/// Season label providers use for a date. Seasons that straddle new year are
/// labelled by the year they started in.
pub fn season_year(sport: Sport, date: NaiveDate) -> i32 {
    match sport {
        Sport::Mlb | Sport::Nascar => date.year(),
        _ if date.month() < 7 => date.year() - 1,
        _ => date.year(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_evening_games_stay_on_local_date() {
        // 7pm EST = 00:00 UTC next day
        let date = game_date_for(utc("2025-02-15T00:00:00Z"));
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 2, 14).unwrap());

        // 1pm EST afternoon game
        let date = game_date_for(utc("2025-02-14T18:00:00Z"));
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 2, 14).unwrap());

        let date = game_date_for(utc("2025-02-15T05:00:00Z"));
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 2, 15).unwrap());
    }

    #[test]
    fn test_date_window_matches_game_date() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 14).unwrap();
        let (start, end) = date_window(date);
        assert_eq!(start, utc("2025-02-14T05:00:00Z"));
        assert_eq!(end, utc("2025-02-15T05:00:00Z"));
        assert_eq!(game_date_for(start), date);
        assert_eq!(game_date_for(end - Duration::seconds(1)), date);
        assert_ne!(game_date_for(end), date);
    }

    #[test]
    fn test_parse_query_date() {
        assert_eq!(
            parse_query_date("2025-02-14"),
            NaiveDate::from_ymd_opt(2025, 2, 14)
        );
        assert_eq!(parse_query_date("02/14/2025"), None);
    }

    #[test]
    fn test_season_year() {
        let jan = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let oct = NaiveDate::from_ymd_opt(2024, 10, 10).unwrap();
        assert_eq!(season_year(Sport::Nhl, jan), 2024);
        assert_eq!(season_year(Sport::Nhl, oct), 2024);
        assert_eq!(season_year(Sport::Mlb, jan), 2025);
    }
}
