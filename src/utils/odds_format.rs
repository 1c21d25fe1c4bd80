use crate::models::PriceQuote;

/// Convert American odds to implied probability
/// Positive odds (+150) mean you win $150 on a $100 bet
/// Negative odds (-150) mean you need to bet $150 to win $100
pub fn american_odds_to_probability(odds: i32) -> f64 {
    if odds > 0 {
        // For positive odds: 100 / (odds + 100)
        100.0 / (odds as f64 + 100.0)
    } else {
        // For negative odds: |odds| / (|odds| + 100)
        let abs_odds = odds.unsigned_abs() as f64;
        abs_odds / (abs_odds + 100.0)
    }
}

/// Implied probability of a decimal price (stake included in the payout)
pub fn decimal_odds_to_probability(decimal: f64) -> f64 {
    1.0 / decimal
}

/// Convert American odds to decimal odds
pub fn american_to_decimal(odds: i32) -> f64 {
    if odds > 0 {
        1.0 + odds as f64 / 100.0
    } else {
        1.0 + 100.0 / odds.unsigned_abs() as f64
    }
}

/// Convert decimal odds to the nearest American price.
/// Returns `None` for prices that cannot pay out (<= 1.0) or are not finite.
pub fn decimal_to_american(decimal: f64) -> Option<i32> {
    if !decimal.is_finite() || decimal <= 1.0 {
        return None;
    }

    let american = if decimal >= 2.0 {
        (decimal - 1.0) * 100.0
    } else {
        -100.0 / (decimal - 1.0)
    };

    american_from_f64(american)
}

/// Round a numeric American price. Values that do not fit an `i32`, or that
/// sit inside (-100, +100), are rejected.
pub fn american_from_f64(price: f64) -> Option<i32> {
    let rounded = price.round();
    if !rounded.is_finite() || rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
        return None;
    }
    let odds = rounded as i32;
    is_valid_american(odds).then_some(odds)
}

/// Canonical American price for a provider quote
pub fn american_price(quote: PriceQuote) -> Option<i32> {
    match quote {
        PriceQuote::American(odds) if is_valid_american(odds) => Some(odds),
        PriceQuote::American(_) => None,
        PriceQuote::Decimal(decimal) => decimal_to_american(decimal),
    }
}

/// Implied probability of a provider quote, whatever its format
pub fn implied_probability(quote: PriceQuote) -> Option<f64> {
    match quote {
        PriceQuote::American(odds) if is_valid_american(odds) => {
            Some(american_odds_to_probability(odds))
        }
        PriceQuote::American(_) => None,
        PriceQuote::Decimal(decimal) if decimal.is_finite() && decimal > 1.0 => {
            Some(decimal_odds_to_probability(decimal))
        }
        PriceQuote::Decimal(_) => None,
    }
}

/// American prices live at or beyond +/-100
pub fn is_valid_american(odds: i32) -> bool {
    odds.unsigned_abs() >= 100
}

/// Parse an American price as printed by books and scraped pages:
/// "+150", "-110", "−110" (unicode minus), "EVEN".
pub fn parse_american_odds(text: &str) -> Option<i32> {
    let cleaned = text.trim().replace('\u{2212}', "-");
    if cleaned.eq_ignore_ascii_case("even") || cleaned.eq_ignore_ascii_case("ev") {
        return Some(100);
    }

    let odds = cleaned.trim_start_matches('+').parse::<i32>().ok()?;
    is_valid_american(odds).then_some(odds)
}

/// Parse a decimal price such as "1.85"
pub fn parse_decimal_odds(text: &str) -> Option<f64> {
    let decimal = text.trim().parse::<f64>().ok()?;
    (decimal.is_finite() && decimal > 1.0).then_some(decimal)
}

/// Parse a handicap or total line: "-1.5", "+3", "3½", "PK", "o6.5", "u6.5"
pub fn parse_line(text: &str) -> Option<f64> {
    let cleaned = text
        .trim()
        .replace('\u{2212}', "-")
        .trim_start_matches(['o', 'O', 'u', 'U'])
        .to_string();

    if cleaned.eq_ignore_ascii_case("pk") || cleaned.eq_ignore_ascii_case("pick") {
        return Some(0.0);
    }

    let (body, half) = match cleaned.strip_suffix('½') {
        Some(body) => (body.to_string(), 0.5),
        None => (cleaned.clone(), 0.0),
    };

    let body = body.trim_start_matches('+');
    let value = match body {
        "" | "-" => 0.0,
        _ => body.parse::<f64>().ok()?,
    };

    if !value.is_finite() {
        return None;
    }
    Some(if body.starts_with('-') { value - half } else { value + half })
}
