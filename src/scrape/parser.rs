// src/scrape/parser.rs
//! Turns scraped rate text into a buy/sell pair.
//!
//! Strategies, first match wins:
//! 1. labelled values ("Compra 6,86 / Venta 6,96", also "buy"/"sell"),
//! 2. two or more numeric runs: the first two are buy and sell,
//! 3. a single numeric run read as a midpoint with a synthetic 1% spread,
//!    accepted only inside the plausibility band. Without a band a lone
//!    number is never trusted.
//!
//! Commas are always decimal separators. Thousands grouping is not detected.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::domain::PlausibleBand;
use crate::error::ParseError;

const SYNTHETIC_BUY_FACTOR: f64 = 0.995;
const SYNTHETIC_SELL_FACTOR: f64 = 1.005;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub buy: f64,
    pub sell: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RateParser {
    band: Option<PlausibleBand>,
}

impl RateParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Band single-number quotes must fall in. `None` rejects them all.
    pub fn with_band(mut self, band: Option<PlausibleBand>) -> Self {
        self.band = band;
        self
    }

    pub fn band(&self) -> Option<PlausibleBand> {
        self.band
    }

    pub fn parse(&self, text: &str) -> Result<Quote, ParseError> {
        if let Some((buy, sell)) = labelled_pair(text) {
            return validate(to_number(buy)?, to_number(sell)?);
        }

        let runs = numeric_runs(text);
        match runs.as_slice() {
            [] => Err(ParseError::NoNumbers(text.to_string())),
            [single] => {
                let mid = to_number(single)?;
                if mid <= 0.0 {
                    return Err(ParseError::NonPositive(mid));
                }
                let Some(band) = self.band else {
                    return Err(ParseError::Unbounded(mid));
                };
                if !band.contains(mid) {
                    return Err(ParseError::OutOfBand {
                        value: mid,
                        min: band.min,
                        max: band.max,
                    });
                }
                validate(mid * SYNTHETIC_BUY_FACTOR, mid * SYNTHETIC_SELL_FACTOR)
            }
            [first, second, ..] => validate(to_number(first)?, to_number(second)?),
        }
    }
}

/// Parse with no plausibility band, so only labelled or two-number text succeeds.
pub fn parse_rate(text: &str) -> Result<Quote, ParseError> {
    RateParser::default().parse(text)
}

fn labelled_pair(text: &str) -> Option<(&str, &str)> {
    static RE_BUY: OnceCell<Regex> = OnceCell::new();
    static RE_SELL: OnceCell<Regex> = OnceCell::new();
    let re_buy = RE_BUY.get_or_init(|| {
        Regex::new(r"(?i)\b(?:compra|buy)\b\s*[:=]?\s*(?:bs\.?\s*)?([0-9][0-9.,]*)").unwrap()
    });
    let re_sell = RE_SELL.get_or_init(|| {
        Regex::new(r"(?i)\b(?:venta|sell)\b\s*[:=]?\s*(?:bs\.?\s*)?([0-9][0-9.,]*)").unwrap()
    });

    let buy = re_buy.captures(text)?.get(1)?.as_str();
    let sell = re_sell.captures(text)?.get(1)?.as_str();
    Some((buy, sell))
}

/// Maximal `[0-9.,]` runs holding at least one digit. Every other character
/// acts as a separator, so "6.95-7.05" yields two runs.
fn numeric_runs(text: &str) -> Vec<&str> {
    static RE_RUN: OnceCell<Regex> = OnceCell::new();
    let re_run = RE_RUN.get_or_init(|| Regex::new(r"[0-9.,]+").unwrap());
    re_run
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|run| run.bytes().any(|b| b.is_ascii_digit()))
        .collect()
}

fn to_number(run: &str) -> Result<f64, ParseError> {
    let cleaned = run.trim_matches(|c| c == '.' || c == ',').replace(',', ".");
    let v: f64 = cleaned
        .parse()
        .map_err(|_| ParseError::NotNumeric(run.to_string()))?;
    if !v.is_finite() {
        return Err(ParseError::NotFinite);
    }
    Ok(v)
}

fn validate(buy: f64, sell: f64) -> Result<Quote, ParseError> {
    if !buy.is_finite() || !sell.is_finite() {
        return Err(ParseError::NotFinite);
    }
    if buy <= 0.0 {
        return Err(ParseError::NonPositive(buy));
    }
    if sell <= 0.0 {
        return Err(ParseError::NonPositive(sell));
    }
    if sell < buy {
        return Err(ParseError::Inverted { buy, sell });
    }
    Ok(Quote { buy, sell })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn banded(min: f64, max: f64) -> RateParser {
        RateParser::new().with_band(Some(PlausibleBand::new(min, max)))
    }

    #[test]
    fn single_value_gets_synthetic_spread() {
        let q = banded(5.0, 10.0).parse("7.00").unwrap();
        assert!(approx(q.buy, 6.965));
        assert!(approx(q.sell, 7.035));
    }

    #[test]
    fn single_value_without_band_is_rejected() {
        assert_eq!(parse_rate("2024"), Err(ParseError::Unbounded(2024.0)));
        assert_eq!(parse_rate("Actualizado 2024"), Err(ParseError::Unbounded(2024.0)));
        assert_eq!(parse_rate("7.00"), Err(ParseError::Unbounded(7.0)));
    }

    #[test]
    fn two_values_are_buy_then_sell() {
        assert_eq!(
            parse_rate("6.95 - 7.05").unwrap(),
            Quote { buy: 6.95, sell: 7.05 }
        );
        assert_eq!(
            parse_rate("6,95 - 7,05").unwrap(),
            Quote { buy: 6.95, sell: 7.05 }
        );
    }

    #[test]
    fn dash_without_spaces_still_splits() {
        assert_eq!(
            parse_rate("6.95-7.05").unwrap(),
            Quote { buy: 6.95, sell: 7.05 }
        );
    }

    #[test]
    fn letters_between_numbers_split_runs() {
        assert_eq!(
            parse_rate("6.95abc7.05").unwrap(),
            Quote { buy: 6.95, sell: 7.05 }
        );
        assert_eq!(
            parse_rate("USD6,95/7,05BOB").unwrap(),
            Quote { buy: 6.95, sell: 7.05 }
        );
    }

    #[test]
    fn labelled_values_win_over_position() {
        let q = parse_rate("Venta: 6,96 | Compra: 6,86").unwrap();
        assert_eq!(q, Quote { buy: 6.86, sell: 6.96 });

        let q = parse_rate("BUY 13.10 SELL 13.40").unwrap();
        assert_eq!(q, Quote { buy: 13.10, sell: 13.40 });
    }

    #[test]
    fn currency_prefix_dot_is_ignored() {
        let q = parse_rate("Bs. 6,95 Bs. 7,05").unwrap();
        assert_eq!(q, Quote { buy: 6.95, sell: 7.05 });
    }

    #[test]
    fn extra_runs_use_the_first_two() {
        let q = parse_rate("6.90 7.10 (2024)").unwrap();
        assert_eq!(q, Quote { buy: 6.90, sell: 7.10 });
    }

    #[test]
    fn inverted_pair_is_rejected() {
        assert_eq!(
            parse_rate("7.05 6.95"),
            Err(ParseError::Inverted { buy: 7.05, sell: 6.95 })
        );
    }

    #[test]
    fn no_digits_fails() {
        assert!(matches!(parse_rate("sin datos"), Err(ParseError::NoNumbers(_))));
        assert!(matches!(parse_rate("..."), Err(ParseError::NoNumbers(_))));
    }

    #[test]
    fn malformed_grouping_fails() {
        assert!(matches!(
            parse_rate("6.950,00"),
            Err(ParseError::NotNumeric(_))
        ));
    }

    #[test]
    fn band_rejects_implausible_single_value() {
        let p = banded(5.0, 10.0);
        assert!(matches!(p.parse("2024"), Err(ParseError::OutOfBand { .. })));
        assert!(p.parse("6.96").is_ok());
        // two-number quotes are not subject to the band
        assert!(p.parse("12.0 13.0").is_ok());
    }

    #[test]
    fn zero_is_not_a_price() {
        assert!(matches!(parse_rate("0"), Err(ParseError::NonPositive(_))));
        assert!(matches!(banded(0.0, 10.0).parse("0"), Err(ParseError::NonPositive(_))));
    }

    #[test]
    fn every_success_has_sell_at_least_buy() {
        let p = banded(0.5, 200.0);
        for s in ["1", "6.95 7.05", "7 7", "compra 1 venta 2", "100,5"] {
            let q = p.parse(s).unwrap();
            assert!(q.sell >= q.buy, "{s}: {q:?}");
        }
    }
}
