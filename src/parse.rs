use crate::error::WalkError;
use crate::models::{Price, UNAVAILABLE_MARK};
use regex::Regex;
use std::sync::OnceLock;

/// Parse calendar price text such as "350", "1.2K" or "—". Negative
/// amounts are rejected.
pub fn parse_price(text: &str) -> Result<Price, WalkError> {
    let text = text.trim();
    if text == UNAVAILABLE_MARK {
        return Ok(Price::Unavailable);
    }

    let (number, multiplier) = if text.contains('K') {
        (text.replace('K', ""), 1000.0)
    } else {
        (text.to_string(), 1.0)
    };

    number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .map(|value| Price::Amount(value * multiplier))
        .ok_or_else(|| WalkError::PriceFormat(text.to_string()))
}

/// Parse a distance such as "1,2 km" or "850 m" into meters
pub fn parse_distance(text: &str) -> Result<f64, WalkError> {
    let normalized = text.trim().replace(',', ".");

    let (number, multiplier) = if normalized.contains("km") {
        (normalized.replace("km", ""), 1000.0)
    } else {
        (normalized.replace('m', ""), 1.0)
    };

    number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value * multiplier)
        .ok_or_else(|| WalkError::DistanceFormat(text.to_string()))
}

fn decimal_regex() -> &'static Regex {
    static DECIMAL: OnceLock<Regex> = OnceLock::new();
    DECIMAL.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid regex"))
}

/// First decimal number in a label like "Com nota 8,7" or "Scored 8.7"
pub fn parse_rating(label: &str) -> Option<f64> {
    decimal_regex()
        .find(label)
        .and_then(|m| m.as_str().replace(',', ".").parse().ok())
}

/// Split review subscore text ("Limpeza\n8,9") into label and score
pub fn parse_subscore(text: &str) -> Option<(String, f64)> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }

    let score = parts[parts.len() - 1].replace(',', ".").parse::<f64>().ok()?;
    Some((parts[0].to_string(), score))
}
