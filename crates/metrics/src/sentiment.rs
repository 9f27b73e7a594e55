//! Sentiment triple handling
//!
//! Models report sentiment as fractions (`0.5`), as percentages (`50`), as
//! numeric strings (`"50%"`), and occasionally as numbers that do not add up.
//! Everything is funnelled into a normalized [`SentimentTriple`].

use serde_json::Value;

use crate::models::SentimentTriple;

/// Allowed absolute deviation of a fractional triple's sum from 1.0
pub const SUM_TOLERANCE: f64 = 0.01;

/// Scale a triple so its components sum to 1.0, preserving proportions.
///
/// Negative components are clamped to zero first. Returns `None` when
/// nothing is left to scale.
pub fn normalize(triple: SentimentTriple) -> Option<SentimentTriple> {
    let clamped = SentimentTriple::new(
        triple.positive.max(0.0),
        triple.neutral.max(0.0),
        triple.negative.max(0.0),
    );
    let sum = clamped.sum();
    if !sum.is_finite() || sum <= 0.0 {
        return None;
    }
    Some(SentimentTriple::new(
        clamped.positive / sum,
        clamped.neutral / sum,
        clamped.negative / sum,
    ))
}

/// Whether a reported triple already describes a valid distribution, either
/// as fractions summing to 1.0 or as percentages summing to 100.
pub fn is_consistent(triple: &SentimentTriple) -> bool {
    if triple.has_negative_component() {
        return false;
    }
    let sum = triple.sum();
    (sum - 1.0).abs() <= SUM_TOLERANCE || (sum - 100.0).abs() <= SUM_TOLERANCE * 100.0
}

/// Read a triple from a model-produced value.
///
/// Accepts `{positive, neutral, negative}` objects (numbers or numeric
/// strings, optional `%` suffix) and three-element arrays.
pub fn parse_triple(value: &Value) -> Option<SentimentTriple> {
    match value {
        Value::Object(map) => {
            let positive = number(map.get("positive")?)?;
            let neutral = number(map.get("neutral")?)?;
            let negative = number(map.get("negative")?)?;
            Some(SentimentTriple::new(positive, neutral, negative))
        }
        Value::Array(items) if items.len() == 3 => Some(SentimentTriple::new(
            number(&items[0])?,
            number(&items[1])?,
            number(&items[2])?,
        )),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}
