// src/sentiment.rs
//! Sentiment normalization.
//!
//! The source API reports sentiment in two shapes: a per-post score already
//! on a 0–5 scale, and a per-platform breakdown of 0–100 scores on topic
//! summaries. Both are reduced here into the 1.0–5.0 band every stored
//! payload carries.

use std::collections::BTreeMap;

use serde_json::Value;

/// Score stored when the input carries no usable sentiment.
pub const NEUTRAL_SENTIMENT: f64 = 3.0;

/// Reduce a per-platform breakdown (platform -> 0–100 score) to one
/// 1.0–5.0 value: plain average of the numeric entries, then `avg/20 + 1`,
/// rounded to 2 decimals.
///
/// Non-numeric entries are skipped. Inputs are clamped into 0–100 before
/// averaging so upstream scale drift cannot push the result out of band.
/// Empty or all-invalid breakdown is neutral.
pub fn dominant_sentiment(breakdown: &BTreeMap<String, Value>) -> f64 {
    let mut sum = 0.0f64;
    let mut n = 0usize;
    for v in breakdown.values() {
        if let Value::Number(num) = v {
            if let Some(x) = num.as_f64() {
                sum += x.clamp(0.0, 100.0);
                n += 1;
            }
        }
    }
    if n == 0 {
        return NEUTRAL_SENTIMENT;
    }
    let avg = sum / n as f64;
    round2((avg / 20.0 + 1.0).clamp(1.0, 5.0))
}

/// Per-post sentiment arrives as a number, a numeric string, or not at all.
/// Returns the clamped score plus whether the neutral fallback was used,
/// so the caller can log the degradation with its own context.
pub fn normalize_post_sentiment(raw: Option<&Value>) -> (f64, bool) {
    match raw.and_then(lenient_f64) {
        Some(x) => (round2(x.clamp(1.0, 5.0)), false),
        None => (NEUTRAL_SENTIMENT, true),
    }
}

/// Numeric coercion used across the wire DTOs: JSON numbers pass through,
/// strings are parsed, anything else is rejected.
pub fn lenient_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
