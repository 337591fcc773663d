use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ParsedValue, RawValue};

static RATIO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?[0-9]+(?:\.[0-9]+)?)\s*/\s*(-?[0-9]+(?:\.[0-9]+)?)").expect("ratio pattern")
});
static HOURS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-?[0-9]+(?:\.[0-9]+)?)\s*h").expect("hours pattern"));
static MINUTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-?[0-9]+)\s*m").expect("minutes pattern"));
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?[0-9]+(?:\.[0-9]+)?").expect("number pattern"));

/// Parses a bucket value into zero, one or two numeric readings.
///
/// Text is matched, in order, as a ratio (`130/90`), an hour/minute
/// duration in hours (`7h 30m`), or the first signed decimal it contains.
/// Nothing here fails: unusable input is [`ParsedValue::None`].
pub fn normalize_number(value: &RawValue) -> ParsedValue {
    match value {
        RawValue::Number(n) if n.is_finite() => ParsedValue::Single(*n),
        RawValue::Number(_) => ParsedValue::None,
        RawValue::Text(text) => normalize_text(text),
    }
}

fn normalize_text(text: &str) -> ParsedValue {
    let trimmed = text.trim().to_lowercase();
    if trimmed.is_empty() {
        return ParsedValue::None;
    }

    if let Some(caps) = RATIO.captures(&trimmed) {
        return match (capture_f64(&caps, 1), capture_f64(&caps, 2)) {
            (Some(first), Some(second)) => ParsedValue::Pair(first, second),
            _ => ParsedValue::None,
        };
    }

    let hours = HOURS.captures(&trimmed).and_then(|caps| capture_f64(&caps, 1));
    let minutes = MINUTES.captures(&trimmed).and_then(|caps| capture_f64(&caps, 1));
    if hours.is_some() || minutes.is_some() {
        let total = hours.unwrap_or(0.0) + minutes.unwrap_or(0.0) / 60.0;
        return finite(total);
    }

    NUMBER
        .find(&trimmed)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(finite)
        .unwrap_or(ParsedValue::None)
}

fn capture_f64(caps: &regex::Captures<'_>, index: usize) -> Option<f64> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

fn finite(value: f64) -> ParsedValue {
    if value.is_finite() {
        ParsedValue::Single(value)
    } else {
        ParsedValue::None
    }
}
