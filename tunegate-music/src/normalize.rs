//! Field normalisation shared by the provider dialects
//!
//! Upstreams disagree on how they spell durations, pay status and artwork.
//! These helpers turn each spelling into the canonical value.

use serde::Deserialize;
use tunegate_common::models::Fee;

/// Duration as an upstream may spell it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDuration {
    Seconds(u64),
    FractionalSeconds(f64),
    Text(String),
}

impl RawDuration {
    /// Milliseconds; anything unreadable is 0
    pub fn to_millis(&self) -> u64 {
        match self {
            RawDuration::Seconds(secs) => secs.saturating_mul(1000),
            RawDuration::FractionalSeconds(secs) if secs.is_finite() && *secs > 0.0 => {
                (secs * 1000.0).round() as u64
            }
            RawDuration::FractionalSeconds(_) => 0,
            RawDuration::Text(text) => parse_duration_text(text),
        }
    }

    /// The value as a whole number in the upstream's own unit; unreadable is 0
    pub fn whole_units(&self) -> u64 {
        match self {
            RawDuration::Seconds(n) => *n,
            RawDuration::FractionalSeconds(n) if n.is_finite() && *n > 0.0 => n.round() as u64,
            RawDuration::FractionalSeconds(_) => 0,
            RawDuration::Text(text) => text.trim().parse().unwrap_or(0),
        }
    }
}

/// Parse a duration string into milliseconds
///
/// Accepts the localized `"M分S秒"` form (anywhere in the string) or a plain
/// integer number of seconds. Returns 0 when neither matches.
pub fn parse_duration_text(text: &str) -> u64 {
    if let Some((minutes, seconds)) = find_minutes_seconds(text) {
        let total_secs = minutes.saturating_mul(60).saturating_add(seconds);
        return total_secs.saturating_mul(1000);
    }

    text.trim()
        .parse::<u64>()
        .map(|secs| secs.saturating_mul(1000))
        .unwrap_or(0)
}

/// First `<digits>分<digits>秒` occurrence
fn find_minutes_seconds(text: &str) -> Option<(u64, u64)> {
    for (pos, _) in text.match_indices('分') {
        let before = &text[..pos];
        let minute_digits = trailing_digits(before);
        if minute_digits.is_empty() {
            continue;
        }

        let after = &text[pos + '分'.len_utf8()..];
        let second_digits = leading_digits(after);
        if second_digits.is_empty() || !after[second_digits.len()..].starts_with('秒') {
            continue;
        }

        let minutes = minute_digits.parse().ok()?;
        let seconds = second_digits.parse().ok()?;
        return Some((minutes, seconds));
    }
    None
}

fn leading_digits(s: &str) -> &str {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    &s[..end]
}

fn trailing_digits(s: &str) -> &str {
    let start = s
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + s[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);
    &s[start..]
}

/// Map a pay-status label to a fee: free only on an exact label match
pub fn fee_from_label(pay_status: Option<&str>, free_label: &str) -> Fee {
    match pay_status {
        Some(label) if label == free_label => Fee::Free,
        _ => Fee::Paid,
    }
}

/// Map a numeric fee code (0 = free) to a fee
pub fn fee_from_code(code: Option<i64>) -> Fee {
    match code {
        None | Some(0) => Fee::Free,
        Some(_) => Fee::Paid,
    }
}

/// Rewrite an `http://` URL to `https://` when `force` is set
pub fn upgrade_https(url: &str, force: bool) -> String {
    match url.strip_prefix("http://") {
        Some(rest) if force => format!("https://{}", rest),
        _ => url.to_string(),
    }
}

/// Build the constructed fallback URL for an identifier
///
/// The identifier is percent-encoded before substitution so the result stays a
/// syntactically valid URL for any input.
pub fn fallback_url(template: &str, id: &str) -> String {
    template.replace("{id}", &urlencoding::encode(id))
}

/// Album art from an album identifier, empty when the identifier is missing
pub fn art_from_template(template: &str, album_mid: Option<&str>) -> String {
    match album_mid.map(str::trim) {
        Some(mid) if !mid.is_empty() => template.replace("{album_mid}", mid),
        _ => String::new(),
    }
}
