use chrono::{DateTime, Local, Utc};

/// Current instant rendered as both a local-tz and a UTC ISO-8601 string,
/// matching the pair the Jellyfin Client normalization rules emit (spec §4.B).
pub struct TimestampPair {
    pub local: String,
    pub utc: String,
}

pub fn now_pair() -> TimestampPair {
    TimestampPair {
        local: Local::now().to_rfc3339(),
        utc: Utc::now().to_rfc3339(),
    }
}

pub fn utc_now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Parses an upstream ISO-8601 timestamp, falling back to `None` rather than
/// failing the whole conversion (spec §4.B: conversion failures are non-fatal).
pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Formats a `RunTimeTicks` duration (10,000 ticks = 1ms) as `HH:MM:SS`.
pub fn ticks_to_hhmmss(ticks: i64) -> String {
    let total_ms = ticks / 10_000;
    let total_secs = total_ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Renders a UUID without hyphens (as Jellyfin commonly sends item ids) back
/// into the standard 8-4-4-4-12 hyphenated form.
pub fn hyphenate_uuid(raw: &str) -> String {
    if raw.len() != 32 || raw.contains('-') {
        return raw.to_string();
    }
    format!(
        "{}-{}-{}-{}-{}",
        &raw[0..8],
        &raw[8..12],
        &raw[12..16],
        &raw[16..20],
        &raw[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_to_hhmmss_formats_correctly() {
        // 1 hour, 2 minutes, 3 seconds = 3723s = 37_230_000_000 ticks
        assert_eq!(ticks_to_hhmmss(37_230_000_000), "01:02:03");
    }

    #[test]
    fn hyphenate_uuid_inserts_dashes() {
        let raw = "0123456789abcdef0123456789abcdef";
        assert_eq!(hyphenate_uuid(raw), "01234567-89ab-cdef-0123-456789abcdef");
    }

    #[test]
    fn hyphenate_uuid_passthrough_if_already_hyphenated() {
        let already = "01234567-89ab-cdef-0123-456789abcdef";
        assert_eq!(hyphenate_uuid(already), already);
    }
}
