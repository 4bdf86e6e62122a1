//! Timestamp parsing, normalisation and display-zone conversion.
//!
//! The remote API ships timestamps as ISO-8601 strings (with `Z` or a
//! numeric offset, fractional seconds optional) and calendar days as bare
//! `YYYY-MM-DD` strings. Storage always uses UTC ISO-8601 so that validity
//! checks and range filters can compare lexicographically; display goes
//! through a configurable zone.
//!
//! ## Display zone resolution
//!
//! Programmatic setting > `GRIDCACHE_TZ` environment variable > the process
//! local zone. Accepted forms: an IANA name (`Europe/Madrid`), a numeric
//! offset (`+02:00`, `-5`), or the keywords `utc` / `local` / `system`.
//! Named zones go through `chrono-tz` and therefore survive DST; numeric
//! offsets are literal fixed deltas.

use crate::libs::messages::Message;
use crate::msg_error_anyhow;
use anyhow::Result;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use std::env;
use std::str::FromStr;

/// Environment variable consulted when no zone is configured explicitly.
pub const TZ_ENV_VAR: &str = "GRIDCACHE_TZ";

/// Storage format for instants: second precision, always UTC.
pub const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Marker written into `expires_at` on explicit invalidation.
pub const EPOCH: &str = "1970-01-01T00:00:00Z";

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// The zone used when rendering instants for humans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayZone {
    /// No conversion: display in UTC.
    Utc,
    /// The process-local zone.
    Local,
    /// An IANA zone, DST-aware.
    Named(Tz),
    /// A literal fixed offset.
    Fixed(FixedOffset),
}

impl FromStr for DisplayZone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "utc" => return Ok(Self::Utc),
            "local" | "system" => return Ok(Self::Local),
            _ => {}
        }
        if let Some(offset) = parse_offset(trimmed) {
            return Ok(Self::Fixed(offset));
        }
        if let Ok(tz) = trimmed.parse::<Tz>() {
            return Ok(Self::Named(tz));
        }
        Err(msg_error_anyhow!(Message::InvalidTimezone(trimmed.to_string())))
    }
}

/// Parses `+HH:MM`, `+HHMM`, `+HH` or a bare signed hour count.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1i32, &s[1..]),
        b'-' => (-1i32, &s[1..]),
        b'0'..=b'9' => (1i32, s),
        _ => return None,
    };
    let (hours, minutes) = if let Some((h, m)) = rest.split_once(':') {
        (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
    } else if rest.len() == 4 {
        (rest[..2].parse::<i32>().ok()?, rest[2..].parse::<i32>().ok()?)
    } else {
        (rest.parse::<i32>().ok()?, 0)
    };
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Converts between wire timestamps, stored UTC strings and display time.
#[derive(Debug, Clone, Copy)]
pub struct Timestamps {
    zone: DisplayZone,
}

impl Default for Timestamps {
    fn default() -> Self {
        Self { zone: DisplayZone::Local }
    }
}

impl Timestamps {
    pub fn new(zone: DisplayZone) -> Self {
        Self { zone }
    }

    /// Resolves the display zone: explicit setting first, then the
    /// `GRIDCACHE_TZ` environment variable, then the process-local zone.
    pub fn from_setting(setting: Option<&str>) -> Result<Self> {
        if let Some(s) = setting {
            return Ok(Self::new(s.parse()?));
        }
        if let Ok(s) = env::var(TZ_ENV_VAR) {
            return Ok(Self::new(s.parse()?));
        }
        Ok(Self::default())
    }

    pub fn zone(&self) -> DisplayZone {
        self.zone
    }

    /// Renders a stored UTC instant in the display zone.
    pub fn display(&self, dt: DateTime<Utc>) -> String {
        match self.zone {
            DisplayZone::Utc => dt.format(DISPLAY_FORMAT).to_string(),
            DisplayZone::Local => dt.with_timezone(&Local).format(DISPLAY_FORMAT).to_string(),
            DisplayZone::Named(tz) => dt.with_timezone(&tz).format(DISPLAY_FORMAT).to_string(),
            DisplayZone::Fixed(offset) => dt.with_timezone(&offset).format(DISPLAY_FORMAT).to_string(),
        }
    }

    /// Display form for a wire value: a timestamp string or a date hash.
    ///
    /// Date-only inputs come back untouched; anything carrying a time
    /// component is converted to the display zone. A `{date, include_time}`
    /// hash with `include_time = false` is only trusted when the UTC time is
    /// exactly midnight: the remote API is known to mislabel timed ranges as
    /// date-only, and a non-midnight time is the tell.
    pub fn to_display(&self, value: &Value) -> Option<String> {
        match value {
            Value::String(s) => {
                if is_date_only(s) {
                    Some(s.clone())
                } else {
                    parse_timestamp(s).map(|dt| self.display(dt))
                }
            }
            Value::Object(map) => {
                let date = map.get("date").and_then(Value::as_str)?;
                if is_date_only(date) {
                    return Some(date.to_string());
                }
                let dt = parse_timestamp(date)?;
                let include_time = map.get("include_time").and_then(Value::as_bool).unwrap_or(true);
                if !include_time && dt.time() == NaiveTime::MIN {
                    Some(dt.format("%Y-%m-%d").to_string())
                } else {
                    Some(self.display(dt))
                }
            }
            _ => None,
        }
    }
}

/// Recognises full ISO-8601 datetimes and bare dates.
pub fn is_timestamp(s: &str) -> bool {
    is_date_only(s) || parse_timestamp(s).is_some()
}

/// Recognises bare `YYYY-MM-DD` strings.
pub fn is_date_only(s: &str) -> bool {
    s.len() == 10 && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Parses an ISO-8601 datetime into a UTC instant.
///
/// Accepts `Z`, `±HH:MM`, `±HHMM` and `±HH` offsets, with optional
/// fractional seconds. A datetime without any offset is taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    None
}

/// Normalises a wire timestamp to the stored UTC form.
///
/// Bare dates become midnight UTC. Returns `None` when the input parses as
/// neither shape; callers decide between "keep the original" and "null".
pub fn normalise(s: &str) -> Option<String> {
    if is_date_only(s) {
        return Some(format!("{}T00:00:00Z", s));
    }
    parse_timestamp(s).map(|dt| dt.format(STORAGE_FORMAT).to_string())
}

/// The inclusive UTC bounds of a calendar day, for date-only equality.
pub fn day_bounds(date: &str) -> Option<(String, String)> {
    if !is_date_only(date) {
        return None;
    }
    Some((format!("{}T00:00:00Z", date), format!("{}T23:59:59Z", date)))
}

/// The current instant in stored form.
pub fn now() -> String {
    Utc::now().format(STORAGE_FORMAT).to_string()
}

/// Parses a stored UTC string back into an instant.
pub fn parse_stored(s: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recognises_wire_shapes() {
        assert!(is_timestamp("2025-03-10T14:30:00Z"));
        assert!(is_timestamp("2025-03-10T14:30:00.250+02:00"));
        assert!(is_timestamp("2025-03-10T14:30:00+0200"));
        assert!(is_timestamp("2025-03-10"));
        assert!(!is_timestamp("10/03/2025"));
        assert!(is_date_only("2025-03-10"));
        assert!(!is_date_only("2025-03-10T00:00:00Z"));
    }

    #[test]
    fn normalises_to_utc() {
        assert_eq!(normalise("2025-03-10T14:30:00+02:00").unwrap(), "2025-03-10T12:30:00Z");
        assert_eq!(normalise("2025-03-10").unwrap(), "2025-03-10T00:00:00Z");
        assert_eq!(normalise("not a date"), None);
    }

    #[test]
    fn day_bounds_span_the_whole_day() {
        let (from, to) = day_bounds("2025-03-10").unwrap();
        assert_eq!(from, "2025-03-10T00:00:00Z");
        assert_eq!(to, "2025-03-10T23:59:59Z");
        assert_eq!(day_bounds("2025-03-10T10:00:00Z"), None);
    }

    #[test]
    fn zone_strings_parse() {
        assert_eq!("utc".parse::<DisplayZone>().unwrap(), DisplayZone::Utc);
        assert_eq!("system".parse::<DisplayZone>().unwrap(), DisplayZone::Local);
        assert!(matches!("Europe/Madrid".parse::<DisplayZone>().unwrap(), DisplayZone::Named(_)));
        assert!(matches!("+05:30".parse::<DisplayZone>().unwrap(), DisplayZone::Fixed(_)));
        assert!("Mars/Olympus".parse::<DisplayZone>().is_err());
    }

    #[test]
    fn display_converts_named_zones() {
        let ts = Timestamps::new("Europe/Madrid".parse().unwrap());
        let dt = parse_timestamp("2025-01-15T12:00:00Z").unwrap();
        // Madrid is UTC+1 in January
        assert_eq!(ts.display(dt), "2025-01-15 13:00");
    }

    #[test]
    fn date_hash_midnight_heuristic() {
        let ts = Timestamps::new(DisplayZone::Utc);

        // include_time=false at exact midnight: date-only
        let hash = json!({"date": "2025-03-10T00:00:00Z", "include_time": false});
        assert_eq!(ts.to_display(&hash).unwrap(), "2025-03-10");

        // include_time=false but a real time: the flag is wrong, keep the time
        let hash = json!({"date": "2025-03-10T09:30:00Z", "include_time": false});
        assert_eq!(ts.to_display(&hash).unwrap(), "2025-03-10 09:30");

        // plain date strings pass through untouched
        assert_eq!(ts.to_display(&json!("2025-03-10")).unwrap(), "2025-03-10");
    }
}
