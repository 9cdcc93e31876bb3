//! Human-readable durations such as `"30s"`, `"500ms"`, `"1.5m"` or `"2h"`.

use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a duration string.
///
/// Accepted suffixes are `ms`, `s`, `m` and `h`; seconds, minutes and hours
/// may be fractional. A bare integer is read as milliseconds. Values that do
/// not fit a [`Duration`] are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    let (number, unit_secs) = if let Some(v) = s.strip_suffix('s') {
        (v, 1)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60)
    } else if let Some(v) = s.strip_suffix('h') {
        (v, 3600)
    } else {
        return s.parse::<u64>().ok().map(Duration::from_millis);
    };
    parse_decimal(number.trim(), unit_secs * NANOS_PER_SEC)
}

/// `whole[.fraction]` times `unit_nanos`, in exact integer arithmetic.
/// Fraction digits finer than a nanosecond are dropped.
fn parse_decimal(number: &str, unit_nanos: u128) -> Option<Duration> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit_nanos)?;
    let mut place = unit_nanos;
    for digit in fraction.bytes() {
        place /= 10;
        nanos = nanos.checked_add(u128::from(digit - b'0') * place)?;
    }

    let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
    let subsec = u32::try_from(nanos % NANOS_PER_SEC).ok()?;
    Some(Duration::new(secs, subsec))
}

/// Render a duration in the shortest form [`parse_duration`] reads back
/// exactly.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.subsec_nanos();
    if nanos == 0 {
        format!("{}s", d.as_secs())
    } else if nanos % 1_000_000 == 0 {
        format!("{}ms", d.as_millis())
    } else {
        let fraction = format!("{nanos:09}");
        format!("{}.{}s", d.as_secs(), fraction.trim_end_matches('0'))
    }
}

/// Serde adapter storing a [`Duration`] as a duration string.
///
/// Deserialization also accepts a plain integer number of milliseconds.
pub mod serde_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(u64),
    }

    pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
            Raw::Text(s) => super::parse_duration(&s).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid duration '{s}'"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_milliseconds() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
    }

    #[test]
    fn parse_seconds_and_fractions() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn parse_minutes_and_hours() {
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn parse_bare_number_is_millis() {
        assert_eq!(parse_duration("250"), Some(Duration::from_millis(250)));
    }

    #[test]
    fn parse_tolerates_whitespace() {
        assert_eq!(parse_duration("  10s "), Some(Duration::from_secs(10)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("fast"), None);
        assert_eq!(parse_duration("-3s"), None);
        assert_eq!(parse_duration("1.5ms"), None);
        assert_eq!(parse_duration("1e3s"), None);
        assert_eq!(parse_duration("."), None);
    }

    #[test]
    fn parse_rejects_values_too_large_for_duration() {
        assert_eq!(parse_duration("1e30s"), None);
        assert_eq!(parse_duration("1e30h"), None);
        assert_eq!(parse_duration("99999999999999999999999h"), None);
        assert_eq!(parse_duration("18446744073709551616s"), None);
        assert_eq!(
            parse_duration("18446744073709551615s"),
            Some(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn parse_fractions_exactly() {
        assert_eq!(parse_duration("1.0005s"), Some(Duration::from_micros(1_000_500)));
        assert_eq!(parse_duration(".5m"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("0.1h"), Some(Duration::from_secs(360)));
        assert_eq!(parse_duration("1.0000000009s"), Some(Duration::from_secs(1)));
    }

    #[test]
    fn format_prefers_whole_seconds() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn format_keeps_sub_millisecond_precision() {
        for d in [
            Duration::from_micros(1_000_500),
            Duration::from_nanos(1),
            Duration::new(90, 123_456_789),
        ] {
            let text = format_duration(d);
            assert_eq!(parse_duration(&text), Some(d), "{text} did not read back");
        }
        assert_eq!(format_duration(Duration::from_micros(1_000_500)), "1.0005s");
    }

    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    struct Wrapper {
        #[serde(with = "serde_str")]
        d: Duration,
    }

    #[test]
    fn serde_reads_string_and_integer_forms() {
        let a: Wrapper = serde_json::from_str(r#"{"d":"30s"}"#).unwrap();
        assert_eq!(a.d, Duration::from_secs(30));
        let b: Wrapper = serde_json::from_str(r#"{"d":750}"#).unwrap();
        assert_eq!(b.d, Duration::from_millis(750));
        assert_eq!(serde_json::to_string(&a).unwrap(), r#"{"d":"30s"}"#);
    }

    #[test]
    fn serde_rejects_invalid_string() {
        let err = serde_json::from_str::<Wrapper>(r#"{"d":"soon"}"#).unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }
}
