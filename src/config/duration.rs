//! A Prometheus-style duration, e.g. `10s`, `500ms`, `1h30m`: wraps
//! `std::time::Duration` with a human-readable YAML representation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConfigDuration(pub Duration);

impl ConfigDuration {
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(Duration::ZERO)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[must_use]
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for ConfigDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl fmt::Display for ConfigDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_duration(self.0))
    }
}

fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }
    let total_ms = d.as_millis();
    if total_ms % 1000 != 0 {
        return format!("{total_ms}ms");
    }
    let total_secs = d.as_secs();
    if total_secs % 3600 == 0 {
        format!("{}h", total_secs / 3600)
    } else if total_secs % 60 == 0 {
        format!("{}m", total_secs / 60)
    } else {
        format!("{total_secs}s")
    }
}

/// Parses strings like `10s`, `500ms`, `2h`, `1h30m`, `0` into a [`Duration`].
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    static UNIT_RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = UNIT_RE
        .get_or_init(|| regex::Regex::new(r"(\d+)(ms|s|m|h|d|w|y)").unwrap_or_else(|_| unreachable!()));

    let mut total = Duration::ZERO;
    let mut pos = 0;
    let mut matched_any = false;
    for caps in re.captures_iter(s) {
        let whole = caps.get(0).ok_or("bad duration")?;
        if whole.start() != pos {
            return Err(format!("invalid duration {s:?}"));
        }
        pos = whole.end();
        matched_any = true;

        let amount: u64 = caps
            .get(1)
            .ok_or("bad duration")?
            .as_str()
            .parse()
            .map_err(|_| format!("invalid duration {s:?}"))?;
        let unit = caps.get(2).ok_or("bad duration")?.as_str();
        let unit_duration = match unit {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount * 60),
            "h" => Duration::from_secs(amount * 3600),
            "d" => Duration::from_secs(amount * 86400),
            "w" => Duration::from_secs(amount * 604_800),
            "y" => Duration::from_secs(amount * 31_536_000),
            _ => return Err(format!("unknown duration unit {unit:?}")),
        };
        total += unit_duration;
    }
    if !matched_any || pos != s.len() {
        return Err(format!("invalid duration {s:?}"));
    }
    Ok(total)
}

impl<'de> Deserialize<'de> for ConfigDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s)
            .map(ConfigDuration)
            .map_err(serde::de::Error::custom)
    }
}

impl Serialize for ConfigDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
