//! Human-readable duration formatting and parsing utilities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid duration format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),
}

/// Duration wrapper with human-readable parsing ("50us", "500ms", "10s", "1h")
///
/// Plain numbers are seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct HumanDuration(pub Duration);

const UNITS: &[(&str, u64)] = &[
    ("d", 86_400_000_000),
    ("h", 3_600_000_000),
    ("m", 60_000_000),
    ("s", 1_000_000),
    ("ms", 1_000),
    ("us", 1),
];

impl HumanDuration {
    pub fn from_secs(secs: u64) -> Self {
        HumanDuration(Duration::from_secs(secs))
    }

    pub fn from_millis(millis: u64) -> Self {
        HumanDuration(Duration::from_millis(millis))
    }

    pub fn from_micros(micros: u64) -> Self {
        HumanDuration(Duration::from_micros(micros))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// Largest unit that represents the value exactly.
    pub fn to_human_readable(&self) -> String {
        let micros = u64::try_from(self.0.as_micros()).unwrap_or(u64::MAX);
        if micros == 0 {
            return "0s".to_string();
        }
        for &(unit, size) in UNITS {
            if micros % size == 0 {
                return format!("{}{}", micros / size, unit);
            }
        }
        format!("{micros}us")
    }
}

impl From<HumanDuration> for Duration {
    fn from(value: HumanDuration) -> Self {
        value.0
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_human_readable())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct HumanDurationVisitor;

        impl<'de> serde::de::Visitor<'de> for HumanDurationVisitor {
            type Value = HumanDuration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a duration as string (e.g., \"500ms\", \"10s\") or seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(HumanDuration::from_secs(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(HumanDuration::from_secs)
                    .map_err(|_| E::custom(format!("negative duration: {v}")))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<HumanDuration>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(HumanDurationVisitor)
    }
}

impl FromStr for HumanDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        // Try to parse as plain number first
        if let Ok(secs) = s.parse::<u64>() {
            return Ok(HumanDuration::from_secs(secs));
        }

        // Parse with unit suffix
        let (num_str, unit) = if let Some(pos) = s.find(|c: char| !c.is_ascii_digit()) {
            (&s[..pos], s[pos..].trim())
        } else {
            return Err(ParseError::InvalidFormat(s.to_string()));
        };
        if num_str.is_empty() {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }

        let num: u64 = num_str.parse()?;

        let micros = match unit {
            "us" | "µs" => 1,
            "ms" => 1_000,
            "s" | "sec" => 1_000_000,
            "m" | "min" => 60_000_000,
            "h" => 3_600_000_000,
            "d" => 86_400_000_000,
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };

        Ok(HumanDuration(Duration::from_micros(num.saturating_mul(micros))))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_durations() {
        assert_eq!("10".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(10));
        assert_eq!("10s".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(10));
        assert_eq!("500ms".parse::<HumanDuration>().unwrap(), HumanDuration::from_millis(500));
        assert_eq!("50us".parse::<HumanDuration>().unwrap(), HumanDuration::from_micros(50));
        assert_eq!("2m".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(120));
        assert_eq!("1h".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(3600));
        assert_eq!("1D".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(86_400));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "10 parsecs".parse::<HumanDuration>(),
            Err(ParseError::InvalidUnit(_))
        ));
        assert!(matches!(
            "ms".parse::<HumanDuration>(),
            Err(ParseError::InvalidFormat(_))
        ));
        assert!("".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_human_readable() {
        assert_eq!(HumanDuration::from_secs(3600).to_string(), "1h");
        assert_eq!(HumanDuration::from_secs(90).to_string(), "90s");
        assert_eq!(HumanDuration::from_millis(2).to_string(), "2ms");
        assert_eq!(HumanDuration::from_micros(50).to_string(), "50us");
        assert_eq!(HumanDuration::default().to_string(), "0s");
    }

    #[test]
    fn test_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            a: HumanDuration,
            b: HumanDuration,
        }

        let parsed: Wrapper = toml::from_str("a = \"250ms\"\nb = 3").unwrap();
        assert_eq!(parsed.a, HumanDuration::from_millis(250));
        assert_eq!(parsed.b, HumanDuration::from_secs(3));
    }
}
