//! Human-readable duration formatting and parsing utilities

use serde::{Deserialize, Serialize, Serializer};
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

    #[error("Negative duration: {0}")]
    Negative(i64),
}

/// Duration wrapper with human-readable parsing ("30s", "500ms", "2m")
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_human_readable(&self) -> String {
        const UNITS: &[(&str, u128)] = &[
            ("h", 3_600_000),
            ("m", 60_000),
            ("s", 1_000),
        ];

        let millis = self.0.as_millis();
        for &(unit, divisor) in UNITS {
            if millis >= divisor && millis % divisor == 0 {
                return format!("{}{}", millis / divisor, unit);
            }
        }

        format!("{}ms", millis)
    }
}

impl From<Duration> for HumanDuration {
    fn from(value: Duration) -> Self {
        Self(value)
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
        S: Serializer,
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
                formatter.write_str("a duration as string (e.g., \"5s\", \"250ms\") or integer seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(HumanDuration::from_secs(v))
            }

            // TOML integers and env values parsed by `config` arrive as i64
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(HumanDuration::from_secs)
                    .map_err(|_| serde::de::Error::custom(ParseError::Negative(v)))
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

        // Bare numbers are seconds
        if let Ok(num) = s.parse::<u64>() {
            return Ok(HumanDuration::from_secs(num));
        }

        let (num_str, unit) = if let Some(pos) = s.find(|c: char| !c.is_ascii_digit()) {
            (&s[..pos], &s[pos..])
        } else {
            return Err(ParseError::InvalidFormat(s.to_string()));
        };

        if num_str.is_empty() {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }

        let num: u64 = num_str.parse()?;

        let duration = match unit.trim() {
            "ms" => Duration::from_millis(num),
            "s" | "sec" | "secs" => Duration::from_secs(num),
            "m" | "min" | "mins" => Duration::from_secs(num * 60),
            "h" | "hr" | "hrs" => Duration::from_secs(num * 3600),
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };

        Ok(HumanDuration(duration))
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
    fn test_parse_seconds() {
        assert_eq!("30".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(30));
        assert_eq!("30s".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(30));
        assert_eq!("5 secs".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(5));
    }

    #[test]
    fn test_parse_millis_and_minutes() {
        assert_eq!("250ms".parse::<HumanDuration>().unwrap(), HumanDuration::from_millis(250));
        assert_eq!("2m".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(120));
        assert_eq!("1H".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(3600));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!("5 fortnights".parse::<HumanDuration>(), Err(ParseError::InvalidUnit(_))));
        assert!(matches!("ms".parse::<HumanDuration>(), Err(ParseError::InvalidFormat(_))));
    }

    #[test]
    fn test_to_human_readable() {
        assert_eq!(HumanDuration::from_secs(5).to_human_readable(), "5s");
        assert_eq!(HumanDuration::from_secs(120).to_human_readable(), "2m");
        assert_eq!(HumanDuration::from_millis(1500).to_human_readable(), "1500ms");
    }

    #[test]
    fn test_deserialize_string() {
        let json = r#"{"every": "3s"}"#;
        #[derive(Deserialize)]
        struct TestStruct {
            every: HumanDuration,
        }
        let parsed: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.every.as_duration(), Duration::from_secs(3));
    }

    #[test]
    fn test_deserialize_number() {
        #[derive(Deserialize)]
        struct TestStruct {
            every: HumanDuration,
        }
        let parsed: TestStruct = toml::from_str("every = 7").unwrap();
        assert_eq!(parsed.every.as_duration(), Duration::from_secs(7));

        let negative: Result<TestStruct, _> = toml::from_str("every = -1");
        assert!(negative.is_err());
    }
}
