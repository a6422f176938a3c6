//! Human-readable sizes and durations for configuration values
//!
//! Both types deserialize from either a string with a unit suffix
//! (`"20MB"`, `"30m"`) or a plain integer (bytes / seconds).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Value out of range: {0}")]
    Overflow(String),
}

/// Splits `"20MB"` into `(20, "MB")`. Unit is upper-cased and trimmed.
fn split_unit(raw: &str) -> Result<(u64, String), ParseError> {
    let s = raw.trim();
    let pos = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    if pos == 0 {
        return Err(ParseError::InvalidFormat(raw.to_string()));
    }

    let num: u64 = s[..pos].parse()?;
    Ok((num, s[pos..].trim().to_uppercase()))
}

/// Byte size wrapper with human-readable parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const fn mib(n: u64) -> Self {
        ByteSize(n * 1024 * 1024)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Saturates on 32-bit targets.
    pub fn as_usize(&self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, unit) = split_unit(s)?;

        let multiplier: u64 = match unit.as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => 1024,
            "M" | "MB" | "MIB" => 1024 * 1024,
            "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
            _ => return Err(ParseError::InvalidUnit(unit)),
        };

        num.checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ParseError::Overflow(s.to_string()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(&str, u64); 3] = [
            ("GB", 1024 * 1024 * 1024),
            ("MB", 1024 * 1024),
            ("KB", 1024),
        ];

        for (unit, divisor) in UNITS {
            if self.0 >= divisor && self.0 % divisor == 0 {
                return write!(f, "{}{}", self.0 / divisor, unit);
            }
        }
        write!(f, "{}B", self.0)
    }
}

/// Duration with human-readable parsing (`"500ms"`, `"20s"`, `"30m"`, `"1h"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub const fn secs(n: u64) -> Self {
        HumanDuration(Duration::from_secs(n))
    }

    pub const fn mins(n: u64) -> Self {
        HumanDuration(Duration::from_secs(n * 60))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for HumanDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, unit) = split_unit(s)?;

        let duration = match unit.as_str() {
            "MS" => Duration::from_millis(num),
            "" | "S" => Duration::from_secs(num),
            "M" => Duration::from_secs(num.saturating_mul(60)),
            "H" => Duration::from_secs(num.saturating_mul(3600)),
            _ => return Err(ParseError::InvalidUnit(unit)),
        };

        Ok(HumanDuration(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis();
        if millis % 1000 != 0 {
            return write!(f, "{}ms", millis);
        }

        let secs = self.0.as_secs();
        if secs != 0 && secs % 3600 == 0 {
            write!(f, "{}h", secs / 3600)
        } else if secs != 0 && secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{}s", secs)
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Shared visitor: integers are taken as the base unit, strings are parsed.
struct HumanVisitor<T>(std::marker::PhantomData<T>);

impl<'de, T> serde::de::Visitor<'de> for HumanVisitor<T>
where
    T: FromStr<Err = ParseError> + From<u64>,
{
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an integer or a string with a unit suffix (e.g. \"20MB\", \"30m\")")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(T::from(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        u64::try_from(v)
            .map(T::from)
            .map_err(|_| E::custom(format!("negative value: {v}")))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.parse::<T>().map_err(E::custom)
    }
}

impl From<u64> for ByteSize {
    fn from(value: u64) -> Self {
        ByteSize(value)
    }
}

impl From<u64> for HumanDuration {
    fn from(value: u64) -> Self {
        HumanDuration(Duration::from_secs(value))
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(HumanVisitor(std::marker::PhantomData))
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(HumanVisitor(std::marker::PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_byte_sizes() {
        assert_eq!("1024".parse::<ByteSize>().unwrap().as_u64(), 1024);
        assert_eq!("16KB".parse::<ByteSize>().unwrap().as_u64(), 16 * 1024);
        assert_eq!("20MB".parse::<ByteSize>().unwrap(), ByteSize::mib(20));
        assert_eq!("10 mib".parse::<ByteSize>().unwrap(), ByteSize::mib(10));
        assert!("MB".parse::<ByteSize>().is_err());
        assert!("5PB".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_parse_durations() {
        assert_eq!("20s".parse::<HumanDuration>().unwrap(), HumanDuration::secs(20));
        assert_eq!("30m".parse::<HumanDuration>().unwrap(), HumanDuration::mins(30));
        assert_eq!("1h".parse::<HumanDuration>().unwrap(), HumanDuration::secs(3600));
        assert_eq!(
            "250ms".parse::<HumanDuration>().unwrap().as_duration(),
            Duration::from_millis(250)
        );
        assert_eq!("45".parse::<HumanDuration>().unwrap(), HumanDuration::secs(45));
        assert!("10d".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ByteSize::mib(20).to_string(), "20MB");
        assert_eq!(ByteSize(1500).to_string(), "1500B");
        assert_eq!(HumanDuration::mins(30).to_string(), "30m");
        assert_eq!(HumanDuration::secs(3600).to_string(), "1h");
        assert_eq!(HumanDuration::secs(20).to_string(), "20s");
        assert_eq!(HumanDuration(Duration::from_millis(250)).to_string(), "250ms");
    }

    #[test]
    fn test_deserialize_string_and_number() {
        #[derive(Deserialize)]
        struct Limits {
            size: ByteSize,
            every: HumanDuration,
        }

        let parsed: Limits = serde_json::from_str(r#"{"size": "20MB", "every": "20s"}"#).unwrap();
        assert_eq!(parsed.size, ByteSize::mib(20));
        assert_eq!(parsed.every, HumanDuration::secs(20));

        let parsed: Limits = serde_json::from_str(r#"{"size": 4096, "every": 90}"#).unwrap();
        assert_eq!(parsed.size.as_u64(), 4096);
        assert_eq!(parsed.every, HumanDuration::secs(90));
    }
}
