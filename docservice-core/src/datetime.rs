//! UTC-normalized timestamps.
//!
//! [`UtcDateTime`] is strict: a value without offset information is assumed to be UTC
//! and stamped as such, a UTC value is kept as is, and any other offset is rejected.
//! Non-UTC values are never converted; callers normalize them first.

use bson::{Bson, DateTime as BsonDateTime};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as DeError};
use std::{fmt, ops::Deref, str::FromStr};

use crate::error::ValidationError;

/// Formats tried, in order, for values that carry an offset.
///
/// `%#z` accepts `Z`, `+HH`, `+HHMM` and `+HH:MM`.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M%#z",
];

/// Formats tried, in order, for values without offset information.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Numeric timestamps above this magnitude are read as milliseconds.
const MS_WATERSHED: f64 = 2e10;

/// A date-time that is guaranteed to be in UTC.
///
/// # Example
///
/// ```ignore
/// use docservice::datetime::UtcDateTime;
///
/// let stamped = UtcDateTime::parse("2024-01-01T00:00:00")?;
/// assert_eq!(stamped.to_rfc3339(), "2024-01-01T00:00:00+00:00");
///
/// assert!(UtcDateTime::parse("2024-01-01T00:00:00+05:00").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(DateTime<Utc>);

impl UtcDateTime {
    /// Returns the current time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parses a date-time and enforces the UTC policy.
    ///
    /// Accepts RFC 3339 / ISO 8601 values (`T` or space separator, minute or second
    /// precision, optional fractional seconds, optional `Z` or `±HH[[:]MM]` offset) and
    /// finite Unix timestamps in seconds or milliseconds.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidDateTime`] if `raw` is not a recognizable date-time.
    /// - [`ValidationError::NonUtcTimezone`] if `raw` carries a non-UTC offset.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();

        if let Ok(number) = trimmed.parse::<f64>() {
            return Self::from_timestamp(number);
        }

        if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
            return Self::try_from(parsed);
        }

        let with_offset = match trimmed.strip_suffix(['Z', 'z']) {
            Some(utc) => format!("{utc}+00:00"),
            None => trimmed.to_string(),
        };
        for format in OFFSET_FORMATS {
            if let Ok(parsed) = DateTime::parse_from_str(&with_offset, format) {
                return Self::try_from(parsed);
            }
        }

        for format in NAIVE_FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self::from(parsed));
            }
        }

        Err(ValidationError::InvalidDateTime(raw.to_string()))
    }

    /// Builds a value from a Unix timestamp in seconds, or milliseconds above `2e10`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidDateTime`] if the value is not finite or out of range.
    pub fn from_timestamp(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::InvalidDateTime(value.to_string()));
        }

        let seconds = if value.abs() > MS_WATERSHED { value / 1000.0 } else { value };
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * 1e9).round() as u32;

        DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidDateTime(value.to_string()))
    }

    /// Returns the wrapped chrono value.
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }

    /// Converts to the store-native datetime (millisecond precision).
    pub fn to_bson_datetime(&self) -> BsonDateTime {
        BsonDateTime::from_chrono(self.0)
    }
}

impl Deref for UtcDateTime {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for UtcDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

impl FromStr for UtcDateTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DateTime<Utc>> for UtcDateTime {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl From<NaiveDateTime> for UtcDateTime {
    fn from(value: NaiveDateTime) -> Self {
        Self(Utc.from_utc_datetime(&value))
    }
}

impl TryFrom<DateTime<FixedOffset>> for UtcDateTime {
    type Error = ValidationError;

    fn try_from(value: DateTime<FixedOffset>) -> Result<Self, Self::Error> {
        if value.offset().local_minus_utc() != 0 {
            return Err(ValidationError::NonUtcTimezone(value.to_rfc3339()));
        }

        Ok(Self(value.with_timezone(&Utc)))
    }
}

impl From<BsonDateTime> for UtcDateTime {
    fn from(value: BsonDateTime) -> Self {
        Self(value.to_chrono())
    }
}

impl From<UtcDateTime> for DateTime<Utc> {
    fn from(value: UtcDateTime) -> Self {
        value.0
    }
}

impl From<UtcDateTime> for Bson {
    fn from(value: UtcDateTime) -> Self {
        Bson::DateTime(value.to_bson_datetime())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_bson_datetime().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Bson::deserialize(deserializer)? {
            Bson::DateTime(value) => Ok(Self::from(value)),
            Bson::String(value) => Self::parse(&value).map_err(D::Error::custom),
            Bson::Int32(value) => Self::from_timestamp(value as f64).map_err(D::Error::custom),
            Bson::Int64(value) => Self::from_timestamp(value as f64).map_err(D::Error::custom),
            Bson::Double(value) => Self::from_timestamp(value).map_err(D::Error::custom),
            other => Err(D::Error::custom(ValidationError::InvalidDateTime(other.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn naive_values_are_stamped_utc() {
        let value = UtcDateTime::parse("2024-01-01T00:00:00").unwrap();

        assert_eq!(value.offset().to_string(), "UTC");
        assert_eq!((value.year(), value.month(), value.day()), (2024, 1, 1));
        assert_eq!((value.hour(), value.minute(), value.second()), (0, 0, 0));
    }

    #[test]
    fn naive_chrono_values_keep_wall_clock() {
        let naive = NaiveDateTime::parse_from_str("2023-06-15 13:45:10", "%Y-%m-%d %H:%M:%S").unwrap();
        let value = UtcDateTime::from(naive);

        assert_eq!(value.naive_utc(), naive);
    }

    #[test]
    fn utc_values_are_unchanged() {
        let original = DateTime::parse_from_rfc3339("2024-03-05T10:11:12.345678Z").unwrap();
        let value = UtcDateTime::try_from(original).unwrap();

        assert_eq!(*value, original.with_timezone(&Utc));
        assert_eq!(UtcDateTime::parse("2024-03-05T10:11:12.345678+00:00").unwrap(), value);
        assert_eq!(UtcDateTime::parse("2024-03-05 10:11:12.345678+00:00").unwrap(), value);
    }

    #[test]
    fn non_utc_offsets_are_rejected() {
        for raw in [
            "2024-01-01T00:00:00+05:00",
            "2024-01-01 00:00:00-03:30",
            "2024-01-01T00:00:00+0100",
            "2024-01-01T00:00:00+05",
            "2024-01-01T00:00+05:00",
            "2024-01-01 00:00-0800",
        ] {
            assert!(matches!(
                UtcDateTime::parse(raw),
                Err(ValidationError::NonUtcTimezone(_)),
            ));
        }
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            UtcDateTime::parse("yesterday-ish"),
            Err(ValidationError::InvalidDateTime(_)),
        ));
    }

    #[test]
    fn minute_precision_and_short_offsets() {
        let midnight = UtcDateTime::parse("2024-01-01T00:00:00").unwrap();

        for raw in ["2024-01-01T00:00Z", "2024-01-01 00:00+00:00", "2024-01-01T00:00:00+00", "2024-01-01T00:00-0000"] {
            assert_eq!(UtcDateTime::parse(raw).unwrap(), midnight, "{raw}");
        }
    }

    #[test]
    fn non_finite_numbers_are_invalid() {
        for raw in ["NaN", "inf", "-infinity"] {
            assert!(matches!(
                UtcDateTime::parse(raw),
                Err(ValidationError::InvalidDateTime(_)),
            ));
        }
        assert!(UtcDateTime::from_timestamp(f64::NAN).is_err());
    }

    #[test]
    fn timestamps_in_seconds_and_millis() {
        let seconds = UtcDateTime::parse("1704067200").unwrap();
        let millis = UtcDateTime::parse("1704067200000").unwrap();

        assert_eq!(seconds, millis);
        assert_eq!(seconds.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn deserializes_through_validation() {
        #[derive(Deserialize)]
        struct Holder {
            at: UtcDateTime,
        }

        let ok: Holder = serde_json::from_value(serde_json::json!({ "at": "2024-01-01T00:00:00" })).unwrap();
        assert_eq!(ok.at.to_rfc3339(), "2024-01-01T00:00:00+00:00");

        let rejected = serde_json::from_value::<Holder>(serde_json::json!({ "at": "2024-01-01T00:00:00+05:00" }));
        assert!(rejected.is_err());

        let native = bson::doc! { "at": BsonDateTime::from_millis(1_704_067_200_000) };
        let stored: Holder = bson::de::deserialize_from_document(native).unwrap();
        assert_eq!(stored.at, ok.at);
    }

    #[test]
    fn serializes_as_native_datetime() {
        let value = UtcDateTime::parse("2024-01-01T00:00:00Z").unwrap();

        assert_eq!(
            bson::ser::serialize_to_bson(&value).unwrap(),
            Bson::DateTime(BsonDateTime::from_millis(1_704_067_200_000)),
        );
    }
}
