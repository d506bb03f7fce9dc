//! Date-only serialization
//!
//! Some wire formats carry timestamps as plain `YYYY-MM-DD` dates. Annotate
//! a `DateTime<Utc>` field with `#[serde(with = "svckit::dates::date_only")]`
//! to use that format; deserialized values land at midnight UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Wire format for date-only fields
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// serde adapter for `DateTime<Utc>` fields serialized as `YYYY-MM-DD`
pub mod date_only {
    use super::{DateTime, NaiveDate, NaiveTime, Utc, DATE_FORMAT};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let date = NaiveDate::parse_from_str(&raw, DATE_FORMAT)
            .map_err(serde::de::Error::custom)?;
        Ok(date.and_time(NaiveTime::MIN).and_utc())
    }
}
