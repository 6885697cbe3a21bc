//! Date and datetime codecs (ISO-8601 canonical forms).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use common::SemanticType;
use serde_json::Value;

use super::{Codec, CodecError};

const DATE_FORMAT: &str = "%Y-%m-%d";
const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
/// `%Y` writes a sign for years outside 0000-9999, which RFC 3339 cannot carry.
const OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

/// Lenient layouts accepted for unencrypted legacy timestamps.
const LEGACY_OFFSET_FORMATS: &[&str] = &[
    OFFSET_FORMAT,
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];
const LEGACY_NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Codec for `date` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateCodec;

impl Codec for DateCodec {
    type Value = NaiveDate;

    fn supports(kind: SemanticType) -> bool {
        kind == SemanticType::Date
    }

    fn encode(value: &NaiveDate) -> String {
        value.format(DATE_FORMAT).to_string()
    }

    fn decode(canonical: &str) -> Result<NaiveDate, CodecError> {
        NaiveDate::parse_from_str(canonical, DATE_FORMAT).map_err(|_| CodecError::invalid("date"))
    }

    fn parse(raw: &str) -> Result<NaiveDate, CodecError> {
        let raw = raw.trim();
        Self::decode(raw).or_else(|_| DateTimeCodec::parse(raw).map(|dt| dt.date()))
    }

    fn from_native(value: &Value) -> Result<NaiveDate, CodecError> {
        match value {
            Value::String(s) => Self::parse(s),
            other => Err(CodecError::unsupported("date", other)),
        }
    }

    fn to_native(value: &NaiveDate) -> Value {
        Value::String(Self::encode(value))
    }
}

/// A datetime that may or may not carry a UTC offset.
///
/// The offset, when present, is part of the value and survives a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeValue {
    /// Wall-clock time without an offset.
    Naive(NaiveDateTime),
    /// Instant with its original offset.
    Offset(DateTime<FixedOffset>),
}

impl DateTimeValue {
    /// Calendar date in the value's own offset.
    pub fn date(&self) -> NaiveDate {
        match self {
            DateTimeValue::Naive(dt) => dt.date(),
            DateTimeValue::Offset(dt) => dt.date_naive(),
        }
    }

    /// The offset, if the value carries one.
    pub fn offset(&self) -> Option<FixedOffset> {
        match self {
            DateTimeValue::Naive(_) => None,
            DateTimeValue::Offset(dt) => Some(*dt.offset()),
        }
    }
}

impl From<NaiveDateTime> for DateTimeValue {
    fn from(dt: NaiveDateTime) -> Self {
        DateTimeValue::Naive(dt)
    }
}

impl From<DateTime<FixedOffset>> for DateTimeValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        DateTimeValue::Offset(dt)
    }
}

/// Codec for `datetime` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeCodec;

impl Codec for DateTimeCodec {
    type Value = DateTimeValue;

    fn supports(kind: SemanticType) -> bool {
        kind == SemanticType::DateTime
    }

    fn encode(value: &DateTimeValue) -> String {
        match value {
            DateTimeValue::Naive(dt) => dt.format(NAIVE_FORMAT).to_string(),
            DateTimeValue::Offset(dt) => dt.format(OFFSET_FORMAT).to_string(),
        }
    }

    fn decode(canonical: &str) -> Result<DateTimeValue, CodecError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(canonical) {
            return Ok(DateTimeValue::Offset(dt));
        }
        if let Ok(dt) = DateTime::parse_from_str(canonical, OFFSET_FORMAT) {
            return Ok(DateTimeValue::Offset(dt));
        }
        NaiveDateTime::parse_from_str(canonical, NAIVE_FORMAT)
            .map(DateTimeValue::Naive)
            .map_err(|_| CodecError::invalid("datetime"))
    }

    fn parse(raw: &str) -> Result<DateTimeValue, CodecError> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(DateTimeValue::Offset(dt));
        }
        for format in LEGACY_OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(raw, format) {
                return Ok(DateTimeValue::Offset(dt));
            }
        }
        for format in LEGACY_NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(DateTimeValue::Naive(dt));
            }
        }
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(|d| DateTimeValue::Naive(d.and_time(NaiveTime::default())))
            .map_err(|_| CodecError::invalid("datetime"))
    }

    fn from_native(value: &Value) -> Result<DateTimeValue, CodecError> {
        match value {
            Value::String(s) => Self::parse(s),
            other => Err(CodecError::unsupported("datetime", other)),
        }
    }

    fn to_native(value: &DateTimeValue) -> Value {
        Value::String(Self::encode(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap()
    }

    #[test]
    fn date_round_trip() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(DateCodec::encode(&d), "2024-02-29");
        assert_eq!(DateCodec::decode("2024-02-29").unwrap(), d);
    }

    #[test]
    fn date_rejects_impossible() {
        assert!(DateCodec::decode("2023-02-29").is_err());
        assert!(DateCodec::decode("29/02/2024").is_err());
    }

    #[test]
    fn date_legacy_accepts_timestamp() {
        assert_eq!(
            DateCodec::parse("2020-01-02 03:04:05").unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
        );
    }

    #[test]
    fn naive_datetime_round_trip() {
        for s in ["2021-06-01 12:00:00", "2021-06-01 12:00:00.5", "1999-12-31 23:59:59.123456789"] {
            let v = DateTimeValue::Naive(naive(s));
            let canonical = DateTimeCodec::encode(&v);
            assert_eq!(DateTimeCodec::decode(&canonical).unwrap(), v, "{canonical}");
        }
        assert_eq!(
            DateTimeCodec::encode(&DateTimeValue::Naive(naive("2021-06-01 12:00:00"))),
            "2021-06-01T12:00:00"
        );
    }

    #[test]
    fn offset_datetime_preserves_offset() {
        let dt = DateTime::parse_from_rfc3339("2021-06-01T12:00:00.250+05:30").unwrap();
        let v = DateTimeValue::Offset(dt);
        let canonical = DateTimeCodec::encode(&v);
        assert_eq!(canonical, "2021-06-01T12:00:00.250+05:30");
        let back = DateTimeCodec::decode(&canonical).unwrap();
        assert_eq!(back, v);
        assert_eq!(back.offset(), Some(FixedOffset::east_opt(5 * 3600 + 1800).unwrap()));
    }

    #[test]
    fn utc_offset_is_kept_explicit() {
        let dt = DateTime::parse_from_rfc3339("2021-06-01T12:00:00Z").unwrap();
        let canonical = DateTimeCodec::encode(&DateTimeValue::Offset(dt));
        assert_eq!(canonical, "2021-06-01T12:00:00+00:00");
        assert!(DateTimeCodec::decode(&canonical).unwrap().offset().is_some());
    }

    #[test]
    fn legacy_datetime_layouts() {
        assert_eq!(
            DateTimeCodec::parse("2021-06-01 12:00:00").unwrap(),
            DateTimeValue::Naive(naive("2021-06-01 12:00:00"))
        );
        assert!(DateTimeCodec::parse("2021-06-01 12:00:00+02:00")
            .unwrap()
            .offset()
            .is_some());
        assert_eq!(
            DateTimeCodec::parse("2021-06-01").unwrap(),
            DateTimeValue::Naive(naive("2021-06-01 00:00:00"))
        );
        assert!(DateTimeCodec::parse("yesterday").is_err());
    }

    #[test]
    fn years_outside_four_digits_round_trip() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        for year in [-50, 10_000] {
            let naive = NaiveDate::from_ymd_opt(year, 3, 4)
                .unwrap()
                .and_hms_opt(5, 6, 7)
                .unwrap();
            let with_offset = DateTimeValue::Offset(naive.and_local_timezone(offset).unwrap());
            let canonical = DateTimeCodec::encode(&with_offset);
            assert_eq!(DateTimeCodec::decode(&canonical).unwrap(), with_offset, "{canonical}");

            let plain = DateTimeValue::Naive(naive);
            let canonical = DateTimeCodec::encode(&plain);
            assert_eq!(DateTimeCodec::decode(&canonical).unwrap(), plain, "{canonical}");
        }
    }

    #[test]
    fn decode_is_strict() {
        assert!(DateTimeCodec::decode("2021-06-01 12:00:00").is_err());
    }

    #[test]
    fn from_native_requires_string() {
        assert!(DateTimeCodec::from_native(&json!(1_600_000_000)).is_err());
        assert!(DateCodec::from_native(&json!("2020-01-01")).is_ok());
    }
}
