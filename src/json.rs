//! Datetime-aware JSON encoding and decoding.
//!
//! [`encode`] accepts anything implementing [`serde::Serialize`]; that trait
//! is the serialization capability domain types opt into. Dates and
//! date-times travel through [`Value`] or through the [`date`] and
//! [`datetime`] field helpers, and always come out in ISO-8601 extended form
//! (`2024-01-15T00:00:00`). Plain dates are promoted to midnight.
//!
//! [`decode`] goes the other way and rewrites every string value of every
//! object that looks like an ISO-8601 date-time into a date-time value:
//!
//! ```rust
//! use kettle::json::{self, Value};
//!
//! let map = json::decode(r#"{"at": "2024-01-15T10:30:00", "name": "hello"}"#).unwrap();
//! assert!(matches!(map["at"], Value::DateTime(_)));
//! assert_eq!(map["name"], Value::String("hello".into()));
//! ```
//!
//! The rewrite is purely pattern based. A string that happens to look like
//! a timestamp is converted whether or not it was meant as one. Strings that
//! sit directly inside arrays are left alone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A decoded JSON object.
pub type Map = BTreeMap<String, Value>;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const ISO_FORMAT_TZ: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

static ISO_8601: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(-?(?:[1-9][0-9]*)?[0-9]{4})-(1[0-2]|0[1-9])-(3[01]|0[1-9]|[12][0-9])T(2[0-3]|[01][0-9]):([0-5][0-9]):([0-5][0-9])(\.[0-9]+)?(Z|[+-](?:2[0-3]|[01][0-9]):[0-5][0-9])?$",
    )
    .expect("ISO-8601 pattern compiles")
});

// ── Value ─────────────────────────────────────────────────────────────────────

/// A JSON value that can also hold dates and date-times.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// Encoded as the date-time at midnight.
    Date(NaiveDate),
    /// A date-time without offset, e.g. `2024-01-15T10:30:00`.
    DateTime(NaiveDateTime),
    /// A date-time with a fixed UTC offset, e.g. `2024-01-15T10:30:00+02:00`.
    DateTimeOffset(DateTime<FixedOffset>),
    Array(Vec<Value>),
    Object(Map),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a naive date-time, if it holds any date or time.
    ///
    /// Offset date-times yield their local wall-clock time.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            Self::DateTime(dt) => Some(*dt),
            Self::DateTimeOffset(dt) => Some(dt.naive_local()),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.collect_str(&format_date(d)),
            Self::DateTime(dt) => serializer.collect_str(&dt.format(ISO_FORMAT)),
            Self::DateTimeOffset(dt) => serializer.collect_str(&dt.format(ISO_FORMAT_TZ)),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self { Self::Number(n.into()) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Self::String(s.to_owned()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Self::String(s) }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self { Self::Date(d) }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self { Self::DateTime(dt) }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self { Self::DateTimeOffset(dt) }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self { Self::Object(map) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

fn format_date(d: &NaiveDate) -> impl fmt::Display {
    d.and_time(NaiveTime::MIN).format(ISO_FORMAT)
}

// ── Field helpers ─────────────────────────────────────────────────────────────

/// `#[serde(serialize_with = "kettle::json::date::serialize")]` for
/// `NaiveDate` fields: writes the date promoted to midnight.
pub mod date {
    use chrono::NaiveDate;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&super::format_date(d))
    }
}

/// `#[serde(serialize_with = "kettle::json::datetime::serialize")]` for
/// `NaiveDateTime` fields.
pub mod datetime {
    use chrono::NaiveDateTime;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&dt.format(super::ISO_FORMAT))
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// A value could not be turned into JSON text.
#[derive(Debug)]
pub struct SerializationError {
    type_name: &'static str,
    reason: String,
}

impl SerializationError {
    /// Rust type name of the value that failed to serialize.
    pub fn type_name(&self) -> &'static str { self.type_name }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type '{}' is not json-serializable: {}", self.type_name, self.reason)
    }
}

impl std::error::Error for SerializationError {}

/// Text could not be decoded into a JSON object.
#[derive(Debug)]
pub enum DecodeError {
    Syntax(serde_json::Error),
    /// The document parsed but its top level is not an object.
    NotAnObject,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(e) => write!(f, "invalid JSON: {e}"),
            Self::NotAnObject => f.write_str("JSON document is not an object"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Syntax(e) => Some(e),
            Self::NotAnObject => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Syntax(e)
    }
}

// ── encode / decode ───────────────────────────────────────────────────────────

/// Serializes `value` to compact JSON text.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, SerializationError> {
    serde_json::to_string(value).map_err(|e| SerializationError {
        type_name: std::any::type_name::<T>(),
        reason: e.to_string(),
    })
}

/// Like [`encode`] but returns bytes, ready for a response body.
pub fn encode_to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SerializationError> {
    serde_json::to_vec(value).map_err(|e| SerializationError {
        type_name: std::any::type_name::<T>(),
        reason: e.to_string(),
    })
}

/// Parses `text` into an object, converting date-time strings on the way.
pub fn decode(text: &str) -> Result<Map, DecodeError> {
    match serde_json::from_str(text)? {
        serde_json::Value::Object(obj) => Ok(convert_object(obj)),
        _ => Err(DecodeError::NotAnObject),
    }
}

fn convert_object(obj: serde_json::Map<String, serde_json::Value>) -> Map {
    obj.into_iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => match parse_iso8601(&s) {
                    Some(dt) => dt,
                    None => Value::String(s),
                },
                other => convert(other),
            };
            (k, v)
        })
        .collect()
}

fn convert(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(convert).collect()),
        serde_json::Value::Object(obj) => Value::Object(convert_object(obj)),
    }
}

/// Parses a strict ISO-8601 date-time string.
///
/// Returns `None` when the string does not match the pattern or names a date
/// that does not exist (e.g. February 31st).
pub fn parse_iso8601(s: &str) -> Option<Value> {
    let caps = ISO_8601.captures(s)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i64>().ok());

    let date = NaiveDate::from_ymd_opt(
        i32::try_from(num(1)?).ok()?,
        u32::try_from(num(2)?).ok()?,
        u32::try_from(num(3)?).ok()?,
    )?;
    let nanos = match caps.get(7) {
        // Keep at most nanosecond precision; pad shorter fractions.
        Some(m) => {
            let digits: String = m.as_str()[1..].chars().take(9).collect();
            format!("{digits:0<9}").parse::<u32>().ok()?
        }
        None => 0,
    };
    let time = NaiveTime::from_hms_nano_opt(
        u32::try_from(num(4)?).ok()?,
        u32::try_from(num(5)?).ok()?,
        u32::try_from(num(6)?).ok()?,
        nanos,
    )?;
    let naive = date.and_time(time);

    match caps.get(8).map(|m| m.as_str()) {
        None => Some(Value::DateTime(naive)),
        Some("Z") => {
            let utc = FixedOffset::east_opt(0)?;
            Some(Value::DateTimeOffset(naive.and_local_timezone(utc).single()?))
        }
        Some(offset) => {
            let sign = if offset.starts_with('-') { -1 } else { 1 };
            let hours: i32 = offset[1..3].parse().ok()?;
            let minutes: i32 = offset[4..6].parse().ok()?;
            let tz = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
            Some(Value::DateTimeOffset(naive.and_local_timezone(tz).single()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Serialize;

    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn decodes_timestamp_strings() {
        let map = decode(r#"{"x": "2024-01-15T10:30:00"}"#).unwrap();
        assert_eq!(map["x"], Value::DateTime(ymd_hms(2024, 1, 15, 10, 30, 0)));
    }

    #[test]
    fn leaves_other_strings_alone() {
        let map = decode(r#"{"x": "hello", "n": 3, "d": "2024-01-15"}"#).unwrap();
        assert_eq!(map["x"], Value::String("hello".into()));
        assert_eq!(map["n"], Value::from(3_i64));
        assert_eq!(map["d"], Value::String("2024-01-15".into()));
    }

    #[test]
    fn converts_nested_objects_but_not_array_items() {
        let map = decode(
            r#"{"inner": {"at": "2024-01-15T10:30:00Z"}, "list": ["2024-01-15T10:30:00"]}"#,
        )
        .unwrap();

        let Value::Object(inner) = &map["inner"] else { panic!("expected object") };
        let Value::DateTimeOffset(at) = &inner["at"] else { panic!("expected date-time") };
        assert_eq!(at.offset().local_minus_utc(), 0);
        assert_eq!(at.naive_local(), ymd_hms(2024, 1, 15, 10, 30, 0));

        assert_eq!(
            map["list"],
            Value::Array(vec![Value::String("2024-01-15T10:30:00".into())])
        );
    }

    #[test]
    fn parses_fraction_and_offset() {
        let Some(Value::DateTimeOffset(dt)) = parse_iso8601("2024-06-01T23:59:59.25-05:30") else {
            panic!("expected offset date-time");
        };
        assert_eq!(dt.offset().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert_eq!(dt.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(parse_iso8601("2024-13-01T00:00:00").is_none());
        assert!(parse_iso8601("2024-01-15T24:00:00").is_none());
        assert!(parse_iso8601("2024-01-15 10:30:00").is_none());
        assert!(parse_iso8601("x2024-01-15T10:30:00").is_none());
        // Matches the pattern but February has no 31st.
        assert!(parse_iso8601("2024-02-31T10:30:00").is_none());
    }

    #[test]
    fn timestamp_lookalikes_are_converted_too() {
        let map = decode(r#"{"ticket": "2000-01-01T00:00:00"}"#).unwrap();
        assert!(map["ticket"].as_datetime().is_some());
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(decode("[1, 2]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode("{oops"), Err(DecodeError::Syntax(_))));
    }

    #[test]
    fn encodes_dates_as_midnight() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(encode(&Value::Date(d)).unwrap(), r#""2024-01-15T00:00:00""#);
    }

    #[test]
    fn encodes_structs_with_date_fields() {
        #[derive(Serialize)]
        struct Booking {
            guest: &'static str,
            #[serde(serialize_with = "date::serialize")]
            day: NaiveDate,
            #[serde(serialize_with = "datetime::serialize")]
            created: NaiveDateTime,
        }

        let booking = Booking {
            guest: "alice",
            day: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            created: ymd_hms(2024, 3, 1, 8, 5, 9),
        };
        assert_eq!(
            encode(&booking).unwrap(),
            r#"{"guest":"alice","day":"2024-03-02T00:00:00","created":"2024-03-01T08:05:09"}"#
        );
    }

    #[test]
    fn datetime_survives_encode_then_decode() {
        let original = Value::DateTime(ymd_hms(2023, 12, 31, 23, 59, 58));
        let mut map = Map::new();
        map.insert("at".into(), original.clone());

        let decoded = decode(&encode(&map).unwrap()).unwrap();
        assert_eq!(decoded["at"], original);

        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let offset = Value::DateTimeOffset(
            ymd_hms(2024, 5, 5, 12, 0, 0).and_local_timezone(tz).single().unwrap(),
        );
        map.insert("at".into(), offset.clone());
        let decoded = decode(&encode(&map).unwrap()).unwrap();
        assert_eq!(decoded["at"], offset);
    }

    #[test]
    fn unsupported_values_name_their_type() {
        let mut grid = HashMap::new();
        grid.insert((1, 2), "cell");

        let err = encode(&grid).unwrap_err();
        assert!(err.type_name().contains("HashMap"));
        assert!(err.to_string().contains("HashMap"), "{err}");
    }

    #[test]
    fn refusing_serialize_impl_is_reported() {
        struct Socket;

        impl Serialize for Socket {
            fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("sockets cannot be serialized"))
            }
        }

        let err = encode(&Socket).unwrap_err();
        assert!(err.to_string().contains("Socket"));
        assert!(err.to_string().contains("sockets cannot be serialized"));
    }
}
