//! # Type Coercion
//!
//! Converts raw source strings (path segments, query values, header values and
//! `default` literals) into typed [`Value`]s for a requested [`TargetType`].
//!
//! ## Rules
//!
//! | Target | Accepted input |
//! |--------|----------------|
//! | `String` | anything (identity) |
//! | integers | base-10, optional sign, must fit the target width |
//! | floats | decimal or exponential notation |
//! | `bool` | `true/false`, `1/0`, `yes/no`, `on/off` (trimmed, case-insensitive) |
//! | duration | Go-style grammar: `300ms`, `30s`, `5m`, `1h30m`, `1.5h` |
//! | timestamp | RFC 3339 (with or without fraction), `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, `HH:MM:SS` |
//!
//! An empty input always coerces to the zero value of the target. Absence is not
//! a failure at this layer; the decoder decides what absence means.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt;
use std::time::Duration;

/// The concrete type a source string is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    String,
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Duration,
    Timestamp,
    /// Any type the coercer cannot produce. Carries the Rust type name.
    Unsupported(&'static str),
}

impl TargetType {
    /// Whether a source string can be coerced into this type.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        !matches!(self, TargetType::Unsupported(_))
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetType::String => "string",
            TargetType::Bool => "bool",
            TargetType::I8 => "i8",
            TargetType::I16 => "i16",
            TargetType::I32 => "i32",
            TargetType::I64 => "i64",
            TargetType::Isize => "isize",
            TargetType::U8 => "u8",
            TargetType::U16 => "u16",
            TargetType::U32 => "u32",
            TargetType::U64 => "u64",
            TargetType::Usize => "usize",
            TargetType::F32 => "f32",
            TargetType::F64 => "f64",
            TargetType::Duration => "duration",
            TargetType::Timestamp => "timestamp",
            TargetType::Unsupported(name) => name,
        };
        f.write_str(name)
    }
}

/// A coerced value, ready to be stored into a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Duration(Duration),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// The zero value of `target`, or `None` when the target is unsupported.
    #[must_use]
    pub fn zero(target: TargetType) -> Option<Value> {
        let value = match target {
            TargetType::String => Value::String(String::new()),
            TargetType::Bool => Value::Bool(false),
            TargetType::I8
            | TargetType::I16
            | TargetType::I32
            | TargetType::I64
            | TargetType::Isize => Value::Int(0),
            TargetType::U8
            | TargetType::U16
            | TargetType::U32
            | TargetType::U64
            | TargetType::Usize => Value::Uint(0),
            TargetType::F32 | TargetType::F64 => Value::Float(0.0),
            TargetType::Duration => Value::Duration(Duration::ZERO),
            TargetType::Timestamp => Value::Timestamp(DateTime::<Utc>::default()),
            TargetType::Unsupported(_) => return None,
        };
        Some(value)
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Int(_) => "signed integer",
            Value::Uint(_) => "unsigned integer",
            Value::Float(_) => "float",
            Value::Duration(_) => "duration",
            Value::Timestamp(_) => "timestamp",
        }
    }
}

/// Failure to convert a source string into the requested type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    /// Integer or float parse failure, including overflow of the target width.
    InvalidNumber {
        input: String,
        target: TargetType,
        reason: String,
    },
    InvalidBool {
        input: String,
    },
    InvalidDuration {
        input: String,
        reason: &'static str,
    },
    /// None of the accepted timestamp layouts matched.
    InvalidTimestamp {
        input: String,
    },
    Unsupported {
        input: String,
        target: TargetType,
    },
    /// A coerced value was handed to a field of a different type.
    Mismatch {
        expected: TargetType,
        found: &'static str,
    },
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionError::InvalidNumber {
                input,
                target,
                reason,
            } => write!(f, "invalid {target} value \"{input}\": {reason}"),
            CoercionError::InvalidBool { input } => write!(f, "invalid boolean value: {input}"),
            CoercionError::InvalidDuration { input, reason } => {
                write!(f, "invalid duration \"{input}\": {reason}")
            }
            CoercionError::InvalidTimestamp { input } => {
                write!(f, "invalid time format \"{input}\"")
            }
            CoercionError::Unsupported { input, target } => {
                write!(f, "unsupported type conversion from \"{input}\" to {target}")
            }
            CoercionError::Mismatch { expected, found } => {
                write!(f, "{found} value cannot be stored in a {expected} field")
            }
        }
    }
}

impl std::error::Error for CoercionError {}

/// Coerce `input` into a value of `target`.
///
/// # Errors
///
/// Returns a [`CoercionError`] when `input` is not valid for `target`, or when
/// `target` is [`TargetType::Unsupported`].
pub fn coerce(input: &str, target: TargetType) -> Result<Value, CoercionError> {
    if input.is_empty() {
        return Value::zero(target).ok_or_else(|| CoercionError::Unsupported {
            input: String::new(),
            target,
        });
    }

    match target {
        TargetType::String => Ok(Value::String(input.to_string())),
        TargetType::Bool => parse_bool(input).map(Value::Bool),
        TargetType::I8 => parse_signed::<i8>(input, target),
        TargetType::I16 => parse_signed::<i16>(input, target),
        TargetType::I32 => parse_signed::<i32>(input, target),
        TargetType::I64 => parse_signed::<i64>(input, target),
        TargetType::Isize => parse_signed::<isize>(input, target),
        TargetType::U8 => parse_unsigned::<u8>(input, target),
        TargetType::U16 => parse_unsigned::<u16>(input, target),
        TargetType::U32 => parse_unsigned::<u32>(input, target),
        TargetType::U64 => parse_unsigned::<u64>(input, target),
        TargetType::Usize => parse_unsigned::<usize>(input, target),
        TargetType::F32 => input
            .parse::<f32>()
            .map(|v| Value::Float(f64::from(v)))
            .map_err(|e| number_error(input, target, e)),
        TargetType::F64 => input
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| number_error(input, target, e)),
        TargetType::Duration => parse_duration(input).map(Value::Duration),
        TargetType::Timestamp => parse_timestamp(input).map(Value::Timestamp),
        TargetType::Unsupported(_) => Err(CoercionError::Unsupported {
            input: input.to_string(),
            target,
        }),
    }
}

fn number_error(input: &str, target: TargetType, reason: impl fmt::Display) -> CoercionError {
    CoercionError::InvalidNumber {
        input: input.to_string(),
        target,
        reason: reason.to_string(),
    }
}

fn parse_signed<T>(input: &str, target: TargetType) -> Result<Value, CoercionError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError> + TryInto<i64>,
{
    let parsed: T = input.parse().map_err(|e| number_error(input, target, e))?;
    parsed
        .try_into()
        .map(Value::Int)
        .map_err(|_| number_error(input, target, "number out of range"))
}

fn parse_unsigned<T>(input: &str, target: TargetType) -> Result<Value, CoercionError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError> + TryInto<u64>,
{
    let parsed: T = input.parse().map_err(|e| number_error(input, target, e))?;
    parsed
        .try_into()
        .map(Value::Uint)
        .map_err(|_| number_error(input, target, "number out of range"))
}

/// Parse a boolean using the relaxed vocabulary accepted by form inputs.
///
/// # Errors
///
/// Returns [`CoercionError::InvalidBool`] for anything outside the vocabulary.
pub fn parse_bool(input: &str) -> Result<bool, CoercionError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(CoercionError::InvalidBool {
            input: input.to_string(),
        }),
    }
}

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
// Durations are capped at i64::MAX nanoseconds (~292 years).
const MAX_DURATION_NANOS: u128 = i64::MAX as u128;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3_600 * NANOS_PER_SECOND),
        _ => None,
    }
}

/// Parse a duration string such as `30s`, `1h30m` or `1.5h`.
///
/// The grammar is a sequence of decimal numbers, each with an optional fraction
/// and a mandatory unit (`ns`, `us`/`µs`, `ms`, `s`, `m`, `h`). A bare `0` is
/// accepted. Negative durations cannot be represented and are rejected.
///
/// # Errors
///
/// Returns [`CoercionError::InvalidDuration`] describing the first violation.
pub fn parse_duration(input: &str) -> Result<Duration, CoercionError> {
    let invalid = |reason: &'static str| CoercionError::InvalidDuration {
        input: input.to_string(),
        reason,
    };

    let mut rest = input;
    let mut negative = false;
    if let Some(stripped) = rest.strip_prefix('-') {
        negative = true;
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    }

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid("empty duration"));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_digits, after_int) = rest.split_at(int_len);
        rest = after_int;

        let mut whole: u128 = 0;
        for digit in int_digits.bytes() {
            whole = whole * 10 + u128::from(digit - b'0');
            if whole > MAX_DURATION_NANOS {
                return Err(invalid("value out of range"));
            }
        }

        let mut fraction: u128 = 0;
        let mut scale: u128 = 1;
        let mut has_fraction_digits = false;
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            let (frac_digits, after_frac) = after_dot.split_at(frac_len);
            has_fraction_digits = frac_len > 0;
            for digit in frac_digits.bytes() {
                // Digits beyond nanosecond precision are dropped.
                if scale >= NANOS_PER_SECOND * 10 {
                    break;
                }
                fraction = fraction * 10 + u128::from(digit - b'0');
                scale *= 10;
            }
            rest = after_frac;
        }

        if int_len == 0 && !has_fraction_digits {
            return Err(invalid("expected a number"));
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| *c == '.' || c.is_ascii_digit())
            .map_or(rest.len(), |(idx, _)| idx);
        let (unit, after_unit) = rest.split_at(unit_len);
        rest = after_unit;
        if unit.is_empty() {
            return Err(invalid("missing unit"));
        }
        let per_unit = unit_nanos(unit).ok_or_else(|| invalid("unknown unit"))?;

        total += whole * per_unit + fraction * per_unit / scale;
        if total > MAX_DURATION_NANOS {
            return Err(invalid("value out of range"));
        }
    }

    if negative && total > 0 {
        return Err(invalid("negative durations are not supported"));
    }

    let secs = u64::try_from(total / NANOS_PER_SECOND).map_err(|_| invalid("value out of range"))?;
    let nanos = u32::try_from(total % NANOS_PER_SECOND).map_err(|_| invalid("value out of range"))?;
    Ok(Duration::new(secs, nanos))
}

/// Timestamp layouts, tried in this exact order; the first that parses wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampLayout {
    /// `2006-01-02T15:04:05Z07:00`
    Rfc3339,
    /// `2006-01-02T15:04:05.999999999Z07:00`
    Rfc3339Nano,
    /// `2006-01-02 15:04:05`, interpreted as UTC
    SpaceSeparated,
    /// `2006-01-02T15:04:05Z`
    UtcSeconds,
    /// `2006-01-02T15:04:05.000Z`
    UtcMillis,
    /// `2006-01-02`, midnight UTC
    DateOnly,
    /// `15:04:05`, on day zero (0000-01-01) UTC
    TimeOnly,
}

pub const TIMESTAMP_LAYOUTS: [TimestampLayout; 7] = [
    TimestampLayout::Rfc3339,
    TimestampLayout::Rfc3339Nano,
    TimestampLayout::SpaceSeparated,
    TimestampLayout::UtcSeconds,
    TimestampLayout::UtcMillis,
    TimestampLayout::DateOnly,
    TimestampLayout::TimeOnly,
];

impl TimestampLayout {
    /// Attempt to parse `input` with this layout.
    #[must_use]
    pub fn parse(&self, input: &str) -> Option<DateTime<Utc>> {
        match self {
            TimestampLayout::Rfc3339 | TimestampLayout::Rfc3339Nano => {
                DateTime::parse_from_rfc3339(input)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }
            TimestampLayout::SpaceSeparated => {
                NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            }
            TimestampLayout::UtcSeconds => {
                NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%SZ")
                    .ok()
                    .map(|naive| naive.and_utc())
            }
            TimestampLayout::UtcMillis => {
                NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.3fZ")
                    .ok()
                    .map(|naive| naive.and_utc())
            }
            TimestampLayout::DateOnly => NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc()),
            TimestampLayout::TimeOnly => {
                let time = NaiveTime::parse_from_str(input, "%H:%M:%S").ok()?;
                NaiveDate::from_ymd_opt(0, 1, 1).map(|day| day.and_time(time).and_utc())
            }
        }
    }
}

/// Parse a timestamp by trying each of [`TIMESTAMP_LAYOUTS`] in order.
///
/// # Errors
///
/// Returns [`CoercionError::InvalidTimestamp`] when no layout matches.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, CoercionError> {
    TIMESTAMP_LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(input))
        .ok_or_else(|| CoercionError::InvalidTimestamp {
            input: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn empty_input_yields_zero_for_every_supported_target() {
        let targets = [
            TargetType::String,
            TargetType::Bool,
            TargetType::I8,
            TargetType::I64,
            TargetType::U16,
            TargetType::Usize,
            TargetType::F32,
            TargetType::F64,
            TargetType::Duration,
            TargetType::Timestamp,
        ];
        for target in targets {
            assert_eq!(coerce("", target).unwrap(), Value::zero(target).unwrap());
        }
    }

    #[test]
    fn integers_respect_target_width() {
        assert_eq!(coerce("127", TargetType::I8).unwrap(), Value::Int(127));
        assert!(coerce("128", TargetType::I8).is_err());
        assert_eq!(coerce("-42", TargetType::I32).unwrap(), Value::Int(-42));
        assert!(coerce("-1", TargetType::U32).is_err());
        assert_eq!(coerce("65535", TargetType::U16).unwrap(), Value::Uint(65535));
        assert!(coerce("12abc", TargetType::I64).is_err());
        assert!(coerce("1.5", TargetType::I64).is_err());
    }

    #[test]
    fn floats_accept_exponents() {
        assert_eq!(coerce("2.5", TargetType::F64).unwrap(), Value::Float(2.5));
        assert_eq!(coerce("1e3", TargetType::F64).unwrap(), Value::Float(1000.0));
        assert!(coerce("three", TargetType::F64).is_err());
    }

    #[test]
    fn bool_vocabulary() {
        for input in ["true", "TRUE", " yes ", "1", "On"] {
            assert!(parse_bool(input).unwrap(), "{input}");
        }
        for input in ["false", "No", "0", "off"] {
            assert!(!parse_bool(input).unwrap(), "{input}");
        }
        assert_eq!(
            parse_bool("maybe"),
            Err(CoercionError::InvalidBool {
                input: "maybe".to_string()
            })
        );
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("2us").unwrap(), Duration::from_micros(2));
        assert_eq!(parse_duration("2µs").unwrap(), Duration::from_micros(2));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration(".5s").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn invalid_durations() {
        for input in ["30", "abc", "5x", "-5m", "s", ".s", "1..5s"] {
            assert!(parse_duration(input).is_err(), "{input} should be rejected");
        }
    }

    #[test]
    fn timestamp_layouts_in_order() {
        let rfc = parse_timestamp("2023-01-01T00:00:00Z").unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());

        let offset = parse_timestamp("2023-06-15T12:00:00+02:00").unwrap();
        assert_eq!(offset.hour(), 10);

        let nano = parse_timestamp("2023-06-15T12:00:00.123456789Z").unwrap();
        assert_eq!(nano.nanosecond(), 123_456_789);

        let spaced = parse_timestamp("2023-06-15 08:30:00").unwrap();
        assert_eq!(spaced, Utc.with_ymd_and_hms(2023, 6, 15, 8, 30, 0).unwrap());

        let date = parse_timestamp("2023-06-15").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2023, 6, 15, 0, 0, 0).unwrap());

        let time = parse_timestamp("15:04:05").unwrap();
        assert_eq!(time.year(), 0);
        assert_eq!((time.hour(), time.minute(), time.second()), (15, 4, 5));

        assert!(parse_timestamp("15/06/2023").is_err());
    }

    #[test]
    fn unsupported_target_is_an_error() {
        let target = TargetType::Unsupported("Vec<Item>");
        assert_eq!(
            coerce("x", target),
            Err(CoercionError::Unsupported {
                input: "x".to_string(),
                target
            })
        );
        assert!(coerce("", target).is_err());
    }
}
