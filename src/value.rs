//! Generic values produced by evaluation, and their conversion into native
//! field types.

use std::{
    error::Error,
    fmt::{self, Display},
    path::PathBuf,
    time::Duration,
};

/// A dynamically-typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `#null`
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer. Wide enough for every KDL integer literal.
    Integer(i128),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
    /// An ordered list of values.
    Array(Vec<Value>),
}

impl Value {
    /// The type of this value, used in conversion errors.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Integer(_) | Value::Float(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value.into())
    }
}

impl From<i128> for Value {
    fn from(value: i128) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

/// Coarse classification of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// `null`
    Null,
    /// `bool`
    Bool,
    /// `number`
    Number,
    /// `string`
    String,
    /// `array`
    Array,
}

impl Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Array => "array",
        };
        f.write_str(name)
    }
}

/// A value could not be converted into the requested native type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValueError {
    /// The value has the wrong type.
    TypeMismatch {
        /// Type the target field accepts.
        expected: ValueType,
        /// Type that was supplied.
        actual: ValueType,
    },
    /// A number does not fit the target type.
    OutOfRange {
        /// The offending value, rendered.
        value: String,
        /// Name of the target type.
        target: &'static str,
    },
    /// A string could not be parsed into the target type.
    InvalidString {
        /// Name of the target type.
        target: &'static str,
        /// What went wrong.
        reason: String,
    },
    /// An array element failed to convert.
    Element {
        /// Index of the element.
        index: usize,
        /// The element's own error.
        source: Box<ValueError>,
    },
}

impl Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueError::TypeMismatch { expected, actual } => {
                write!(f, "expected {expected}, got {actual}")
            }
            ValueError::OutOfRange { value, target } => {
                write!(f, "{value} is out of range for {target}")
            }
            ValueError::InvalidString { target, reason } => {
                write!(f, "invalid {target}: {reason}")
            }
            ValueError::Element { index, source } => write!(f, "element {index}: {source}"),
        }
    }
}

impl Error for ValueError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ValueError::Element { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Type-directed conversion from a generic [`Value`].
pub trait FromValue: Sized {
    /// Converts `value` into `Self`.
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

/// Object-safe form of [`FromValue`]: overwrite a field in place.
///
/// This is what an attribute field reference exposes to the decoder.
pub trait DecodeValue {
    /// Replaces `self` with the conversion of `value`.
    fn decode_value(&mut self, value: Value) -> Result<(), ValueError>;
}

impl<T: FromValue> DecodeValue for T {
    fn decode_value(&mut self, value: Value) -> Result<(), ValueError> {
        *self = T::from_value(value)?;
        Ok(())
    }
}

fn mismatch(expected: ValueType, value: &Value) -> ValueError {
    ValueError::TypeMismatch {
        expected,
        actual: value.value_type(),
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(ValueType::Bool, &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch(ValueType::String, &other)),
        }
    }
}

impl FromValue for PathBuf {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        String::from_value(value).map(PathBuf::from)
    }
}

macro_rules! impl_from_value_for_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value {
                        Value::Integer(i) => <$ty>::try_from(i).map_err(|_| ValueError::OutOfRange {
                            value: i.to_string(),
                            target: stringify!($ty),
                        }),
                        other => Err(mismatch(ValueType::Number, &other)),
                    }
                }
            }
        )*
    };
}

impl_from_value_for_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

// Integers up to this magnitude are exact in an f64.
const F64_EXACT_INT: u128 = 1 << 53;

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Integer(i) if i.unsigned_abs() <= F64_EXACT_INT => Ok(i as f64),
            Value::Integer(i) => Err(ValueError::OutOfRange {
                value: i.to_string(),
                target: "f64",
            }),
            other => Err(mismatch(ValueType::Number, &other)),
        }
    }
}

/// Values are rounded to the nearest `f32`; finite values beyond its range are
/// rejected.
impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        let wide = f64::from_value(value)?;
        let narrow = wide as f32;
        if wide.is_finite() && narrow.is_infinite() {
            return Err(ValueError::OutOfRange {
                value: wide.to_string(),
                target: "f32",
            });
        }
        Ok(narrow)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Array(elements) => elements
                .into_iter()
                .enumerate()
                .map(|(index, element)| {
                    T::from_value(element).map_err(|source| ValueError::Element {
                        index,
                        source: Box::new(source),
                    })
                })
                .collect(),
            // `labels "a"` has no array syntax of its own in KDL.
            Value::Null => Err(mismatch(ValueType::Array, &Value::Null)),
            single => T::from_value(single).map(|element| vec![element]),
        }
    }
}

impl FromValue for Duration {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        let text = String::from_value(value)?;
        parse_duration(&text).map_err(|reason| ValueError::InvalidString {
            target: "duration",
            reason,
        })
    }
}

/// Parses durations written as a sequence of `<integer><unit>` pairs, e.g.
/// `1h30m` or `250ms`. Units: `ns`, `us`, `ms`, `s`, `m`, `h`.
fn parse_duration(text: &str) -> Result<Duration, String> {
    if text.is_empty() {
        return Err("empty duration".into());
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(format!("expected a number in {text:?}"));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("number too large in {text:?}"))?;
        rest = &rest[digits..];

        let unit_len = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
        let part = match &rest[..unit_len] {
            "ns" => Duration::from_nanos(amount),
            "us" => Duration::from_micros(amount),
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount.saturating_mul(60)),
            "h" => Duration::from_secs(amount.saturating_mul(3600)),
            "" => return Err(format!("missing unit in {text:?}")),
            unit => return Err(format!("unknown unit {unit:?} in {text:?}")),
        };
        rest = &rest[unit_len..];
        total = total
            .checked_add(part)
            .ok_or_else(|| format!("duration {text:?} overflows"))?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_range_checked() {
        assert_eq!(u8::from_value(Value::Integer(255)), Ok(255));
        assert_eq!(
            u8::from_value(Value::Integer(256)),
            Err(ValueError::OutOfRange {
                value: "256".into(),
                target: "u8",
            })
        );
        assert_eq!(
            i32::from_value(Value::from("1")),
            Err(ValueError::TypeMismatch {
                expected: ValueType::Number,
                actual: ValueType::String,
            })
        );
    }

    #[test]
    fn floats_accept_integers() {
        assert_eq!(f64::from_value(Value::Integer(3)), Ok(3.0));
        assert_eq!(f32::from_value(Value::Float(0.5)), Ok(0.5));
    }

    #[test]
    fn floats_reject_values_they_cannot_hold() {
        assert_eq!(
            f32::from_value(Value::Float(1e300)),
            Err(ValueError::OutOfRange {
                value: 1e300f64.to_string(),
                target: "f32",
            })
        );
        assert_eq!(
            f32::from_value(Value::Float(f64::INFINITY)),
            Ok(f32::INFINITY)
        );

        assert_eq!(
            f64::from_value(Value::Integer(1 << 53)),
            Ok(9_007_199_254_740_992.0)
        );
        assert_eq!(
            f64::from_value(Value::Integer(-(1 << 53) - 1)),
            Err(ValueError::OutOfRange {
                value: "-9007199254740993".into(),
                target: "f64",
            })
        );
    }

    #[test]
    fn option_maps_null_to_none() {
        assert_eq!(Option::<String>::from_value(Value::Null), Ok(None));
        assert_eq!(
            Option::<String>::from_value(Value::from("x")),
            Ok(Some("x".to_string()))
        );
    }

    #[test]
    fn vec_reports_failing_element() {
        let err = Vec::<u16>::from_value(Value::from(vec![Value::Integer(80), Value::Bool(true)]))
            .unwrap_err();
        assert_eq!(err.to_string(), "element 1: expected number, got bool");
    }

    #[test]
    fn vec_accepts_a_single_value() {
        assert_eq!(
            Vec::<String>::from_value(Value::from("job")),
            Ok(vec!["job".to_string()])
        );
        assert!(Vec::<String>::from_value(Value::Null).is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(
            Duration::from_value(Value::from("1m30s")),
            Ok(Duration::from_secs(90))
        );
        assert_eq!(
            Duration::from_value(Value::from("250ms")),
            Ok(Duration::from_millis(250))
        );
        assert!(Duration::from_value(Value::from("10")).is_err());
        assert!(Duration::from_value(Value::from("5 days")).is_err());
    }

    #[test]
    fn decode_value_overwrites_in_place() {
        let mut port: u16 = 0;
        port.decode_value(Value::Integer(8080)).unwrap();
        assert_eq!(port, 8080);
    }
}
