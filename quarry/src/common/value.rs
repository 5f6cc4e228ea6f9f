use crate::common::Record;
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

#[inline]
fn num_cmp_float(a: f64, b: f64) -> Ordering {
    // NaN sorts after every other number
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// A field value inside a [Record].
///
/// Integers of different widths compare and hash as the same number, so
/// `Value::I32(5)` and `Value::I64(5)` address the same identity-map slot.
/// Ordering is total: `Null` sorts first, numbers compare numerically and
/// values of unrelated types fall back to a fixed type rank.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    Array(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::I32(_) | Value::I64(_) | Value::U64(_))
    }

    pub fn is_number(&self) -> bool {
        self.is_integer() || matches!(self, Value::F64(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Value::Record(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as a wide integer if it is any integer variant.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::I32(v) => Some(*v as i128),
            Value::I64(v) => Some(*v as i128),
            Value::U64(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Returns the value as a float if it is any numeric variant.
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            other => other.as_integer().map(|v| v as f64),
        }
    }

    pub fn as_string(&self) -> Option<&String> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
        }
    }

    /// Compares two values the way a query predicate does: `None` when
    /// either side is null or the types are not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
            return Some(a.cmp(&b));
        }
        if self.is_number() && other.is_number() {
            let (a, b) = (self.as_decimal()?, other.as_decimal()?);
            return Some(num_cmp_float(a, b));
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => Some(a.cmp(b)),
            (Value::Record(a), Value::Record(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Adds a numeric delta, keeping the width of the receiver where the
    /// result fits. Used by increment mutations.
    pub fn add(&self, delta: &Value) -> QuarryResult<Value> {
        let overflow = || {
            QuarryError::new(
                &format!("numeric overflow adding {} to {}", delta, self),
                ErrorKind::InvalidOperation,
            )
        };

        match (self, delta) {
            (Value::F64(a), d) if d.is_number() => Ok(Value::F64(a + d.as_decimal().unwrap_or(0.0))),
            (a, Value::F64(d)) if a.is_number() => {
                Ok(Value::F64(a.as_decimal().unwrap_or(0.0) + d))
            }
            (a, d) if a.is_integer() && d.is_integer() => {
                let sum = a
                    .as_integer()
                    .zip(d.as_integer())
                    .and_then(|(a, d)| a.checked_add(d))
                    .ok_or_else(overflow)?;
                match a {
                    Value::I32(_) => i32::try_from(sum).map(Value::I32).map_err(|_| overflow()),
                    Value::U64(_) => u64::try_from(sum).map(Value::U64).map_err(|_| overflow()),
                    _ => i64::try_from(sum).map(Value::I64).map_err(|_| overflow()),
                }
            }
            _ => {
                log::error!("Cannot add {} to non-numeric value {}", delta, self);
                Err(QuarryError::new(
                    &format!(
                        "cannot add {} ({}) to {} ({})",
                        delta,
                        delta.type_name(),
                        self,
                        self.type_name()
                    ),
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    /// Arithmetic negation of a numeric value.
    pub fn negate(&self) -> QuarryResult<Value> {
        match self {
            Value::I32(v) => v
                .checked_neg()
                .map(Value::I32)
                .ok_or_else(|| QuarryError::new("i32 overflow on negation", ErrorKind::InvalidOperation)),
            Value::I64(v) => v
                .checked_neg()
                .map(Value::I64)
                .ok_or_else(|| QuarryError::new("i64 overflow on negation", ErrorKind::InvalidOperation)),
            Value::U64(v) => i64::try_from(*v)
                .map(|v| Value::I64(-v))
                .map_err(|_| QuarryError::new("u64 overflow on negation", ErrorKind::InvalidOperation)),
            Value::F64(v) => Ok(Value::F64(-v)),
            other => Err(QuarryError::new(
                &format!("cannot negate {} value", other.type_name()),
                ErrorKind::InvalidOperation,
            )),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::I32(_) | Value::I64(_) | Value::U64(_) | Value::F64(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Record(_) => 5,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Array(values) => write!(f, "[{}]", values.iter().join(", ")),
            Value::Record(record) => write!(f, "{}", record),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            _ => self
                .compare(other)
                .unwrap_or_else(|| self.type_rank().cmp(&other.type_rank())),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(v) => v.hash(state),
            Value::I32(_) | Value::I64(_) | Value::U64(_) => {
                self.as_integer().unwrap_or_default().hash(state)
            }
            // integral floats hash like the integer they equal
            Value::F64(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                (*v as i128).hash(state)
            }
            Value::F64(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Array(v) => v.hash(state),
            Value::Record(v) => v.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i8> for Value {
    fn from(value: i8) -> Self {
        Value::I32(value as i32)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::I32(value as i32)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::I32(value as i32)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::I32(value as i32)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::I64(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::U64(value as u64)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F64(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
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

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
