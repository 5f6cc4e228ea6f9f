use crate::common::{Record, Value};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};

/// Conversion between a Rust type and a [Value].
///
/// Entities, projection DTOs and scalar query results all go through this
/// trait. Implement it with `#[derive(Convertible)]` from `quarry_derive`
/// for structs; primitives, `String`, `Option<T>`, `Vec<T>`, [Record] and
/// [Value] are covered here.
pub trait Convertible: Sized {
    fn to_value(&self) -> QuarryResult<Value>;

    fn from_value(value: &Value) -> QuarryResult<Self>;
}

/// Converts a value into `T`, used by derived implementations.
pub fn from_value<T: Convertible>(value: &Value) -> QuarryResult<T> {
    T::from_value(value)
}

/// Converts `T` into a value, used by derived implementations.
pub fn to_value<T: Convertible>(value: &T) -> QuarryResult<Value> {
    value.to_value()
}

pub(crate) fn mapping_error(value: &Value, target: &str) -> QuarryError {
    log::error!("Cannot convert {} value {} into {}", value.type_name(), value, target);
    QuarryError::new(
        &format!("cannot convert {} value {} into {}", value.type_name(), value, target),
        ErrorKind::ObjectMappingError,
    )
}

macro_rules! integer_convertible {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Convertible for $ty {
                fn to_value(&self) -> QuarryResult<Value> {
                    Ok(Value::$variant((*self).into()))
                }

                fn from_value(value: &Value) -> QuarryResult<Self> {
                    let wide = value
                        .as_integer()
                        .ok_or_else(|| mapping_error(value, stringify!($ty)))?;
                    <$ty>::try_from(wide).map_err(|_| mapping_error(value, stringify!($ty)))
                }
            }
        )*
    };
}

integer_convertible!(
    i8 => I32,
    i16 => I32,
    i32 => I32,
    u8 => I32,
    u16 => I32,
    u32 => I64,
    i64 => I64,
    u64 => U64,
);

impl Convertible for usize {
    fn to_value(&self) -> QuarryResult<Value> {
        Ok(Value::U64(*self as u64))
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        let wide = value
            .as_integer()
            .ok_or_else(|| mapping_error(value, "usize"))?;
        usize::try_from(wide).map_err(|_| mapping_error(value, "usize"))
    }
}

impl Convertible for f64 {
    fn to_value(&self) -> QuarryResult<Value> {
        Ok(Value::F64(*self))
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        value.as_decimal().ok_or_else(|| mapping_error(value, "f64"))
    }
}

impl Convertible for f32 {
    fn to_value(&self) -> QuarryResult<Value> {
        Ok(Value::F64(*self as f64))
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        value
            .as_decimal()
            .map(|v| v as f32)
            .ok_or_else(|| mapping_error(value, "f32"))
    }
}

impl Convertible for bool {
    fn to_value(&self) -> QuarryResult<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        value.as_bool().ok_or_else(|| mapping_error(value, "bool"))
    }
}

impl Convertible for String {
    fn to_value(&self) -> QuarryResult<Value> {
        Ok(Value::String(self.clone()))
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        value
            .as_string()
            .cloned()
            .ok_or_else(|| mapping_error(value, "String"))
    }
}

impl Convertible for Value {
    fn to_value(&self) -> QuarryResult<Value> {
        Ok(self.clone())
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        Ok(value.clone())
    }
}

impl Convertible for Record {
    fn to_value(&self) -> QuarryResult<Value> {
        Ok(Value::Record(self.clone()))
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        value
            .as_record()
            .cloned()
            .ok_or_else(|| mapping_error(value, "Record"))
    }
}

impl<T: Convertible> Convertible for Option<T> {
    fn to_value(&self) -> QuarryResult<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Convertible> Convertible for Vec<T> {
    fn to_value(&self) -> QuarryResult<Value> {
        let values = self
            .iter()
            .map(|v| v.to_value())
            .collect::<QuarryResult<Vec<Value>>>()?;
        Ok(Value::Array(values))
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        match value {
            Value::Array(values) => values.iter().map(T::from_value).collect(),
            other => Err(mapping_error(other, "Vec")),
        }
    }
}
