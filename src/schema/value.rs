//! Bind values.
//!
//! Every persisted field is converted into a `SqlValue` when a batch is
//! written. The conversion is driven by `ToSqlValue`, implemented for the
//! scalar types records usually carry. `Option` and `Box` are the optional
//! indirections: their `NULLABLE` flag is set and an absent `Option` becomes
//! `SqlValue::Null`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// A positional statement argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// Text
    Text(String),
    /// Binary blob
    Bytes(Vec<u8>),
    /// Timestamp in UTC
    Timestamp(DateTime<Utc>),
    /// Date and time without a zone
    DateTime(NaiveDateTime),
}

/// Conversion of a record field into a bind value.
pub trait ToSqlValue {
    /// Whether the field sits behind an optional indirection.
    const NULLABLE: bool = false;

    /// The value bound for this field.
    fn to_sql_value(&self) -> SqlValue;
}

macro_rules! signed_to_sql {
    ($($t:ty),*) => {
        $(impl ToSqlValue for $t {
            fn to_sql_value(&self) -> SqlValue {
                SqlValue::Int(i64::from(*self))
            }
        })*
    };
}

macro_rules! unsigned_to_sql {
    ($($t:ty),*) => {
        $(impl ToSqlValue for $t {
            fn to_sql_value(&self) -> SqlValue {
                SqlValue::UInt(u64::from(*self))
            }
        })*
    };
}

signed_to_sql!(i8, i16, i32, i64);
unsigned_to_sql!(u8, u16, u32, u64);

impl ToSqlValue for usize {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::UInt(*self as u64)
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Float(f64::from(*self))
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Float(*self)
    }
}

impl ToSqlValue for str {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.to_string())
    }
}

impl ToSqlValue for String {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Bytes(self.clone())
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Timestamp(*self)
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::DateTime(*self)
    }
}

impl ToSqlValue for NaiveDate {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::DateTime(self.and_time(chrono::NaiveTime::MIN))
    }
}

// JSON documents are stored as their text form
impl ToSqlValue for serde_json::Value {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.to_string())
    }
}

impl<V: ToSqlValue> ToSqlValue for Option<V> {
    const NULLABLE: bool = true;

    fn to_sql_value(&self) -> SqlValue {
        match self {
            Some(value) => value.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

impl<V: ToSqlValue + ?Sized> ToSqlValue for Box<V> {
    const NULLABLE: bool = true;

    fn to_sql_value(&self) -> SqlValue {
        (**self).to_sql_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(42i32.to_sql_value(), SqlValue::Int(42));
        assert_eq!(7u16.to_sql_value(), SqlValue::UInt(7));
        assert_eq!(true.to_sql_value(), SqlValue::Bool(true));
        assert_eq!(1.5f32.to_sql_value(), SqlValue::Float(1.5));
        assert_eq!("a".to_sql_value(), SqlValue::Text("a".to_string()));
        assert_eq!(
            vec![1u8, 2].to_sql_value(),
            SqlValue::Bytes(vec![1, 2])
        );
    }

    #[test]
    fn test_option_is_nullable_and_absent_is_null() {
        assert!(<Option<i64> as ToSqlValue>::NULLABLE);
        assert!(!<i64 as ToSqlValue>::NULLABLE);
        assert_eq!(None::<i64>.to_sql_value(), SqlValue::Null);
        assert_eq!(Some(3i64).to_sql_value(), SqlValue::Int(3));
        assert_eq!(None::<String>.to_sql_value(), SqlValue::Null);
    }

    #[test]
    fn test_box_derefs() {
        let boxed: Box<u32> = Box::new(9);
        assert!(<Box<u32> as ToSqlValue>::NULLABLE);
        assert_eq!(boxed.to_sql_value(), SqlValue::UInt(9));
    }

    #[test]
    fn test_json_is_stored_as_text() {
        let doc = serde_json::json!({"nodes": []});
        assert_eq!(
            doc.to_sql_value(),
            SqlValue::Text("{\"nodes\":[]}".to_string())
        );
    }
}
