//! MaxDB value type for parameters and query results.

use super::lob::LongValue;
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// A single column or parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum MaxDbValue {
    /// NULL value.
    Null,
    /// BOOLEAN.
    Boolean(bool),
    /// SMALLINT / INTEGER.
    Integer(i64),
    /// FIXED, scaled to the column's fraction digits.
    Decimal(BigDecimal),
    /// FLOAT / VFLOAT.
    Float(f64),
    /// Character data.
    String(String),
    /// Byte data (CHAR BYTE, VARCHAR BYTE).
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    /// LONG column: descriptor plus inline data.
    Long(LongValue),
}

impl MaxDbValue {
    /// Check if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, MaxDbValue::Null)
    }

    /// Try to get the value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MaxDbValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to i64. Decimals with a fraction are rejected.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            MaxDbValue::Integer(v) => Some(*v),
            MaxDbValue::Decimal(d) if d.is_integer() => d.to_i64(),
            MaxDbValue::Boolean(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Try to convert to f64.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            MaxDbValue::Float(v) => Some(*v),
            MaxDbValue::Integer(v) => Some(*v as f64),
            MaxDbValue::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<BigDecimal> {
        match self {
            MaxDbValue::Decimal(d) => Some(d.clone()),
            MaxDbValue::Integer(v) => Some(BigDecimal::from(*v)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MaxDbValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get the value as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            MaxDbValue::Bytes(bytes) => Some(bytes),
            MaxDbValue::Long(long) => long.as_bytes(),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            MaxDbValue::Timestamp(ts) => Some(*ts),
            MaxDbValue::Date(d) => d.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<&LongValue> {
        match self {
            MaxDbValue::Long(long) => Some(long),
            _ => None,
        }
    }

    /// Name of the variant, used in conversion errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MaxDbValue::Null => "NULL",
            MaxDbValue::Boolean(_) => "boolean",
            MaxDbValue::Integer(_) => "integer",
            MaxDbValue::Decimal(_) => "decimal",
            MaxDbValue::Float(_) => "float",
            MaxDbValue::String(_) => "string",
            MaxDbValue::Bytes(_) => "bytes",
            MaxDbValue::Date(_) => "date",
            MaxDbValue::Time(_) => "time",
            MaxDbValue::Timestamp(_) => "timestamp",
            MaxDbValue::Long(_) => "long",
        }
    }
}

impl fmt::Display for MaxDbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxDbValue::Null => write!(f, "NULL"),
            MaxDbValue::Boolean(b) => write!(f, "{}", b),
            MaxDbValue::Integer(v) => write!(f, "{}", v),
            MaxDbValue::Decimal(d) => write!(f, "{}", d),
            MaxDbValue::Float(v) => write!(f, "{}", v),
            MaxDbValue::String(s) => write!(f, "{}", s),
            MaxDbValue::Bytes(bytes) => write!(f, "<BYTES: {} bytes>", bytes.len()),
            MaxDbValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            MaxDbValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            MaxDbValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.6f")),
            MaxDbValue::Long(long) => match long.as_string() {
                Some(text) if long.is_complete() => write!(f, "{}", text),
                _ => write!(f, "<LONG: {} bytes>", long.max_len()),
            },
        }
    }
}

impl From<&str> for MaxDbValue {
    fn from(value: &str) -> Self {
        MaxDbValue::String(value.to_string())
    }
}

impl From<String> for MaxDbValue {
    fn from(value: String) -> Self {
        MaxDbValue::String(value)
    }
}

impl From<i64> for MaxDbValue {
    fn from(value: i64) -> Self {
        MaxDbValue::Integer(value)
    }
}

impl From<i32> for MaxDbValue {
    fn from(value: i32) -> Self {
        MaxDbValue::Integer(value as i64)
    }
}

impl From<f64> for MaxDbValue {
    fn from(value: f64) -> Self {
        MaxDbValue::Float(value)
    }
}

impl From<bool> for MaxDbValue {
    fn from(value: bool) -> Self {
        MaxDbValue::Boolean(value)
    }
}

impl From<BigDecimal> for MaxDbValue {
    fn from(value: BigDecimal) -> Self {
        MaxDbValue::Decimal(value)
    }
}

impl From<Vec<u8>> for MaxDbValue {
    fn from(value: Vec<u8>) -> Self {
        MaxDbValue::Bytes(value)
    }
}

impl From<NaiveDateTime> for MaxDbValue {
    fn from(value: NaiveDateTime) -> Self {
        MaxDbValue::Timestamp(value)
    }
}

impl From<NaiveDate> for MaxDbValue {
    fn from(value: NaiveDate) -> Self {
        MaxDbValue::Date(value)
    }
}

impl From<NaiveTime> for MaxDbValue {
    fn from(value: NaiveTime) -> Self {
        MaxDbValue::Time(value)
    }
}

impl<T: Into<MaxDbValue>> From<Option<T>> for MaxDbValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(MaxDbValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_null() {
        let val = MaxDbValue::Null;
        assert!(val.is_null());
        assert_eq!(val.as_str(), None);
        assert_eq!(format!("{}", val), "NULL");
        assert_eq!(MaxDbValue::from(None::<i64>), MaxDbValue::Null);
    }

    #[test]
    fn test_decimal_conversions() {
        let val = MaxDbValue::Decimal(BigDecimal::from_str("123.45").unwrap());
        assert_eq!(val.to_i64(), None);
        assert_eq!(val.to_f64(), Some(123.45));
        assert_eq!(val.to_string(), "123.45");

        let whole = MaxDbValue::Decimal(BigDecimal::from_str("42.00").unwrap());
        assert_eq!(whole.to_i64(), Some(42));
    }

    #[test]
    fn test_temporal_display() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(13, 5, 9, 120)
            .unwrap();
        assert_eq!(
            MaxDbValue::from(ts).to_string(),
            "2024-02-29 13:05:09.000120"
        );
        let date = MaxDbValue::Date(ts.date());
        assert_eq!(date.to_string(), "2024-02-29");
        assert_eq!(date.as_timestamp().unwrap().date(), ts.date());
    }

    #[test]
    fn test_from_impls() {
        assert_eq!(MaxDbValue::from("x").as_str(), Some("x"));
        assert_eq!(MaxDbValue::from(7i32).to_i64(), Some(7));
        assert_eq!(MaxDbValue::from(true).as_bool(), Some(true));
        assert_eq!(MaxDbValue::from(vec![1u8, 2]).as_bytes(), Some(&[1u8, 2][..]));
    }
}
