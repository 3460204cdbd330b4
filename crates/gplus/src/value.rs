//! Tagged value type used for every bound argument and decoded column.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;
use std::error::Error;
use std::fmt;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

/// A dynamically typed SQL value.
///
/// `List` only appears as the operand of `IN`/`NOT IN` and is expanded into one
/// placeholder per element. `Raw` is spliced into the SQL text verbatim.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Json(serde_json::Value),
    List(Vec<Value>),
    Raw(String),
}

impl Value {
    /// Build a `List` from anything convertible into values.
    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(values.into_iter().map(Into::into).collect())
    }

    /// An SQL expression emitted inline instead of bound.
    pub fn raw(sql: impl Into<String>) -> Self {
        Value::Raw(sql.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this is the zero value of its type.
    ///
    /// Sparse updates skip zero-valued fields and inserts skip a zero primary key.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Decimal(d) => d.is_zero(),
            Value::Text(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Uuid(u) => u.is_nil(),
            Value::Timestamp(t) => t.timestamp() == 0 && t.timestamp_subsec_nanos() == 0,
            Value::DateTime(t) => *t == NaiveDateTime::default(),
            Value::Date(d) => *d == NaiveDate::default(),
            Value::Json(j) => j.is_null(),
            Value::List(items) => items.is_empty(),
            Value::Raw(sql) => sql.is_empty(),
        }
    }

    /// JSON form used for map-shaped results. Decimals and timestamps become
    /// strings to keep precision.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Value::Decimal(d) => Json::String(d.to_string()),
            Value::Text(s) | Value::Raw(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::from(b.clone()),
            Value::Uuid(u) => Json::String(u.to_string()),
            Value::Timestamp(t) => Json::String(t.to_rfc3339()),
            Value::DateTime(t) => Json::String(t.to_string()),
            Value::Date(d) => Json::String(d.to_string()),
            Value::Json(j) => j.clone(),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// Human readable name of the variant, used in decode errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "numeric",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamptz",
            Value::DateTime(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Json(_) => "json",
            Value::List(_) => "list",
            Value::Raw(_) => "raw",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Value::DateTime(t) => write!(f, "{t}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Json(j) => write!(f, "{j}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Raw(sql) => f.write_str(sql),
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

type BindError = Box<dyn Error + Sync + Send>;

/// Binding converts the value to the parameter type the server declared.
/// A variant that cannot represent that type is an error, never a silent
/// reinterpretation of its bytes.
impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) if is_text(ty) => b.to_string().to_sql_checked(ty, out),
            Value::Bool(b) => b.to_sql_checked(ty, out),
            Value::Int(i) => int_to_sql(*i, ty, out),
            Value::Float(v) => float_to_sql(*v, ty, out),
            Value::Decimal(d) => decimal_to_sql(d, ty, out),
            Value::Text(s) => text_to_sql(s, ty, out),
            Value::Bytes(b) => b.to_sql_checked(ty, out),
            Value::Uuid(u) if is_text(ty) => u.to_string().to_sql_checked(ty, out),
            Value::Uuid(u) => u.to_sql_checked(ty, out),
            Value::Timestamp(t) if *ty == Type::TIMESTAMP => t.naive_utc().to_sql_checked(ty, out),
            Value::Timestamp(t) => t.to_sql_checked(ty, out),
            Value::DateTime(t) if *ty == Type::TIMESTAMPTZ => t.and_utc().to_sql_checked(ty, out),
            Value::DateTime(t) => t.to_sql_checked(ty, out),
            Value::Date(d) => d.to_sql_checked(ty, out),
            Value::Json(j) => j.to_sql_checked(ty, out),
            Value::List(_) => Err("a list value must be expanded before binding".into()),
            Value::Raw(sql) => Err(format!("raw SQL `{sql}` cannot be bound as a parameter").into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn is_text(ty: &Type) -> bool {
    *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
}

fn int_to_sql(i: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    if *ty == Type::INT2 {
        i16::try_from(i)?.to_sql_checked(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(i)?.to_sql_checked(ty, out)
    } else if *ty == Type::OID {
        u32::try_from(i)?.to_sql_checked(ty, out)
    } else if *ty == Type::FLOAT4 {
        (i as f32).to_sql_checked(ty, out)
    } else if *ty == Type::FLOAT8 {
        (i as f64).to_sql_checked(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from(i).to_sql_checked(ty, out)
    } else if is_text(ty) {
        i.to_string().to_sql_checked(ty, out)
    } else {
        i.to_sql_checked(ty, out)
    }
}

fn float_to_sql(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    if *ty == Type::FLOAT4 {
        (v as f32).to_sql_checked(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::try_from(v)?.to_sql_checked(ty, out)
    } else if is_text(ty) {
        v.to_string().to_sql_checked(ty, out)
    } else {
        v.to_sql_checked(ty, out)
    }
}

fn decimal_to_sql(d: &Decimal, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    if *ty == Type::FLOAT4 || *ty == Type::FLOAT8 {
        let v = d.to_f64().ok_or("numeric value out of float range")?;
        float_to_sql(v, ty, out)
    } else if is_text(ty) {
        d.to_string().to_sql_checked(ty, out)
    } else {
        d.to_sql_checked(ty, out)
    }
}

/// Text is parsed into the declared type so `eq("id", "42")` binds an integer.
fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    if *ty == Type::INT2 {
        s.parse::<i16>()?.to_sql_checked(ty, out)
    } else if *ty == Type::INT4 {
        s.parse::<i32>()?.to_sql_checked(ty, out)
    } else if *ty == Type::INT8 {
        s.parse::<i64>()?.to_sql_checked(ty, out)
    } else if *ty == Type::FLOAT4 {
        s.parse::<f32>()?.to_sql_checked(ty, out)
    } else if *ty == Type::FLOAT8 {
        s.parse::<f64>()?.to_sql_checked(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from_str(s)?.to_sql_checked(ty, out)
    } else if *ty == Type::BOOL {
        parse_bool(s)?.to_sql_checked(ty, out)
    } else if *ty == Type::UUID {
        Uuid::parse_str(s)?.to_sql_checked(ty, out)
    } else if *ty == Type::DATE {
        NaiveDate::from_str(s)?.to_sql_checked(ty, out)
    } else if *ty == Type::TIMESTAMP {
        NaiveDateTime::from_str(s)?.to_sql_checked(ty, out)
    } else if *ty == Type::TIMESTAMPTZ {
        DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc).to_sql_checked(ty, out)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        serde_json::from_str::<serde_json::Value>(s)?.to_sql_checked(ty, out)
    } else {
        s.to_sql_checked(ty, out)
    }
}

fn parse_bool(s: &str) -> Result<bool, BindError> {
    match s.to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("`{s}` is not a boolean").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_none_becomes_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
    }

    #[test]
    fn zero_values() {
        assert!(Value::from(0_i32).is_zero());
        assert!(Value::from("").is_zero());
        assert!(Value::from(false).is_zero());
        assert!(Value::from(Uuid::nil()).is_zero());
        assert!(!Value::from(3_i64).is_zero());
        assert!(!Value::from("x").is_zero());
    }

    #[test]
    fn display_uses_plain_formatting() {
        assert_eq!(Value::from(42_i64).to_string(), "42");
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::from(1.5_f64).to_string(), "1.5");
        assert_eq!(Value::list([1, 2]).to_string(), "[1 2]");
    }

    #[test]
    fn int_binds_to_narrower_columns() {
        let mut buf = BytesMut::new();
        Value::Int(7).to_sql(&Type::INT4, &mut buf).unwrap();
        assert_eq!(&buf[..], &7_i32.to_be_bytes());

        let mut buf = BytesMut::new();
        assert!(Value::Int(i64::MAX).to_sql(&Type::INT2, &mut buf).is_err());
    }

    fn encode(value: &Value, ty: &Type) -> Result<Vec<u8>, BindError> {
        let mut buf = BytesMut::new();
        value.to_sql_checked(ty, &mut buf)?;
        Ok(buf.to_vec())
    }

    fn expected<T: ToSql>(value: T, ty: &Type) -> Vec<u8> {
        let mut buf = BytesMut::new();
        value.to_sql(ty, &mut buf).unwrap();
        buf.to_vec()
    }

    fn numeric(raw: &[u8]) -> Decimal {
        <Decimal as tokio_postgres::types::FromSql>::from_sql(&Type::NUMERIC, raw).unwrap()
    }

    #[test]
    fn numbers_bind_to_numeric_as_decimal() {
        let sum = encode(&Value::Int(100), &Type::NUMERIC).unwrap();
        assert_eq!(sum, expected(Decimal::from(100), &Type::NUMERIC));
        assert_ne!(sum, 100_i64.to_be_bytes().to_vec());

        let avg = encode(&Value::Float(2.5), &Type::NUMERIC).unwrap();
        assert_eq!(numeric(&avg), Decimal::new(25, 1));

        assert!(encode(&Value::Float(f64::NAN), &Type::NUMERIC).is_err());
    }

    #[test]
    fn text_is_parsed_into_declared_type() {
        assert_eq!(
            encode(&Value::from("1234"), &Type::INT4).unwrap(),
            1234_i32.to_be_bytes().to_vec()
        );
        assert_eq!(
            encode(&Value::from("1234"), &Type::INT8).unwrap(),
            1234_i64.to_be_bytes().to_vec()
        );
        assert_eq!(encode(&Value::from("true"), &Type::BOOL).unwrap(), vec![1]);
        let price = encode(&Value::from("12.50"), &Type::NUMERIC).unwrap();
        assert_eq!(numeric(&price), Decimal::new(1250, 2));
        assert!(encode(&Value::from("12ab"), &Type::INT4).is_err());
    }

    #[test]
    fn mismatched_variants_are_rejected() {
        assert!(encode(&Value::Bool(true), &Type::INT4).is_err());
        assert!(encode(&Value::Bytes(vec![1]), &Type::TEXT).is_err());
        assert!(encode(&Value::Json(serde_json::json!({"a": 1})), &Type::INT8).is_err());
        assert!(encode(&Value::Int(1), &Type::UUID).is_err());
        assert_eq!(encode(&Value::Int(7), &Type::TEXT).unwrap(), b"7".to_vec());
    }

    #[test]
    fn list_and_raw_refuse_to_bind() {
        let mut buf = BytesMut::new();
        assert!(Value::list([1]).to_sql(&Type::INT8, &mut buf).is_err());
        assert!(Value::raw("now()").to_sql(&Type::TEXT, &mut buf).is_err());
    }
}
