//! Driver-neutral rows and the row mapping traits

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use tokio_postgres::types::{FromSql, Type};
use uuid::Uuid;

/// A result row: column names with their decoded values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from parallel column and value lists.
    ///
    /// Extra values are dropped and missing values are filled with `Null`.
    pub fn new(columns: Vec<String>, mut values: Vec<Value>) -> Self {
        values.resize(columns.len(), Value::Null);
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, C, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, V)>,
        C: Into<String>,
        V: Into<Value>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(c, v)| (c.into(), v.into()))
            .unzip();
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Raw value of a column, if present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Decode a column by name.
    ///
    /// A column that was not selected decodes to the zero value of `T`.
    pub fn try_get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        match self.get(column) {
            Some(value) => T::from_value(value).map_err(|msg| OrmError::decode(column, msg)),
            None => Ok(T::zero()),
        }
    }

    /// Decode a column by position.
    pub fn try_get_idx<T: FromValue>(&self, idx: usize) -> OrmResult<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            OrmError::decode(
                format!("#{idx}"),
                format!("row has only {} columns", self.values.len()),
            )
        })?;
        let column = self.columns[idx].as_str();
        T::from_value(value).map_err(|msg| OrmError::decode(column, msg))
    }

    /// Convert a `tokio_postgres` row by inspecting each column type.
    pub fn from_pg(row: &tokio_postgres::Row) -> OrmResult<Self> {
        let mut columns = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());
        for (idx, column) in row.columns().iter().enumerate() {
            values.push(pg_value(row, idx, column.name(), column.type_())?);
            columns.push(column.name().to_string());
        }
        Ok(Self { columns, values })
    }
}

fn pg_get<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    idx: usize,
    name: &str,
) -> OrmResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| OrmError::decode(name, e.to_string()))
}

fn pg_list<'a, T>(row: &'a tokio_postgres::Row, idx: usize, name: &str) -> OrmResult<Value>
where
    T: FromSql<'a> + Into<Value>,
{
    Ok(pg_get::<Vec<T>>(row, idx, name)?.map_or(Value::Null, Value::list))
}

fn pg_value(row: &tokio_postgres::Row, idx: usize, name: &str, ty: &Type) -> OrmResult<Value> {
    let value = match *ty {
        Type::BOOL => pg_get::<bool>(row, idx, name)?.into(),
        Type::INT2 => pg_get::<i16>(row, idx, name)?.into(),
        Type::INT4 => pg_get::<i32>(row, idx, name)?.into(),
        Type::INT8 => pg_get::<i64>(row, idx, name)?.into(),
        Type::OID => pg_get::<u32>(row, idx, name)?.into(),
        Type::FLOAT4 => pg_get::<f32>(row, idx, name)?.into(),
        Type::FLOAT8 => pg_get::<f64>(row, idx, name)?.into(),
        Type::NUMERIC => pg_get::<Decimal>(row, idx, name)?.into(),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            pg_get::<String>(row, idx, name)?.into()
        }
        Type::BYTEA => pg_get::<Vec<u8>>(row, idx, name)?.into(),
        Type::UUID => pg_get::<Uuid>(row, idx, name)?.into(),
        Type::JSON | Type::JSONB => pg_get::<serde_json::Value>(row, idx, name)?.into(),
        Type::TIMESTAMPTZ => pg_get::<DateTime<Utc>>(row, idx, name)?.into(),
        Type::TIMESTAMP => pg_get::<NaiveDateTime>(row, idx, name)?.into(),
        Type::DATE => pg_get::<NaiveDate>(row, idx, name)?.into(),
        Type::INT4_ARRAY => pg_list::<i32>(row, idx, name)?,
        Type::INT8_ARRAY => pg_list::<i64>(row, idx, name)?,
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => pg_list::<String>(row, idx, name)?,
        Type::UUID_ARRAY => pg_list::<Uuid>(row, idx, name)?,
        _ => {
            return Err(OrmError::decode(
                name,
                format!("unsupported column type `{}`", ty.name()),
            ));
        }
    };
    Ok(value)
}

/// Conversion from a [`Value`] into a Rust type.
pub trait FromValue: Sized {
    /// Convert a non-missing value. `Null` is an error unless `Self` is optional.
    fn from_value(value: &Value) -> Result<Self, String>;

    /// Value used when the column is absent from the row (partial selects).
    fn zero() -> Self;
}

fn mismatch(expected: &str, found: &Value) -> String {
    if found.is_null() {
        format!("unexpected NULL for non-optional {expected}")
    } else {
        format!("expected {expected}, found {}", found.type_name())
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),*) => {
        $(impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self, String> {
                match value {
                    Value::Int(i) => <$ty>::try_from(*i).map_err(|e| e.to_string()),
                    other => Err(mismatch(stringify!($ty), other)),
                }
            }

            fn zero() -> Self {
                0
            }
        })*
    };
}

impl_from_value_int!(i16, i32, i64, u32);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(i) => Ok(*i as f64),
            Value::Decimal(d) => d.to_f64().ok_or_else(|| format!("{d} does not fit in f64")),
            other => Err(mismatch("f64", other)),
        }
    }

    fn zero() -> Self {
        0.0
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Int(i) => Ok(Decimal::from(*i)),
            Value::Float(v) => Decimal::try_from(*v).map_err(|e| e.to_string()),
            other => Err(mismatch("numeric", other)),
        }
    }

    fn zero() -> Self {
        Decimal::ZERO
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        f64::from_value(value).map(|v| v as f32)
    }

    fn zero() -> Self {
        0.0
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }

    fn zero() -> Self {
        false
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Uuid(u) => Ok(u.to_string()),
            other => Err(mismatch("text", other)),
        }
    }

    fn zero() -> Self {
        String::new()
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(mismatch("bytes", other)),
        }
    }

    fn zero() -> Self {
        Vec::new()
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => Uuid::parse_str(s).map_err(|e| e.to_string()),
            other => Err(mismatch("uuid", other)),
        }
    }

    fn zero() -> Self {
        Uuid::nil()
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(t) => Ok(*t),
            Value::DateTime(t) => Ok(t.and_utc()),
            other => Err(mismatch("timestamptz", other)),
        }
    }

    fn zero() -> Self {
        DateTime::<Utc>::UNIX_EPOCH
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::DateTime(t) => Ok(*t),
            Value::Timestamp(t) => Ok(t.naive_utc()),
            other => Err(mismatch("timestamp", other)),
        }
    }

    fn zero() -> Self {
        NaiveDateTime::default()
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Date(d) => Ok(*d),
            other => Err(mismatch("date", other)),
        }
    }

    fn zero() -> Self {
        NaiveDate::default()
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Null => Ok(serde_json::Value::Null),
            Value::Text(s) => serde_json::from_str(s).map_err(|e| e.to_string()),
            other => Err(mismatch("json", other)),
        }
    }

    fn zero() -> Self {
        serde_json::Value::Null
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }

    fn zero() -> Self {
        Value::Null
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn zero() -> Self {
        None
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            other => Err(mismatch("array", other)),
        }
    }

    fn zero() -> Self {
        Vec::new()
    }
}

/// Trait for converting a row into a Rust struct.
///
/// This trait should typically be derived using `#[derive(FromRow)]`
/// from the `gplus-derive` crate.
///
/// # Example
///
/// ```ignore
/// use gplus::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     id: i64,
///     username: String,
///     email: Option<String>,
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a row into Self
    fn from_row(row: &Row) -> OrmResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row.clone())
    }
}

/// Rows as column maps, for results without a dedicated struct.
impl FromRow for HashMap<String, Value> {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row
            .columns()
            .iter()
            .cloned()
            .zip(row.values().iter().cloned())
            .collect())
    }
}

impl FromRow for serde_json::Map<String, serde_json::Value> {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row
            .columns()
            .iter()
            .zip(row.values())
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect())
    }
}

macro_rules! impl_from_row_tuple {
    ($($idx:tt => $ty:ident),+) => {
        impl<$($ty: FromValue),+> FromRow for ($($ty,)+) {
            fn from_row(row: &Row) -> OrmResult<Self> {
                Ok(($(row.try_get_idx::<$ty>($idx)?,)+))
            }
        }
    };
}

impl_from_row_tuple!(0 => A);
impl_from_row_tuple!(0 => A, 1 => B);
impl_from_row_tuple!(0 => A, 1 => B, 2 => C);
impl_from_row_tuple!(0 => A, 1 => B, 2 => C, 3 => D);
