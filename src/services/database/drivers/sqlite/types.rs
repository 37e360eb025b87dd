//! SQLite type conversion utilities.
//!
//! This module handles conversion between SQLite values (from SQLx) and the
//! generic `Value` type, in both directions.
//!
//! SQLite uses dynamic typing, so decoding goes by the storage class of each
//! individual value rather than the declared column type:
//! - INTEGER: 64-bit signed integer
//! - REAL: 64-bit floating point
//! - TEXT: UTF-8 string
//! - BLOB: Binary data
//! - NULL: Null value

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

use crate::services::database::traits::{Row as TraitRow, Value};

pub(crate) type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Converter between SQLite values and the unified `Value` type.
pub struct SqliteValueConverter;

impl SqliteValueConverter {
    /// Convert a SQLite row to a trait Row.
    pub fn convert_row(sqlite_row: &SqliteRow) -> TraitRow {
        let columns = sqlite_row
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();
        let values = (0..sqlite_row.len())
            .map(|idx| Self::extract_value(sqlite_row, idx))
            .collect();

        TraitRow::new(columns, values)
    }

    /// Bind a unified value onto a SQLite query.
    ///
    /// Types SQLite has no native storage class for (decimal, UUID, JSON) are
    /// bound as their canonical text form.
    pub fn bind<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
        match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(v) => query.bind(*v),
            Value::Int32(v) => query.bind(*v),
            Value::Int64(v) => query.bind(*v),
            Value::Float64(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
            Value::Bytes(v) => query.bind(v.clone()),
            Value::Date(v) => query.bind(*v),
            Value::DateTimeTz(v) => query.bind(*v),
            Value::Decimal(v) => query.bind(v.to_string()),
            Value::Uuid(v) => query.bind(v.hyphenated().to_string()),
            Value::Json(v) => query.bind(v.to_string()),
        }
    }

    /// Extract a value from a SQLite row at the given column index.
    fn extract_value(row: &SqliteRow, index: usize) -> Value {
        let storage_class = match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Ok(raw) => raw.type_info().name().to_uppercase(),
            Err(_) => return Value::Null,
        };

        Self::decode_by_storage_class(row, index, &storage_class)
    }

    /// Decode a value based on its runtime storage class.
    fn decode_by_storage_class(row: &SqliteRow, index: usize, storage_class: &str) -> Value {
        match storage_class {
            "INTEGER" => row
                .try_get::<i64, _>(index)
                .map(Value::Int64)
                .unwrap_or(Value::Null),

            "REAL" => row
                .try_get::<f64, _>(index)
                .map(Value::Float64)
                .unwrap_or(Value::Null),

            "BLOB" => row
                .try_get::<Vec<u8>, _>(index)
                .map(Value::Bytes)
                .unwrap_or(Value::Null),

            // TEXT, and anything the driver reports under a declared type name
            _ => row
                .try_get::<String, _>(index)
                .map(Value::Text)
                .or_else(|_| row.try_get::<i64, _>(index).map(Value::Int64))
                .or_else(|_| row.try_get::<f64, _>(index).map(Value::Float64))
                .unwrap_or(Value::Null),
        }
    }
}
