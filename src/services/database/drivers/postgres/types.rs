//! PostgreSQL type conversion utilities.
//!
//! This module handles conversion between PostgreSQL types (from SQLx)
//! and the generic `Value` type, in both directions.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgSslMode, PgTypeInfo};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, Type, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::services::database::traits::{Row as TraitRow, TlsMode, Value};

pub(crate) type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// A NULL parameter with no declared type.
///
/// OID 0 leaves the parameter type unspecified, so the server infers it from
/// the surrounding statement, as it does for NULL on SQLite.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Converter between PostgreSQL values and the unified `Value` type.
pub struct PgValueConverter;

impl PgValueConverter {
    /// Convert a PostgreSQL row to a trait Row.
    pub fn convert_row(pg_row: &PgRow) -> TraitRow {
        let columns = pg_row
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();
        let values = pg_row
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| Self::extract_value(pg_row, col.type_info().name(), idx))
            .collect();

        TraitRow::new(columns, values)
    }

    /// Bind a unified value onto a PostgreSQL query.
    pub fn bind<'q>(query: PgQuery<'q>, value: &Value) -> PgQuery<'q> {
        match value {
            Value::Null => query.bind(UntypedNull),
            Value::Bool(v) => query.bind(*v),
            Value::Int32(v) => query.bind(*v),
            Value::Int64(v) => query.bind(*v),
            Value::Float64(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
            Value::Bytes(v) => query.bind(v.clone()),
            Value::Date(v) => query.bind(*v),
            Value::DateTimeTz(v) => query.bind(*v),
            Value::Decimal(v) => query.bind(*v),
            Value::Uuid(v) => query.bind(*v),
            Value::Json(v) => query.bind(v.clone()),
        }
    }

    /// Map the transport trust setting onto a PostgreSQL ssl mode.
    ///
    /// `None` keeps whatever the connection string specified.
    pub fn map_tls_mode(mode: TlsMode) -> Option<PgSslMode> {
        match mode {
            TlsMode::FromUrl => None,
            TlsMode::VerifyFull => Some(PgSslMode::VerifyFull),
        }
    }

    /// Extract a value from a PostgreSQL row at the given column index.
    fn extract_value(row: &PgRow, type_name: &str, index: usize) -> Value {
        match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Err(_) => return Value::Null,
            _ => {}
        }

        Self::decode_by_type(row, index, type_name)
    }

    /// Decode a value based on its PostgreSQL type name.
    fn decode_by_type(row: &PgRow, index: usize, type_name: &str) -> Value {
        match type_name {
            "BOOL" => row
                .try_get::<bool, _>(index)
                .map(Value::Bool)
                .unwrap_or(Value::Null),

            "INT2" => row
                .try_get::<i16, _>(index)
                .map(|v| Value::Int32(i32::from(v)))
                .unwrap_or(Value::Null),

            "INT4" => row
                .try_get::<i32, _>(index)
                .map(Value::Int32)
                .unwrap_or(Value::Null),

            "INT8" => row
                .try_get::<i64, _>(index)
                .map(Value::Int64)
                .unwrap_or(Value::Null),

            "FLOAT4" => row
                .try_get::<f32, _>(index)
                .map(|v| Value::Float64(f64::from(v)))
                .unwrap_or(Value::Null),

            "FLOAT8" => row
                .try_get::<f64, _>(index)
                .map(Value::Float64)
                .unwrap_or(Value::Null),

            "NUMERIC" => row
                .try_get::<Decimal, _>(index)
                .map(Value::Decimal)
                .unwrap_or(Value::Null),

            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
                .try_get::<String, _>(index)
                .map(Value::Text)
                .unwrap_or(Value::Null),

            "BYTEA" => row
                .try_get::<Vec<u8>, _>(index)
                .map(Value::Bytes)
                .unwrap_or(Value::Null),

            "DATE" => row
                .try_get::<NaiveDate, _>(index)
                .map(Value::Date)
                .unwrap_or(Value::Null),

            // Naive timestamps are taken to be UTC
            "TIMESTAMP" => row
                .try_get::<NaiveDateTime, _>(index)
                .map(|v| Value::DateTimeTz(v.and_utc()))
                .unwrap_or(Value::Null),

            "TIMESTAMPTZ" => row
                .try_get::<DateTime<Utc>, _>(index)
                .map(Value::DateTimeTz)
                .unwrap_or(Value::Null),

            "UUID" => row
                .try_get::<Uuid, _>(index)
                .map(Value::Uuid)
                .unwrap_or(Value::Null),

            "JSON" | "JSONB" => row
                .try_get::<serde_json::Value, _>(index)
                .map(Value::Json)
                .unwrap_or(Value::Null),

            _ => Self::decode_as_string_fallback(row, index, type_name),
        }
    }

    /// Fallback for types without a mapping (enums, domains, citext).
    fn decode_as_string_fallback(row: &PgRow, index: usize, type_name: &str) -> Value {
        match row.try_get_unchecked::<String, _>(index) {
            Ok(s) => Value::Text(s),
            Err(e) => {
                tracing::debug!(type_name, error = %e, "Unsupported PostgreSQL column type");
                Value::Null
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_parameter_type_is_unspecified() {
        assert_eq!(UntypedNull::type_info().oid(), Some(Oid(0)));
    }

    #[test]
    fn test_tls_mode_mapping() {
        assert!(PgValueConverter::map_tls_mode(TlsMode::FromUrl).is_none());
        assert!(matches!(
            PgValueConverter::map_tls_mode(TlsMode::VerifyFull),
            Some(PgSslMode::VerifyFull)
        ));
    }
}
