//! Schema catalog
//!
//! Discovers databases, tables, columns and primary keys from the catalog
//! views at runtime. Nothing is cached here: callers re-describe a table on
//! every selection because the schema may change in between.

use crate::config::{ConnectionProfile, Settings};
use crate::db::Database;
use crate::db::coerce::BoundValue;
use crate::db::session::Session;
use crate::db::types::{CellValue, DataType, QueryResults};
use crate::error::{DbError, DbResult};
use crate::sql::Statement;

pub(crate) const LIST_DATABASES_SQL: &str = "SELECT datname::text FROM pg_database \
     WHERE NOT datistemplate \
     ORDER BY datname";

pub(crate) const LIST_TABLES_SQL: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

pub(crate) const TABLE_EXISTS_SQL: &str = "SELECT count(*)::int8 FROM information_schema.tables \
     WHERE table_schema = 'public' AND table_type = 'BASE TABLE' AND table_name = $1";

pub(crate) const TABLE_COLUMNS_SQL: &str =
    "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod), NOT a.attnotnull \
     FROM pg_attribute a \
     JOIN pg_class c ON c.oid = a.attrelid \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     WHERE n.nspname = 'public' AND c.relname = $1 \
       AND a.attnum > 0 AND NOT a.attisdropped \
     ORDER BY a.attnum";

pub(crate) const PRIMARY_KEY_SQL: &str = "SELECT kcu.column_name::text \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name \
      AND tc.constraint_schema = kcu.constraint_schema \
      AND tc.table_name = kcu.table_name \
     WHERE tc.table_schema = 'public' AND tc.table_name = $1 \
       AND tc.constraint_type = 'PRIMARY KEY' \
     ORDER BY kcu.ordinal_position";

/// A table column as discovered from the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Declared type
    pub data_type: DataType,
    /// Whether the column accepts NULL
    pub nullable: bool,
}

/// Structure of one table, re-derived on every selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Table name
    pub name: String,
    /// Columns in physical order
    pub columns: Vec<ColumnInfo>,
    /// The single key column used for edits and deletes
    pub primary_key: Option<String>,
}

impl TableDescriptor {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// The key column, or `NoPrimaryKey` when the table has none
    pub fn require_primary_key(&self) -> DbResult<&str> {
        self.primary_key
            .as_deref()
            .ok_or_else(|| DbError::NoPrimaryKey(self.name.clone()))
    }
}

/// List databases reachable with `profile`, template databases excluded.
///
/// Opens a short-lived connection of its own and closes it afterwards.
pub async fn list_databases<D: Database>(
    profile: &ConnectionProfile,
    settings: &Settings,
) -> DbResult<Vec<String>> {
    let mut session = Session::<D>::connect(profile, settings).await?;
    let result = session
        .query(&Statement::new(LIST_DATABASES_SQL))
        .await
        .map_err(catalog_error)
        .map(|r| first_column_text(&r));
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "failed to close catalog connection");
    }
    result
}

/// List user base tables in the public schema, ordered by name
pub async fn list_tables<D: Database>(session: &mut Session<D>) -> DbResult<Vec<String>> {
    let results = session
        .query(&Statement::new(LIST_TABLES_SQL))
        .await
        .map_err(catalog_error)?;
    Ok(first_column_text(&results))
}

/// Describe one table: its columns in physical order and its key column.
///
/// A composite key is reduced to its first column (logged); a table with no
/// key yields `primary_key: None`, which is not an error here.
pub async fn describe_table<D: Database>(
    session: &mut Session<D>,
    table: &str,
) -> DbResult<TableDescriptor> {
    let name_param = || vec![BoundValue::Text(table.to_string())];

    let exists = session
        .query(&Statement::with_params(TABLE_EXISTS_SQL, name_param()))
        .await
        .map_err(catalog_error)?;
    let count = exists
        .rows
        .first()
        .and_then(|r| r.values.first())
        .map_or(0, |v| match v {
            CellValue::Integer(n) => *n,
            other => other
                .to_text()
                .and_then(|t| t.parse().ok())
                .unwrap_or(0),
        });
    if count == 0 {
        return Err(DbError::UnknownTable(table.to_string()));
    }

    let column_rows = session
        .query(&Statement::with_params(TABLE_COLUMNS_SQL, name_param()))
        .await
        .map_err(catalog_error)?;
    let columns = column_rows
        .rows
        .iter()
        .filter_map(|row| {
            let name = row.values.first()?.to_text()?;
            let type_name = row.values.get(1).and_then(CellValue::to_text);
            let nullable = !matches!(row.values.get(2), Some(CellValue::Boolean(false)));
            Some(ColumnInfo {
                name,
                data_type: type_name
                    .as_deref()
                    .map_or(DataType::Unknown("unknown".to_string()), datatype_from_format_type),
                nullable,
            })
        })
        .collect::<Vec<_>>();

    let key_rows = session
        .query(&Statement::with_params(PRIMARY_KEY_SQL, name_param()))
        .await
        .map_err(catalog_error)?;
    let key_columns = first_column_text(&key_rows);
    if key_columns.len() > 1 {
        tracing::warn!(
            table,
            key_columns = ?key_columns,
            "composite primary key; edits and deletes use the first key column only"
        );
    }
    let primary_key = key_columns.into_iter().next();

    tracing::debug!(
        table,
        columns = columns.len(),
        primary_key = primary_key.as_deref().unwrap_or("<none>"),
        "described table"
    );

    Ok(TableDescriptor {
        name: table.to_string(),
        columns,
        primary_key,
    })
}

fn first_column_text(results: &QueryResults) -> Vec<String> {
    results
        .rows
        .iter()
        .filter_map(|r| r.values.first().and_then(CellValue::to_text))
        .collect()
}

/// Catalog reads report as schema failures; connection loss stays as is
fn catalog_error(e: DbError) -> DbError {
    match e {
        DbError::QueryFailed(msg) => DbError::SchemaLoadFailed(msg),
        other => other,
    }
}

/// Map `format_type()` output to our DataType enum.
///
/// `format_type()` returns strings like "integer", "character varying(255)",
/// "numeric(10,2)", "timestamp with time zone", "text[]", etc.
pub fn datatype_from_format_type(type_name: &str) -> DataType {
    // Handle array types (e.g. "text[]", "integer[]")
    if let Some(inner) = type_name.strip_suffix("[]") {
        return DataType::Array(Box::new(datatype_from_format_type(inner)));
    }

    // Handle parameterized types: extract base name and optional params
    let (base, params) = match (type_name.find('('), type_name.rfind(')')) {
        (Some(open), Some(close)) if close > open => {
            let base = type_name.get(..open).unwrap_or(type_name).trim();
            // "timestamp(3) with time zone" keeps its suffix in the base name
            let suffix = type_name.get(close + 1..).unwrap_or("").trim();
            let params = type_name.get(open + 1..close);
            if suffix.is_empty() {
                (base.to_string(), params)
            } else {
                (format!("{} {}", base, suffix), params)
            }
        }
        _ => (type_name.trim().to_string(), None),
    };

    match base.as_str() {
        "smallint" => DataType::SmallInt,
        "integer" => DataType::Integer,
        "bigint" => DataType::BigInt,
        "real" => DataType::Real,
        "double precision" => DataType::Double,
        "numeric" => DataType::Numeric,
        "text" | "name" => DataType::Text,
        "character varying" => DataType::Varchar(params.and_then(|p| p.parse::<usize>().ok())),
        "character" => DataType::Char(params.and_then(|p| p.parse::<usize>().ok())),
        "boolean" => DataType::Boolean,
        "date" => DataType::Date,
        "time without time zone" => DataType::Time,
        "time with time zone" => DataType::TimeTz,
        "timestamp without time zone" => DataType::Timestamp,
        "timestamp with time zone" => DataType::TimestampTz,
        "interval" => DataType::Interval,
        "json" => DataType::Json,
        "jsonb" => DataType::Jsonb,
        "bytea" => DataType::Bytea,
        "uuid" => DataType::Uuid,
        _ => DataType::Unknown(type_name.to_string()),
    }
}
