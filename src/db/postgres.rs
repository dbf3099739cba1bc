//! PostgreSQL database provider
//!
//! Concrete implementation using tokio-postgres.

use crate::config::{ConnectionProfile, Settings, SslMode};
use crate::db::Database;
use crate::db::coerce::BoundValue;
use crate::db::types::{CellValue, ColumnDef, DataType, QueryResults, Row};
use crate::error::{DbError, DbResult};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, SimpleQueryMessage};

/// PostgreSQL database provider
pub struct PostgresProvider {
    /// The tokio-postgres client
    client: Client,
    /// Fires if the background connection task ends with an error
    conn_err_rx: mpsc::UnboundedReceiver<String>,
    /// First loss message seen; sticky once set
    lost: Option<String>,
}

impl PostgresProvider {
    fn ensure_open(&mut self) -> DbResult<()> {
        if self.lost.is_none() {
            if let Ok(msg) = self.conn_err_rx.try_recv() {
                self.lost = Some(msg);
            }
        }
        if let Some(msg) = &self.lost {
            return Err(DbError::ConnectionFailed(msg.clone()));
        }
        if self.client.is_closed() {
            return Err(DbError::ConnectionFailed("connection closed".to_string()));
        }
        Ok(())
    }

    async fn control(&mut self, command: &str) -> DbResult<()> {
        self.ensure_open()?;
        tracing::debug!(command, "transaction control");
        self.client
            .batch_execute(command)
            .await
            .map_err(query_error)
    }
}

impl Database for PostgresProvider {
    /// Connect to a PostgreSQL database.
    ///
    /// The background connection task reports a lost connection through a
    /// channel; the next operation then fails with `ConnectionFailed`.
    async fn connect(profile: &ConnectionProfile, settings: &Settings) -> DbResult<Self> {
        tracing::info!(
            host = %profile.host,
            port = profile.port,
            database = %profile.database,
            ssl_mode = profile.ssl_mode.as_str(),
            "connecting to PostgreSQL"
        );

        let config = pg_config(profile, settings);
        let (conn_err_tx, conn_err_rx) = mpsc::unbounded_channel();

        let client = match profile.ssl_mode {
            SslMode::Disable => {
                let (client, connection) = config
                    .connect(tokio_postgres::NoTls)
                    .await
                    .map_err(|e| DbError::ConnectionFailed(pg_error_message(&e)))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::warn!(error = %e, "PostgreSQL connection lost");
                        let _ = conn_err_tx.send(format!("Connection lost: {}", e));
                    }
                });
                client
            }
            SslMode::Prefer | SslMode::Require => {
                let tls_config = make_tls_config();
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
                let (client, connection) = config
                    .connect(tls)
                    .await
                    .map_err(|e| DbError::ConnectionFailed(pg_error_message(&e)))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::warn!(error = %e, "PostgreSQL connection lost");
                        let _ = conn_err_tx.send(format!("Connection lost: {}", e));
                    }
                });
                client
            }
        };

        tracing::info!(database = %profile.database, "connected");
        Ok(Self {
            client,
            conn_err_rx,
            lost: None,
        })
    }

    #[tracing::instrument(skip_all, fields(sql_preview = %preview(sql), params = params.len()))]
    async fn query(&mut self, sql: &str, params: &[BoundValue]) -> DbResult<QueryResults> {
        self.ensure_open()?;
        let start = std::time::Instant::now();

        let stmt = self.client.prepare(sql).await.map_err(query_error)?;

        let columns: Vec<ColumnDef> = stmt
            .columns()
            .iter()
            .map(|col| ColumnDef::new(col.name(), pg_type_to_datatype(col.type_())))
            .collect();

        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let pg_rows = self
            .client
            .query(&stmt, &param_refs)
            .await
            .map_err(query_error)?;

        let row_count = pg_rows.len();
        let mut rows = Vec::with_capacity(row_count);

        for pg_row in &pg_rows {
            let mut values = Vec::with_capacity(columns.len());
            for (i, col_def) in columns.iter().enumerate() {
                values.push(extract_cell_value(pg_row, i, &col_def.data_type));
            }
            rows.push(Row { values });
        }

        tracing::debug!(row_count, "query returned rows");
        Ok(QueryResults::new(columns, rows, start.elapsed(), row_count))
    }

    #[tracing::instrument(skip_all, fields(sql_preview = %preview(sql)))]
    async fn query_text(&mut self, sql: &str) -> DbResult<QueryResults> {
        self.ensure_open()?;
        let start = std::time::Instant::now();

        let messages = self.client.simple_query(sql).await.map_err(query_error)?;

        let mut columns: Vec<ColumnDef> = Vec::new();
        let mut rows = Vec::new();
        let mut described = false;
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(cols) => {
                    // A new result set replaces the previous statement's
                    columns = cols
                        .iter()
                        .map(|c| ColumnDef::new(c.name(), DataType::Text))
                        .collect();
                    rows.clear();
                    described = true;
                }
                SimpleQueryMessage::Row(row) => {
                    if !described {
                        columns = row
                            .columns()
                            .iter()
                            .map(|c| ColumnDef::new(c.name(), DataType::Text))
                            .collect();
                        described = true;
                    }
                    let values = (0..row.len())
                        .map(|i| match row.try_get(i) {
                            Ok(Some(text)) => CellValue::Text(text.to_string()),
                            _ => CellValue::Null,
                        })
                        .collect();
                    rows.push(Row { values });
                }
                _ => {}
            }
        }

        let row_count = rows.len();
        tracing::debug!(row_count, "text query returned rows");
        Ok(QueryResults::new(columns, rows, start.elapsed(), row_count))
    }

    #[tracing::instrument(skip_all, fields(sql_preview = %preview(sql), params = params.len()))]
    async fn execute(&mut self, sql: &str, params: &[BoundValue]) -> DbResult<u64> {
        self.ensure_open()?;
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let affected = self
            .client
            .execute(sql, &param_refs)
            .await
            .map_err(query_error)?;
        tracing::debug!(affected, "statement executed");
        Ok(affected)
    }

    #[tracing::instrument(skip_all, fields(sql_preview = %preview(sql)))]
    async fn execute_text(&mut self, sql: &str) -> DbResult<u64> {
        self.ensure_open()?;
        let messages = self.client.simple_query(sql).await.map_err(query_error)?;
        let affected = messages
            .iter()
            .map(|message| match message {
                SimpleQueryMessage::CommandComplete(n) => *n,
                _ => 0,
            })
            .sum();
        tracing::debug!(affected, "text statements executed");
        Ok(affected)
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.control("BEGIN").await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.control("COMMIT").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.control("ROLLBACK").await
    }

    async fn close(self) -> DbResult<()> {
        tracing::info!("closing PostgreSQL connection");
        // Dropping the client ends the background connection task
        drop(self.client);
        Ok(())
    }
}

fn pg_config(profile: &ConnectionProfile, settings: &Settings) -> tokio_postgres::Config {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&profile.host)
        .port(profile.port)
        .dbname(&profile.database)
        .user(&profile.username)
        .application_name(&settings.application_name)
        .ssl_mode(match profile.ssl_mode {
            SslMode::Disable => tokio_postgres::config::SslMode::Disable,
            SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            SslMode::Require => tokio_postgres::config::SslMode::Require,
        });
    if let Some(password) = &profile.password {
        config.password(password);
    }
    if let Some(timeout) = settings.connect_timeout() {
        config.connect_timeout(timeout);
    }
    config
}

/// First 100 characters of a statement, for log fields
fn preview(sql: &str) -> String {
    sql.chars().take(100).collect()
}

fn query_error(e: tokio_postgres::Error) -> DbError {
    if e.is_closed() {
        DbError::ConnectionFailed(pg_error_message(&e))
    } else {
        DbError::QueryFailed(pg_error_message(&e))
    }
}

/// Server message plus detail/hint, with friendlier wording for common SQLSTATEs
fn pg_error_message(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }

    let code = db_error.code().code();
    match code {
        "23505" => format!("duplicate value violates unique constraint: {}", message),
        "23503" => format!("foreign key violation: {}", message),
        "23502" => format!("null value violates not-null constraint: {}", message),
        "22P02" => format!("invalid input syntax: {}", message),
        "42P01" => format!("undefined table: {}", message),
        _ => format!("{} (SQLSTATE {})", message, code),
    }
}

/// Map tokio_postgres Type to our DataType enum
fn pg_type_to_datatype(pg_type: &Type) -> DataType {
    match *pg_type {
        Type::INT2 => DataType::SmallInt,
        Type::INT4 => DataType::Integer,
        Type::INT8 => DataType::BigInt,
        Type::FLOAT4 => DataType::Real,
        Type::FLOAT8 => DataType::Double,
        Type::NUMERIC => DataType::Numeric,
        Type::TEXT | Type::NAME => DataType::Text,
        Type::VARCHAR => DataType::Varchar(None),
        Type::CHAR | Type::BPCHAR => DataType::Char(None),
        Type::BOOL => DataType::Boolean,
        Type::DATE => DataType::Date,
        Type::TIME => DataType::Time,
        Type::TIMETZ => DataType::TimeTz,
        Type::TIMESTAMP => DataType::Timestamp,
        Type::TIMESTAMPTZ => DataType::TimestampTz,
        Type::INTERVAL => DataType::Interval,
        Type::JSON => DataType::Json,
        Type::JSONB => DataType::Jsonb,
        Type::BYTEA => DataType::Bytea,
        Type::UUID => DataType::Uuid,
        // Array types
        Type::BOOL_ARRAY => DataType::Array(Box::new(DataType::Boolean)),
        Type::INT2_ARRAY => DataType::Array(Box::new(DataType::SmallInt)),
        Type::INT4_ARRAY => DataType::Array(Box::new(DataType::Integer)),
        Type::INT8_ARRAY => DataType::Array(Box::new(DataType::BigInt)),
        Type::FLOAT8_ARRAY => DataType::Array(Box::new(DataType::Double)),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::NAME_ARRAY => {
            DataType::Array(Box::new(DataType::Text))
        }
        Type::UUID_ARRAY => DataType::Array(Box::new(DataType::Uuid)),
        _ => DataType::Unknown(pg_type.name().to_string()),
    }
}

/// Build a rustls ClientConfig that trusts OS certificates (with Mozilla roots as fallback)
fn make_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    let mut loaded = 0;
    for cert in native_certs.certs {
        if root_store.add(cert).is_ok() {
            loaded += 1;
        }
    }
    if loaded == 0 {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Extract a cell value from a tokio_postgres Row based on the column's DataType.
///
/// Typed extraction first, then a string fallback. Returns CellValue::Null
/// only for actual NULL values.
fn extract_cell_value(row: &tokio_postgres::Row, idx: usize, data_type: &DataType) -> CellValue {
    match data_type {
        DataType::SmallInt => match row.try_get::<_, Option<i16>>(idx) {
            Ok(Some(v)) => CellValue::Integer(v as i64),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Integer => match row.try_get::<_, Option<i32>>(idx) {
            Ok(Some(v)) => CellValue::Integer(v as i64),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::BigInt => match row.try_get::<_, Option<i64>>(idx) {
            Ok(Some(v)) => CellValue::Integer(v),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Real => match row.try_get::<_, Option<f32>>(idx) {
            Ok(Some(v)) => CellValue::Float(v as f64),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Double => match row.try_get::<_, Option<f64>>(idx) {
            Ok(Some(v)) => CellValue::Float(v),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Numeric => match row.try_get::<_, Option<Decimal>>(idx) {
            Ok(Some(v)) => CellValue::Text(v.to_string()),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Boolean => match row.try_get::<_, Option<bool>>(idx) {
            Ok(Some(v)) => CellValue::Boolean(v),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Json | DataType::Jsonb => {
            match row.try_get::<_, Option<serde_json::Value>>(idx) {
                Ok(Some(v)) => CellValue::Json(v),
                Ok(None) => CellValue::Null,
                Err(_) => try_as_string(row, idx),
            }
        }
        DataType::Bytea => match row.try_get::<_, Option<Vec<u8>>>(idx) {
            Ok(Some(v)) => CellValue::Binary(v),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Uuid => match row.try_get::<_, Option<uuid::Uuid>>(idx) {
            Ok(Some(v)) => CellValue::Uuid(v.to_string()),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Timestamp => match row.try_get::<_, Option<chrono::NaiveDateTime>>(idx) {
            Ok(Some(v)) => CellValue::DateTime(v.to_string()),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::TimestampTz => {
            match row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx) {
                Ok(Some(v)) => CellValue::DateTime(v.to_rfc3339()),
                Ok(None) => CellValue::Null,
                Err(_) => try_as_string(row, idx),
            }
        }
        DataType::Date => match row.try_get::<_, Option<chrono::NaiveDate>>(idx) {
            Ok(Some(v)) => CellValue::DateTime(v.to_string()),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Time => match row.try_get::<_, Option<chrono::NaiveTime>>(idx) {
            Ok(Some(v)) => CellValue::DateTime(v.to_string()),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Array(inner) => extract_array_value(row, idx, inner),
        // Text types and fallback for unknown types
        _ => try_as_string(row, idx),
    }
}

/// Extract an array value, falling back to the string path for element
/// types without a direct Rust mapping.
fn extract_array_value(row: &tokio_postgres::Row, idx: usize, inner: &DataType) -> CellValue {
    match inner {
        DataType::Text => match row.try_get::<_, Option<Vec<Option<String>>>>(idx) {
            Ok(Some(v)) => CellValue::Array(
                v.into_iter()
                    .map(|s| s.map_or(CellValue::Null, CellValue::Text))
                    .collect(),
            ),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::SmallInt => match row.try_get::<_, Option<Vec<Option<i16>>>>(idx) {
            Ok(Some(v)) => CellValue::Array(
                v.into_iter()
                    .map(|n| n.map_or(CellValue::Null, |n| CellValue::Integer(n as i64)))
                    .collect(),
            ),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Integer => match row.try_get::<_, Option<Vec<Option<i32>>>>(idx) {
            Ok(Some(v)) => CellValue::Array(
                v.into_iter()
                    .map(|n| n.map_or(CellValue::Null, |n| CellValue::Integer(n as i64)))
                    .collect(),
            ),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::BigInt => match row.try_get::<_, Option<Vec<Option<i64>>>>(idx) {
            Ok(Some(v)) => CellValue::Array(
                v.into_iter()
                    .map(|n| n.map_or(CellValue::Null, CellValue::Integer))
                    .collect(),
            ),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Double => match row.try_get::<_, Option<Vec<Option<f64>>>>(idx) {
            Ok(Some(v)) => CellValue::Array(
                v.into_iter()
                    .map(|n| n.map_or(CellValue::Null, CellValue::Float))
                    .collect(),
            ),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Boolean => match row.try_get::<_, Option<Vec<Option<bool>>>>(idx) {
            Ok(Some(v)) => CellValue::Array(
                v.into_iter()
                    .map(|b| b.map_or(CellValue::Null, CellValue::Boolean))
                    .collect(),
            ),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Uuid => match row.try_get::<_, Option<Vec<Option<uuid::Uuid>>>>(idx) {
            Ok(Some(v)) => CellValue::Array(
                v.into_iter()
                    .map(|u| u.map_or(CellValue::Null, |u| CellValue::Uuid(u.to_string())))
                    .collect(),
            ),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        _ => try_as_string(row, idx),
    }
}

/// Try to extract a value as a string (fallback for type mismatches).
///
/// When even the string fallback fails, includes the postgres type name
/// in the message so the user knows what type couldn't be displayed.
fn try_as_string(row: &tokio_postgres::Row, idx: usize) -> CellValue {
    match row.try_get::<_, Option<String>>(idx) {
        Ok(Some(v)) => CellValue::Text(v),
        Ok(None) => CellValue::Null,
        Err(_) => {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_().name());
            CellValue::Text(format!("<unable to display: {}>", type_name))
        }
    }
}
