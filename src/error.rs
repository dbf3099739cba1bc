//! Error types for pgedit
//!
//! This module defines the error hierarchy used throughout the crate.
//! We use `thiserror` for library-style errors with clear error chains.

use std::io;

/// Main error type for pgedit
#[derive(Debug, thiserror::Error)]
pub enum PgeditError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Database operation errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Bad credentials, unreachable host, or a lost connection.
    /// Fatal to the current session; recover by reconnecting.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The backend rejected or failed a statement
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Catalog introspection failed
    #[error("Schema loading failed: {0}")]
    SchemaLoadFailed(String),

    /// Edit/delete refused: the table has no discoverable primary key
    #[error("Table '{0}' has no primary key; edit and delete are disabled")]
    NoPrimaryKey(String),

    /// The caller handed the synthesizer inconsistent input
    #[error("Malformed statement: {0}")]
    MalformedStatement(String),

    /// The name is not a user table in the public schema
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Row index outside the loaded snapshot
    #[error("Row {index} is out of range ({count} rows loaded)")]
    InvalidRow { index: usize, count: usize },

    /// The displayed rows came from a free-form query, not the selected table
    #[error("Displayed rows are a query result; reload table '{0}' to edit or delete rows")]
    SnapshotNotEditable(String),

    /// A row operation was requested with no table selected
    #[error("No table selected")]
    NoTableSelected,

    /// Not connected to a database
    #[error("Not connected to database")]
    NotConnected,
}

impl DbError {
    /// Whether the session must be re-established before further use
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_) | DbError::NotConnected)
    }
}

/// Configuration loading/parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Config file could not be read
    #[error("Configuration file not readable: {0}")]
    NotFound(String),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Connection profile not found
    #[error("Connection profile '{0}' not found")]
    ProfileNotFound(String),
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::NotFound(e.to_string())
    }
}

/// Specialized Result type for pgedit operations
pub type Result<T> = std::result::Result<T, PgeditError>;

/// Specialized Result type for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
