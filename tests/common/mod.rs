//! Common test utilities and helpers
//!
//! Shared infrastructure for the integration tests. Every test works on
//! its own freshly created table so tests can run in parallel against one
//! database.

#![allow(dead_code)]

use pgedit::config::{ConnectionProfile, Settings, SslMode};
use pgedit::db::postgres::PostgresProvider;
use pgedit::db::{Session, Snapshot};
use pgedit::editor::TableEditor;
use std::sync::atomic::{AtomicUsize, Ordering};

static TABLE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Test database profile, from `TEST_DB_*` variables
pub fn test_profile() -> ConnectionProfile {
    let mut profile = ConnectionProfile::new(
        std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
        std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "test_db".to_string()),
        std::env::var("TEST_DB_USER").unwrap_or_else(|_| "test_user".to_string()),
        Some(std::env::var("TEST_DB_PASSWORD").unwrap_or_else(|_| "test_password".to_string())),
    );
    profile.name = "integration-test".to_string();
    profile.port = std::env::var("TEST_DB_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5433);
    profile.ssl_mode = SslMode::Disable;
    profile
}

pub fn test_settings() -> Settings {
    Settings {
        connect_timeout_secs: Some(5),
        ..Settings::default()
    }
}

/// A table name no other test uses
pub fn unique_table(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        std::process::id(),
        TABLE_SEQ.fetch_add(1, Ordering::SeqCst)
    )
}

/// Connect and run `setup` statements, or `None` when no database is reachable
pub async fn editor_with(setup: &[&str]) -> Option<TableEditor<PostgresProvider>> {
    let profile = test_profile();
    let mut session = match Session::<PostgresProvider>::connect(&profile, &test_settings()).await
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!(
                "Skipping test: Database not available at {}:{} - {}",
                profile.host, profile.port, e
            );
            return None;
        }
    };
    for sql in setup {
        session
            .run_arbitrary(sql)
            .await
            .unwrap_or_else(|e| panic!("setup statement failed: {}: {}", sql, e));
    }
    Some(TableEditor::new(session, test_settings()))
}

/// Drop `table`, ignoring errors
pub async fn drop_table(editor: &mut TableEditor<PostgresProvider>, table: &str) {
    let _ = editor
        .run_query(&format!("DROP TABLE IF EXISTS \"{}\"", table))
        .await;
}

/// Index of the row whose `column` holds `value`
pub fn find_row(snapshot: &Snapshot, column: &str, value: &str) -> Option<usize> {
    let col = snapshot.column_index(column)?;
    snapshot.rows.iter().position(|r| r.get(col) == Some(value))
}
