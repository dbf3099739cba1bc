//! Session manager
//!
//! A [`Session`] exclusively owns one connection. Reads run directly; every
//! write runs as its own transaction block that is committed on success and
//! rolled back on any failure, so no write is ever left half-applied and
//! the connection is clean for the next operation.

use crate::config::{ConnectionProfile, Settings};
use crate::db::Database;
use crate::db::types::QueryResults;
use crate::error::{DbError, DbResult};
use crate::sql::{Statement, StatementKind};

/// Result of executing one statement
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    /// Rows returned by a read
    Rows(QueryResults),
    /// Rows affected by a write
    Affected(u64),
}

/// The live connection for one user session
pub struct Session<D: Database> {
    db: D,
}

impl<D: Database> Session<D> {
    /// Validate the profile, then connect.
    ///
    /// # Errors
    /// `DbError::ConnectionFailed` for an incomplete profile (no network
    /// activity happens) or on authentication/network failure.
    pub async fn connect(profile: &ConnectionProfile, settings: &Settings) -> DbResult<Self> {
        profile
            .validate()
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        let db = D::connect(profile, settings).await?;
        Ok(Self { db })
    }

    /// Wrap an already-open connection
    pub fn from_database(db: D) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    /// Run a read statement with its bound values
    pub async fn query(&mut self, stmt: &Statement) -> DbResult<QueryResults> {
        self.db.query(&stmt.sql, &stmt.params).await
    }

    /// Run a parameterless read and get every value as server-rendered text
    pub async fn query_text(&mut self, stmt: &Statement) -> DbResult<QueryResults> {
        if !stmt.params.is_empty() {
            return Err(DbError::MalformedStatement(
                "text queries cannot take parameters".to_string(),
            ));
        }
        self.db.query_text(&stmt.sql).await
    }

    /// Run one mutating statement in its own transaction.
    ///
    /// Commits on success. On any failure (including a failed commit) the
    /// transaction is rolled back and the original error is returned.
    #[tracing::instrument(skip_all, fields(params = stmt.params.len()))]
    pub async fn execute_write(&mut self, stmt: &Statement) -> DbResult<u64> {
        self.begin().await?;
        let result = self.db.execute(&stmt.sql, &stmt.params).await;
        self.finish_write(result).await
    }

    /// Commit after a successful write, roll back after a failed one (or a
    /// failed commit) and hand back the first error
    async fn finish_write(&mut self, result: DbResult<u64>) -> DbResult<u64> {
        let result = match result {
            Ok(affected) => self.commit().await.map(|()| affected),
            Err(e) => Err(e),
        };

        match result {
            Ok(affected) => Ok(affected),
            Err(e) => {
                tracing::warn!(error = %e, "write failed; rolling back");
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    pub async fn begin(&mut self) -> DbResult<()> {
        self.db.begin().await
    }

    pub async fn commit(&mut self) -> DbResult<()> {
        self.db.commit().await
    }

    pub async fn rollback(&mut self) -> DbResult<()> {
        self.db.rollback().await
    }

    /// Execute user-supplied text verbatim.
    ///
    /// This is the one path where raw text reaches the server. It goes over
    /// the simple query protocol, so it may hold several statements and
    /// every returned value is in the server's text form. It is classified
    /// by [`StatementKind::classify`]; writes follow the same
    /// commit/rollback policy as the structured paths, covering all
    /// statements in the text at once.
    #[tracing::instrument(skip_all)]
    pub async fn run_arbitrary(&mut self, raw: &str) -> DbResult<ExecOutcome> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DbError::QueryFailed("empty statement".to_string()));
        }
        let kind = StatementKind::classify(trimmed);
        tracing::debug!(kind = ?kind, "running ad-hoc statement");
        match kind {
            StatementKind::Read => self.db.query_text(trimmed).await.map(ExecOutcome::Rows),
            StatementKind::Write => {
                self.begin().await?;
                let result = self.db.execute_text(trimmed).await;
                self.finish_write(result).await.map(ExecOutcome::Affected)
            }
        }
    }

    /// Release the connection
    pub async fn close(self) -> DbResult<()> {
        tracing::debug!("closing session");
        self.db.close().await
    }
}
