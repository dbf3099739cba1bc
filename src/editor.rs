//! Table editor facade
//!
//! The entry point for a presentation layer. A [`TableEditor`] owns one
//! [`Session`] and the currently loaded table, and composes the catalog,
//! the synthesizer and the session into the user-level operations: select a
//! table, edit/add/delete a row, run a free-form statement.
//!
//! Every successful mutation re-fetches the whole table. Every failure
//! leaves the editor exactly as it was before the call: writes are rolled
//! back by the session, and a snapshot is only replaced once a fetch has
//! fully succeeded.

use crate::config::{ConnectionProfile, Settings};
use crate::db::Database;
use crate::db::coerce::{BoundValue, coerce_inputs};
use crate::db::schema::{self, TableDescriptor};
use crate::db::session::{ExecOutcome, Session};
use crate::db::types::Snapshot;
use crate::error::{DbError, DbResult};
use crate::sql::{self, Statement};

/// Where the editor is in its per-table lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Unselected,
    Loading,
    Loaded,
    /// The snapshot holds a free-form query result; row edits and deletes
    /// are refused until a table is loaded again
    Browsing,
    Editing,
    Adding,
    Deleting,
}

/// What a free-form statement did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A read replaced the snapshot with this many rows
    Rows(usize),
    /// A write affected this many rows
    Affected(u64),
}

pub struct TableEditor<D: Database> {
    session: Option<Session<D>>,
    settings: Settings,
    state: EditorState,
    table: Option<TableDescriptor>,
    snapshot: Snapshot,
}

impl<D: Database> TableEditor<D> {
    /// Wrap an open session
    pub fn new(session: Session<D>, settings: Settings) -> Self {
        Self {
            session: Some(session),
            settings,
            state: EditorState::Unselected,
            table: None,
            snapshot: Snapshot::default(),
        }
    }

    /// Connect and wrap the new session
    pub async fn connect(profile: &ConnectionProfile, settings: Settings) -> DbResult<Self> {
        let session = Session::connect(profile, &settings).await?;
        Ok(Self::new(session, settings))
    }

    /// Replace the current session with a new one.
    ///
    /// The previous connection is released before the new one is opened.
    /// If the new connection fails the editor is left disconnected.
    pub async fn reconnect(&mut self, profile: &ConnectionProfile) -> DbResult<()> {
        self.disconnect().await;
        let session = Session::connect(profile, &self.settings).await?;
        tracing::info!(database = %profile.database, "session replaced");
        self.session = Some(session);
        Ok(())
    }

    /// Close the session and forget the loaded table
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "error while closing session");
            }
        }
        self.table = None;
        self.snapshot = Snapshot::default();
        self.state = EditorState::Unselected;
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session<D>> {
        self.session.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    /// Descriptor of the selected table
    pub fn table(&self) -> Option<&TableDescriptor> {
        self.table.as_ref()
    }

    /// The rows currently on display
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Databases reachable with `profile`, over a separate short-lived connection
    pub async fn list_databases(&self, profile: &ConnectionProfile) -> DbResult<Vec<String>> {
        schema::list_databases::<D>(profile, &self.settings).await
    }

    pub async fn list_tables(&mut self) -> DbResult<Vec<String>> {
        let session = self.session.as_mut().ok_or(DbError::NotConnected)?;
        schema::list_tables(session).await
    }

    /// Describe and load `name`, replacing the current snapshot
    pub async fn select_table(&mut self, name: &str) -> DbResult<&Snapshot> {
        tracing::info!(table = name, "selecting table");
        let previous = self.state;
        self.state = EditorState::Loading;
        match self.reload(name).await {
            Ok(()) => {
                self.state = EditorState::Loaded;
                Ok(&self.snapshot)
            }
            Err(e) => {
                self.state = previous;
                Err(e)
            }
        }
    }

    /// Overwrite every column of row `row_index` with `new_values`.
    ///
    /// The row is located by its current primary-key value. Empty strings
    /// are written as NULL. Returns the affected-row count.
    pub async fn edit_row<S: AsRef<str>>(
        &mut self,
        row_index: usize,
        new_values: &[S],
    ) -> DbResult<u64> {
        let (pk_column, pk_value) = self.row_key(row_index)?;
        let table = self.table.as_ref().ok_or(DbError::NoTableSelected)?;
        let stmt = sql::update(
            table,
            &table.column_names(),
            coerce_inputs(new_values),
            &pk_column,
            pk_value,
        )?;
        self.mutate(EditorState::Editing, stmt).await
    }

    /// Insert a row given one value per column, in column order
    pub async fn add_row<S: AsRef<str>>(&mut self, new_values: &[S]) -> DbResult<u64> {
        let table = self.table.as_ref().ok_or(DbError::NoTableSelected)?;
        let stmt = sql::insert(table, &table.column_names(), coerce_inputs(new_values))?;
        self.mutate(EditorState::Adding, stmt).await
    }

    /// Delete row `row_index`, located by its primary-key value
    pub async fn delete_row(&mut self, row_index: usize) -> DbResult<u64> {
        let (pk_column, pk_value) = self.row_key(row_index)?;
        let table = self.table.as_ref().ok_or(DbError::NoTableSelected)?;
        let stmt = sql::delete(table, &pk_column, pk_value)?;
        self.mutate(EditorState::Deleting, stmt).await
    }

    /// Run free-form text.
    ///
    /// A read replaces the snapshot with its result and puts the editor in
    /// `Browsing`, where rows can no longer be addressed by index. A write
    /// is committed and the selected table (if any) is re-fetched; if the
    /// write removed that table the editor returns to `Unselected`.
    pub async fn run_query(&mut self, raw: &str) -> DbResult<RunOutcome> {
        let previous = self.state;
        let session = self.session.as_mut().ok_or(DbError::NotConnected)?;

        match session.run_arbitrary(raw).await? {
            ExecOutcome::Rows(results) => {
                self.snapshot = Snapshot::from(&results);
                self.state = EditorState::Browsing;
                Ok(RunOutcome::Rows(results.row_count))
            }
            ExecOutcome::Affected(affected) => {
                let Some(name) = self.table.as_ref().map(|t| t.name.clone()) else {
                    return Ok(RunOutcome::Affected(affected));
                };
                self.state = EditorState::Loading;
                match self.reload(&name).await {
                    Ok(()) => self.state = EditorState::Loaded,
                    Err(DbError::UnknownTable(_)) => {
                        tracing::info!(table = %name, "selected table no longer exists");
                        self.table = None;
                        self.snapshot = Snapshot::default();
                        self.state = EditorState::Unselected;
                    }
                    Err(e) => {
                        self.state = previous;
                        return Err(e);
                    }
                }
                Ok(RunOutcome::Affected(affected))
            }
        }
    }

    /// Describe `name` and fetch all of its rows; state changes only on success
    async fn reload(&mut self, name: &str) -> DbResult<()> {
        let session = self.session.as_mut().ok_or(DbError::NotConnected)?;
        let table = schema::describe_table(session, name).await?;
        let results = session.query_text(&sql::select(&table)).await?;
        self.snapshot = Snapshot::from(&results);
        self.table = Some(table);
        Ok(())
    }

    /// Key column and bound key value for a loaded row
    fn row_key(&self, row_index: usize) -> DbResult<(String, BoundValue)> {
        let table = self.table.as_ref().ok_or(DbError::NoTableSelected)?;
        if self.state == EditorState::Browsing {
            return Err(DbError::SnapshotNotEditable(table.name.clone()));
        }
        let pk_column = table.require_primary_key()?;
        let row = self.snapshot.row(row_index).ok_or(DbError::InvalidRow {
            index: row_index,
            count: self.snapshot.rows.len(),
        })?;
        let idx = self.snapshot.column_index(pk_column).ok_or_else(|| {
            DbError::MalformedStatement(format!(
                "primary key column '{}' is not part of the displayed rows",
                pk_column
            ))
        })?;
        let pk_value = BoundValue::from(row.values.get(idx).cloned().flatten());
        Ok((pk_column.to_string(), pk_value))
    }

    /// Commit one write, then re-fetch the selected table
    async fn mutate(&mut self, during: EditorState, stmt: Statement) -> DbResult<u64> {
        let name = self
            .table
            .as_ref()
            .map(|t| t.name.clone())
            .ok_or(DbError::NoTableSelected)?;
        let session = self.session.as_mut().ok_or(DbError::NotConnected)?;

        let previous = self.state;
        self.state = during;
        tracing::debug!(table = %name, state = ?during, "applying row change");

        let affected = match session.execute_write(&stmt).await {
            Ok(affected) => affected,
            Err(e) => {
                self.state = previous;
                return Err(e);
            }
        };

        self.state = EditorState::Loading;
        if let Err(e) = self.reload(&name).await {
            self.state = previous;
            return Err(e);
        }
        self.state = EditorState::Loaded;
        Ok(affected)
    }
}
