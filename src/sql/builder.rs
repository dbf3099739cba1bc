//! Query synthesis for the CRUD paths
//!
//! Every builder takes a [`TableDescriptor`] from the catalog, so table and
//! column names in the output are only ever names the database reported
//! itself. Values never reach the statement text; each one becomes a `$n`
//! placeholder and travels in [`Statement::params`].

use crate::db::coerce::BoundValue;
use crate::db::schema::TableDescriptor;
use crate::error::{DbError, DbResult};
use crate::sql::Statement;
use crate::sql::ident::quote_ident;

/// `SELECT * FROM <table>`
pub fn select(table: &TableDescriptor) -> Statement {
    Statement::new(format!("SELECT * FROM {}", quote_ident(&table.name)))
}

/// `INSERT INTO <table> (<columns>) VALUES ($1,...)`
pub fn insert(
    table: &TableDescriptor,
    columns: &[String],
    values: Vec<BoundValue>,
) -> DbResult<Statement> {
    check_shape(table, columns, &values)?;

    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=values.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(",");

    Ok(Statement::with_params(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&table.name),
            column_list,
            placeholders
        ),
        values,
    ))
}

/// `UPDATE <table> SET <c1> = $1, ... WHERE <pk> = $n`
pub fn update(
    table: &TableDescriptor,
    columns: &[String],
    values: Vec<BoundValue>,
    pk_column: &str,
    pk_value: BoundValue,
) -> DbResult<Statement> {
    check_shape(table, columns, &values)?;
    check_column(table, pk_column)?;

    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quote_ident(c), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let key_placeholder = values.len() + 1;

    let mut params = values;
    params.push(pk_value);

    Ok(Statement::with_params(
        format!(
            "UPDATE {} SET {} WHERE {} = ${}",
            quote_ident(&table.name),
            assignments,
            quote_ident(pk_column),
            key_placeholder
        ),
        params,
    ))
}

/// `DELETE FROM <table> WHERE <pk> = $1`
pub fn delete(table: &TableDescriptor, pk_column: &str, pk_value: BoundValue) -> DbResult<Statement> {
    check_column(table, pk_column)?;
    Ok(Statement::with_params(
        format!(
            "DELETE FROM {} WHERE {} = $1",
            quote_ident(&table.name),
            quote_ident(pk_column)
        ),
        vec![pk_value],
    ))
}

fn check_shape(table: &TableDescriptor, columns: &[String], values: &[BoundValue]) -> DbResult<()> {
    if columns.is_empty() {
        return Err(DbError::MalformedStatement("no columns given".to_string()));
    }
    if columns.len() != values.len() {
        return Err(DbError::MalformedStatement(format!(
            "{} columns but {} values",
            columns.len(),
            values.len()
        )));
    }
    for column in columns {
        check_column(table, column)?;
    }
    Ok(())
}

fn check_column(table: &TableDescriptor, column: &str) -> DbResult<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(DbError::MalformedStatement(format!(
            "column '{}' does not exist in table '{}'",
            column, table.name
        )))
    }
}
