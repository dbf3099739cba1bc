//! End-to-end editor tests against a live PostgreSQL
//!
//! Each test skips when the database is not reachable.

use crate::common::{drop_table, editor_with, find_row, test_profile, unique_table};
use pgedit::DbError;
use pgedit::editor::{EditorState, RunOutcome};

macro_rules! editor_or_skip {
    ($($setup:expr),* $(,)?) => {
        match editor_with(&[$($setup.as_str()),*]).await {
            Some(editor) => editor,
            None => return,
        }
    };
}

#[tokio::test]
async fn test_books_crud_cycle() {
    let books = unique_table("books");
    let mut editor = editor_or_skip!(
        &format!("CREATE TABLE {} (id integer PRIMARY KEY, title text)", books),
        &format!("INSERT INTO {} VALUES (1, 'Dune'), (2, 'Foundation')", books),
    );

    let snapshot = editor.select_table(&books).await.unwrap();
    assert_eq!(snapshot.columns, vec!["id", "title"]);
    assert_eq!(snapshot.rows.len(), 2);
    assert_eq!(editor.state(), EditorState::Loaded);

    // Add
    assert_eq!(editor.add_row(&["3", "Neuromancer"]).await.unwrap(), 1);
    let snapshot = editor.snapshot();
    let idx = find_row(snapshot, "id", "3").unwrap();
    assert_eq!(snapshot.rows[idx].get(1), Some("Neuromancer"));

    // Edit: empty input becomes NULL
    let idx = find_row(editor.snapshot(), "id", "2").unwrap();
    assert_eq!(editor.edit_row(idx, &["2", ""]).await.unwrap(), 1);
    let idx = find_row(editor.snapshot(), "id", "2").unwrap();
    assert_eq!(editor.snapshot().rows[idx].get(1), None);

    // Delete
    let idx = find_row(editor.snapshot(), "id", "1").unwrap();
    assert_eq!(editor.delete_row(idx).await.unwrap(), 1);
    assert!(find_row(editor.snapshot(), "id", "1").is_none());
    assert_eq!(editor.snapshot().rows.len(), 2);

    drop_table(&mut editor, &books).await;
}

#[tokio::test]
async fn test_values_round_trip_unchanged() {
    let table = unique_table("typed");
    let mut editor = editor_or_skip!(
        &format!(
            "CREATE TABLE {} (id bigint PRIMARY KEY, price numeric(12,4), seen timestamptz, \
             active boolean, meta jsonb, tags text[], ratio double precision, day date)",
            table
        ),
        &format!(
            "INSERT INTO {} VALUES (7, 12.5000, '2024-03-01 10:00:00+00', true, \
             '{{\"a\": [1, 2]}}', '{{red,\"big blue\"}}', 0.1, '2024-02-29')",
            table
        ),
    );

    let before = editor.select_table(&table).await.unwrap().clone();
    assert_eq!(before.rows.len(), 1);
    let price = before.column_index("price").unwrap();
    assert_eq!(before.rows[0].get(price), Some("12.5000"));

    // Write every value back exactly as displayed
    let values: Vec<String> = before.rows[0]
        .values
        .iter()
        .map(|v| v.clone().unwrap_or_default())
        .collect();
    editor.edit_row(0, &values).await.unwrap();

    assert_eq!(editor.snapshot(), &before);

    drop_table(&mut editor, &table).await;
}

#[tokio::test]
async fn test_table_without_primary_key_is_read_only() {
    let table = unique_table("log");
    let mut editor = editor_or_skip!(
        &format!("CREATE TABLE {} (line text)", table),
        &format!("INSERT INTO {} VALUES ('started')", table),
    );

    editor.select_table(&table).await.unwrap();
    assert!(editor.table().unwrap().primary_key.is_none());
    assert!(matches!(
        editor.edit_row(0, &["changed"]).await,
        Err(DbError::NoPrimaryKey(_))
    ));
    assert!(matches!(editor.delete_row(0).await, Err(DbError::NoPrimaryKey(_))));

    // Inserts need no key
    editor.add_row(&["stopped"]).await.unwrap();
    assert_eq!(editor.snapshot().rows.len(), 2);

    drop_table(&mut editor, &table).await;
}

#[tokio::test]
async fn test_constraint_violation_leaves_session_usable() {
    let books = unique_table("books");
    let mut editor = editor_or_skip!(
        &format!("CREATE TABLE {} (id integer PRIMARY KEY, title text NOT NULL)", books),
        &format!("INSERT INTO {} VALUES (1, 'Dune')", books),
    );

    let before = editor.select_table(&books).await.unwrap().clone();

    let err = editor.add_row(&["1", "Duplicate"]).await.unwrap_err();
    assert!(matches!(err, DbError::QueryFailed(_)));
    assert_eq!(editor.snapshot(), &before);

    let err = editor.add_row(&["2", ""]).await.unwrap_err();
    assert!(err.to_string().contains("null") || err.to_string().contains("NULL"));

    // The connection is not stuck in an aborted transaction
    editor.add_row(&["2", "Foundation"]).await.unwrap();
    assert_eq!(editor.snapshot().rows.len(), 2);

    drop_table(&mut editor, &books).await;
}

#[tokio::test]
async fn test_quotes_in_values_are_stored_verbatim() {
    let books = unique_table("books");
    let mut editor = editor_or_skip!(&format!(
        "CREATE TABLE {} (id integer PRIMARY KEY, title text)",
        books
    ));
    editor.select_table(&books).await.unwrap();

    let hostile = "x'); DROP TABLE books; --";
    editor.add_row(&["1", hostile]).await.unwrap();
    assert_eq!(editor.snapshot().rows[0].get(1), Some(hostile));

    drop_table(&mut editor, &books).await;
}

#[tokio::test]
async fn test_quoted_identifiers() {
    let table = unique_table("Order Items");
    let mut editor = editor_or_skip!(&format!(
        "CREATE TABLE \"{}\" (\"Item Id\" integer PRIMARY KEY, \"select\" text)",
        table
    ));

    editor.select_table(&table).await.unwrap();
    assert_eq!(editor.snapshot().columns, vec!["Item Id", "select"]);
    editor.add_row(&["1", "widget"]).await.unwrap();
    editor.edit_row(0, &["1", "gadget"]).await.unwrap();
    assert_eq!(editor.snapshot().rows[0].get(1), Some("gadget"));
    editor.delete_row(0).await.unwrap();
    assert!(editor.snapshot().rows.is_empty());

    drop_table(&mut editor, &table).await;
}

#[tokio::test]
async fn test_run_query_read_and_drop() {
    let books = unique_table("books");
    let mut editor = editor_or_skip!(
        &format!("CREATE TABLE {} (id integer PRIMARY KEY, title text)", books),
        &format!("INSERT INTO {} VALUES (1, 'Dune'), (2, 'Foundation')", books),
    );
    editor.select_table(&books).await.unwrap();

    let outcome = editor
        .run_query(&format!("SELECT title FROM {} WHERE id = 2", books))
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Rows(1));
    assert_eq!(editor.snapshot().columns, vec!["title"]);

    let outcome = editor
        .run_query(&format!("UPDATE {} SET title = upper(title)", books))
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Affected(2));
    assert!(find_row(editor.snapshot(), "title", "DUNE").is_some());

    editor.run_query(&format!("DROP TABLE {}", books)).await.unwrap();
    assert_eq!(editor.state(), EditorState::Unselected);
    assert!(editor.table().is_none());
}

#[tokio::test]
async fn test_catalog_listings() {
    let books = unique_table("books");
    let mut editor = editor_or_skip!(&format!("CREATE TABLE {} (id integer PRIMARY KEY)", books));

    let tables = editor.list_tables().await.unwrap();
    assert!(tables.contains(&books));

    let profile = test_profile();
    let databases = editor.list_databases(&profile).await.unwrap();
    assert!(databases.contains(&profile.database));

    let err = editor.select_table("no_such_table_here").await.unwrap_err();
    assert!(matches!(err, DbError::UnknownTable(_)));

    drop_table(&mut editor, &books).await;
}

#[tokio::test]
async fn test_reconnect_to_same_database() {
    let mut editor = editor_or_skip!();
    let profile = test_profile();
    editor.reconnect(&profile).await.unwrap();
    assert!(editor.is_connected());
    assert!(editor.list_tables().await.is_ok());
}

#[tokio::test]
async fn test_free_form_read_shows_server_text() {
    let table = unique_table("odd_types");
    let mut editor = editor_or_skip!(
        &format!(
            "CREATE TABLE {} (id int PRIMARY KEY, span interval, addr inet, cost money, \
             at timetz, big numeric)",
            table
        ),
        &format!(
            "INSERT INTO {} VALUES (1, '1 day 2 hours', '10.0.0.1', 12.50, '10:00:00+02', \
             123456789012345678901234567890.5)",
            table
        ),
    );

    let loaded = editor.select_table(&table).await.unwrap().clone();
    let outcome = editor
        .run_query(&format!("SELECT * FROM {}", table))
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Rows(1));
    assert_eq!(editor.snapshot(), &loaded);

    let row = &editor.snapshot().rows[0];
    assert_eq!(row.get(1), Some("1 day 02:00:00"));
    assert_eq!(row.get(2), Some("10.0.0.1"));
    assert_eq!(row.get(4), Some("10:00:00+02"));
    assert_eq!(row.get(5), Some("123456789012345678901234567890.5"));

    drop_table(&mut editor, &table).await;
}

#[tokio::test]
async fn test_free_form_read_keeps_last_result_set() {
    let mut editor = editor_or_skip!();
    let outcome = editor.run_query("SELECT 1 AS a; SELECT 2 AS b").await.unwrap();
    assert_eq!(outcome, RunOutcome::Rows(1));
    assert_eq!(editor.snapshot().columns, vec!["b"]);
    assert_eq!(editor.snapshot().rows[0].get(0), Some("2"));
}

#[tokio::test]
async fn test_free_form_multi_statement_write() {
    let books = unique_table("books");
    let mut editor = editor_or_skip!(&format!(
        "CREATE TABLE {} (id integer PRIMARY KEY, title text)",
        books
    ));
    editor.select_table(&books).await.unwrap();

    let outcome = editor
        .run_query(&format!(
            "INSERT INTO {0} VALUES (1, 'Dune'); INSERT INTO {0} VALUES (2, 'Foundation')",
            books
        ))
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Affected(2));
    assert!(find_row(editor.snapshot(), "id", "1").is_some());
    assert!(find_row(editor.snapshot(), "id", "2").is_some());

    drop_table(&mut editor, &books).await;
}

#[tokio::test]
async fn test_free_form_multi_statement_failure_rolls_back_all() {
    let books = unique_table("books");
    let mut editor = editor_or_skip!(&format!(
        "CREATE TABLE {} (id integer PRIMARY KEY, title text)",
        books
    ));
    editor.select_table(&books).await.unwrap();

    let err = editor
        .run_query(&format!(
            "INSERT INTO {} VALUES (1, 'Dune'); INSERT INTO no_such_table_here VALUES (2)",
            books
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryFailed(_)));

    editor.select_table(&books).await.unwrap();
    assert!(editor.snapshot().rows.is_empty());

    drop_table(&mut editor, &books).await;
}

#[tokio::test]
async fn test_delete_after_free_form_read_of_other_table_is_refused() {
    let books = unique_table("books");
    let authors = unique_table("authors");
    let mut editor = editor_or_skip!(
        &format!("CREATE TABLE {} (id integer PRIMARY KEY, title text)", books),
        &format!("INSERT INTO {} VALUES (1, 'Dune'), (2, 'Foundation')", books),
        &format!("CREATE TABLE {} (id integer PRIMARY KEY, name text)", authors),
        &format!("INSERT INTO {} VALUES (2, 'Asimov')", authors),
    );
    editor.select_table(&books).await.unwrap();
    editor
        .run_query(&format!("SELECT * FROM {}", authors))
        .await
        .unwrap();

    assert!(matches!(
        editor.delete_row(0).await,
        Err(DbError::SnapshotNotEditable(_))
    ));

    // Both books are still there
    let snapshot = editor.select_table(&books).await.unwrap();
    assert_eq!(snapshot.rows.len(), 2);

    drop_table(&mut editor, &books).await;
    drop_table(&mut editor, &authors).await;
}
