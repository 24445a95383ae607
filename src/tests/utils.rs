use crate::db::connection::{init_db, Database};
use rusqlite::Connection;
use tempfile::TempDir;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// A connection to a fresh database with the production schema. Keep the
/// `TempDir` alive for as long as the connection is used.
pub fn test_conn() -> (TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
    let conn = Connection::open(dir.path().join("test.sqlite"))
        .unwrap_or_else(|e| panic!("open test db failed: {e}"));
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .and_then(|_| conn.execute_batch(SCHEMA))
        .unwrap_or_else(|e| panic!("apply schema failed: {e}"));
    (dir, conn)
}

/// Initialize a fresh test DB using the production schema file
pub fn init_test_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
    let db = Database::new(dir.path().join("test.sqlite").to_string_lossy().to_string());

    init_db(&db, "sql/schema.sql")
        .unwrap_or_else(|e| panic!("Database initialization failed: {e}"));

    (dir, db)
}
