use rusqlite::{Connection, Transaction};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;

use crate::errors::ServerError;

// Thread-local connection slots, one per database path.
thread_local! {
    static DB_CONNS: RefCell<HashMap<String, Connection>> = RefCell::new(HashMap::new());
}

#[derive(Clone, Debug)]
pub struct Database {
    path: String,
}

impl Database {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Provides a mutable connection to the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Connection) -> Result<T, ServerError>,
    {
        DB_CONNS
            .try_with(|cell| {
                let mut slots = cell.borrow_mut();
                if !slots.contains_key(&self.path) {
                    let conn = Connection::open(&self.path)
                        .map_err(|e| ServerError::DbError(format!("Open DB failed: {e}")))?;
                    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
                        .map_err(|e| ServerError::DbError(format!("Configure DB failed: {e}")))?;
                    slots.insert(self.path.clone(), conn);
                }
                let conn = slots
                    .get_mut(&self.path)
                    .ok_or_else(|| ServerError::internal("connection slot vanished"))?;
                f(conn)
            })
            .map_err(|_| ServerError::internal("thread-local connection unavailable"))?
    }

    /// Runs `f` inside one transaction. Commits on `Ok`, rolls back on `Err`.
    ///
    /// Every mutating service operation goes through here so the primary
    /// write and its audit record land together.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, ServerError>,
    {
        self.with_conn(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| ServerError::DbError(format!("begin tx failed: {e}")))?;
            let out = f(&tx)?;
            tx.commit()
                .map_err(|e| ServerError::DbError(format!("commit tx failed: {e}")))?;
            Ok(out)
        })
    }
}

/// Initialize database from a SQL schema file
pub fn init_db(db: &Database, schema_path: &str) -> Result<(), ServerError> {
    let schema_sql = fs::read_to_string(schema_path)
        .map_err(|e| ServerError::DbError(format!("Failed to read schema file: {e}")))?;

    db.with_conn(|conn| {
        conn.execute_batch(&schema_sql)
            .map_err(|e| ServerError::DbError(format!("Failed to apply schema: {e}")))?;
        Ok(())
    })?;

    tracing::info!(schema = schema_path, db = db.path(), "database initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_closure_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("rollback.sqlite").to_string_lossy().to_string());
        db.with_conn(|conn| {
            conn.execute_batch("create table t (x integer)")?;
            Ok(())
        })
        .unwrap();

        let res: Result<(), ServerError> = db.with_tx(|tx| {
            tx.execute("insert into t (x) values (1)", [])?;
            Err(ServerError::conflict("TEST", "abort"))
        });
        assert!(res.is_err());

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("select count(*) from t", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn separate_paths_get_separate_connections() {
        let dir = tempfile::tempdir().unwrap();
        let a = Database::new(dir.path().join("a.sqlite").to_string_lossy().to_string());
        let b = Database::new(dir.path().join("b.sqlite").to_string_lossy().to_string());
        a.with_conn(|c| Ok(c.execute_batch("create table only_in_a (x integer)")?))
            .unwrap();

        let in_b: i64 = b
            .with_conn(|c| {
                Ok(c.query_row(
                    "select count(*) from sqlite_master where name = 'only_in_a'",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(in_b, 0);
    }
}
