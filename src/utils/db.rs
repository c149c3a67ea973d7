use crate::models::ServiceError;
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    is_active     INTEGER NOT NULL DEFAULT 1,
    is_staff      INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS teams (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_by  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS team_memberships (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    team_id   TEXT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    role      TEXT NOT NULL CHECK (role IN ('owner', 'admin', 'member')),
    joined_at TEXT NOT NULL,
    UNIQUE (user_id, team_id)
);

CREATE TABLE IF NOT EXISTS tasks (
    id          TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    assigned_to TEXT REFERENCES users(id) ON DELETE SET NULL,
    team_id     TEXT REFERENCES teams(id) ON DELETE CASCADE,
    due_date    TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'not_started'
                CHECK (status IN ('not_started', 'in_progress', 'complete')),
    due_reminder_sent INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    id                   TEXT PRIMARY KEY,
    title                TEXT NOT NULL,
    external_id          TEXT NOT NULL,
    file_url             TEXT NOT NULL,
    owner_id             TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    team_id              TEXT REFERENCES teams(id) ON DELETE CASCADE,
    review_date          TEXT,
    review_reminder_sent INTEGER NOT NULL DEFAULT 0,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS external_credentials (
    user_id       TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    access_token  TEXT NOT NULL,
    refresh_token TEXT,
    expires_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS revoked_tokens (
    fingerprint TEXT PRIMARY KEY,
    expires_at  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memberships_team ON team_memberships(team_id);
CREATE INDEX IF NOT EXISTS idx_tasks_team ON tasks(team_id);
CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assigned_to);
CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_date, due_reminder_sent);
CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id);
CREATE INDEX IF NOT EXISTS idx_documents_team ON documents(team_id);
CREATE INDEX IF NOT EXISTS idx_documents_review ON documents(review_date, review_reminder_sent);
"#;

// Single SQLite connection shared by all workers
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, ServiceError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    error!("❌ Failed to create database directory: {:?}", e);
                    ServiceError::InternalServerError
                })?;
            }
        }

        info!("🗄️ Opening database at {}", path);
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, ServiceError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ServiceError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ServiceError> {
        self.conn.lock().map_err(|_| {
            error!("❌ Database mutex poisoned");
            ServiceError::InternalServerError
        })
    }

    // Run read-only or single-statement work on the shared connection
    pub fn with_conn<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&Connection) -> Result<T, ServiceError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside an IMMEDIATE transaction. The write lock is taken up
    /// front, so checks made inside `f` still hold when its writes land.
    /// Any error rolls the transaction back.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&Transaction) -> Result<T, ServiceError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();

        let result: Result<(), ServiceError> = db.transaction(|tx| {
            tx.execute(
                "INSERT INTO revoked_tokens (fingerprint, expires_at) VALUES ('abc', 1)",
                [],
            )?;
            Err(ServiceError::BadRequest("abort".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM revoked_tokens", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = Database::open_in_memory().unwrap();

        let result = db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO team_memberships (user_id, team_id, role, joined_at) VALUES ('u', 't', 'owner', 'now')",
                [],
            )?;
            Ok(())
        });
        assert!(matches!(result, Err(ServiceError::InternalServerError)));
    }
}
