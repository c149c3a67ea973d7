use crate::models::ServiceError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

// Records a revoked token by fingerprint; expired entries are purged on the way in
pub fn revoke(conn: &Connection, fingerprint: &str, expires_at: usize) -> Result<(), ServiceError> {
    conn.execute(
        "DELETE FROM revoked_tokens WHERE expires_at < ?1",
        params![Utc::now().timestamp()],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO revoked_tokens (fingerprint, expires_at) VALUES (?1, ?2)",
        params![fingerprint, expires_at as i64],
    )?;
    Ok(())
}

pub fn is_revoked(conn: &Connection, fingerprint: &str) -> Result<bool, ServiceError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM revoked_tokens WHERE fingerprint = ?1",
            params![fingerprint],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}
