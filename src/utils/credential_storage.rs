use crate::models::{ExternalCredential, ServiceError};
use rusqlite::{params, Connection, OptionalExtension};

// Insert or replace the user's document-store grant
pub fn save_credential(conn: &Connection, credential: &ExternalCredential) -> Result<(), ServiceError> {
    conn.execute(
        "INSERT INTO external_credentials (user_id, access_token, refresh_token, expires_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO UPDATE SET
             access_token = excluded.access_token,
             refresh_token = COALESCE(excluded.refresh_token, external_credentials.refresh_token),
             expires_at = excluded.expires_at,
             updated_at = excluded.updated_at",
        params![
            credential.user_id,
            credential.access_token,
            credential.refresh_token,
            credential.expires_at,
            credential.updated_at
        ],
    )?;
    Ok(())
}

pub fn find_credential(conn: &Connection, user_id: &str) -> Result<Option<ExternalCredential>, ServiceError> {
    Ok(conn
        .query_row(
            "SELECT user_id, access_token, refresh_token, expires_at, updated_at
             FROM external_credentials WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(ExternalCredential {
                    user_id: row.get(0)?,
                    access_token: row.get(1)?,
                    refresh_token: row.get(2)?,
                    expires_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )
        .optional()?)
}

pub fn delete_credential(conn: &Connection, user_id: &str) -> Result<bool, ServiceError> {
    Ok(conn.execute("DELETE FROM external_credentials WHERE user_id = ?1", params![user_id])? > 0)
}
