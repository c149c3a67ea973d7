use crate::models::{ServiceError, User, UserSummary};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, email, name, password_hash, is_active, is_staff, created_at";

// Emails are compared case-insensitively by storing them lower-cased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        is_active: row.get(4)?,
        is_staff: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn save_user(conn: &Connection, user: &User) -> Result<(), ServiceError> {
    conn.execute(
        "INSERT INTO users (id, email, name, password_hash, is_active, is_staff, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id,
            normalize_email(&user.email),
            user.name,
            user.password_hash,
            user.is_active,
            user.is_staff,
            user.created_at
        ],
    )?;
    Ok(())
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, ServiceError> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
    Ok(conn
        .query_row(&sql, params![normalize_email(email)], user_from_row)
        .optional()?)
}

pub fn find_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>, ServiceError> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, params![id], user_from_row).optional()?)
}

pub fn find_user_summary(conn: &Connection, id: &str) -> Result<Option<UserSummary>, ServiceError> {
    Ok(conn
        .query_row(
            "SELECT id, email, name FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(UserSummary {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::db::Database;
    use chrono::Utc;

    #[test]
    fn lookups_ignore_email_case_and_whitespace() {
        let db = Database::open_in_memory().unwrap();
        let user = User {
            id: "u1".to_string(),
            email: "  Alice@Example.COM ".to_string(),
            name: "Alice".to_string(),
            password_hash: "hash".to_string(),
            is_active: true,
            is_staff: false,
            created_at: Utc::now(),
        };

        db.with_conn(|conn| save_user(conn, &user)).unwrap();

        let found = db
            .with_conn(|conn| find_user_by_email(conn, "alice@example.com"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "u1");
        assert_eq!(found.email, "alice@example.com");

        let duplicate = db.with_conn(|conn| save_user(conn, &User { id: "u2".to_string(), ..user.clone() }));
        assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));
    }
}
