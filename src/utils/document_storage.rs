use crate::models::{Document, ServiceError};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const DOCUMENT_SELECT: &str = "SELECT d.id, d.title, d.file_url, d.external_id, d.owner_id, u.name,
        d.team_id, tm.name, d.review_date, d.review_reminder_sent, d.created_at, d.updated_at
    FROM documents d
    JOIN users u ON u.id = d.owner_id
    LEFT JOIN teams tm ON tm.id = d.team_id";

fn document_from_row(row: &Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        file_url: row.get(2)?,
        external_id: row.get(3)?,
        owner: row.get(4)?,
        owner_name: row.get(5)?,
        team: row.get(6)?,
        team_name: row.get(7)?,
        review_date: row.get(8)?,
        review_reminder_sent: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn query_documents(conn: &Connection, filter: &str, value: &str) -> Result<Vec<Document>, ServiceError> {
    let sql = format!("{} WHERE {} ORDER BY d.created_at, d.id", DOCUMENT_SELECT, filter);
    let mut stmt = conn.prepare(&sql)?;
    let documents = stmt
        .query_map(params![value], document_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(documents)
}

pub fn insert_document(conn: &Connection, document: &Document) -> Result<(), ServiceError> {
    conn.execute(
        "INSERT INTO documents (id, title, external_id, file_url, owner_id, team_id, review_date,
             review_reminder_sent, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            document.id,
            document.title,
            document.external_id,
            document.file_url,
            document.owner,
            document.team,
            document.review_date,
            document.review_reminder_sent,
            document.created_at,
            document.updated_at
        ],
    )?;
    Ok(())
}

pub fn find_document_by_id(conn: &Connection, document_id: &str) -> Result<Option<Document>, ServiceError> {
    let sql = format!("{} WHERE d.id = ?1", DOCUMENT_SELECT);
    Ok(conn.query_row(&sql, params![document_id], document_from_row).optional()?)
}

// Personal documents of the user plus every document of the user's teams
pub fn list_documents_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Document>, ServiceError> {
    query_documents(
        conn,
        "(d.team_id IS NULL AND d.owner_id = ?1)
         OR d.team_id IN (SELECT team_id FROM team_memberships WHERE user_id = ?1)",
        user_id,
    )
}

pub fn list_team_documents(conn: &Connection, team_id: &str) -> Result<Vec<Document>, ServiceError> {
    query_documents(conn, "d.team_id = ?1", team_id)
}

pub fn delete_document(conn: &Connection, document_id: &str) -> Result<bool, ServiceError> {
    Ok(conn.execute("DELETE FROM documents WHERE id = ?1", params![document_id])? > 0)
}

pub fn update_title(
    conn: &Connection,
    document_id: &str,
    title: &str,
    updated_at: DateTime<Utc>,
) -> Result<(), ServiceError> {
    conn.execute(
        "UPDATE documents SET title = ?2, updated_at = ?3 WHERE id = ?1",
        params![document_id, title, updated_at],
    )?;
    Ok(())
}

// A changed review date re-arms the reminder
pub fn update_review_date(
    conn: &Connection,
    document_id: &str,
    review_date: Option<NaiveDate>,
    updated_at: DateTime<Utc>,
) -> Result<(), ServiceError> {
    conn.execute(
        "UPDATE documents
         SET review_reminder_sent = CASE WHEN review_date IS ?2 THEN review_reminder_sent ELSE 0 END,
             review_date = ?2,
             updated_at = ?3
         WHERE id = ?1",
        params![document_id, review_date, updated_at],
    )?;
    Ok(())
}

// Documents whose review falls in (today, today + window_days] and not yet reminded
pub fn documents_due_for_review(
    conn: &Connection,
    today: NaiveDate,
    window_days: i64,
) -> Result<Vec<Document>, ServiceError> {
    let horizon = today + chrono::Duration::days(window_days);
    let sql = format!(
        "{} WHERE d.review_reminder_sent = 0 AND d.review_date > ?1 AND d.review_date <= ?2
         ORDER BY d.review_date, d.id",
        DOCUMENT_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let documents = stmt
        .query_map(params![today, horizon], document_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(documents)
}

// Returns true when this caller won the reminder for the document
pub fn claim_review_reminder(conn: &Connection, document_id: &str) -> Result<bool, ServiceError> {
    Ok(conn.execute(
        "UPDATE documents SET review_reminder_sent = 1 WHERE id = ?1 AND review_reminder_sent = 0",
        params![document_id],
    )? == 1)
}

pub fn release_review_reminder(conn: &Connection, document_id: &str) -> Result<(), ServiceError> {
    conn.execute(
        "UPDATE documents SET review_reminder_sent = 0 WHERE id = ?1",
        params![document_id],
    )?;
    Ok(())
}
