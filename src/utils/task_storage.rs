use crate::models::{AssigneeFilter, ServiceError, Task, TaskQuery};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const TASK_SELECT: &str = "SELECT t.id, t.description, t.assigned_to, COALESCE(u.name, 'Unassigned'),
        t.team_id, tm.name, t.due_date, t.status, t.created_at, t.updated_at
    FROM tasks t
    LEFT JOIN users u ON u.id = t.assigned_to
    LEFT JOIN teams tm ON tm.id = t.team_id";

/// An open, assigned task with the assignee's contact details.
#[derive(Debug, Clone)]
pub struct DueTask {
    pub id: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub assignee_name: String,
    pub assignee_email: String,
}

/// Which slice of a user's tasks a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    /// Assigned to the user, or in any team the user belongs to.
    Visible,
    /// Assigned to the user, personal or team.
    AssignedToUser,
    /// In the user's teams but assigned to someone else or nobody.
    TeamOthers,
}

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        description: row.get(1)?,
        assigned_to: row.get(2)?,
        assigned_to_name: row.get(3)?,
        team: row.get(4)?,
        team_name: row.get(5)?,
        due_date: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn insert_task(conn: &Connection, task: &Task) -> Result<(), ServiceError> {
    conn.execute(
        "INSERT INTO tasks (id, description, assigned_to, team_id, due_date, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            task.id,
            task.description,
            task.assigned_to,
            task.team,
            task.due_date,
            task.status,
            task.created_at,
            task.updated_at
        ],
    )?;
    Ok(())
}

pub fn find_task_by_id(conn: &Connection, task_id: &str) -> Result<Option<Task>, ServiceError> {
    let sql = format!("{} WHERE t.id = ?1", TASK_SELECT);
    Ok(conn.query_row(&sql, params![task_id], task_from_row).optional()?)
}

pub fn update_task(conn: &Connection, task: &Task) -> Result<(), ServiceError> {
    conn.execute(
        "UPDATE tasks
         SET due_reminder_sent = CASE WHEN due_date IS ?5 AND assigned_to IS ?3
                 THEN due_reminder_sent ELSE 0 END,
             description = ?2, assigned_to = ?3, team_id = ?4, due_date = ?5,
             status = ?6, updated_at = ?7
         WHERE id = ?1",
        params![
            task.id,
            task.description,
            task.assigned_to,
            task.team,
            task.due_date,
            task.status,
            task.updated_at
        ],
    )?;
    Ok(())
}

pub fn delete_task(conn: &Connection, task_id: &str) -> Result<bool, ServiceError> {
    Ok(conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])? > 0)
}

// Lists tasks for `user_id` within `scope`, narrowed by `query`,
// ordered by due date then creation time
pub fn list_tasks(
    conn: &Connection,
    user_id: &str,
    scope: TaskScope,
    query: &TaskQuery,
) -> Result<Vec<Task>, ServiceError> {
    let mut values: Vec<Value> = vec![Value::Text(user_id.to_string())];
    let mut clauses: Vec<String> = vec![match scope {
        TaskScope::Visible => {
            "(t.assigned_to = ?1 OR t.team_id IN (SELECT team_id FROM team_memberships WHERE user_id = ?1))"
        }
        TaskScope::AssignedToUser => "t.assigned_to = ?1",
        TaskScope::TeamOthers => {
            "(t.team_id IN (SELECT team_id FROM team_memberships WHERE user_id = ?1)
              AND (t.assigned_to IS NULL OR t.assigned_to != ?1))"
        }
    }
    .to_string()];

    let mut push = |clause: &str, value: Value| {
        values.push(value);
        clauses.push(clause.replace("{}", &format!("?{}", values.len())));
    };

    if let Some(status) = query.status {
        push("t.status = {}", Value::Text(status.as_str().to_string()));
    }
    if let Some(team) = &query.team {
        push("t.team_id = {}", Value::Text(team.clone()));
    }
    if let AssigneeFilter::User(assignee) = &query.assignee {
        push("t.assigned_to = {}", Value::Text(assignee.clone()));
    }
    if let Some(after) = query.due_after {
        push("t.due_date >= {}", Value::Text(after.format("%Y-%m-%d").to_string()));
    }
    if let Some(before) = query.due_before {
        push("t.due_date <= {}", Value::Text(before.format("%Y-%m-%d").to_string()));
    }
    if query.assignee == AssigneeFilter::Unassigned {
        clauses.push("t.assigned_to IS NULL".to_string());
    }

    let sql = format!(
        "{} WHERE {} ORDER BY t.due_date, t.created_at, t.id",
        TASK_SELECT,
        clauses.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params_from_iter(values.iter()), task_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

// Open assigned tasks due in [today, today + window_days] and not yet reminded
pub fn tasks_due_soon(conn: &Connection, today: NaiveDate, window_days: i64) -> Result<Vec<DueTask>, ServiceError> {
    let horizon = today + chrono::Duration::days(window_days);
    let mut stmt = conn.prepare(
        "SELECT t.id, t.description, t.due_date, u.name, u.email
         FROM tasks t
         JOIN users u ON u.id = t.assigned_to
         WHERE t.due_reminder_sent = 0 AND t.status != 'complete'
           AND t.due_date >= ?1 AND t.due_date <= ?2
         ORDER BY t.due_date, t.id",
    )?;
    let tasks = stmt
        .query_map(params![today, horizon], |row| {
            Ok(DueTask {
                id: row.get(0)?,
                description: row.get(1)?,
                due_date: row.get(2)?,
                assignee_name: row.get(3)?,
                assignee_email: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

pub fn claim_due_reminder(conn: &Connection, task_id: &str) -> Result<bool, ServiceError> {
    Ok(conn.execute(
        "UPDATE tasks SET due_reminder_sent = 1 WHERE id = ?1 AND due_reminder_sent = 0",
        params![task_id],
    )? == 1)
}

pub fn release_due_reminder(conn: &Connection, task_id: &str) -> Result<(), ServiceError> {
    conn.execute("UPDATE tasks SET due_reminder_sent = 0 WHERE id = ?1", params![task_id])?;
    Ok(())
}
