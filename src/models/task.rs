use crate::models::{double_option, ServiceError};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "not_started" => Ok(TaskStatus::NotStarted),
            "in_progress" => Ok(TaskStatus::InProgress),
            "complete" => Ok(TaskStatus::Complete),
            other => Err(ServiceError::BadRequest(format!(
                "Invalid status: {}. Must be 'not_started', 'in_progress' or 'complete'",
                other
            ))),
        }
    }
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|_| FromSqlError::InvalidType)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub assigned_to: Option<String>,
    pub assigned_to_name: String,
    pub team: Option<String>,
    pub team_name: Option<String>,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CreateTaskRequest {
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub team: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<String>,
}

// Partial update; `null` clears `assigned_to` or `team`
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct UpdateTaskRequest {
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub team: Option<Option<String>>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<String>,
}

// Raw query-string filters for task listings
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct TaskFilters {
    pub status: Option<String>,
    pub team: Option<String>,
    pub assigned_to: Option<String>,
    pub due_before: Option<String>,
    pub due_after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AssigneeFilter {
    #[default]
    Any,
    Unassigned,
    User(String),
}

#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub team: Option<String>,
    pub assignee: AssigneeFilter,
    pub due_before: Option<NaiveDate>,
    pub due_after: Option<NaiveDate>,
}

impl TaskFilters {
    pub fn parse(&self) -> Result<TaskQuery, ServiceError> {
        let status = non_empty(&self.status).map(str::parse).transpose()?;
        let assignee = match non_empty(&self.assigned_to) {
            None => AssigneeFilter::Any,
            Some(value) if value.eq_ignore_ascii_case("null") || value.eq_ignore_ascii_case("unassigned") => {
                AssigneeFilter::Unassigned
            }
            Some(value) => AssigneeFilter::User(value.to_string()),
        };

        Ok(TaskQuery {
            status,
            team: non_empty(&self.team).map(str::to_string),
            assignee,
            due_before: parse_date("due_before", &self.due_before)?,
            due_after: parse_date("due_after", &self.due_after)?,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, value: &Option<String>) -> Result<Option<NaiveDate>, ServiceError> {
    non_empty(value)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ServiceError::BadRequest(format!("Invalid {} date: {}. Expected YYYY-MM-DD", field, raw))
            })
        })
        .transpose()
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserAndTeamTasks {
    pub user_tasks: Vec<Task>,
    pub team_tasks: Vec<Task>,
}
