// src/services/task_service.rs

use crate::models::{
    CreateTaskRequest, ServiceError, Task, TaskFilters, TaskStatus, UpdateTaskRequest, UserAndTeamTasks,
};
use crate::utils::db::Database;
use crate::utils::permissions::{self, AccessContext, Action, ResourceKind};
use crate::utils::task_storage::{self, TaskScope};
use crate::utils::{team_storage, user_storage};
use chrono::Utc;
use log::{error, info};
use rusqlite::Connection;
use uuid::Uuid;

// Team rules applied whenever a task's (team, assignee) pair is set
fn check_assignment(
    conn: &Connection,
    requester_id: &str,
    team_id: Option<&str>,
    assignee_id: Option<&str>,
) -> Result<(), ServiceError> {
    if let Some(team_id) = team_id {
        if !team_storage::team_exists(conn, team_id)? {
            return Err(ServiceError::NotFound(format!("Team with ID {} not found", team_id)));
        }
        let role = team_storage::find_member_role(conn, requester_id, team_id)?.ok_or_else(|| {
            error!("❌ User: {} is not a member of team: {}", requester_id, team_id);
            ServiceError::Forbidden("You are not a member of the selected team.".to_string())
        })?;

        let ctx = AccessContext {
            role: Some(role),
            ..AccessContext::default()
        };
        if !permissions::is_allowed(ResourceKind::Task, Action::Create, &ctx) {
            return Err(ServiceError::Forbidden("You cannot create tasks in this team.".to_string()));
        }
        if assignee_id.map_or(false, |a| a != requester_id)
            && !permissions::is_allowed(ResourceKind::Task, Action::AssignOthers, &ctx)
        {
            error!("❌ User: {} tried to assign a task to another member of team: {}", requester_id, team_id);
            return Err(ServiceError::Forbidden(
                "Only team owners can assign tasks to other members.".to_string(),
            ));
        }
    }

    if let Some(assignee_id) = assignee_id {
        if user_storage::find_user_summary(conn, assignee_id)?.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Assigned user {} does not exist",
                assignee_id
            )));
        }
        if let Some(team_id) = team_id {
            if !permissions::is_team_member(conn, assignee_id, team_id)? {
                return Err(ServiceError::ValidationError(
                    "Assigned user is not a member of the selected team".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn parse_status(status: &Option<String>) -> Result<Option<TaskStatus>, ServiceError> {
    status.as_deref().map(str::parse).transpose()
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn load_task(conn: &Connection, task_id: &str) -> Result<Task, ServiceError> {
    task_storage::find_task_by_id(conn, task_id)?
        .ok_or_else(|| ServiceError::NotFound(format!("Task with ID {} not found", task_id)))
}

pub fn list_tasks(db: &Database, user_id: &str, filters: &TaskFilters) -> Result<Vec<Task>, ServiceError> {
    let query = filters.parse()?;
    db.with_conn(|conn| task_storage::list_tasks(conn, user_id, TaskScope::Visible, &query))
}

/// Splits the user's tasks into those assigned to them and the rest of
/// their teams' tasks. A `team` filter drops the first bucket entirely.
pub fn list_user_and_team_tasks(
    db: &Database,
    user_id: &str,
    filters: &TaskFilters,
) -> Result<UserAndTeamTasks, ServiceError> {
    let query = filters.parse()?;
    db.transaction(|tx| {
        let user_tasks = if query.team.is_some() {
            Vec::new()
        } else {
            task_storage::list_tasks(tx, user_id, TaskScope::AssignedToUser, &query)?
        };
        let team_tasks = task_storage::list_tasks(tx, user_id, TaskScope::TeamOthers, &query)?;
        Ok(UserAndTeamTasks { user_tasks, team_tasks })
    })
}

pub fn get_task(db: &Database, requester_id: &str, task_id: &str) -> Result<Task, ServiceError> {
    db.transaction(|tx| {
        let task = load_task(tx, task_id)?;
        if !permissions::can_read_task(tx, requester_id, &task)? {
            error!("❌ User: {} cannot read task: {}", requester_id, task_id);
            return Err(ServiceError::Forbidden(
                "You do not have permission to view this task.".to_string(),
            ));
        }
        Ok(task)
    })
}

pub fn create_task(db: &Database, requester_id: &str, request: &CreateTaskRequest) -> Result<Task, ServiceError> {
    let description = non_blank(&request.description)
        .ok_or_else(|| ServiceError::BadRequest("Description is required".to_string()))?;
    let due_date = request
        .due_date
        .ok_or_else(|| ServiceError::BadRequest("Due date is required".to_string()))?;
    let status = parse_status(&request.status)?.unwrap_or_default();
    let team = non_blank(&request.team);

    // Personal tasks default to their creator so they stay visible
    let assignee = match (non_blank(&request.assigned_to), &team) {
        (Some(assignee), _) => Some(assignee),
        (None, None) => Some(requester_id.to_string()),
        (None, Some(_)) => None,
    };

    db.transaction(|tx| {
        check_assignment(tx, requester_id, team.as_deref(), assignee.as_deref())?;

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let task = Task {
            id: id.clone(),
            description,
            assigned_to: assignee,
            assigned_to_name: String::new(),
            team,
            team_name: None,
            due_date,
            status,
            created_at: now,
            updated_at: now,
        };
        task_storage::insert_task(tx, &task)?;

        info!("✅ Task created: {} by user: {}", id, requester_id);
        load_task(tx, &id)
    })
}

pub fn update_task(
    db: &Database,
    requester_id: &str,
    task_id: &str,
    changes: &UpdateTaskRequest,
) -> Result<Task, ServiceError> {
    let status = parse_status(&changes.status)?;

    db.transaction(|tx| {
        let mut task = load_task(tx, task_id)?;
        if !permissions::can_write_task(tx, requester_id, &task)? {
            error!("❌ User: {} cannot modify task: {}", requester_id, task_id);
            return Err(ServiceError::Forbidden(
                "You do not have permission to modify this task.".to_string(),
            ));
        }

        if let Some(description) = &changes.description {
            let description = description.trim();
            if description.is_empty() {
                return Err(ServiceError::BadRequest("Description cannot be empty".to_string()));
            }
            task.description = description.to_string();
        }

        let team = match &changes.team {
            Some(team) => non_blank(team),
            None => task.team.clone(),
        };
        let assignee = match &changes.assigned_to {
            Some(assignee) => non_blank(assignee),
            None => task.assigned_to.clone(),
        };
        if team != task.team || assignee != task.assigned_to {
            check_assignment(tx, requester_id, team.as_deref(), assignee.as_deref())?;
        }
        task.team = team;
        task.assigned_to = assignee;

        if let Some(due_date) = changes.due_date {
            task.due_date = due_date;
        }
        if let Some(status) = status {
            task.status = status;
        }
        task.updated_at = Utc::now();

        task_storage::update_task(tx, &task)?;
        info!("🔄 Task updated: {} by user: {}", task_id, requester_id);
        load_task(tx, task_id)
    })
}

pub fn delete_task(db: &Database, requester_id: &str, task_id: &str) -> Result<(), ServiceError> {
    db.transaction(|tx| {
        let task = load_task(tx, task_id)?;
        if !permissions::can_delete_task(tx, requester_id, &task)? {
            error!("❌ User: {} cannot delete task: {}", requester_id, task_id);
            return Err(ServiceError::Forbidden(
                "You do not have permission to delete this task.".to_string(),
            ));
        }
        task_storage::delete_task(tx, task_id)?;
        info!("🗑️ Task deleted: {} by user: {}", task_id, requester_id);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TeamData, TeamRole, User};
    use crate::services::team_service;
    use chrono::NaiveDate;

    fn seed_user(db: &Database, id: &str) {
        let user = User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            name: id.to_string(),
            password_hash: String::new(),
            is_active: true,
            is_staff: false,
            created_at: Utc::now(),
        };
        db.with_conn(|conn| user_storage::save_user(conn, &user)).unwrap();
    }

    fn new_task(description: &str, team: Option<&str>, assignee: Option<&str>, day: u32) -> CreateTaskRequest {
        CreateTaskRequest {
            description: Some(description.to_string()),
            assigned_to: assignee.map(str::to_string),
            team: team.map(str::to_string),
            due_date: NaiveDate::from_ymd_opt(2030, 1, day),
            status: None,
        }
    }

    fn setup() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        for id in ["owner", "member", "outsider"] {
            seed_user(&db, id);
        }
        let team = team_service::create_team(
            &db,
            "owner",
            &TeamData {
                name: "Ops".to_string(),
                description: String::new(),
            },
        )
        .unwrap();
        db.with_conn(|conn| team_storage::add_team_member(conn, "member", &team.id, TeamRole::Member))
            .unwrap();
        (db, team.id)
    }

    #[test]
    fn personal_task_defaults_to_creator() {
        let (db, _) = setup();
        let task = create_task(&db, "outsider", &new_task("Water plants", None, None, 3)).unwrap();

        assert_eq!(task.assigned_to.as_deref(), Some("outsider"));
        assert_eq!(task.status, TaskStatus::NotStarted);
        assert_eq!(list_tasks(&db, "outsider", &TaskFilters::default()).unwrap().len(), 1);
    }

    #[test]
    fn assignee_must_belong_to_the_team() {
        let (db, team) = setup();
        let result = create_task(&db, "owner", &new_task("Audit", Some(&team), Some("outsider"), 3));
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[test]
    fn buckets_are_disjoint_and_team_filter_empties_user_bucket() {
        let (db, team) = setup();
        create_task(&db, "owner", &new_task("Mine", Some(&team), Some("member"), 2)).unwrap();
        create_task(&db, "owner", &new_task("Theirs", Some(&team), Some("owner"), 1)).unwrap();
        create_task(&db, "owner", &new_task("Nobody", Some(&team), None, 4)).unwrap();
        create_task(&db, "member", &new_task("Personal", None, None, 5)).unwrap();

        let buckets = list_user_and_team_tasks(&db, "member", &TaskFilters::default()).unwrap();
        let user: Vec<_> = buckets.user_tasks.iter().map(|t| t.description.as_str()).collect();
        let others: Vec<_> = buckets.team_tasks.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(user, vec!["Mine", "Personal"]);
        assert_eq!(others, vec!["Theirs", "Nobody"]);

        let filtered = list_user_and_team_tasks(
            &db,
            "member",
            &TaskFilters {
                team: Some(team.clone()),
                ..TaskFilters::default()
            },
        )
        .unwrap();
        assert!(filtered.user_tasks.is_empty());
        assert_eq!(filtered.team_tasks.len(), 2);
    }

    #[test]
    fn clearing_team_on_update_makes_task_personal() {
        let (db, team) = setup();
        let task = create_task(&db, "member", &new_task("Draft", Some(&team), Some("member"), 2)).unwrap();

        let changes = UpdateTaskRequest {
            team: Some(None),
            ..UpdateTaskRequest::default()
        };
        let updated = update_task(&db, "member", &task.id, &changes).unwrap();
        assert_eq!(updated.team, None);
        assert_eq!(updated.team_name, None);
        assert_eq!(updated.assigned_to.as_deref(), Some("member"));

        // The team owner no longer sees a personal task
        assert!(matches!(get_task(&db, "owner", &task.id), Err(ServiceError::Forbidden(_))));
    }
}
