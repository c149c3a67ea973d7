//! Access rules for teams, tasks and documents.
//!
//! Every decision is a lookup in [`POLICY`]: a rule grants an action either to
//! holders of certain team roles on the resource's team, or to a principal with
//! a direct relationship to the resource (the task's assignee, the document's
//! owner). Roles are read from `team_memberships` on every call, inside the
//! caller's transaction.

use crate::models::{Document, ServiceError, Task, TeamRole};
use crate::utils::team_storage;
use log::error;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Team,
    Task,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    ManageMembers,
    AssignOthers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    None,
    Assignee,
    Owner,
    PersonalOwner,
}

#[derive(Debug)]
pub struct Rule {
    pub kind: ResourceKind,
    pub action: Action,
    pub roles: &'static [TeamRole],
    pub grant: Grant,
}

const ANY_ROLE: &[TeamRole] = &[TeamRole::Owner, TeamRole::Admin, TeamRole::Member];
const OWNER_ONLY: &[TeamRole] = &[TeamRole::Owner];

const fn rule(kind: ResourceKind, action: Action, roles: &'static [TeamRole], grant: Grant) -> Rule {
    Rule {
        kind,
        action,
        roles,
        grant,
    }
}

pub const POLICY: &[Rule] = &[
    rule(ResourceKind::Team, Action::Read, ANY_ROLE, Grant::None),
    rule(ResourceKind::Team, Action::Update, OWNER_ONLY, Grant::None),
    rule(ResourceKind::Team, Action::Delete, OWNER_ONLY, Grant::None),
    rule(ResourceKind::Team, Action::ManageMembers, OWNER_ONLY, Grant::None),
    rule(ResourceKind::Task, Action::Create, ANY_ROLE, Grant::None),
    rule(ResourceKind::Task, Action::AssignOthers, OWNER_ONLY, Grant::None),
    rule(ResourceKind::Task, Action::Read, ANY_ROLE, Grant::Assignee),
    rule(ResourceKind::Task, Action::Update, OWNER_ONLY, Grant::Assignee),
    rule(ResourceKind::Task, Action::Delete, OWNER_ONLY, Grant::Assignee),
    rule(ResourceKind::Document, Action::Create, ANY_ROLE, Grant::None),
    rule(ResourceKind::Document, Action::Read, ANY_ROLE, Grant::PersonalOwner),
    rule(ResourceKind::Document, Action::Update, OWNER_ONLY, Grant::Owner),
    rule(ResourceKind::Document, Action::Delete, OWNER_ONLY, Grant::Owner),
];

/// The caller's relationship to one resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessContext {
    /// Role on the resource's team, if the resource has a team and the caller belongs to it.
    pub role: Option<TeamRole>,
    pub is_assignee: bool,
    pub is_owner: bool,
    pub is_personal: bool,
}

impl Grant {
    fn matches(&self, ctx: &AccessContext) -> bool {
        match self {
            Grant::None => false,
            Grant::Assignee => ctx.is_assignee,
            Grant::Owner => ctx.is_owner,
            Grant::PersonalOwner => ctx.is_owner && ctx.is_personal,
        }
    }
}

pub fn is_allowed(kind: ResourceKind, action: Action, ctx: &AccessContext) -> bool {
    POLICY
        .iter()
        .filter(|r| r.kind == kind && r.action == action)
        .any(|r| ctx.role.map_or(false, |role| r.roles.contains(&role)) || r.grant.matches(ctx))
}

fn role_on(conn: &Connection, user_id: &str, team_id: Option<&str>) -> Result<Option<TeamRole>, ServiceError> {
    match team_id {
        Some(team_id) => team_storage::find_member_role(conn, user_id, team_id),
        None => Ok(None),
    }
}

pub fn is_team_member(conn: &Connection, user_id: &str, team_id: &str) -> Result<bool, ServiceError> {
    Ok(team_storage::find_member_role(conn, user_id, team_id)?.is_some())
}

fn task_context(conn: &Connection, user_id: &str, task: &Task) -> Result<AccessContext, ServiceError> {
    Ok(AccessContext {
        role: role_on(conn, user_id, task.team.as_deref())?,
        is_assignee: task.assigned_to.as_deref() == Some(user_id),
        is_owner: false,
        is_personal: task.team.is_none(),
    })
}

fn document_context(conn: &Connection, user_id: &str, document: &Document) -> Result<AccessContext, ServiceError> {
    Ok(AccessContext {
        role: role_on(conn, user_id, document.team.as_deref())?,
        is_assignee: false,
        is_owner: document.owner == user_id,
        is_personal: document.is_personal(),
    })
}

pub fn can_read_task(conn: &Connection, user_id: &str, task: &Task) -> Result<bool, ServiceError> {
    let ctx = task_context(conn, user_id, task)?;
    Ok(is_allowed(ResourceKind::Task, Action::Read, &ctx))
}

// Assignee, or owner of the task's team
pub fn can_write_task(conn: &Connection, user_id: &str, task: &Task) -> Result<bool, ServiceError> {
    let ctx = task_context(conn, user_id, task)?;
    Ok(is_allowed(ResourceKind::Task, Action::Update, &ctx))
}

pub fn can_delete_task(conn: &Connection, user_id: &str, task: &Task) -> Result<bool, ServiceError> {
    let ctx = task_context(conn, user_id, task)?;
    Ok(is_allowed(ResourceKind::Task, Action::Delete, &ctx))
}

pub fn can_read_document(conn: &Connection, user_id: &str, document: &Document) -> Result<bool, ServiceError> {
    let ctx = document_context(conn, user_id, document)?;
    Ok(is_allowed(ResourceKind::Document, Action::Read, &ctx))
}

// Document owner, or owner of the document's team
pub fn can_update_document(conn: &Connection, user_id: &str, document: &Document) -> Result<bool, ServiceError> {
    let ctx = document_context(conn, user_id, document)?;
    Ok(is_allowed(ResourceKind::Document, Action::Update, &ctx))
}

pub fn can_delete_document(conn: &Connection, user_id: &str, document: &Document) -> Result<bool, ServiceError> {
    let ctx = document_context(conn, user_id, document)?;
    Ok(is_allowed(ResourceKind::Document, Action::Delete, &ctx))
}

/// Membership check for filing a new document under `team_id`, followed by
/// the `(Document, Create)` rule for the caller's role.
pub fn require_document_create(conn: &Connection, user_id: &str, team_id: &str) -> Result<TeamRole, ServiceError> {
    let role = validate_team_membership(conn, user_id, team_id)?;
    let ctx = AccessContext {
        role: Some(role),
        ..AccessContext::default()
    };
    if !is_allowed(ResourceKind::Document, Action::Create, &ctx) {
        error!("❌ User: {} with role {} cannot add documents to team: {}", user_id, role, team_id);
        return Err(ServiceError::Forbidden(
            "You cannot add documents to this team.".to_string(),
        ));
    }
    Ok(role)
}

/// Resolve the caller's role on `team_id`: `NotFound` when the team does not
/// exist, `Forbidden` when the caller is not a member.
pub fn validate_team_membership(conn: &Connection, user_id: &str, team_id: &str) -> Result<TeamRole, ServiceError> {
    if !team_storage::team_exists(conn, team_id)? {
        error!("❌ Team not found: {}", team_id);
        return Err(ServiceError::NotFound(format!("Team with ID {} not found", team_id)));
    }

    team_storage::find_member_role(conn, user_id, team_id)?.ok_or_else(|| {
        error!("❌ User: {} is not a member of team: {}", user_id, team_id);
        ServiceError::Forbidden("You are not a member of this team.".to_string())
    })
}

/// Like [`validate_team_membership`], additionally requiring a role that
/// `action` on teams allows. `denied` is the message for members lacking it.
pub fn require_team_action(
    conn: &Connection,
    user_id: &str,
    team_id: &str,
    action: Action,
    denied: &str,
) -> Result<TeamRole, ServiceError> {
    let role = validate_team_membership(conn, user_id, team_id)?;
    let ctx = AccessContext {
        role: Some(role),
        ..AccessContext::default()
    };
    if !is_allowed(ResourceKind::Team, action, &ctx) {
        error!("❌ User: {} with role {} denied {:?} on team: {}", user_id, role, action, team_id);
        return Err(ServiceError::Forbidden(denied.to_string()));
    }
    Ok(role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskStatus, TeamData, User};
    use crate::services::team_service;
    use crate::utils::db::Database;
    use crate::utils::user_storage;
    use chrono::{NaiveDate, Utc};

    fn with_role(role: Option<TeamRole>) -> AccessContext {
        AccessContext {
            role,
            ..AccessContext::default()
        }
    }

    #[test]
    fn only_owners_manage_teams() {
        for action in [Action::Update, Action::Delete, Action::ManageMembers] {
            assert!(is_allowed(ResourceKind::Team, action, &with_role(Some(TeamRole::Owner))));
            assert!(!is_allowed(ResourceKind::Team, action, &with_role(Some(TeamRole::Admin))));
            assert!(!is_allowed(ResourceKind::Team, action, &with_role(Some(TeamRole::Member))));
            assert!(!is_allowed(ResourceKind::Team, action, &with_role(None)));
        }
        assert!(is_allowed(ResourceKind::Team, Action::Read, &with_role(Some(TeamRole::Member))));
    }

    #[test]
    fn task_writes_allow_assignee_or_team_owner() {
        let assignee = AccessContext {
            role: Some(TeamRole::Member),
            is_assignee: true,
            ..AccessContext::default()
        };
        assert!(is_allowed(ResourceKind::Task, Action::Update, &assignee));
        assert!(is_allowed(ResourceKind::Task, Action::Delete, &assignee));

        assert!(is_allowed(ResourceKind::Task, Action::Delete, &with_role(Some(TeamRole::Owner))));
        assert!(!is_allowed(ResourceKind::Task, Action::Delete, &with_role(Some(TeamRole::Admin))));
        assert!(!is_allowed(ResourceKind::Task, Action::Update, &with_role(Some(TeamRole::Member))));
        assert!(is_allowed(ResourceKind::Task, Action::Read, &with_role(Some(TeamRole::Member))));
        assert!(!is_allowed(ResourceKind::Task, Action::Read, &with_role(None)));
    }

    #[test]
    fn personal_documents_are_owner_only() {
        let owner = AccessContext {
            is_owner: true,
            is_personal: true,
            ..AccessContext::default()
        };
        assert!(is_allowed(ResourceKind::Document, Action::Read, &owner));
        assert!(is_allowed(ResourceKind::Document, Action::Delete, &owner));

        let stranger = AccessContext {
            is_personal: true,
            ..AccessContext::default()
        };
        assert!(!is_allowed(ResourceKind::Document, Action::Read, &stranger));
    }

    #[test]
    fn team_documents_readable_by_members_but_not_by_former_owner() {
        assert!(is_allowed(ResourceKind::Document, Action::Read, &with_role(Some(TeamRole::Admin))));

        let former_member_owner = AccessContext {
            is_owner: true,
            ..AccessContext::default()
        };
        assert!(!is_allowed(ResourceKind::Document, Action::Read, &former_member_owner));
        assert!(is_allowed(ResourceKind::Document, Action::Delete, &former_member_owner));
        assert!(!is_allowed(ResourceKind::Document, Action::Delete, &with_role(Some(TeamRole::Admin))));
    }

    #[test]
    fn every_action_has_exactly_one_row() {
        let used = [
            (ResourceKind::Team, Action::Read),
            (ResourceKind::Team, Action::Update),
            (ResourceKind::Team, Action::Delete),
            (ResourceKind::Team, Action::ManageMembers),
            (ResourceKind::Task, Action::Create),
            (ResourceKind::Task, Action::AssignOthers),
            (ResourceKind::Task, Action::Read),
            (ResourceKind::Task, Action::Update),
            (ResourceKind::Task, Action::Delete),
            (ResourceKind::Document, Action::Create),
            (ResourceKind::Document, Action::Read),
            (ResourceKind::Document, Action::Update),
            (ResourceKind::Document, Action::Delete),
        ];
        for (kind, action) in used {
            let rows = POLICY.iter().filter(|r| r.kind == kind && r.action == action).count();
            assert_eq!(rows, 1, "{:?}/{:?}", kind, action);
        }
        assert_eq!(POLICY.len(), used.len());
    }

    fn seeded() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        for id in ["owner", "member", "outsider"] {
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
    fn task_delete_follows_its_own_rule() {
        let (db, team) = seeded();
        let task = Task {
            id: "t1".to_string(),
            description: "Sweep".to_string(),
            assigned_to: Some("member".to_string()),
            assigned_to_name: "member".to_string(),
            team: Some(team),
            team_name: None,
            due_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            status: TaskStatus::NotStarted,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.with_conn(|conn| {
            assert!(can_delete_task(conn, "member", &task)?);
            assert!(can_delete_task(conn, "owner", &task)?);
            assert!(!can_delete_task(conn, "outsider", &task)?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn document_update_and_create_follow_their_own_rules() {
        let (db, team) = seeded();
        let document = Document {
            id: "d1".to_string(),
            title: "SOP".to_string(),
            file_url: String::new(),
            external_id: "x1".to_string(),
            owner: "member".to_string(),
            owner_name: "member".to_string(),
            team: Some(team.clone()),
            team_name: None,
            review_date: None,
            review_reminder_sent: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.with_conn(|conn| {
            assert!(can_update_document(conn, "member", &document)?);
            assert!(can_update_document(conn, "owner", &document)?);
            assert!(!can_update_document(conn, "outsider", &document)?);

            assert_eq!(require_document_create(conn, "member", &team)?, TeamRole::Member);
            assert!(matches!(
                require_document_create(conn, "outsider", &team),
                Err(ServiceError::Forbidden(_))
            ));
            assert!(matches!(
                require_document_create(conn, "member", "no-such-team"),
                Err(ServiceError::NotFound(_))
            ));
            Ok(())
        })
        .unwrap();
    }
}
