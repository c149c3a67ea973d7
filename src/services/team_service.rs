// src/services/team_service.rs

use crate::models::{
    InviteMemberRequest, MemberRoleRequest, MemberSummary, RemoveMemberRequest, ServiceError, Team, TeamData,
    TeamDetail, TeamMembership, TeamRole, UpdateTeamRequest, UserSummary,
};
use crate::services::notifier::Notifier;
use crate::utils::db::Database;
use crate::utils::permissions::{self, Action};
use crate::utils::{team_storage, user_storage};
use chrono::Utc;
use log::{error, info, warn};
use uuid::Uuid;

const MAX_TEAM_NAME_LEN: usize = 100;

fn validate_team_name(name: &str) -> Result<String, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::BadRequest("Team name is required".to_string()));
    }
    if name.chars().count() > MAX_TEAM_NAME_LEN {
        return Err(ServiceError::BadRequest(format!(
            "Team name must be at most {} characters",
            MAX_TEAM_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn required_user_id(user_id: &Option<String>) -> Result<&str, ServiceError> {
    user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::BadRequest("User ID is required".to_string()))
}

// Creates the team and the creator's owner membership together
pub fn create_team(db: &Database, creator_id: &str, data: &TeamData) -> Result<Team, ServiceError> {
    let name = validate_team_name(&data.name)?;
    let team = Team {
        id: Uuid::new_v4().to_string(),
        name,
        description: data.description.trim().to_string(),
        created_by: creator_id.to_string(),
        created_at: Utc::now(),
    };

    db.transaction(|tx| {
        team_storage::insert_team(tx, &team)?;
        team_storage::add_team_member(tx, creator_id, &team.id, TeamRole::Owner)?;
        Ok(())
    })?;

    info!("✅ Team created successfully: {} by user: {}", team.id, creator_id);
    Ok(team)
}

pub fn list_teams_for_user(db: &Database, user_id: &str) -> Result<Vec<Team>, ServiceError> {
    db.with_conn(|conn| team_storage::get_teams_for_user(conn, user_id))
}

pub fn get_team(db: &Database, requester_id: &str, team_id: &str) -> Result<TeamDetail, ServiceError> {
    db.transaction(|tx| {
        permissions::require_team_action(tx, requester_id, team_id, Action::Read, "You are not a member of this team.")?;
        let team = team_storage::find_team_by_id(tx, team_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("Team with ID {} not found", team_id)))?;
        let members = team_storage::get_team_members(tx, team_id)?;
        Ok(TeamDetail { team, members })
    })
}

pub fn update_team(
    db: &Database,
    requester_id: &str,
    team_id: &str,
    changes: &UpdateTeamRequest,
) -> Result<Team, ServiceError> {
    db.transaction(|tx| {
        permissions::require_team_action(
            tx,
            requester_id,
            team_id,
            Action::Update,
            "Only team owners can update the team.",
        )?;
        let mut team = team_storage::find_team_by_id(tx, team_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("Team with ID {} not found", team_id)))?;

        if let Some(name) = &changes.name {
            team.name = validate_team_name(name)?;
        }
        if let Some(description) = &changes.description {
            team.description = description.trim().to_string();
        }

        team_storage::update_team(tx, &team)?;
        info!("✅ Team updated: {}", team_id);
        Ok(team)
    })
}

pub fn delete_team(db: &Database, requester_id: &str, team_id: &str) -> Result<(), ServiceError> {
    db.transaction(|tx| {
        permissions::require_team_action(
            tx,
            requester_id,
            team_id,
            Action::Delete,
            "Only team owners can delete a team.",
        )?;
        team_storage::delete_team(tx, team_id)?;
        info!("🗑️ Team deleted: {} by user: {}", team_id, requester_id);
        Ok(())
    })
}

/// Adds the user with `request.email` to the team and notifies them.
/// The membership is rolled back if the notification cannot be sent.
pub async fn invite_member(
    db: &Database,
    notifier: &dyn Notifier,
    requester_id: &str,
    team_id: &str,
    request: &InviteMemberRequest,
) -> Result<TeamMembership, ServiceError> {
    let (team, invitee_email, membership) = db.transaction(|tx| {
        permissions::require_team_action(
            tx,
            requester_id,
            team_id,
            Action::ManageMembers,
            "Only team owners can invite members.",
        )?;

        let email = request
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ServiceError::BadRequest("Email is required".to_string()))?;
        let role: TeamRole = request.role.as_deref().unwrap_or("member").parse()?;

        let invitee = user_storage::find_user_by_email(tx, email)?.ok_or_else(|| {
            error!("❌ No user with email: {}", email);
            ServiceError::NotFound("User with this email does not exist".to_string())
        })?;

        if team_storage::find_member_role(tx, &invitee.id, team_id)?.is_some() {
            error!("❌ User: {} already in team: {}", invitee.id, team_id);
            return Err(ServiceError::BadRequest("User is already a member of the team".to_string()));
        }

        let team = team_storage::find_team_by_id(tx, team_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("Team with ID {} not found", team_id)))?;
        let membership = team_storage::add_team_member(tx, &invitee.id, team_id, role)?;
        Ok((team, invitee.email, membership))
    })?;

    let body = format!(
        "You have been invited to join the team \"{}\" as {}.",
        team.name, membership.role
    );
    if let Err(err) = notifier
        .notify(&[invitee_email.clone()], "Team Invitation", &body)
        .await
    {
        warn!("⚠️ Invitation email to {} failed, reverting membership: {}", invitee_email, err);
        db.transaction(|tx| team_storage::remove_team_member(tx, &membership.user_id, team_id))?;
        return Err(ServiceError::InternalServerError);
    }

    info!("👥 User: {} invited to team: {} as {}", membership.user_id, team_id, membership.role);
    Ok(membership)
}

pub fn update_member_role(
    db: &Database,
    requester_id: &str,
    team_id: &str,
    request: &MemberRoleRequest,
) -> Result<MemberSummary, ServiceError> {
    db.transaction(|tx| {
        permissions::require_team_action(
            tx,
            requester_id,
            team_id,
            Action::ManageMembers,
            "Only team owners can change member roles.",
        )?;
        let target_id = required_user_id(&request.user_id)?;
        let role: TeamRole = request
            .role
            .as_deref()
            .ok_or_else(|| ServiceError::BadRequest("Invalid role".to_string()))?
            .parse()?;

        if target_id == requester_id {
            return Err(ServiceError::BadRequest("You cannot change your own role.".to_string()));
        }
        if !team_storage::update_member_role(tx, target_id, team_id, role)? {
            return Err(ServiceError::NotFound("User is not a member of this team.".to_string()));
        }

        info!("🔄 User: {} in team: {} is now {}", target_id, team_id, role);
        team_storage::get_team_members(tx, team_id)?
            .into_iter()
            .find(|m| m.user_id == target_id)
            .ok_or(ServiceError::InternalServerError)
    })
}

pub fn remove_member(
    db: &Database,
    requester_id: &str,
    team_id: &str,
    request: &RemoveMemberRequest,
) -> Result<(), ServiceError> {
    db.transaction(|tx| {
        permissions::require_team_action(
            tx,
            requester_id,
            team_id,
            Action::ManageMembers,
            "Only team owners can remove members.",
        )?;
        let target_id = required_user_id(&request.user_id)?;

        if target_id == requester_id {
            return Err(ServiceError::BadRequest(
                "You cannot remove yourself from the team.".to_string(),
            ));
        }
        if !team_storage::remove_team_member(tx, target_id, team_id)? {
            return Err(ServiceError::NotFound("User is not a member of this team.".to_string()));
        }

        info!("🗑️ User: {} removed from team: {}", target_id, team_id);
        Ok(())
    })
}

pub fn list_members(db: &Database, requester_id: &str, team_id: &str) -> Result<Vec<MemberSummary>, ServiceError> {
    db.transaction(|tx| {
        permissions::validate_team_membership(tx, requester_id, team_id)?;
        team_storage::get_team_members(tx, team_id)
    })
}

pub fn users_in_same_team(db: &Database, requester_id: &str, team_id: &str) -> Result<Vec<UserSummary>, ServiceError> {
    db.transaction(|tx| {
        permissions::validate_team_membership(tx, requester_id, team_id)?;
        team_storage::get_team_users(tx, team_id)
    })
}
