use crate::models::{
    InviteMemberRequest, MemberRoleRequest, RemoveMemberRequest, ServiceError, TeamData, UpdateTeamRequest,
};
use crate::services::team_service;
use crate::state::AppState;
use crate::utils::get_user_id_from_request;
use actix_web::{delete, get, patch, post, put, web, HttpRequest, HttpResponse};
use log::info;
use serde_json::json;

// Create a new team
#[post("/teams")]
async fn create_team(
    req: HttpRequest,
    state: web::Data<AppState>,
    team_data: web::Json<TeamData>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;

    info!("📝 Creating new team: {} for user: {}", team_data.name, user_id);

    let team = team_service::create_team(&state.db, &user_id, &team_data)?;

    Ok(HttpResponse::Created().json(team))
}

// Get all teams for the current user
#[get("/teams")]
async fn get_user_teams(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;

    info!("📋 Fetching teams for user: {}", user_id);

    let teams = team_service::list_teams_for_user(&state.db, &user_id)?;

    info!("✅ Found {} teams for user: {}", teams.len(), user_id);

    Ok(HttpResponse::Ok().json(teams))
}

// Get a specific team with its members
#[get("/teams/{team_id}")]
async fn get_team(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let team_id = path.into_inner();

    info!("🔍 Fetching team: {} for user: {}", team_id, user_id);

    let team = team_service::get_team(&state.db, &user_id, &team_id)?;

    Ok(HttpResponse::Ok().json(team))
}

#[put("/teams/{team_id}")]
async fn update_team(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    changes: web::Json<UpdateTeamRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let team_id = path.into_inner();

    info!("🔄 Updating team: {} by user: {}", team_id, user_id);

    let team = team_service::update_team(&state.db, &user_id, &team_id, &changes)?;

    Ok(HttpResponse::Ok().json(team))
}

// Delete a team along with its memberships, tasks and documents
#[delete("/teams/{team_id}")]
async fn delete_team(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let team_id = path.into_inner();

    info!("🗑️ Deleting team: {}", team_id);

    team_service::delete_team(&state.db, &user_id, &team_id)?;

    Ok(HttpResponse::NoContent().finish())
}

// Invite an existing user into the team
#[post("/teams/{team_id}/invite-member")]
async fn invite_member(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    data: web::Json<InviteMemberRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let team_id = path.into_inner();

    info!("👥 Invite to team: {} requested by user: {}", team_id, user_id);

    let membership =
        team_service::invite_member(&state.db, state.notifier.as_ref(), &user_id, &team_id, &data).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "User invited successfully",
        "user_id": membership.user_id,
        "team_id": membership.team_id,
        "role": membership.role
    })))
}

#[patch("/teams/{team_id}/update-member-role")]
async fn update_member_role(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    data: web::Json<MemberRoleRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let team_id = path.into_inner();

    info!("🔄 Role change in team: {} requested by user: {}", team_id, user_id);

    let member = team_service::update_member_role(&state.db, &user_id, &team_id, &data)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Role updated successfully",
        "member": member
    })))
}

#[delete("/teams/{team_id}/remove-member")]
async fn remove_member(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    data: web::Json<RemoveMemberRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let team_id = path.into_inner();

    info!("🗑️ Member removal from team: {} requested by user: {}", team_id, user_id);

    team_service::remove_member(&state.db, &user_id, &team_id, &data)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Member removed successfully"
    })))
}

// Members in the order they joined
#[get("/teams/{team_id}/members")]
async fn get_team_members(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let team_id = path.into_inner();

    info!("📋 Fetching members for team: {}", team_id);

    let members = team_service::list_members(&state.db, &user_id, &team_id)?;

    Ok(HttpResponse::Ok().json(members))
}

#[get("/teams/{team_id}/users-in-same-team")]
async fn users_in_same_team(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let team_id = path.into_inner();

    let users = team_service::users_in_same_team(&state.db, &user_id, &team_id)?;

    Ok(HttpResponse::Ok().json(users))
}

// Register all team routes
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_team)
        .service(get_user_teams)
        .service(get_team)
        .service(update_team)
        .service(delete_team)
        .service(invite_member)
        .service(update_member_role)
        .service(remove_member)
        .service(get_team_members)
        .service(users_in_same_team);
}
