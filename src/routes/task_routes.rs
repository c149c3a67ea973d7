use crate::models::{CreateTaskRequest, ServiceError, TaskFilters, UpdateTaskRequest};
use crate::services::task_service;
use crate::state::AppState;
use crate::utils::get_user_id_from_request;
use actix_web::{delete, get, post, route, web, HttpRequest, HttpResponse};
use log::info;

// Tasks assigned to the user or belonging to any of the user's teams
#[get("/tasks")]
async fn list_tasks(
    req: HttpRequest,
    state: web::Data<AppState>,
    filters: web::Query<TaskFilters>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;

    info!("📋 Listing tasks for user: {} with filters: {:?}", user_id, filters);

    let tasks = task_service::list_tasks(&state.db, &user_id, &filters)?;

    Ok(HttpResponse::Ok().json(tasks))
}

#[get("/tasks/user-and-team-tasks")]
async fn user_and_team_tasks(
    req: HttpRequest,
    state: web::Data<AppState>,
    filters: web::Query<TaskFilters>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;

    info!("📋 Listing user and team tasks for user: {}", user_id);

    let buckets = task_service::list_user_and_team_tasks(&state.db, &user_id, &filters)?;

    Ok(HttpResponse::Ok().json(buckets))
}

#[post("/tasks")]
async fn create_task(
    req: HttpRequest,
    state: web::Data<AppState>,
    data: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;

    info!("📝 Creating task for user: {}", user_id);

    let task = task_service::create_task(&state.db, &user_id, &data)?;

    Ok(HttpResponse::Created().json(task))
}

#[get("/tasks/{task_id}")]
async fn get_task(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let task_id = path.into_inner();

    info!("🔍 Fetching task: {} for user: {}", task_id, user_id);

    let task = task_service::get_task(&state.db, &user_id, &task_id)?;

    Ok(HttpResponse::Ok().json(task))
}

// PUT and PATCH both apply the fields present in the body
#[route("/tasks/{task_id}", method = "PUT", method = "PATCH")]
async fn update_task(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    data: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let task_id = path.into_inner();

    info!("🔄 Updating task: {} by user: {}", task_id, user_id);

    let task = task_service::update_task(&state.db, &user_id, &task_id, &data)?;

    Ok(HttpResponse::Ok().json(task))
}

#[delete("/tasks/{task_id}")]
async fn delete_task(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let task_id = path.into_inner();

    info!("🗑️ Deleting task: {} by user: {}", task_id, user_id);

    task_service::delete_task(&state.db, &user_id, &task_id)?;

    Ok(HttpResponse::NoContent().finish())
}

// Register all task routes; the fixed path must precede `/tasks/{task_id}`
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(user_and_team_tasks)
        .service(list_tasks)
        .service(create_task)
        .service(get_task)
        .service(update_task)
        .service(delete_task);
}
