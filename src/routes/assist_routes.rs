use crate::models::{ContentRequest, GenerateRequest, ServiceError};
use crate::services::assistant;
use crate::state::AppState;
use crate::utils::get_user_id_from_request;
use actix_web::{post, web, HttpRequest, HttpResponse};
use log::info;
use serde_json::json;

#[post("/assist/generate")]
async fn generate(
    req: HttpRequest,
    state: web::Data<AppState>,
    data: web::Json<GenerateRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    info!("🤖 SOP generation requested by user: {}", user_id);

    let sop = assistant::generate_sop(state.assistant.as_ref(), &data.prompt).await?;

    Ok(HttpResponse::Ok().json(json!({ "sop": sop })))
}

#[post("/assist/summarise")]
async fn summarise(
    req: HttpRequest,
    state: web::Data<AppState>,
    data: web::Json<ContentRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    info!("🤖 SOP summary requested by user: {}", user_id);

    let summary = assistant::summarise_sop(state.assistant.as_ref(), &data.content).await?;

    Ok(HttpResponse::Ok().json(json!({ "summary": summary })))
}

#[post("/assist/improve")]
async fn improve(
    req: HttpRequest,
    state: web::Data<AppState>,
    data: web::Json<ContentRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    info!("🤖 SOP improvement requested by user: {}", user_id);

    let improved = assistant::improve_sop(state.assistant.as_ref(), &data.content).await?;

    Ok(HttpResponse::Ok().json(json!({ "improved": improved })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(generate).service(summarise).service(improve);
}
