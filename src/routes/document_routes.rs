use crate::models::{ConnectStoreRequest, CreateDocumentRequest, ReviewDateRequest, ServiceError};
use crate::services::document_service;
use crate::state::AppState;
use crate::utils::get_user_id_from_request;
use actix_web::{delete, get, post, route, web, HttpRequest, HttpResponse};
use log::info;
use serde_json::json;

// Personal documents plus documents of the user's teams
#[get("/documents")]
async fn list_documents(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;

    info!("📋 Listing documents for user: {}", user_id);

    let documents = document_service::list_documents(&state.db, &user_id)?;

    Ok(HttpResponse::Ok().json(documents))
}

#[post("/documents")]
async fn create_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    data: web::Json<CreateDocumentRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;

    info!("📝 Creating document for user: {}", user_id);

    let document = document_service::create_document(&state, &user_id, &data).await?;

    Ok(HttpResponse::Created().json(document))
}

#[get("/documents/team/{team_id}")]
async fn list_team_documents(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let team_id = path.into_inner();

    info!("📋 Listing documents of team: {} for user: {}", team_id, user_id);

    let documents = document_service::list_team_documents(&state.db, &user_id, &team_id)?;

    Ok(HttpResponse::Ok().json(documents))
}

#[get("/documents/{document_id}")]
async fn get_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let document_id = path.into_inner();

    let document = document_service::get_document(&state.db, &user_id, &document_id)?;

    Ok(HttpResponse::Ok().json(document))
}

#[delete("/documents/{document_id}")]
async fn delete_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let document_id = path.into_inner();

    info!("🗑️ Deleting document: {} by user: {}", document_id, user_id);

    document_service::delete_document(&state, &user_id, &document_id).await?;

    Ok(HttpResponse::NoContent().finish())
}

// Live body from the document store; refreshes the stored title
#[get("/documents/{document_id}/content")]
async fn document_content(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let document_id = path.into_inner();

    info!("🔍 Fetching content of document: {} for user: {}", document_id, user_id);

    let content = document_service::fetch_document_content(&state, &user_id, &document_id).await?;

    Ok(HttpResponse::Ok().json(content))
}

#[route("/documents/{document_id}/review-date", method = "PUT", method = "PATCH")]
async fn update_review_date(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    data: web::Json<ReviewDateRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;
    let document_id = path.into_inner();

    let document = document_service::update_review_date(&state.db, &user_id, &document_id, data.review_date)?;

    Ok(HttpResponse::Ok().json(document))
}

#[get("/integrations/document-store")]
async fn store_status(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;

    let credential = document_service::store_status(&state.db, &user_id)?;

    Ok(HttpResponse::Ok().json(json!({
        "connected": credential.is_some(),
        "expires_at": credential.map(|c| c.expires_at)
    })))
}

#[post("/integrations/document-store")]
async fn connect_store(
    req: HttpRequest,
    state: web::Data<AppState>,
    data: web::Json<ConnectStoreRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;

    info!("🔗 Connecting document store for user: {}", user_id);

    document_service::connect_store(&state, &user_id, &data.code).await?;

    Ok(HttpResponse::Ok().json(json!({
        "connected": true
    })))
}

#[delete("/integrations/document-store")]
async fn disconnect_store(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let user_id = get_user_id_from_request(&req)?;

    document_service::disconnect_store(&state.db, &user_id)?;

    Ok(HttpResponse::Ok().json(json!({
        "connected": false
    })))
}

// Register all document routes
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_documents)
        .service(create_document)
        .service(list_team_documents)
        .service(get_document)
        .service(delete_document)
        .service(document_content)
        .service(update_review_date)
        .service(store_status)
        .service(connect_store)
        .service(disconnect_store);
}
