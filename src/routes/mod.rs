// src/routes/mod.rs
use crate::models::ServiceError;
use actix_web::{error, get, web, HttpResponse, Responder};

pub mod assist_routes;
pub mod auth_routes;
pub mod document_routes;
pub mod task_routes;
pub mod team_routes;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().body("Welcome to the SOPify API")
}

// Malformed bodies and query strings share the JSON error shape
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        error::Error::from(ServiceError::BadRequest(format!("Invalid JSON body: {}", err)))
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        error::Error::from(ServiceError::BadRequest(format!("Invalid query string: {}", err)))
    })
}

// Register every route of the service
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(index)
        .configure(auth_routes::init_routes)
        .configure(team_routes::init_routes)
        .configure(task_routes::init_routes)
        .configure(document_routes::init_routes)
        .configure(assist_routes::init_routes);
}
