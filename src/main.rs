//Third-party-dependencies
use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use chrono::Utc;
use log::{error, info};

// Module imports:
use sopify_service::config::AppConfig;
use sopify_service::routes;
use sopify_service::services::review_reminders;
use sopify_service::state::AppState;
use sopify_service::utils::auth_middleware::Authentication;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env();
    let state = AppState::from_config(config).map_err(|e| {
        error!("❌ Failed to initialise application state: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let state = web::Data::new(state);

    // One-shot reminder sweeps, for running from cron
    let command = std::env::args().nth(1);
    if let Some(command) = command.as_deref() {
        let today = Utc::now().date_naive();
        let outcome = match command {
            "send-review-reminders" => {
                review_reminders::send_review_reminders(&state.db, state.notifier.as_ref(), today).await
            }
            "send-task-reminders" => {
                review_reminders::send_task_due_reminders(&state.db, state.notifier.as_ref(), today).await
            }
            other => {
                error!("❌ Unknown command: {}", other);
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, other.to_string()));
            }
        };
        return match outcome {
            Ok(report) => {
                info!("✅ {}: {} sent, {} failed", command, report.reminded, report.failed);
                Ok(())
            }
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
        };
    }

    review_reminders::spawn_reminder_scheduler(state.clone());

    let address = state.config.bind_address.clone();
    info!("🚀 Server started at {}", address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&state.config.cors_allowed_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(Authentication)
            .wrap(cors)
            .wrap(Logger::default())
            .configure(routes::init_routes) // utilises methods from routes
    })
    .bind(address)?
    .run()
    .await
}
