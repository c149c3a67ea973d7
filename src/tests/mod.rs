// Shared fixtures for the HTTP-level tests
use crate::config::AppConfig;
use crate::models::{ExternalCredential, ServiceError, TeamData, TeamRole, TokenType, User};
use crate::services::assistant::Assistant;
use crate::services::document_store::{InMemoryDocumentStore, InMemoryTokenExchange};
use crate::services::notifier::Notifier;
use crate::services::team_service;
use crate::state::AppState;
use crate::utils::db::Database;
use crate::utils::{credential_storage, jwt, password, team_storage, user_storage};
use actix_web::http::header;
use actix_web::web;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

mod assist_tests;
mod task_tests;

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<SentMessage>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::InternalServerError);
        }
        self.sent.lock().unwrap().push(SentMessage {
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

// Echoes the prompt back with the token budget it was given
pub struct EchoAssistant;

#[async_trait]
impl Assistant for EchoAssistant {
    async fn complete(&self, _instructions: &str, prompt: &str, max_tokens: u32) -> Result<String, ServiceError> {
        Ok(format!("[{}] {}", max_tokens, prompt))
    }
}

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub store: Arc<InMemoryDocumentStore>,
    pub exchange: Arc<InMemoryTokenExchange>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn test_context() -> TestContext {
    let store = Arc::new(InMemoryDocumentStore::default());
    let exchange = Arc::new(InMemoryTokenExchange::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let state = AppState {
        config: AppConfig {
            bcrypt_cost: 4,
            ..AppConfig::default()
        },
        db: Database::open_in_memory().unwrap(),
        document_store: store.clone(),
        token_exchange: exchange.clone(),
        assistant: Arc::new(EchoAssistant),
        notifier: notifier.clone(),
    };

    TestContext {
        state: web::Data::new(state),
        store,
        exchange,
        notifier,
    }
}

impl TestContext {
    // Inserts `<name>@example.com` and returns its id with a fresh access token
    pub fn create_user(&self, name: &str) -> (String, String) {
        let user = User {
            id: format!("{}-id", name),
            email: format!("{}@example.com", name),
            name: name.to_string(),
            password_hash: password::hash_password("password123", 4).unwrap(),
            is_active: true,
            is_staff: false,
            created_at: Utc::now(),
        };
        self.state
            .db
            .with_conn(|conn| user_storage::save_user(conn, &user))
            .unwrap();
        let token = jwt::generate_token(&self.state.config, &user, TokenType::Access).unwrap();
        (user.id, token)
    }

    // Team owned by `owner_id`; returns the team id
    pub fn create_team(&self, owner_id: &str, name: &str) -> String {
        let data = TeamData {
            name: name.to_string(),
            description: String::new(),
        };
        team_service::create_team(&self.state.db, owner_id, &data).unwrap().id
    }

    pub fn add_member(&self, user_id: &str, team_id: &str, role: TeamRole) {
        self.state
            .db
            .with_conn(|conn| team_storage::add_team_member(conn, user_id, team_id, role))
            .unwrap();
    }

    pub fn connect_store(&self, user_id: &str, expires_in: Duration) {
        let credential = ExternalCredential {
            user_id: user_id.to_string(),
            access_token: format!("store-token-{}", user_id),
            refresh_token: Some(format!("store-refresh-{}", user_id)),
            expires_at: Utc::now() + expires_in,
            updated_at: Utc::now(),
        };
        self.state
            .db
            .with_conn(|conn| credential_storage::save_credential(conn, &credential))
            .unwrap();
    }
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

// Builds the full application around a test context's state
#[macro_export]
macro_rules! test_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.state.clone())
                .wrap($crate::utils::auth_middleware::Authentication)
                .configure($crate::routes::init_routes),
        )
        .await
    };
}
