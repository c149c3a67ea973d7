// sopify-service/src/state.rs
use crate::config::AppConfig;
use crate::models::ServiceError;
use crate::services::assistant::{Assistant, OpenAiAssistant};
use crate::services::document_store::{
    DocumentStore, HttpDocumentStore, HttpTokenExchange, InMemoryDocumentStore, InMemoryTokenExchange, TokenExchange,
};
use crate::services::notifier::{LogNotifier, Notifier, SmtpNotifier};
use crate::utils::db::Database;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

// Shared by every worker through `web::Data<AppState>`
pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub document_store: Arc<dyn DocumentStore>,
    pub token_exchange: Arc<dyn TokenExchange>,
    pub assistant: Arc<dyn Assistant>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    // Wire the production collaborators, falling back to local ones when unconfigured
    pub fn from_config(config: AppConfig) -> Result<Self, ServiceError> {
        let timeout = Duration::from_secs(config.external_timeout_secs);
        let db = Database::open(&config.database_path)?;

        let document_store: Arc<dyn DocumentStore> = match &config.document_store.base_url {
            Some(url) => {
                info!("📁 Using document store at {}", url);
                Arc::new(HttpDocumentStore::new(url, timeout)?)
            }
            None => {
                warn!("⚠️ DOCUMENT_STORE_URL not set, keeping documents in memory");
                Arc::new(InMemoryDocumentStore::default())
            }
        };

        let token_exchange: Arc<dyn TokenExchange> = match &config.document_store.token_url {
            Some(url) => Arc::new(HttpTokenExchange::new(&config.document_store, url, timeout)?),
            None => {
                warn!("⚠️ DOCUMENT_STORE_TOKEN_URL not set, issuing local store tokens");
                Arc::new(InMemoryTokenExchange::default())
            }
        };

        let notifier: Arc<dyn Notifier> = match &config.smtp {
            Some(smtp) => {
                info!("📧 Sending mail through {}:{}", smtp.host, smtp.port);
                Arc::new(SmtpNotifier::new(smtp, &config.mail_from, timeout)?)
            }
            None => {
                warn!("⚠️ SMTP_HOST not set, notifications will only be logged");
                Arc::new(LogNotifier)
            }
        };

        let assistant: Arc<dyn Assistant> = Arc::new(OpenAiAssistant::new(&config.openai, timeout)?);

        Ok(AppState {
            config,
            db,
            document_store,
            token_exchange,
            assistant,
            notifier,
        })
    }
}
