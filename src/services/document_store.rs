// src/services/document_store.rs

use crate::config::DocumentStoreConfig;
use crate::models::{ContentKind, ServiceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

pub const RETRY_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub external_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedDocument {
    pub title: String,
    pub content: String,
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// External storage for document bodies. Every call acts on behalf of one
/// user and carries that user's access token.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(
        &self,
        access_token: &str,
        title: &str,
        content: &str,
        kind: ContentKind,
    ) -> Result<StoredDocument, ServiceError>;

    async fn fetch(&self, access_token: &str, external_id: &str) -> Result<FetchedDocument, ServiceError>;

    async fn delete(&self, access_token: &str, external_id: &str) -> Result<(), ServiceError>;
}

/// OAuth token endpoint of the document store.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ServiceError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ServiceError>;
}

// Runs `op` up to `attempts` times, sleeping `delay` between failures
pub async fn with_retry<T, F, Fut>(label: &str, attempts: u32, delay: Duration, mut op: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                warn!("⚠️ {} failed (attempt {}/{}): {}", label, attempt, attempts, err);
                actix_web::rt::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                error!("❌ {} failed after {} attempts: {}", label, attempts, err);
                return Err(err);
            }
        }
    }
}

fn upstream_error(context: &str, err: impl std::fmt::Debug) -> ServiceError {
    error!("❌ Document store {} failed: {:?}", context, err);
    ServiceError::InternalServerError
}

#[derive(Serialize)]
struct CreateBody<'a> {
    title: &'a str,
    content: &'a str,
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct CreatedResponse {
    id: String,
    url: String,
}

#[derive(Deserialize)]
struct FetchedResponse {
    title: String,
    content: String,
    modified_at: Option<DateTime<Utc>>,
}

/// REST client for the document store: `POST /documents`,
/// `GET /documents/{id}` and `DELETE /documents/{id}`.
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    retry_delay: Duration,
}

impl HttpDocumentStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| upstream_error("client setup", e))?;
        Ok(HttpDocumentStore {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_delay: RETRY_DELAY,
        })
    }

    fn document_url(&self, external_id: &str) -> String {
        format!("{}/documents/{}", self.base_url, external_id)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn create(
        &self,
        access_token: &str,
        title: &str,
        content: &str,
        kind: ContentKind,
    ) -> Result<StoredDocument, ServiceError> {
        let url = format!("{}/documents", self.base_url);
        let body = CreateBody {
            title,
            content,
            mime_type: kind.mime_type(),
        };
        let (url, body) = (&url, &body);

        let created: CreatedResponse = with_retry("document upload", RETRY_ATTEMPTS, self.retry_delay, || async move {
            self.client
                .post(url)
                .bearer_auth(access_token)
                .json(body)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| upstream_error("upload", e))?
                .json()
                .await
                .map_err(|e| upstream_error("upload response", e))
        })
        .await?;

        info!("📤 Uploaded document to store: {}", created.id);
        Ok(StoredDocument {
            external_id: created.id,
            url: created.url,
        })
    }

    async fn fetch(&self, access_token: &str, external_id: &str) -> Result<FetchedDocument, ServiceError> {
        let url = &self.document_url(external_id);
        let fetched: FetchedResponse = with_retry("document fetch", RETRY_ATTEMPTS, self.retry_delay, || async move {
            self.client
                .get(url)
                .bearer_auth(access_token)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| upstream_error("fetch", e))?
                .json()
                .await
                .map_err(|e| upstream_error("fetch response", e))
        })
        .await?;

        Ok(FetchedDocument {
            title: fetched.title,
            content: fetched.content,
            modified_at: fetched.modified_at,
        })
    }

    async fn delete(&self, access_token: &str, external_id: &str) -> Result<(), ServiceError> {
        let url = &self.document_url(external_id);
        with_retry("document delete", RETRY_ATTEMPTS, self.retry_delay, || async move {
            self.client
                .delete(url)
                .bearer_auth(access_token)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map(|_| ())
                .map_err(|e| upstream_error("delete", e))
        })
        .await
    }
}

pub struct HttpTokenExchange {
    client: reqwest::Client,
    config: DocumentStoreConfig,
    token_url: String,
}

impl HttpTokenExchange {
    pub fn new(config: &DocumentStoreConfig, token_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| upstream_error("client setup", e))?;
        Ok(HttpTokenExchange {
            client,
            config: config.clone(),
            token_url: token_url.to_string(),
        })
    }

    async fn request_grant(&self, form: &[(&str, &str)]) -> Result<TokenGrant, ServiceError> {
        self.client
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream_error("token request", e))?
            .json()
            .await
            .map_err(|e| upstream_error("token response", e))
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ServiceError> {
        self.request_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
            ("redirect_uri", &self.config.redirect_uri),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ServiceError> {
        self.request_grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ])
        .await
    }
}

/// Process-local store used when no document store is configured, and in tests.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<HashMap<String, (String, String)>>,
    pub deletes: AtomicUsize,
    // Makes `delete` fail, as an unreachable store would
    pub fail_deletes: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn contains(&self, external_id: &str) -> bool {
        self.documents
            .lock()
            .map(|docs| docs.contains_key(external_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Simulates an edit made directly in the store
    pub fn rename(&self, external_id: &str, title: &str) {
        if let Ok(mut docs) = self.documents.lock() {
            if let Some(entry) = docs.get_mut(external_id) {
                entry.0 = title.to_string();
            }
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, (String, String)>>, ServiceError> {
        self.documents.lock().map_err(|_| ServiceError::InternalServerError)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(
        &self,
        _access_token: &str,
        title: &str,
        content: &str,
        _kind: ContentKind,
    ) -> Result<StoredDocument, ServiceError> {
        let external_id = Uuid::new_v4().to_string();
        self.lock()?
            .insert(external_id.clone(), (title.to_string(), content.to_string()));
        debug!("📤 Stored document in memory: {}", external_id);
        Ok(StoredDocument {
            url: format!("memory://documents/{}", external_id),
            external_id,
        })
    }

    async fn fetch(&self, _access_token: &str, external_id: &str) -> Result<FetchedDocument, ServiceError> {
        let docs = self.lock()?;
        let (title, content) = docs.get(external_id).ok_or_else(|| {
            error!("❌ Document missing from store: {}", external_id);
            ServiceError::InternalServerError
        })?;
        Ok(FetchedDocument {
            title: title.clone(),
            content: content.clone(),
            modified_at: None,
        })
    }

    async fn delete(&self, _access_token: &str, external_id: &str) -> Result<(), ServiceError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(upstream_error("delete", "store unavailable"));
        }
        self.lock()?.remove(external_id);
        Ok(())
    }
}

/// Issues opaque tokens without contacting any provider.
#[derive(Default)]
pub struct InMemoryTokenExchange {
    pub refreshes: AtomicUsize,
}

#[async_trait]
impl TokenExchange for InMemoryTokenExchange {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ServiceError> {
        if code.trim().is_empty() {
            return Err(ServiceError::BadRequest("Authorization code is required".to_string()));
        }
        Ok(TokenGrant {
            access_token: format!("access-{}", Uuid::new_v4()),
            refresh_token: Some(format!("refresh-{}", Uuid::new_v4())),
            expires_in: 3600,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ServiceError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(TokenGrant {
            access_token: format!("access-{}", Uuid::new_v4()),
            refresh_token: Some(format!("refresh-{}", Uuid::new_v4())),
            expires_in: 3600,
        })
    }
}
