// src/services/document_service.rs

use crate::models::{
    ContentKind, CreateDocumentRequest, Document, DocumentContent, ExternalCredential, ServiceError,
};
use crate::services::document_store::{DocumentStore, StoredDocument, TokenExchange, TokenGrant};
use crate::state::AppState;
use crate::utils::db::Database;
use crate::utils::permissions;
use crate::utils::{credential_storage, document_storage};
use chrono::{Duration, NaiveDate, Utc};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use uuid::Uuid;

// Credentials this close to expiry are refreshed before use
const REFRESH_MARGIN_SECS: i64 = 60;

fn load_document(conn: &Connection, document_id: &str) -> Result<Document, ServiceError> {
    document_storage::find_document_by_id(conn, document_id)?
        .ok_or_else(|| ServiceError::NotFound(format!("Document with ID {} not found", document_id)))
}

fn readable_document(conn: &Connection, requester_id: &str, document_id: &str) -> Result<Document, ServiceError> {
    let document = load_document(conn, document_id)?;
    if !permissions::can_read_document(conn, requester_id, &document)? {
        error!("❌ User: {} cannot read document: {}", requester_id, document_id);
        return Err(ServiceError::Forbidden(
            "You do not have permission to access this document.".to_string(),
        ));
    }
    Ok(document)
}

fn updatable_document(conn: &Connection, requester_id: &str, document_id: &str) -> Result<Document, ServiceError> {
    let document = load_document(conn, document_id)?;
    if !permissions::can_update_document(conn, requester_id, &document)? {
        error!("❌ User: {} cannot modify document: {}", requester_id, document_id);
        return Err(ServiceError::Forbidden(
            "Only the document owner or a team owner can modify this document.".to_string(),
        ));
    }
    Ok(document)
}

fn deletable_document(conn: &Connection, requester_id: &str, document_id: &str) -> Result<Document, ServiceError> {
    let document = load_document(conn, document_id)?;
    if !permissions::can_delete_document(conn, requester_id, &document)? {
        error!("❌ User: {} cannot delete document: {}", requester_id, document_id);
        return Err(ServiceError::Forbidden(
            "Only the document owner or a team owner can delete this document.".to_string(),
        ));
    }
    Ok(document)
}

fn credential_from_grant(user_id: &str, grant: TokenGrant) -> ExternalCredential {
    let now = Utc::now();
    ExternalCredential {
        user_id: user_id.to_string(),
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        expires_at: now + Duration::seconds(grant.expires_in),
        updated_at: now,
    }
}

/// Returns a usable document-store access token for `user_id`, refreshing
/// and persisting the credential when it is about to expire.
pub async fn valid_access_token(
    db: &Database,
    exchange: &dyn TokenExchange,
    user_id: &str,
) -> Result<String, ServiceError> {
    let credential = db
        .with_conn(|conn| credential_storage::find_credential(conn, user_id))?
        .ok_or_else(|| ServiceError::Unauthorized("Document store account is not connected".to_string()))?;

    if !credential.expires_within(Utc::now(), REFRESH_MARGIN_SECS) {
        return Ok(credential.access_token);
    }

    let refresh_token = credential.refresh_token.as_deref().ok_or_else(|| {
        warn!("⚠️ Document store credential for user: {} expired without refresh token", user_id);
        ServiceError::Unauthorized("Document store session expired, please reconnect".to_string())
    })?;

    info!("🔄 Refreshing document store credential for user: {}", user_id);
    let refreshed = credential_from_grant(user_id, exchange.refresh(refresh_token).await?);
    db.with_conn(|conn| credential_storage::save_credential(conn, &refreshed))?;
    Ok(refreshed.access_token)
}

// The body lives in the owner's store account; the requester's own
// credential is only tried when the owner has none
async fn owner_access_token(state: &AppState, document: &Document, requester_id: &str) -> Result<String, ServiceError> {
    let exchange = state.token_exchange.as_ref();
    match valid_access_token(&state.db, exchange, &document.owner).await {
        Err(ServiceError::Unauthorized(reason)) if document.owner != requester_id => {
            debug!("🔍 Owner credential unusable for document {}: {}", document.id, reason);
            valid_access_token(&state.db, exchange, requester_id).await
        }
        outcome => outcome,
    }
}

pub async fn connect_store(state: &AppState, user_id: &str, code: &Option<String>) -> Result<(), ServiceError> {
    let code = code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ServiceError::BadRequest("Authorization code is required".to_string()))?;

    let grant = state.token_exchange.exchange_code(code).await?;
    let credential = credential_from_grant(user_id, grant);
    state
        .db
        .with_conn(|conn| credential_storage::save_credential(conn, &credential))?;

    info!("🔗 Document store connected for user: {}", user_id);
    Ok(())
}

pub fn store_status(db: &Database, user_id: &str) -> Result<Option<ExternalCredential>, ServiceError> {
    db.with_conn(|conn| credential_storage::find_credential(conn, user_id))
}

pub fn disconnect_store(db: &Database, user_id: &str) -> Result<bool, ServiceError> {
    let removed = db.with_conn(|conn| credential_storage::delete_credential(conn, user_id))?;
    info!("🔌 Document store disconnected for user: {}", user_id);
    Ok(removed)
}

pub fn list_documents(db: &Database, user_id: &str) -> Result<Vec<Document>, ServiceError> {
    db.with_conn(|conn| document_storage::list_documents_for_user(conn, user_id))
}

pub fn list_team_documents(db: &Database, requester_id: &str, team_id: &str) -> Result<Vec<Document>, ServiceError> {
    db.transaction(|tx| {
        permissions::validate_team_membership(tx, requester_id, team_id)?;
        document_storage::list_team_documents(tx, team_id)
    })
}

pub fn get_document(db: &Database, requester_id: &str, document_id: &str) -> Result<Document, ServiceError> {
    db.transaction(|tx| readable_document(tx, requester_id, document_id))
}

// Runs `persist`; on failure deletes the already-uploaded artifact
async fn persist_or_compensate<F>(
    store: &dyn DocumentStore,
    access_token: &str,
    stored: &StoredDocument,
    persist: F,
) -> Result<Document, ServiceError>
where
    F: FnOnce() -> Result<Document, ServiceError>,
{
    match persist() {
        Ok(document) => Ok(document),
        Err(err) => {
            error!("❌ Failed to save document metadata, removing upload {}: {}", stored.external_id, err);
            if let Err(cleanup) = store.delete(access_token, &stored.external_id).await {
                warn!("⚠️ Orphaned upload {} could not be removed: {}", stored.external_id, cleanup);
            }
            Err(err)
        }
    }
}

pub async fn create_document(
    state: &AppState,
    requester_id: &str,
    request: &CreateDocumentRequest,
) -> Result<Document, ServiceError> {
    let title = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServiceError::BadRequest("Title is required".to_string()))?;
    let content = request
        .text_content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ServiceError::BadRequest("Content is required".to_string()))?;
    let kind: ContentKind = match request.content_type.as_deref() {
        Some(raw) => raw.parse()?,
        None => ContentKind::default(),
    };
    let team_id = request.team_id.as_deref().map(str::trim).filter(|t| !t.is_empty());

    if let Some(team_id) = team_id {
        state
            .db
            .with_conn(|conn| permissions::require_document_create(conn, requester_id, team_id))?;
    }

    let access_token = valid_access_token(&state.db, state.token_exchange.as_ref(), requester_id).await?;
    let stored = state
        .document_store
        .create(&access_token, title, content, kind)
        .await?;

    let document = persist_or_compensate(state.document_store.as_ref(), &access_token, &stored, || {
        state.db.transaction(|tx| {
            // Membership may have changed while the upload was in flight
            if let Some(team_id) = team_id {
                permissions::require_document_create(tx, requester_id, team_id)?;
            }
            let now = Utc::now();
            let id = Uuid::new_v4().to_string();
            document_storage::insert_document(
                tx,
                &Document {
                    id: id.clone(),
                    title: title.to_string(),
                    file_url: stored.url.clone(),
                    external_id: stored.external_id.clone(),
                    owner: requester_id.to_string(),
                    owner_name: String::new(),
                    team: team_id.map(str::to_string),
                    team_name: None,
                    review_date: request.review_date,
                    review_reminder_sent: false,
                    created_at: now,
                    updated_at: now,
                },
            )?;
            load_document(tx, &id)
        })
    })
    .await?;

    info!("✅ Document created: {} by user: {}", document.id, requester_id);
    Ok(document)
}

/// Deletes the local record, then the stored body on a best-effort basis
/// using the owner's store credential.
pub async fn delete_document(state: &AppState, requester_id: &str, document_id: &str) -> Result<(), ServiceError> {
    let document = state.db.transaction(|tx| {
        let document = deletable_document(tx, requester_id, document_id)?;
        document_storage::delete_document(tx, document_id)?;
        Ok(document)
    })?;
    info!("🗑️ Document deleted: {} by user: {}", document_id, requester_id);

    let outcome = match owner_access_token(state, &document, requester_id).await {
        Ok(token) => state.document_store.delete(&token, &document.external_id).await,
        Err(err) => Err(err),
    };
    if let Err(err) = outcome {
        warn!("⚠️ Could not delete stored body {} of document {}: {}", document.external_id, document_id, err);
    }
    Ok(())
}

pub async fn fetch_document_content(
    state: &AppState,
    requester_id: &str,
    document_id: &str,
) -> Result<DocumentContent, ServiceError> {
    let document = state
        .db
        .transaction(|tx| readable_document(tx, requester_id, document_id))?;

    let access_token = owner_access_token(state, &document, requester_id).await?;
    let fetched = state
        .document_store
        .fetch(&access_token, &document.external_id)
        .await?;

    let updated_at = fetched.modified_at.unwrap_or_else(Utc::now);
    state
        .db
        .with_conn(|conn| document_storage::update_title(conn, document_id, &fetched.title, updated_at))?;

    info!("📄 Fetched content of document: {} for user: {}", document_id, requester_id);
    Ok(DocumentContent {
        title: fetched.title,
        content: fetched.content,
        file_url: document.file_url,
    })
}

pub fn update_review_date(
    db: &Database,
    requester_id: &str,
    document_id: &str,
    review_date: Option<NaiveDate>,
) -> Result<Document, ServiceError> {
    db.transaction(|tx| {
        updatable_document(tx, requester_id, document_id)?;
        document_storage::update_review_date(tx, document_id, review_date, Utc::now())?;
        info!("📅 Review date of document: {} set to {:?}", document_id, review_date);
        load_document(tx, document_id)
    })
}
