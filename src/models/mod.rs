// sopify-service/src/models/mod.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use derive_more::Display;
use log::error;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

pub mod assist;
pub use assist::*;

pub mod document;
pub use document::*;

pub mod task;
pub use task::*;

pub mod team;
pub use team::*;

// User models for authentication
#[derive(Serialize, Deserialize, Debug)]
pub struct UserCredentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    pub re_password: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

// Public view of a user, as listed in team pickers
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub teams: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

// JWT claims structure for authentication
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub email: String,
    pub exp: usize, // Expiration time
    pub iat: usize, // Issued at
    pub jti: String,
    pub token_type: TokenType,
}

// Raw bearer token the request was authenticated with
#[derive(Debug, Clone)]
pub struct AuthenticatedToken(pub String);

// Distinguishes an absent field from an explicit `null` in partial updates
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// Custom error types
#[derive(Debug, Display)]
pub enum ServiceError {
    #[display(fmt = "Internal Server Error")]
    InternalServerError,
    #[display(fmt = "BadRequest: {}", _0)]
    BadRequest(String),
    #[display(fmt = "ValidationError: {}", _0)]
    ValidationError(String),
    #[display(fmt = "Unauthorized: {}", _0)]
    Unauthorized(String),
    #[display(fmt = "NotFound: {}", _0)]
    NotFound(String),
    #[display(fmt = "Forbidden: {}", _0)]
    Forbidden(String),
    #[display(fmt = "Conflict: {}", _0)]
    Conflict(String),
}

impl ServiceError {
    // Machine-readable error kind sent to clients
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InternalServerError => "internal_error",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::ValidationError(_) => "validation_error",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Conflict(_) => "conflict",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ServiceError::InternalServerError => "Internal Server Error",
            ServiceError::BadRequest(msg)
            | ServiceError::ValidationError(msg)
            | ServiceError::Unauthorized(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::Forbidden(msg)
            | ServiceError::Conflict(msg) => msg,
        }
    }
}

impl std::error::Error for ServiceError {}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::BadRequest(_) | ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": self.message(),
        }))
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &err {
            if matches!(
                failure.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ) {
                error!("❌ Unique constraint violated: {:?}", err);
                return ServiceError::Conflict("Resource already exists".to_string());
            }
        }
        error!("❌ Database error: {:?}", err);
        ServiceError::InternalServerError
    }
}
