use crate::models::ServiceError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub file_url: String,
    pub external_id: String,
    pub owner: String,
    pub owner_name: String,
    pub team: Option<String>,
    pub team_name: Option<String>,
    pub review_date: Option<NaiveDate>,
    pub review_reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_personal(&self) -> bool {
        self.team.is_none()
    }
}

// How the body handed to the document store should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Html,
    #[default]
    Text,
}

impl ContentKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContentKind::Html => "text/html",
            ContentKind::Text => "text/plain",
        }
    }
}

impl FromStr for ContentKind {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(ContentKind::Html),
            "text" | "plain" => Ok(ContentKind::Text),
            other => Err(ServiceError::BadRequest(format!(
                "Invalid content type: {}. Must be 'html' or 'text'",
                other
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CreateDocumentRequest {
    pub title: Option<String>,
    pub team_id: Option<String>,
    pub text_content: Option<String>,
    pub content_type: Option<String>,
    pub review_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ReviewDateRequest {
    pub review_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentContent {
    pub title: String,
    pub content: String,
    pub file_url: String,
}

// Persisted document-store grant for one user
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExternalCredential {
    pub user_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExternalCredential {
    pub fn expires_within(&self, now: DateTime<Utc>, seconds: i64) -> bool {
        self.expires_at <= now + chrono::Duration::seconds(seconds)
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ConnectStoreRequest {
    pub code: Option<String>,
}
