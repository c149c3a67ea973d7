use crate::models::ServiceError;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_by: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Admin => "admin",
            TeamRole::Member => "member",
        }
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamRole {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(TeamRole::Owner),
            "admin" => Ok(TeamRole::Admin),
            "member" => Ok(TeamRole::Member),
            _ => Err(ServiceError::BadRequest("Invalid role".to_string())),
        }
    }
}

impl ToSql for TeamRole {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TeamRole {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|_| FromSqlError::InvalidType)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TeamMembership {
    pub user_id: String,
    pub team_id: String,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

// One row of a team's member listing
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MemberSummary {
    pub user_id: String,
    pub user_name: String,
    pub role: TeamRole,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TeamDetail {
    #[serde(flatten)]
    pub team: Team,
    pub members: Vec<MemberSummary>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TeamData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InviteMemberRequest {
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct MemberRoleRequest {
    pub user_id: Option<String>,
    pub role: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct RemoveMemberRequest {
    pub user_id: Option<String>,
}
