use crate::models::{MemberSummary, ServiceError, Team, TeamMembership, TeamRole, UserSummary};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

fn team_from_row(row: &Row) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_by: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert_team(conn: &Connection, team: &Team) -> Result<(), ServiceError> {
    conn.execute(
        "INSERT INTO teams (id, name, description, created_by, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![team.id, team.name, team.description, team.created_by, team.created_at],
    )?;
    Ok(())
}

pub fn find_team_by_id(conn: &Connection, team_id: &str) -> Result<Option<Team>, ServiceError> {
    Ok(conn
        .query_row(
            "SELECT id, name, description, created_by, created_at FROM teams WHERE id = ?1",
            params![team_id],
            team_from_row,
        )
        .optional()?)
}

pub fn team_exists(conn: &Connection, team_id: &str) -> Result<bool, ServiceError> {
    Ok(find_team_by_id(conn, team_id)?.is_some())
}

pub fn update_team(conn: &Connection, team: &Team) -> Result<(), ServiceError> {
    conn.execute(
        "UPDATE teams SET name = ?2, description = ?3 WHERE id = ?1",
        params![team.id, team.name, team.description],
    )?;
    Ok(())
}

// Memberships, tasks and documents go with the team via ON DELETE CASCADE
pub fn delete_team(conn: &Connection, team_id: &str) -> Result<bool, ServiceError> {
    Ok(conn.execute("DELETE FROM teams WHERE id = ?1", params![team_id])? > 0)
}

pub fn get_teams_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Team>, ServiceError> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.description, t.created_by, t.created_at
         FROM teams t
         JOIN team_memberships m ON m.team_id = t.id
         WHERE m.user_id = ?1
         ORDER BY t.created_at, t.id",
    )?;
    let teams = stmt
        .query_map(params![user_id], team_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(teams)
}

pub fn get_team_ids_for_user(conn: &Connection, user_id: &str) -> Result<Vec<String>, ServiceError> {
    let mut stmt = conn.prepare("SELECT team_id FROM team_memberships WHERE user_id = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

pub fn add_team_member(
    conn: &Connection,
    user_id: &str,
    team_id: &str,
    role: TeamRole,
) -> Result<TeamMembership, ServiceError> {
    let membership = TeamMembership {
        user_id: user_id.to_string(),
        team_id: team_id.to_string(),
        role,
        joined_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO team_memberships (user_id, team_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
        params![membership.user_id, membership.team_id, membership.role, membership.joined_at],
    )?;
    Ok(membership)
}

pub fn find_member_role(conn: &Connection, user_id: &str, team_id: &str) -> Result<Option<TeamRole>, ServiceError> {
    Ok(conn
        .query_row(
            "SELECT role FROM team_memberships WHERE user_id = ?1 AND team_id = ?2",
            params![user_id, team_id],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn update_member_role(conn: &Connection, user_id: &str, team_id: &str, role: TeamRole) -> Result<bool, ServiceError> {
    Ok(conn.execute(
        "UPDATE team_memberships SET role = ?3 WHERE user_id = ?1 AND team_id = ?2",
        params![user_id, team_id, role],
    )? > 0)
}

pub fn remove_team_member(conn: &Connection, user_id: &str, team_id: &str) -> Result<bool, ServiceError> {
    Ok(conn.execute(
        "DELETE FROM team_memberships WHERE user_id = ?1 AND team_id = ?2",
        params![user_id, team_id],
    )? > 0)
}

// Members in the order they joined
pub fn get_team_members(conn: &Connection, team_id: &str) -> Result<Vec<MemberSummary>, ServiceError> {
    let mut stmt = conn.prepare(
        "SELECT m.user_id, u.name, m.role
         FROM team_memberships m
         JOIN users u ON u.id = m.user_id
         WHERE m.team_id = ?1
         ORDER BY m.id",
    )?;
    let members = stmt
        .query_map(params![team_id], |row| {
            Ok(MemberSummary {
                user_id: row.get(0)?,
                user_name: row.get(1)?,
                role: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(members)
}

pub fn get_team_users(conn: &Connection, team_id: &str) -> Result<Vec<UserSummary>, ServiceError> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.email, u.name
         FROM team_memberships m
         JOIN users u ON u.id = m.user_id
         WHERE m.team_id = ?1
         ORDER BY m.id",
    )?;
    let users = stmt
        .query_map(params![team_id], |row| {
            Ok(UserSummary {
                id: row.get(0)?,
                email: row.get(1)?,
                name: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

// Emails of members holding one of `roles`, excluding `exclude_user`
pub fn get_member_emails(
    conn: &Connection,
    team_id: &str,
    roles: &[TeamRole],
    exclude_user: &str,
) -> Result<Vec<String>, ServiceError> {
    let mut stmt = conn.prepare(
        "SELECT u.email, m.role
         FROM team_memberships m
         JOIN users u ON u.id = m.user_id
         WHERE m.team_id = ?1 AND m.user_id != ?2
         ORDER BY m.id",
    )?;
    let rows = stmt
        .query_map(params![team_id, exclude_user], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, TeamRole>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows
        .into_iter()
        .filter(|(_, role)| roles.contains(role))
        .map(|(email, _)| email)
        .collect())
}
