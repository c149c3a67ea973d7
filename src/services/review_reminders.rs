// src/services/review_reminders.rs

use crate::models::{Document, ServiceError, TeamRole};
use crate::services::notifier::Notifier;
use crate::state::AppState;
use crate::utils::db::Database;
use crate::utils::task_storage::{self, DueTask};
use crate::utils::{document_storage, team_storage, user_storage};
use actix_web::rt;
use actix_web::web;
use chrono::{NaiveDate, Utc};
use log::{error, info, warn};
use std::time::Duration;

pub const REVIEW_WINDOW_DAYS: i64 = 14;
pub const TASK_DUE_WINDOW_DAYS: i64 = 3;

const TEAM_RECIPIENT_ROLES: &[TeamRole] = &[TeamRole::Member, TeamRole::Owner];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub reminded: usize,
    pub failed: usize,
}

struct Recipients {
    owner: Option<String>,
    team: Vec<String>,
}

fn recipients_for(db: &Database, document: &Document) -> Result<Recipients, ServiceError> {
    db.with_conn(|conn| {
        let owner = user_storage::find_user_by_id(conn, &document.owner)?.map(|u| u.email);
        let team = match &document.team {
            Some(team_id) => team_storage::get_member_emails(conn, team_id, TEAM_RECIPIENT_ROLES, &document.owner)?,
            None => Vec::new(),
        };
        Ok(Recipients { owner, team })
    })
}

async fn send_reminders(notifier: &dyn Notifier, document: &Document, recipients: &Recipients) -> Result<(), ServiceError> {
    let review_date = document
        .review_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    if let Some(owner) = &recipients.owner {
        let body = format!(
            "Hello {},\n\nYour SOP \"{}\" is due for review on {}.\n\nOpen it here: {}",
            document.owner_name, document.title, review_date, document.file_url
        );
        notifier.notify(&[owner.clone()], "SOP Review Reminder", &body).await?;
    }

    if !recipients.team.is_empty() {
        let body = format!(
            "The team SOP \"{}\" owned by {} is due for review on {}.\n\nOpen it here: {}",
            document.title, document.owner_name, review_date, document.file_url
        );
        notifier
            .notify(&recipients.team, "Team SOP Review Reminder", &body)
            .await?;
    }

    Ok(())
}

/// Notifies owners (and teams) of documents due for review within
/// [`REVIEW_WINDOW_DAYS`] of `today`. Each document is claimed before sending,
/// so a document is reminded once even when sweeps overlap; a failed send
/// releases the claim for the next sweep.
pub async fn send_review_reminders(
    db: &Database,
    notifier: &dyn Notifier,
    today: NaiveDate,
) -> Result<SweepReport, ServiceError> {
    let due = db.with_conn(|conn| document_storage::documents_due_for_review(conn, today, REVIEW_WINDOW_DAYS))?;
    info!("🔍 {} document(s) due for review reminders", due.len());

    let mut report = SweepReport::default();
    for document in due {
        if !db.transaction(|tx| document_storage::claim_review_reminder(tx, &document.id))? {
            continue;
        }

        let sent = match recipients_for(db, &document) {
            Ok(recipients) => send_reminders(notifier, &document, &recipients).await,
            Err(err) => Err(err),
        };

        match sent {
            Ok(()) => {
                info!("📧 Review reminder sent for document: {}", document.id);
                report.reminded += 1;
            }
            Err(err) => {
                error!("❌ Review reminder for document: {} failed: {}", document.id, err);
                db.with_conn(|conn| document_storage::release_review_reminder(conn, &document.id))?;
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn send_due_reminder(notifier: &dyn Notifier, task: &DueTask) -> Result<(), ServiceError> {
    let body = format!(
        "Hello {},\n\nYour task \"{}\" is due on {}. Login to complete this task.",
        task.assignee_name,
        task.description,
        task.due_date.format("%Y-%m-%d")
    );
    notifier
        .notify(&[task.assignee_email.clone()], "Task Due Soon", &body)
        .await
}

/// Notifies assignees of open tasks due within [`TASK_DUE_WINDOW_DAYS`] of
/// `today` (inclusive). Claims and releases work as for review reminders.
pub async fn send_task_due_reminders(
    db: &Database,
    notifier: &dyn Notifier,
    today: NaiveDate,
) -> Result<SweepReport, ServiceError> {
    let due = db.with_conn(|conn| task_storage::tasks_due_soon(conn, today, TASK_DUE_WINDOW_DAYS))?;
    info!("🔍 {} task(s) due soon", due.len());

    let mut report = SweepReport::default();
    for task in due {
        if !db.transaction(|tx| task_storage::claim_due_reminder(tx, &task.id))? {
            continue;
        }

        match send_due_reminder(notifier, &task).await {
            Ok(()) => {
                info!("📧 Due reminder sent for task: {}", task.id);
                report.reminded += 1;
            }
            Err(err) => {
                error!("❌ Due reminder for task: {} failed: {}", task.id, err);
                db.with_conn(|conn| task_storage::release_due_reminder(conn, &task.id))?;
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

fn log_sweep(label: &str, outcome: Result<SweepReport, ServiceError>) {
    match outcome {
        Ok(report) if report.reminded + report.failed > 0 => {
            info!("✅ {} sweep: {} reminded, {} failed", label, report.reminded, report.failed)
        }
        Ok(_) => {}
        Err(err) => warn!("⚠️ {} sweep aborted: {}", label, err),
    }
}

// Runs both sweeps on a fixed interval for the lifetime of the server
pub fn spawn_reminder_scheduler(state: web::Data<AppState>) {
    let period = Duration::from_secs(state.config.review_sweep_interval_secs.max(1));
    rt::spawn(async move {
        let mut ticker = rt::time::interval(period);
        loop {
            ticker.tick().await;
            let today = Utc::now().date_naive();
            log_sweep("Review", send_review_reminders(&state.db, state.notifier.as_ref(), today).await);
            log_sweep("Task due", send_task_due_reminders(&state.db, state.notifier.as_ref(), today).await);
        }
    });
}
