use super::{bearer, test_context, TestContext};
use crate::models::TeamRole;
use crate::services::review_reminders::{self, SweepReport};
use crate::test_app;
use actix_web::http::StatusCode;
use actix_web::test;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;

struct Fixture {
    team_id: String,
    alice: String,
    bob: String,
    carol: String,
}

// alice owns the team, bob is a member, carol is an outsider
fn fixture(ctx: &TestContext) -> Fixture {
    let (alice_id, alice) = ctx.create_user("alice");
    let (bob_id, bob) = ctx.create_user("bob");
    let (_, carol) = ctx.create_user("carol");
    let team_id = ctx.create_team(&alice_id, "Operations");
    ctx.add_member(&bob_id, &team_id, TeamRole::Member);
    Fixture {
        team_id,
        alice,
        bob,
        carol,
    }
}

fn task_body(description: &str, team: Option<&str>, assignee: Option<&str>, due: &str) -> Value {
    json!({
        "description": description,
        "team": team,
        "assigned_to": assignee,
        "due_date": due
    })
}

fn descriptions(tasks: &Value) -> Vec<String> {
    tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["description"].as_str().unwrap().to_string())
        .collect()
}

#[actix_rt::test]
async fn test_team_task_assignment_rules() {
    let ctx = test_context();
    let app = test_app!(ctx);
    let f = fixture(&ctx);

    // Owner assigns to a member
    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(&f.alice))
        .set_json(task_body("Calibrate scales", Some(&f.team_id), Some("bob-id"), "2030-01-10"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let assigned_to_bob: Value = test::read_body_json(resp).await;
    assert_eq!(assigned_to_bob["status"], "not_started");
    assert_eq!(assigned_to_bob["assigned_to_name"], "bob");
    assert_eq!(assigned_to_bob["team_name"], "Operations");

    // Member may not assign to someone else
    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(&f.bob))
        .set_json(task_body("Review audit", Some(&f.team_id), Some("alice-id"), "2030-01-11"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Only team owners can assign tasks to other members.");

    // Member may assign to themself
    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(&f.bob))
        .set_json(task_body("Clean bench", Some(&f.team_id), Some("bob-id"), "2030-01-12"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    // Outsider cannot create in the team
    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(&f.carol))
        .set_json(task_body("Intrude", Some(&f.team_id), None, "2030-01-12"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "You are not a member of the selected team.");

    // Assignee outside the team
    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(&f.alice))
        .set_json(task_body("Wrong person", Some(&f.team_id), Some("carol-id"), "2030-01-12"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_task_write_permissions() {
    let ctx = test_context();
    let app = test_app!(ctx);
    let f = fixture(&ctx);

    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(&f.alice))
        .set_json(task_body("Owner's task", Some(&f.team_id), Some("alice-id"), "2030-02-01"))
        .to_request();
    let alices: Value = test::call_and_read_body_json(&app, req).await;
    let alices_id = alices["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(&f.alice))
        .set_json(task_body("Bob's task", Some(&f.team_id), Some("bob-id"), "2030-02-02"))
        .to_request();
    let bobs: Value = test::call_and_read_body_json(&app, req).await;
    let bobs_id = bobs["id"].as_str().unwrap();

    // A member can read but not delete a teammate's task
    let req = test::TestRequest::get()
        .uri(&format!("/tasks/{}", alices_id))
        .insert_header(bearer(&f.bob))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&format!("/tasks/{}", alices_id))
        .insert_header(bearer(&f.bob))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    // The assignee updates their own task
    let req = test::TestRequest::patch()
        .uri(&format!("/tasks/{}", bobs_id))
        .insert_header(bearer(&f.bob))
        .set_json(json!({ "status": "in_progress" }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["status"], "in_progress");
    assert_eq!(updated["description"], "Bob's task");

    // Outsiders see nothing
    let req = test::TestRequest::get()
        .uri(&format!("/tasks/{}", bobs_id))
        .insert_header(bearer(&f.carol))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    // The team owner deletes
    let req = test::TestRequest::delete()
        .uri(&format!("/tasks/{}", alices_id))
        .insert_header(bearer(&f.alice))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/tasks/{}", alices_id))
        .insert_header(bearer(&f.alice))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_invalid_status_is_rejected() {
    let ctx = test_context();
    let app = test_app!(ctx);
    let f = fixture(&ctx);

    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(&f.alice))
        .set_json(json!({ "description": "Odd", "due_date": "2030-01-01", "status": "done" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(&f.alice))
        .set_json(json!({ "description": "No date" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_list_filters() {
    let ctx = test_context();
    let app = test_app!(ctx);
    let f = fixture(&ctx);

    for body in [
        task_body("January", Some(&f.team_id), Some("bob-id"), "2030-01-15"),
        task_body("February", Some(&f.team_id), None, "2030-02-15"),
        task_body("March", None, None, "2030-03-15"),
    ] {
        let req = test::TestRequest::post()
            .uri("/tasks")
            .insert_header(bearer(&f.alice))
            .set_json(body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let list = |query: &str, token: &str| {
        test::TestRequest::get()
            .uri(&format!("/tasks{}", query))
            .insert_header(bearer(token))
            .to_request()
    };

    let all: Value = test::call_and_read_body_json(&app, list("", &f.alice)).await;
    assert_eq!(descriptions(&all), vec!["January", "February", "March"]);

    // alice's personal task is hidden from bob
    let bobs: Value = test::call_and_read_body_json(&app, list("", &f.bob)).await;
    assert_eq!(descriptions(&bobs), vec!["January", "February"]);

    let unassigned: Value = test::call_and_read_body_json(&app, list("?assigned_to=unassigned", &f.alice)).await;
    assert_eq!(descriptions(&unassigned), vec!["February"]);

    let window: Value = test::call_and_read_body_json(
        &app,
        list("?due_after=2030-02-01&due_before=2030-03-15", &f.alice),
    )
    .await;
    assert_eq!(descriptions(&window), vec!["February", "March"]);

    let team_only: Value =
        test::call_and_read_body_json(&app, list(&format!("?team={}", f.team_id), &f.alice)).await;
    assert_eq!(descriptions(&team_only), vec!["January", "February"]);

    let carols: Value = test::call_and_read_body_json(&app, list("", &f.carol)).await;
    assert_eq!(carols, json!([]));

    let resp = test::call_service(&app, list("?due_before=next-week", &f.alice)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_user_and_team_buckets() {
    let ctx = test_context();
    let app = test_app!(ctx);
    let f = fixture(&ctx);

    for body in [
        task_body("For bob", Some(&f.team_id), Some("bob-id"), "2030-01-01"),
        task_body("For alice", Some(&f.team_id), Some("alice-id"), "2030-01-02"),
    ] {
        let req = test::TestRequest::post()
            .uri("/tasks")
            .insert_header(bearer(&f.alice))
            .set_json(body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri("/tasks/user-and-team-tasks")
        .insert_header(bearer(&f.bob))
        .to_request();
    let buckets: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(descriptions(&buckets["user_tasks"]), vec!["For bob"]);
    assert_eq!(descriptions(&buckets["team_tasks"]), vec!["For alice"]);

    let req = test::TestRequest::get()
        .uri(&format!("/tasks/user-and-team-tasks?team={}", f.team_id))
        .insert_header(bearer(&f.bob))
        .to_request();
    let buckets: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(buckets["user_tasks"], json!([]));
    assert_eq!(descriptions(&buckets["team_tasks"]), vec!["For alice"]);
}

fn day(today: NaiveDate, offset: i64) -> String {
    (today + Duration::days(offset)).format("%Y-%m-%d").to_string()
}

#[actix_rt::test]
async fn test_due_reminders_cover_open_tasks_in_window_once() {
    let ctx = test_context();
    let app = test_app!(ctx);
    let f = fixture(&ctx);
    let today = Utc::now().date_naive();

    let mut ids = Vec::new();
    for body in [
        task_body("Edge of window", Some(&f.team_id), Some("bob-id"), &day(today, 3)),
        task_body("Beyond window", Some(&f.team_id), Some("bob-id"), &day(today, 4)),
        task_body("Due today", None, None, &day(today, 0)),
        task_body("Overdue", Some(&f.team_id), Some("bob-id"), &day(today, -1)),
        task_body("Nobody's", Some(&f.team_id), None, &day(today, 1)),
    ] {
        let req = test::TestRequest::post()
            .uri("/tasks")
            .insert_header(bearer(&f.alice))
            .set_json(body)
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        ids.push(task["id"].as_str().unwrap().to_string());
    }

    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(&f.alice))
        .set_json(json!({ "description": "Finished", "assigned_to": "bob-id", "team": f.team_id,
                          "due_date": day(today, 1), "status": "complete" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let report = review_reminders::send_task_due_reminders(&ctx.state.db, ctx.notifier.as_ref(), today)
        .await
        .unwrap();
    assert_eq!(report, SweepReport { reminded: 2, failed: 0 });

    let sent = ctx.notifier.messages();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.subject == "Task Due Soon"));
    assert_eq!(sent[0].recipients, vec!["alice@example.com".to_string()]);
    assert!(sent[0].body.contains("\"Due today\""));
    assert_eq!(sent[1].recipients, vec!["bob@example.com".to_string()]);
    assert!(sent[1].body.contains(&format!("is due on {}", day(today, 3))));

    let report = review_reminders::send_task_due_reminders(&ctx.state.db, ctx.notifier.as_ref(), today)
        .await
        .unwrap();
    assert_eq!(report, SweepReport::default());

    // A status change keeps the reminder spent, a new due date re-arms it
    let req = test::TestRequest::patch()
        .uri(&format!("/tasks/{}", ids[0]))
        .insert_header(bearer(&f.bob))
        .set_json(json!({ "status": "in_progress" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let report = review_reminders::send_task_due_reminders(&ctx.state.db, ctx.notifier.as_ref(), today)
        .await
        .unwrap();
    assert_eq!(report.reminded, 0);

    let req = test::TestRequest::patch()
        .uri(&format!("/tasks/{}", ids[0]))
        .insert_header(bearer(&f.bob))
        .set_json(json!({ "due_date": day(today, 2) }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let report = review_reminders::send_task_due_reminders(&ctx.state.db, ctx.notifier.as_ref(), today)
        .await
        .unwrap();
    assert_eq!(report, SweepReport { reminded: 1, failed: 0 });
}

#[actix_rt::test]
async fn test_failed_due_reminder_is_retried_next_sweep() {
    let ctx = test_context();
    let app = test_app!(ctx);
    let f = fixture(&ctx);
    let today = Utc::now().date_naive();

    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(&f.bob))
        .set_json(task_body("Restock gloves", None, None, &day(today, 1)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    ctx.notifier.fail.store(true, Ordering::SeqCst);
    let report = review_reminders::send_task_due_reminders(&ctx.state.db, ctx.notifier.as_ref(), today)
        .await
        .unwrap();
    assert_eq!(report, SweepReport { reminded: 0, failed: 1 });

    ctx.notifier.fail.store(false, Ordering::SeqCst);
    let report = review_reminders::send_task_due_reminders(&ctx.state.db, ctx.notifier.as_ref(), today)
        .await
        .unwrap();
    assert_eq!(report, SweepReport { reminded: 1, failed: 0 });
    assert_eq!(ctx.notifier.messages()[0].recipients, vec!["bob@example.com".to_string()]);
}
