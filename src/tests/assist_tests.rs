use super::{bearer, test_context};
use crate::test_app;
use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};

#[actix_rt::test]
async fn test_assist_endpoints() {
    let ctx = test_context();
    let app = test_app!(ctx);
    let (_, token) = ctx.create_user("alice");

    let req = test::TestRequest::post()
        .uri("/assist/generate")
        .insert_header(bearer(&token))
        .set_json(json!({ "prompt": "Handling chemical spills" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["sop"], "[1000] Handling chemical spills");

    let req = test::TestRequest::post()
        .uri("/assist/summarise")
        .insert_header(bearer(&token))
        .set_json(json!({ "content": "A long SOP" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["summary"], "[300] A long SOP");

    let req = test::TestRequest::post()
        .uri("/assist/improve")
        .insert_header(bearer(&token))
        .set_json(json!({ "content": "do the thing" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["improved"], "[1500] Please improve this SOP:\n\ndo the thing");
}

#[actix_rt::test]
async fn test_assist_requires_input() {
    let ctx = test_context();
    let app = test_app!(ctx);
    let (_, token) = ctx.create_user("alice");

    let req = test::TestRequest::post()
        .uri("/assist/generate")
        .insert_header(bearer(&token))
        .set_json(json!({ "prompt": "   " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Prompt is required.");

    let req = test::TestRequest::post()
        .uri("/assist/summarise")
        .insert_header(bearer(&token))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "No content provided.");
}
