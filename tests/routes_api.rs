#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use chrono::{DateTime, TimeZone, Utc};
use reset_bump::auth::{create_jwt, Role};
use reset_bump::models::{Post, Thread};
use reset_bump::repo::inmem::InMemRepo;
use reset_bump::repo::{AuditLogRepo, ThreadRepo};
use reset_bump::{config, AppState};
use serial_test::serial;
use std::sync::Arc;

fn setup_env() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

fn staff_token() -> String { create_jwt(1, "moderator", vec![Role::Moderator]).unwrap() }
fn user_token() -> String { create_jwt(2, "user", vec![Role::User]).unwrap() }

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap() }
fn t1() -> DateTime<Utc> { Utc.with_ymd_and_hms(2023, 11, 5, 9, 15, 0).unwrap() }

fn seeded() -> InMemRepo {
    let repo = InMemRepo::new();
    repo.insert_thread(Thread {
        id: 5,
        slug: "demo".into(),
        title: "Demo thread".into(),
        last_activity_at: t0(),
        last_actor_id: 10,
        last_posted_at: t0(),
        created_at: t1(),
    }).unwrap();
    repo.insert_post(Post { id: 42, thread_id: 5, author_id: 11, post_number: 3, created_at: t1() }).unwrap();
    repo.insert_post(Post { id: 50, thread_id: 99, author_id: 11, post_number: 1, created_at: t1() }).unwrap();
    repo
}

macro_rules! app {
    ($repo:expr, $enabled:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(Arc::new($repo.clone()), $enabled)))
                .configure(config),
        )
        .await
    };
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

fn form_post(token: &str, body: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/reset_bump")
        .insert_header(bearer(token))
        .insert_header(("Content-Type", "application/x-www-form-urlencoded"))
        .set_payload(body.to_string())
}

async fn error_message(resp: actix_web::dev::ServiceResponse) -> String {
    let v: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    v["error"].as_str().unwrap().to_string()
}

#[actix_web::test]
#[serial]
async fn form_request_resets_bump() {
    setup_env();
    let repo = seeded();
    let app = app!(repo, true);

    let resp = test::call_service(&app, form_post(&staff_token(), "post_id=42").to_request()).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(body, serde_json::json!({"success": "OK"}));

    let th = repo.get_thread(5).await.unwrap();
    assert_eq!(th.last_activity_at, t1());
    assert_eq!(th.last_actor_id, 11);

    let log = repo.list_audit_entries(10).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].acting_user_id, 1);
    assert_eq!(log[0].context, "/t/demo/5/3");
}

#[actix_web::test]
#[serial]
async fn json_query_and_legacy_names_are_accepted() {
    setup_env();
    let repo = seeded();
    let app = app!(repo, true);

    let req = test::TestRequest::post()
        .uri("/reset_bump/")
        .insert_header(bearer(&staff_token()))
        .set_json(serde_json::json!({"post_id": 42}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::post()
        .uri("/reset_bump?post_id=42")
        .insert_header(bearer(&staff_token()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let resp = test::call_service(&app, form_post(&staff_token(), "postId=42").to_request()).await;
    assert_eq!(resp.status(), 200);

    assert_eq!(repo.list_audit_entries(10).await.unwrap().len(), 3);
}

#[actix_web::test]
#[serial]
async fn guard_rejects_anonymous_and_non_staff() {
    setup_env();
    let repo = seeded();
    let app = app!(repo, true);

    let req = test::TestRequest::post().uri("/reset_bump").set_payload("post_id=42").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let resp = test::call_service(&app, form_post("garbage", "post_id=42").to_request()).await;
    assert_eq!(resp.status(), 401);

    let resp = test::call_service(&app, form_post(&user_token(), "post_id=42").to_request()).await;
    assert_eq!(resp.status(), 403);
    assert_eq!(error_message(resp).await, "staff only");

    let req = test::TestRequest::get().uri("/reset_bump/logs").insert_header(bearer(&user_token())).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    assert_eq!(repo.get_thread(5).await.unwrap().last_activity_at, t0());
    assert!(repo.list_audit_entries(10).await.unwrap().is_empty());
}

#[actix_web::test]
#[serial]
async fn validation_errors_map_to_statuses() {
    setup_env();
    let repo = seeded();
    let app = app!(repo, true);

    let req = test::TestRequest::post().uri("/reset_bump").insert_header(bearer(&staff_token())).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(error_message(resp).await.contains("post_id"));

    for body in ["post_id=", "post_id=abc", "post_id=0", "post_id=-3"] {
        let resp = test::call_service(&app, form_post(&staff_token(), body).to_request()).await;
        assert_eq!(resp.status(), 400, "{body}");
    }

    let resp = test::call_service(&app, form_post(&staff_token(), "post_id=777").to_request()).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(error_message(resp).await, "post 777 not found");

    let resp = test::call_service(&app, form_post(&staff_token(), "post_id=50").to_request()).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(error_message(resp).await, "thread 99 for post 50 not found");

    assert_eq!(repo.get_thread(5).await.unwrap().last_activity_at, t0());
    assert!(repo.list_audit_entries(10).await.unwrap().is_empty());
}

#[actix_web::test]
#[serial]
async fn disabled_endpoint_answers_not_found() {
    setup_env();
    let repo = seeded();
    let app = app!(repo, false);

    let resp = test::call_service(&app, form_post(&staff_token(), "post_id=42").to_request()).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(repo.get_thread(5).await.unwrap().last_activity_at, t0());
}

#[actix_web::test]
#[serial]
async fn logs_list_recent_resets() {
    setup_env();
    let repo = seeded();
    let app = app!(repo, true);

    for _ in 0..3 {
        let resp = test::call_service(&app, form_post(&staff_token(), "post_id=42").to_request()).await;
        assert_eq!(resp.status(), 200);
    }

    let req = test::TestRequest::get()
        .uri("/reset_bump/logs?limit=2")
        .insert_header(bearer(&staff_token()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let entries: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "reset_post_bump");
    assert_eq!(entries[0]["id"], 3);
    assert_eq!(entries[0]["context"], "/t/demo/5/3");

    // limit is clamped to at least one
    let req = test::TestRequest::get()
        .uri("/reset_bump/logs?limit=0")
        .insert_header(bearer(&staff_token()))
        .to_request();
    let entries: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(entries.as_array().unwrap().len(), 1);
}

fn json_post(token: &str, uri: &str, body: serde_json::Value) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .insert_header(bearer(token))
        .set_json(body)
}

#[actix_web::test]
#[serial]
async fn non_integer_json_ids_are_invalid() {
    setup_env();
    let repo = seeded();
    let app = app!(repo, true);

    for (value, shown) in [
        (serde_json::json!(42.0), "42.0"),
        (serde_json::json!(true), "true"),
        (serde_json::json!([42]), "[42]"),
        (serde_json::json!(18446744073709551615u64), "18446744073709551615"),
    ] {
        let req = json_post(&staff_token(), "/reset_bump", serde_json::json!({ "post_id": value }));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), 400, "{shown}");
        assert_eq!(
            error_message(resp).await,
            format!("post_id must be a positive integer, got '{shown}'")
        );
    }

    let req = json_post(&staff_token(), "/reset_bump", serde_json::json!({ "post_id": null }));
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(error_message(resp).await, "param is missing or the value is empty: post_id");

    assert_eq!(repo.get_thread(5).await.unwrap().last_activity_at, t0());
    assert!(repo.list_audit_entries(10).await.unwrap().is_empty());
}

#[actix_web::test]
#[serial]
async fn post_id_takes_precedence_over_legacy_name() {
    setup_env();
    let repo = seeded();
    let app = app!(repo, true);

    let req = json_post(&staff_token(), "/reset_bump", serde_json::json!({ "post_id": "42", "postId": "7" }));
    assert_eq!(test::call_service(&app, req.to_request()).await.status(), 200);

    let resp = test::call_service(&app, form_post(&staff_token(), "postId=777&post_id=42").to_request()).await;
    assert_eq!(resp.status(), 200);

    let log = repo.list_audit_entries(10).await.unwrap();
    assert_eq!(log.iter().map(|e| e.post_id).collect::<Vec<_>>(), vec![42, 42]);
}

#[actix_web::test]
#[serial]
async fn malformed_body_is_rejected() {
    setup_env();
    let repo = seeded();
    let app = app!(repo, true);

    let req = test::TestRequest::post()
        .uri("/reset_bump?post_id=42")
        .insert_header(bearer(&staff_token()))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{bad");
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(error_message(resp).await, "request body is not a valid form or JSON document");

    assert_eq!(repo.get_thread(5).await.unwrap().last_activity_at, t0());
    assert!(repo.list_audit_entries(10).await.unwrap().is_empty());
}

#[actix_web::test]
#[serial]
async fn query_string_wins_over_body() {
    setup_env();
    let repo = seeded();
    let app = app!(repo, true);

    let req = test::TestRequest::post()
        .uri("/reset_bump?post_id=42")
        .insert_header(bearer(&staff_token()))
        .insert_header(("Content-Type", "application/x-www-form-urlencoded"))
        .set_payload("post_id=777");
    assert_eq!(test::call_service(&app, req.to_request()).await.status(), 200);

    // a body value still fills in a name the query string leaves out
    let req = json_post(&staff_token(), "/reset_bump?postId=777", serde_json::json!({ "post_id": 42 }));
    assert_eq!(test::call_service(&app, req.to_request()).await.status(), 200);

    let log = repo.list_audit_entries(10).await.unwrap();
    assert_eq!(log.iter().map(|e| e.post_id).collect::<Vec<_>>(), vec![42, 42]);
}
