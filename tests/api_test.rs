mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use taskboard::api::router;
use taskboard::notify::NoopNotifier;
use taskboard::state::AppState;
use tower::ServiceExt;

async fn app() -> Router {
    let db = common::test_pool().await;
    router(AppState {
        db,
        notifier: Arc::new(NoopNotifier),
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", "alice");
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn create_weekly(app: &Router) -> String {
    let (status, task) = send(
        app,
        "POST",
        "/tasks",
        Some(json!({
            "title": "Team sync",
            "dueDate": "2024-03-10",
            "startDate": "2024-03-03",
            "recurrence": { "pattern": "weekly", "interval": 1 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    task["id"].as_str().expect("id").to_string()
}

#[tokio::test]
async fn health_is_ok() {
    let app = app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn requests_without_identity_are_rejected() {
    let app = app().await;
    let response = app
        .oneshot(Request::builder().uri("/tasks").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn blank_title_is_a_bad_request() {
    let app = app().await;
    let (status, body) = send(&app, "POST", "/tasks", Some(json!({ "title": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "title must not be empty");
}

#[tokio::test]
async fn calendar_merges_originals_and_instances() {
    let app = app().await;
    let id = create_weekly(&app).await;
    send(
        &app,
        "POST",
        "/tasks",
        Some(json!({ "title": "Dentist", "dueDate": "2024-03-12" })),
    )
    .await;

    let (status, view) = send(&app, "GET", "/calendar?start=2024-03-01&end=2024-03-17", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["total"], 4);
    assert_eq!(view["recurringInstanceCount"], 2);
    assert_eq!(view["originalCount"], 2);

    let entries = view["entries"].as_array().expect("entries");
    let dates: Vec<&str> = entries.iter().map(|e| e["date"].as_str().expect("date")).collect();
    assert_eq!(dates, vec!["2024-03-03", "2024-03-10", "2024-03-12", "2024-03-17"]);
    assert_eq!(entries[0]["key"], format!("{}_2024-03-03", id));
    assert_eq!(entries[1]["key"], id);
    assert_eq!(entries[1]["isGeneratedInstance"], false);
    assert_eq!(entries[3]["isGeneratedInstance"], true);
}

#[tokio::test]
async fn inverted_calendar_window_is_empty() {
    let app = app().await;
    create_weekly(&app).await;

    let (status, view) = send(&app, "GET", "/calendar?start=2024-03-31&end=2024-03-01", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["total"], 0);
}

#[tokio::test]
async fn invalid_window_date_is_rejected() {
    let app = app().await;
    let (status, _) = send(&app, "GET", "/calendar?start=soon&end=2024-03-01", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn completing_and_skipping_instances() {
    let app = app().await;
    let id = create_weekly(&app).await;

    let uri = format!("/tasks/{}/instances/complete", id);
    let body = json!({ "instanceDate": "2024-03-17", "completed": true });
    send(&app, "POST", &uri, Some(body.clone())).await;
    let (status, task) = send(&app, "POST", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["recurrence"]["completedInstances"], 2);
    assert_eq!(task["recurrence"]["completedDates"].as_array().expect("list").len(), 2);

    let (status, task) = send(
        &app,
        "POST",
        &format!("/tasks/{}/instances/skip", id),
        Some(json!({ "instanceDate": "2024-03-24T10:00:00Z", "reason": "travel" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["recurrence"]["skippedDates"][0]["date"], "2024-03-24");
    assert_eq!(task["recurrence"]["skippedDates"][0]["reason"], "travel");

    let (_, view) = send(&app, "GET", "/calendar?start=2024-03-15&end=2024-03-31", None).await;
    let entries = view["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["date"], "2024-03-17");
    assert_eq!(entries[0]["completed"], true);
    assert_eq!(entries[1]["date"], "2024-03-24");
    assert_eq!(entries[1]["skipped"], true);
}

#[tokio::test]
async fn instance_operations_need_a_recurring_task() {
    let app = app().await;
    let (_, task) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({ "title": "One-off", "dueDate": "2024-03-12" })),
    )
    .await;
    let id = task["id"].as_str().expect("id");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/tasks/{}/instances/complete", id),
        Some(json!({ "instanceDate": "2024-03-12", "completed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Not a recurring task");

    let (status, _) = send(
        &app,
        "POST",
        "/tasks/missing/instances/skip",
        Some(json!({ "instanceDate": "2024-03-12" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn task_occurrences_for_one_template() {
    let app = app().await;
    let id = create_weekly(&app).await;

    let (status, occurrences) = send(
        &app,
        "GET",
        &format!("/tasks/{}/occurrences?start=2024-03-01&end=2024-03-17", id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let list = occurrences.as_array().expect("list");
    assert_eq!(list.len(), 3);
    assert_eq!(list[1]["isGeneratedInstance"], false);
    assert_eq!(list[1]["sourceTaskId"], id.as_str());
}

#[tokio::test]
async fn update_and_archive_flow() {
    let app = app().await;
    let id = create_weekly(&app).await;

    let (status, task) = send(
        &app,
        "PATCH",
        &format!("/tasks/{}", id),
        Some(json!({ "title": "Team sync (moved)", "completed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["title"], "Team sync (moved)");
    assert_eq!(task["completed"], true);

    let (status, _) = send(&app, "PATCH", &format!("/tasks/{}/archive", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = send(&app, "GET", "/tasks", None).await;
    assert_eq!(list.as_array().expect("list").len(), 0);
    let (_, list) = send(&app, "GET", "/tasks?include_archived=true", None).await;
    assert_eq!(list.as_array().expect("list").len(), 1);

    let (status, _) = send(&app, "PATCH", "/tasks/missing/archive", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_windows_are_rejected() {
    let app = app().await;
    let id = create_weekly(&app).await;

    let (status, body) = send(&app, "GET", "/calendar?start=0001-01-01&end=9999-12-31", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "window must not span more than 366 days");

    let (status, _) = send(
        &app,
        "GET",
        &format!("/tasks/{}/occurrences?start=0001-01-01&end=9999-12-31", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // うるう年を含む1年分はそのまま通る
    let (status, view) = send(&app, "GET", "/calendar?start=2024-01-01&end=2025-01-01", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["originalCount"], 1);

    let (status, _) = send(&app, "GET", "/calendar?start=2024-01-01&end=2025-01-02", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_null_clears_fields_and_omitted_fields_stay() {
    let app = app().await;
    let (_, created) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({
            "title": "Quarterly report",
            "description": "draft first",
            "dueDate": "2024-03-31",
            "startDate": "2024-03-31",
            "recurrence": { "pattern": "monthly", "interval": 3, "endDate": "2025-12-31" }
        })),
    )
    .await;
    let id = created["id"].as_str().expect("id");

    let (status, task) = send(
        &app,
        "PATCH",
        &format!("/tasks/{}", id),
        Some(json!({
            "description": null,
            "dueDate": null,
            "recurrence": { "endDate": null }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["description"], Value::Null);
    assert_eq!(task["dueDate"], Value::Null);
    assert_eq!(task["startDate"], "2024-03-31");
    assert_eq!(task["recurrence"]["endDate"], Value::Null);
    assert_eq!(task["recurrence"]["pattern"], "monthly");
    assert_eq!(task["recurrence"]["interval"], 3);

    let (_, fetched) = send(&app, "GET", &format!("/tasks/{}", id), None).await;
    assert_eq!(fetched["dueDate"], Value::Null);
    assert_eq!(fetched["recurrence"]["endDate"], Value::Null);
}

#[tokio::test]
async fn completing_the_due_date_instance_leaves_the_original_row_open() {
    let app = app().await;
    let id = create_weekly(&app).await;

    let (status, task) = send(
        &app,
        "POST",
        &format!("/tasks/{}/instances/complete", id),
        Some(json!({ "instanceDate": "2024-03-10" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["recurrence"]["completedDates"][0]["date"], "2024-03-10");

    let (_, view) = send(&app, "GET", "/calendar?start=2024-03-10&end=2024-03-10", None).await;
    let entries = view["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["isGeneratedInstance"], false);
    assert_eq!(entries[0]["completed"], false);

    // 元の行はタスク自体の completed フラグで閉じる
    send(&app, "PATCH", &format!("/tasks/{}", id), Some(json!({ "completed": true }))).await;
    let (_, view) = send(&app, "GET", "/calendar?start=2024-03-10&end=2024-03-10", None).await;
    assert_eq!(view["entries"][0]["completed"], true);
}

#[tokio::test]
async fn manual_reminder_run_requires_identity() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reminders/run")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, stats) = send(&app, "POST", "/reminders/run", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["failed"], 0);
}
