pub mod auth;

use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use crate::db::repository;
use crate::error::AppError;
use crate::models::*;
use crate::recurrence::{Occurrence, parse_calendar_day};
use crate::services::calendar::occurrences_for;
use crate::services::{CalendarService, CalendarView, InstanceService, ReminderService, ReminderStats};
use crate::state::AppState;

pub use auth::UserId;

#[derive(Deserialize)]
struct TaskQueryParams {
    #[serde(default)]
    include_archived: bool,
}

#[derive(Deserialize)]
struct WindowParams {
    start: String,
    end: String,
}

/// Widest window a single request may materialize; a year view fits.
pub const MAX_WINDOW_DAYS: i64 = 366;

impl WindowParams {
    fn parse(&self) -> Result<(NaiveDate, NaiveDate), AppError> {
        let start = parse_day(&self.start, "start")?;
        let end = parse_day(&self.end, "end")?;
        if (end - start).num_days() > MAX_WINDOW_DAYS {
            return Err(AppError::BadRequest(format!(
                "window must not span more than {} days",
                MAX_WINDOW_DAYS
            )));
        }
        Ok((start, end))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteInstanceRequest {
    instance_date: String,
    #[serde(default = "default_completed")]
    completed: bool,
}

fn default_completed() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkipInstanceRequest {
    instance_date: String,
    #[serde(default)]
    reason: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task).patch(update_task))
        .route("/tasks/{id}/archive", patch(archive_task))
        .route("/tasks/{id}/unarchive", patch(unarchive_task))
        .route("/tasks/{id}/occurrences", get(task_occurrences))
        .route("/tasks/{id}/instances/complete", post(complete_instance))
        .route("/tasks/{id}/instances/skip", post(skip_instance))
        .route("/calendar", get(calendar))
        .route("/reminders/run", post(run_reminders))
        .with_state(state)
}

fn parse_day(raw: &str, field: &str) -> Result<NaiveDate, AppError> {
    parse_calendar_day(raw)
        .ok_or_else(|| AppError::BadRequest(format!("{} is not a valid date: {}", field, raw)))
}

fn require_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::BadRequest("title must not be empty".to_string()));
    }
    Ok(())
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_tasks(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(params): Query<TaskQueryParams>,
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = repository::fetch_tasks(&state.db, &user_id, params.include_archived).await?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(req): Json<NewTaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    require_title(&req.title)?;
    let task = repository::insert_task(&state.db, &user_id, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let task = repository::find_task_by_id(&state.db, &user_id, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, AppError> {
    if let Some(title) = &req.title {
        require_title(title)?;
    }
    let task = repository::update_task(&state.db, &user_id, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

async fn archive_task(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let ok = repository::archive_task(&state.db, &user_id, &id).await?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn unarchive_task(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let ok = repository::unarchive_task(&state.db, &user_id, &id).await?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn task_occurrences(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    Query(window): Query<WindowParams>,
) -> Result<Json<Vec<Occurrence>>, AppError> {
    let (start, end) = window.parse()?;
    let task = repository::find_task_by_id(&state.db, &user_id, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(occurrences_for(&task, start, end)))
}

/// Records an instance completion. The original (due-date) row of the
/// calendar reads the template's own `completed` flag, so completing that day
/// here leaves it open; use `PATCH /tasks/{id}` with `completed` for it.
async fn complete_instance(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    Json(req): Json<CompleteInstanceRequest>,
) -> Result<Json<Task>, AppError> {
    let instance_date = parse_day(&req.instance_date, "instanceDate")?;
    let service = InstanceService::new(state.db.clone());
    let task = service
        .complete(&user_id, &id, instance_date, req.completed, Utc::now())
        .await?;
    Ok(Json(task))
}

async fn skip_instance(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    Json(req): Json<SkipInstanceRequest>,
) -> Result<Json<Task>, AppError> {
    let instance_date = parse_day(&req.instance_date, "instanceDate")?;
    let service = InstanceService::new(state.db.clone());
    let task = service
        .skip(&user_id, &id, instance_date, req.reason, Utc::now())
        .await?;
    Ok(Json(task))
}

async fn calendar(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(window): Query<WindowParams>,
) -> Result<Json<CalendarView>, AppError> {
    let (start, end) = window.parse()?;
    let service = CalendarService::new(state.db.clone());
    let view = service.view(&user_id, start, end).await?;
    Ok(Json(view))
}

/// Operations hook: runs one reminder poll immediately. The poll covers every
/// user, not only the caller; the identity header is still required.
async fn run_reminders(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<ReminderStats>, AppError> {
    info!("manual reminder poll requested by {}", user_id);
    let now = Utc::now();
    let service = ReminderService::new(state.db.clone(), state.notifier.clone());
    let stats = service.run_once(now.date_naive(), now).await?;
    Ok(Json(stats))
}
