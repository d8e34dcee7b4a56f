//! Route handlers.
//!
//! Storage and the generative backend are blocking, so every handler moves
//! its work onto the blocking pool.

use super::error::ApiError;
use crate::models::{
    CommunicationLog, EngagementMetrics, FollowUpReceipt, NewCommunication, NewStudent,
    NotesUpdate, Student, StudentId, StudentStats, StudentUpdate, TagsUpdate,
};
use crate::services::{
    AppContext, DEFAULT_COMMUNICATIONS_LIMIT, EngagementScorer, SUMMARY_LOG_LIMIT,
    StatisticsEngine,
};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Runs `f` on the blocking pool with its own clone of the context.
async fn blocking<T, F>(ctx: &AppContext, f: F) -> std::result::Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(AppContext) -> crate::Result<T> + Send + 'static,
{
    let ctx = ctx.clone();
    Ok(tokio::task::spawn_blocking(move || f(ctx)).await??)
}

fn parse_id(raw: &str) -> std::result::Result<StudentId, ApiError> {
    Ok(StudentId::parse(raw)?)
}

/// `GET /health`.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /students/stats`.
pub async fn stats(State(ctx): State<AppContext>) -> ApiResult<StudentStats> {
    blocking(&ctx, |ctx| StatisticsEngine::compute(ctx.db()))
        .await
        .map(Json)
}

/// `GET /students`.
pub async fn list_students(State(ctx): State<AppContext>) -> ApiResult<Vec<Student>> {
    blocking(&ctx, |ctx| ctx.students().list()).await.map(Json)
}

/// `GET /students/{id}`.
pub async fn get_student(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Student> {
    let id = parse_id(&id)?;
    blocking(&ctx, move |ctx| ctx.students().get(&id))
        .await
        .map(Json)
}

/// `POST /students`.
pub async fn create_student(
    State(ctx): State<AppContext>,
    payload: std::result::Result<Json<NewStudent>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<Student>), ApiError> {
    let Json(new) = payload?;
    let student = blocking(&ctx, move |ctx| ctx.students().create(new)).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// `PATCH /students/{id}`.
pub async fn update_student(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<StudentUpdate>, JsonRejection>,
) -> ApiResult<Student> {
    let id = parse_id(&id)?;
    let Json(update) = payload?;
    blocking(&ctx, move |ctx| ctx.students().update(&id, update))
        .await
        .map(Json)
}

/// `PATCH /students/{id}/internal_notes`.
pub async fn update_notes(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<NotesUpdate>, JsonRejection>,
) -> ApiResult<Student> {
    let id = parse_id(&id)?;
    let Json(notes) = payload?;
    blocking(&ctx, move |ctx| ctx.students().replace_notes(&id, notes))
        .await
        .map(Json)
}

/// `PATCH /students/{id}/tags`.
pub async fn update_tags(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<TagsUpdate>, JsonRejection>,
) -> ApiResult<Student> {
    let id = parse_id(&id)?;
    let Json(tags) = payload?;
    blocking(&ctx, move |ctx| ctx.students().replace_tags(&id, tags))
        .await
        .map(Json)
}

/// `POST /students/{id}/email`.
pub async fn send_email(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<FollowUpReceipt> {
    let id = parse_id(&id)?;
    blocking(&ctx, move |ctx| ctx.students().send_follow_up_email(&id))
        .await
        .map(Json)
}

/// `POST /students/{id}/communication`.
pub async fn log_communication(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<NewCommunication>, JsonRejection>,
) -> ApiResult<CommunicationLog> {
    let id = parse_id(&id)?;
    let Json(entry) = payload?;
    blocking(&ctx, move |ctx| ctx.students().log_communication(&id, entry))
        .await
        .map(Json)
}

/// Query string of `GET /students/{id}/communications`.
#[derive(Debug, Deserialize)]
pub struct CommunicationsQuery {
    limit: Option<i64>,
}

/// `GET /students/{id}/communications`.
pub async fn communications(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    query: std::result::Result<Query<CommunicationsQuery>, QueryRejection>,
) -> ApiResult<Vec<CommunicationLog>> {
    let id = parse_id(&id)?;
    let Query(query) = query?;
    // Negative limits become 0 and are rejected by the service.
    let limit = query.limit.map_or(DEFAULT_COMMUNICATIONS_LIMIT, |n| {
        usize::try_from(n).unwrap_or(0)
    });
    blocking(&ctx, move |ctx| ctx.students().recent_communications(&id, limit))
        .await
        .map(Json)
}

/// Body of `GET /students/{id}/ai-summary`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    /// Markdown summary or the fallback text.
    pub summary: String,
}

/// `GET /students/{id}/ai-summary`.
pub async fn ai_summary(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<SummaryResponse> {
    let id = parse_id(&id)?;
    blocking(&ctx, move |ctx| {
        let (student, logs) = ctx.students().with_history(&id, Some(SUMMARY_LOG_LIMIT))?;
        Ok(ctx.summaries().generate(&student, &logs))
    })
    .await
    .map(|summary| Json(SummaryResponse { summary }))
    .map_err(|e| e.or_server_detail("Failed to generate AI summary"))
}

/// `GET /students/{id}/engagement`.
pub async fn engagement(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<EngagementMetrics> {
    let id = parse_id(&id)?;
    blocking(&ctx, move |ctx| {
        let (student, logs) = ctx.students().with_history(&id, None)?;
        Ok(EngagementScorer::score(&student, &logs))
    })
    .await
    .map(Json)
}
