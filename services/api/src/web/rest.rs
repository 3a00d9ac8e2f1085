//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the JSON API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::{AppState, SessionId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use lesson_gen_core::{
    domain::{
        GeneratedLessonRecord, ImproveLessonRequest, Lesson, LessonSection, LessonStatus,
    },
    ports::LessonError,
    tracker::Notification,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        submit_lesson_handler,
        list_lessons_handler,
        get_lesson_handler,
        improve_lesson_handler,
    ),
    components(
        schemas(
            GenerateLessonPayload,
            ImproveLessonPayload,
            ImprovedLessonPayload,
            LessonRecordPayload,
            LessonPayload,
            LessonSectionPayload,
            RecordStatus,
            NotificationPayload,
        )
    ),
    tags(
        (name = "LessonGen API", description = "Generate structured lessons from a topic.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Request body for submitting a topic.
#[derive(Deserialize, ToSchema)]
pub struct GenerateLessonPayload {
    pub topic: String,
}

/// Request body for improving a lesson with feedback.
#[derive(Deserialize, ToSchema)]
pub struct ImproveLessonPayload {
    pub lesson: String,
    pub feedback: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImprovedLessonPayload {
    pub improved_lesson: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Generated,
    Failed,
}

impl From<LessonStatus> for RecordStatus {
    fn from(status: LessonStatus) -> Self {
        match status {
            LessonStatus::Pending => RecordStatus::Pending,
            LessonStatus::Generated => RecordStatus::Generated,
            LessonStatus::Failed => RecordStatus::Failed,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct LessonSectionPayload {
    pub title: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct LessonPayload {
    pub title: String,
    pub introduction: String,
    pub sections: Vec<LessonSectionPayload>,
    pub summary: String,
}

impl From<&LessonSection> for LessonSectionPayload {
    fn from(section: &LessonSection) -> Self {
        Self {
            title: section.title.clone(),
            content: section.content.clone(),
        }
    }
}

impl From<&Lesson> for LessonPayload {
    fn from(lesson: &Lesson) -> Self {
        Self {
            title: lesson.title.clone(),
            introduction: lesson.introduction.clone(),
            sections: lesson.sections.iter().map(LessonSectionPayload::from).collect(),
            summary: lesson.summary.clone(),
        }
    }
}

/// One tracked generation request; `lesson` is null unless `status` is `generated`.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecordPayload {
    pub id: Uuid,
    pub topic: String,
    pub created_at: DateTime<Utc>,
    pub status: RecordStatus,
    pub lesson: Option<LessonPayload>,
}

impl From<&GeneratedLessonRecord> for LessonRecordPayload {
    fn from(record: &GeneratedLessonRecord) -> Self {
        Self {
            id: record.id,
            topic: record.topic.clone(),
            created_at: record.created_at,
            status: record.status().into(),
            lesson: record.lesson().map(LessonPayload::from),
        }
    }
}

/// Error body shaped like the notification the UI shows.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct NotificationPayload {
    pub title: String,
    pub description: String,
}

impl From<Notification> for NotificationPayload {
    fn from(notification: Notification) -> Self {
        Self {
            title: notification.title,
            description: notification.description,
        }
    }
}

type ApiFailure = (StatusCode, Json<NotificationPayload>);

fn failure(status: StatusCode, title: &str, description: impl Into<String>) -> ApiFailure {
    (
        status,
        Json(NotificationPayload {
            title: title.to_string(),
            description: description.into(),
        }),
    )
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Submit a topic for lesson generation.
///
/// The record is returned immediately in `pending` status; generation continues
/// in the background and can be observed via `GET /api/lessons/{id}` or `/ws`.
#[utoipa::path(
    post,
    path = "/api/lessons",
    request_body = GenerateLessonPayload,
    responses(
        (status = 202, description = "Generation started", body = LessonRecordPayload),
        (status = 400, description = "Blank topic", body = NotificationPayload)
    )
)]
pub async fn submit_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    Json(payload): Json<GenerateLessonPayload>,
) -> Result<(StatusCode, Json<LessonRecordPayload>), ApiFailure> {
    // Rejections are reported in the response body only, never queued for the page.
    if payload.topic.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(Notification::missing_topic().into()),
        ));
    }
    let tracker = app_state.tracker_for(session).await;
    match tracker.try_submit(&payload.topic).await {
        Ok(pending) => Ok((
            StatusCode::ACCEPTED,
            Json(LessonRecordPayload::from(&pending.record)),
        )),
        Err(LessonError::Validation(_)) => Err((
            StatusCode::BAD_REQUEST,
            Json(Notification::missing_topic().into()),
        )),
        Err(e) => {
            error!("Failed to submit lesson: {:?}", e);
            Err(failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error",
                "Failed to submit lesson",
            ))
        }
    }
}

/// List this session's lesson history, newest first.
#[utoipa::path(
    get,
    path = "/api/lessons",
    responses(
        (status = 200, description = "History, newest first", body = [LessonRecordPayload])
    )
)]
pub async fn list_lessons_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
) -> Json<Vec<LessonRecordPayload>> {
    let history = match app_state.find_tracker(session).await {
        Some(tracker) => tracker.history().await,
        None => Vec::new(),
    };
    Json(history.iter().map(LessonRecordPayload::from).collect())
}

/// Fetch one record of this session's history.
#[utoipa::path(
    get,
    path = "/api/lessons/{id}",
    params(
        ("id" = Uuid, Path, description = "The record id.")
    ),
    responses(
        (status = 200, description = "The record", body = LessonRecordPayload),
        (status = 404, description = "No such record in this session", body = NotificationPayload)
    )
)]
pub async fn get_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    Path(id): Path<Uuid>,
) -> Result<Json<LessonRecordPayload>, ApiFailure> {
    let record = match app_state.find_tracker(session).await {
        Some(tracker) => tracker.get(id).await,
        None => None,
    };
    record
        .map(|record| Json(LessonRecordPayload::from(&record)))
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "Error", "Lesson not found."))
}

/// Improve a lesson's text according to feedback.
#[utoipa::path(
    post,
    path = "/api/lessons/improve",
    request_body = ImproveLessonPayload,
    responses(
        (status = 200, description = "The improved lesson", body = ImprovedLessonPayload),
        (status = 400, description = "Invalid input", body = NotificationPayload),
        (status = 502, description = "The model provider failed", body = NotificationPayload)
    )
)]
pub async fn improve_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ImproveLessonPayload>,
) -> Result<Json<ImprovedLessonPayload>, ApiFailure> {
    let request = ImproveLessonRequest {
        lesson: payload.lesson,
        feedback: payload.feedback,
    };
    match app_state.improver.improve_lesson(&request).await {
        Ok(response) => Ok(Json(ImprovedLessonPayload {
            improved_lesson: response.improved_lesson,
        })),
        Err(LessonError::Validation(msg)) => Err(failure(StatusCode::BAD_REQUEST, "Error", msg)),
        Err(e) => {
            error!("Failed to improve lesson: {:?}", e);
            Err(failure(
                StatusCode::BAD_GATEWAY,
                "Failed to improve lesson",
                "An error occurred while improving the lesson. Please try again.",
            ))
        }
    }
}
