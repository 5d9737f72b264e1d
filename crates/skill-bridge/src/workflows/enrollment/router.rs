use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::AttemptId;
use super::intake::EnrollmentRequest;
use super::notification::NotificationDispatcher;
use super::repository::AttemptRepository;
use super::service::{EnrollmentError, EnrollmentService};
use super::video::{VideoArtifact, VideoUpload};

const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub(crate) struct ResendBody {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswersBody {
    pub answers: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoLinkBody {
    pub url: String,
}

/// Router exposing the enrollment funnel under `/api/v1/enrollment/quizzes`.
pub fn enrollment_router<R, N>(service: Arc<EnrollmentService<R, N>>) -> Router
where
    R: AttemptRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let upload_limit = service
        .config()
        .video_max_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/api/v1/enrollment/quizzes", post(create_handler::<R, N>))
        .route(
            "/api/v1/enrollment/quizzes/:quiz_id",
            get(questions_handler::<R, N>),
        )
        .route(
            "/api/v1/enrollment/quizzes/:quiz_id/status",
            get(status_handler::<R, N>),
        )
        .route(
            "/api/v1/enrollment/quizzes/:quiz_id/notifications",
            post(resend_handler::<R, N>),
        )
        .route(
            "/api/v1/enrollment/quizzes/:quiz_id/answers",
            post(submit_handler::<R, N>),
        )
        .route(
            "/api/v1/enrollment/quizzes/:quiz_id/result",
            get(result_handler::<R, N>),
        )
        .route(
            "/api/v1/enrollment/quizzes/:quiz_id/video",
            post(video_upload_handler::<R, N>).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/enrollment/quizzes/:quiz_id/video_link",
            post(video_link_handler::<R, N>),
        )
        .route(
            "/api/v1/enrollment/quizzes/:quiz_id/decision",
            get(decision_handler::<R, N>),
        )
        .with_state(service)
}

pub(crate) async fn create_handler<R, N>(
    State(service): State<Arc<EnrollmentService<R, N>>>,
    Json(request): Json<EnrollmentRequest>,
) -> Response
where
    R: AttemptRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.create_attempt(request).await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn questions_handler<R, N>(
    State(service): State<Arc<EnrollmentService<R, N>>>,
    Path(quiz_id): Path<String>,
) -> Response
where
    R: AttemptRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.fetch_questions(&AttemptId(quiz_id)).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn status_handler<R, N>(
    State(service): State<Arc<EnrollmentService<R, N>>>,
    Path(quiz_id): Path<String>,
) -> Response
where
    R: AttemptRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.attempt_status(&AttemptId(quiz_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn resend_handler<R, N>(
    State(service): State<Arc<EnrollmentService<R, N>>>,
    Path(quiz_id): Path<String>,
    Json(body): Json<ResendBody>,
) -> Response
where
    R: AttemptRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service
        .resend_notification(&AttemptId(quiz_id), &body.email)
        .await
    {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn submit_handler<R, N>(
    State(service): State<Arc<EnrollmentService<R, N>>>,
    Path(quiz_id): Path<String>,
    Json(body): Json<AnswersBody>,
) -> Response
where
    R: AttemptRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service
        .submit_answers(&AttemptId(quiz_id), body.answers)
        .await
    {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn result_handler<R, N>(
    State(service): State<Arc<EnrollmentService<R, N>>>,
    Path(quiz_id): Path<String>,
) -> Response
where
    R: AttemptRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.score_result(&AttemptId(quiz_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn video_upload_handler<R, N>(
    State(service): State<Arc<EnrollmentService<R, N>>>,
    Path(quiz_id): Path<String>,
    multipart: Multipart,
) -> Response
where
    R: AttemptRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let upload = match read_upload(multipart, service.config().video_max_bytes).await {
        Ok(upload) => upload,
        Err(err) => return err.into_response(),
    };

    match service
        .upload_video(&AttemptId(quiz_id), VideoArtifact::Upload(upload))
        .await
    {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn video_link_handler<R, N>(
    State(service): State<Arc<EnrollmentService<R, N>>>,
    Path(quiz_id): Path<String>,
    Json(body): Json<VideoLinkBody>,
) -> Response
where
    R: AttemptRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service
        .upload_video(&AttemptId(quiz_id), VideoArtifact::Link { url: body.url })
        .await
    {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn decision_handler<R, N>(
    State(service): State<Arc<EnrollmentService<R, N>>>,
    Path(quiz_id): Path<String>,
) -> Response
where
    R: AttemptRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.final_decision(&AttemptId(quiz_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Pull the `file` part out of a multipart body.
async fn read_upload(
    mut multipart: Multipart,
    limit: usize,
) -> Result<VideoUpload, EnrollmentError> {
    let rejected = |err: MultipartError| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            EnrollmentError::VideoTooLarge { limit }
        } else {
            EnrollmentError::InvalidInput(format!("malformed multipart body: {err}"))
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(rejected)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("video.bin").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(rejected)?;
        return Ok(VideoUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(EnrollmentError::InvalidInput(
        "multipart body has no `file` field".to_string(),
    ))
}

impl EnrollmentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EnrollmentError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EnrollmentError::VideoTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            EnrollmentError::NotFound(_) => StatusCode::NOT_FOUND,
            EnrollmentError::EmailMismatch(_) => StatusCode::FORBIDDEN,
            EnrollmentError::AnswerCountMismatch { .. } => StatusCode::BAD_REQUEST,
            EnrollmentError::WrongStage { .. }
            | EnrollmentError::AlreadySubmitted(_)
            | EnrollmentError::NotEligible(_)
            | EnrollmentError::NotYetGenerated(_)
            | EnrollmentError::NotScoredYet(_)
            | EnrollmentError::NotFinalizedYet(_)
            | EnrollmentError::Conflict(_) => StatusCode::CONFLICT,
            EnrollmentError::DeadlineExceeded { .. } => StatusCode::GONE,
            EnrollmentError::CollaboratorUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EnrollmentError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EnrollmentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "enrollment request failed");
        }
        let payload = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (status, Json(payload)).into_response()
    }
}
