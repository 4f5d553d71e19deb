//! HTTP façade
//!
//! Thin axum handlers: parse the request, call the engagement service,
//! serialize the outcome. Account ids in paths accept the "guest" sentinel.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use jobquest_core::{
    level_progress, AccountId, BadgeType, Error, LevelProgress, NewAccount, PointSource,
    PointTransaction, ProfileStep,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: u32 = 20;

// ─── Errors ─────────────────────────────────────────────────────────

/// Engine error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::AccountNotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            other => {
                error!("Request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn account_id(raw: &str) -> Result<AccountId, ApiError> {
    Ok(raw.parse::<AccountId>()?)
}

// ─── Router ────────────────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    let account_routes = Router::new()
        .route("/api/accounts", post(handle_register))
        .route("/api/accounts/{id}/login", post(handle_login))
        .route("/api/accounts/{id}/points", get(handle_points).post(handle_credit))
        .route("/api/accounts/{id}/badges", get(handle_badges))
        .route("/api/accounts/{id}/badges/pending", get(handle_pending_badges))
        .route("/api/accounts/{id}/badges/{badge}", post(handle_ensure_badge))
        .route("/api/accounts/{id}/streak", get(handle_streak))
        .route("/api/accounts/{id}/streak/notifications", put(handle_notifications));

    let activity_routes = Router::new()
        .route("/api/accounts/{id}/applications", post(handle_apply))
        .route("/api/accounts/{id}/reviews", post(handle_review))
        .route("/api/accounts/{id}/profile-steps/{step}", post(handle_profile_step));

    Router::new()
        .route("/api/status", get(handle_status))
        .route("/api/chat", post(handle_chat))
        .merge(account_routes)
        .merge(activity_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Handlers ──────────────────────────────────────────────────────

/// GET /api/status: health check
async fn handle_status() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "app": "JobQuest",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// POST /api/accounts
async fn handle_register(
    State(state): State<AppState>,
    Json(body): Json<NewAccount>,
) -> ApiResult<jobquest_engine::RegisterResponse> {
    Ok(Json(state.engagement.register(body).await?))
}

/// POST /api/accounts/{id}/login
async fn handle_login(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<jobquest_engine::LoginResponse> {
    let account = account_id(&id)?;
    Ok(Json(state.engagement.login(account, Utc::now()).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PointsResponse {
    points: i64,
    progress: LevelProgress,
    history: Vec<PointTransaction>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

/// GET /api/accounts/{id}/points: total, level progress and recent ledger
async fn handle_points(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<PointsResponse> {
    let account = account_id(&id)?;
    let ledger = state.engagement.ledger();
    let (points, _) = ledger.balance(account).await?;
    let history = ledger
        .history(account, query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await?;

    Ok(Json(PointsResponse {
        points,
        progress: level_progress(points),
        history,
    }))
}

#[derive(Debug, Deserialize)]
struct CreditRequest {
    amount: i64,
    source: Option<String>,
}

/// POST /api/accounts/{id}/points: manual credit
async fn handle_credit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CreditRequest>,
) -> ApiResult<jobquest_core::CreditOutcome> {
    let account = account_id(&id)?;
    let source = match body.source.as_deref() {
        Some(raw) => raw.parse::<PointSource>()?,
        None => PointSource::Manual,
    };
    Ok(Json(state.engagement.credit_points(account, body.amount, source).await?))
}

/// GET /api/accounts/{id}/badges
async fn handle_badges(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<jobquest_core::BadgeRecord>> {
    let account = account_id(&id)?;
    Ok(Json(state.engagement.badges(account).await?))
}

/// GET /api/accounts/{id}/badges/pending: obtained but not yet announced
async fn handle_pending_badges(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<jobquest_core::BadgeRecord>> {
    let account = account_id(&id)?;
    Ok(Json(state.engagement.pending_badges(account).await?))
}

/// POST /api/accounts/{id}/badges/{badge}
async fn handle_ensure_badge(
    State(state): State<AppState>,
    Path((id, badge)): Path<(String, String)>,
) -> ApiResult<jobquest_core::BadgeAward> {
    let account = account_id(&id)?;
    let badge_type = BadgeType::parse(&badge)?;
    Ok(Json(state.engagement.ensure_badge(account, badge_type).await?))
}

/// GET /api/accounts/{id}/streak
async fn handle_streak(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Option<jobquest_core::StreakRecord>> {
    let account = account_id(&id)?;
    Ok(Json(state.engagement.streak(account).await?))
}

#[derive(Debug, Deserialize)]
struct NotificationRequest {
    enabled: bool,
    time: String,
}

/// PUT /api/accounts/{id}/streak/notifications
async fn handle_notifications(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NotificationRequest>,
) -> ApiResult<jobquest_core::StreakRecord> {
    let account = account_id(&id)?;
    Ok(Json(
        state
            .engagement
            .configure_notifications(account, body.enabled, &body.time)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobRequest {
    job_id: String,
}

/// POST /api/accounts/{id}/applications
async fn handle_apply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<JobRequest>,
) -> ApiResult<jobquest_engine::ApplicationOutcome> {
    let account = account_id(&id)?;
    Ok(Json(
        state
            .engagement
            .apply_to_job(account, &body.job_id, Utc::now())
            .await?,
    ))
}

/// POST /api/accounts/{id}/reviews
async fn handle_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<JobRequest>,
) -> ApiResult<jobquest_engine::ReviewOutcome> {
    let account = account_id(&id)?;
    Ok(Json(
        state
            .engagement
            .review_job(account, &body.job_id, Utc::now())
            .await?,
    ))
}

/// POST /api/accounts/{id}/profile-steps/{step}
async fn handle_profile_step(
    State(state): State<AppState>,
    Path((id, step)): Path<(String, String)>,
) -> ApiResult<jobquest_engine::ProfileStepOutcome> {
    let account = account_id(&id)?;
    let step = ProfileStep::parse(&step)?;
    Ok(Json(
        state
            .engagement
            .complete_profile_step(account, step, Utc::now())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// Numeric id or "guest"
    account: String,
    message: String,
}

/// POST /api/chat
async fn handle_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> ApiResult<jobquest_engine::ChatReply> {
    let account = account_id(&body.account)?;
    Ok(Json(
        state
            .chat
            .handle_message(account, &body.message, Utc::now())
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jobquest_networking::{CompletionRequest, LanguageModel};
    use jobquest_persistence::Database;
    use std::sync::Arc;

    struct OfflineModel;

    #[async_trait]
    impl LanguageModel for OfflineModel {
        async fn complete(&self, _request: &CompletionRequest) -> jobquest_core::Result<String> {
            Err(Error::NetworkError("offline".into()))
        }
    }

    async fn state() -> AppState {
        let db = Database::connect_in_memory().await.unwrap();
        AppState::with_parts(db, Arc::new(OfflineModel)).await.unwrap()
    }

    #[test]
    fn test_error_status_mapping() {
        let status = |e: Error| ApiError(e).into_response().status();
        assert_eq!(status(Error::Validation("bad".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::AccountNotFound(7)), StatusCode::NOT_FOUND);
        assert_eq!(
            status(Error::DatabaseError("locked".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_register_then_apply() {
        let state = state().await;

        let Json(registered) = handle_register(
            State(state.clone()),
            Json(NewAccount {
                name: "Diego".into(),
                email: "diego@example.com".into(),
                password: "pw".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(registered.credit.new_total, 100);

        let id = registered.account.id.to_string();
        let Json(applied) = handle_apply(
            State(state.clone()),
            Path(id.clone()),
            Json(JobRequest {
                job_id: "job-42".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(applied.points_granted, 10);
        assert!(applied.badge.is_some());

        let Json(pending) = handle_pending_badges(State(state), Path(id)).await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_ids_and_unknown_accounts() {
        let state = state().await;

        let err = handle_login(State(state.clone()), Path("abc".into())).await.unwrap_err();
        assert!(matches!(err.0, Error::Validation(_)));

        let err = handle_login(State(state), Path("999".into())).await.unwrap_err();
        assert!(matches!(err.0, Error::AccountNotFound(999)));
    }

    #[tokio::test]
    async fn test_router_maps_errors_to_status() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let app = build_router(state().await);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/accounts/42/profile-steps/hobbies")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/accounts/42/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(Request::get("/api/accounts/guest/badges").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn test_guest_chat() {
        let state = state().await;
        let Json(reply) = handle_chat(
            State(state),
            Json(ChatRequest {
                account: "guest".into(),
                message: "hola".into(),
            }),
        )
        .await
        .unwrap();
        assert!(!reply.rate_limited);
        assert!(reply.session_state.is_none());
    }
}
