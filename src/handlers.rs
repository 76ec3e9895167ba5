use crate::config::Config;
use crate::dashboard::{DashboardView, GeneratedMessage, LoadStatus};
use crate::errors::AppError;
use crate::lifecycle::{ActionOutcome, EditorKind, LifecycleController};
use crate::models::{CreatedLead, InteractionDraft, LeadId, NewLead, Weights};
use crate::notifications::Notification;
use crate::session::DashboardSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use uuid::Uuid;

/// Largest request body accepted, 1MB is plenty for drafts and new leads.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// The dashboard session every request acts on.
    pub session: Arc<DashboardSession>,
}

/// Builds the dashboard routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/messages", get(get_messages))
        .route("/api/notifications", get(get_notifications))
        .route("/api/notifications/:id", delete(dismiss_notification))
        .route("/api/leads", post(create_lead))
        .route("/api/leads/reload", post(reload_leads))
        .route("/api/search", post(search_leads))
        .route(
            "/api/leads/:id/editor/:kind",
            put(open_editor).delete(dismiss_editor),
        )
        .route("/api/leads/:id/weights", put(update_weights))
        .route("/api/leads/:id/rescore", post(rescore_lead))
        .route("/api/leads/:id/message", post(generate_message))
        .route(
            "/api/leads/:id/interaction",
            put(update_interaction).post(submit_interaction),
        )
        .with_state(state)
}

/// Dashboard routes wrapped in the request size limit, tracing and CORS layers.
pub fn app(state: Arc<AppState>) -> Router {
    router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint.
///
/// Reports this service's status and whether the lead backend answers.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let backend = match state.session.client().health().await {
        Ok(_) => "reachable".to_string(),
        Err(e) => {
            tracing::warn!("Lead backend health check failed: {}", e);
            format!("unreachable: {}", e)
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "sales-lead-dashboard",
            "version": env!("CARGO_PKG_VERSION"),
            "backend": backend,
        })),
    )
}

/// GET /api/dashboard
///
/// Returns the full dashboard view. When the last collection load failed the
/// view is replaced by a retry prompt with `503 Service Unavailable`.
pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> Response {
    let view: DashboardView = state.session.view().await;

    if let LoadStatus::Failed { error } = &view.status {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "failed",
                "error": error,
                "backend": state.config.api_url,
                "retry": "/api/leads/reload",
            })),
        )
            .into_response();
    }

    Json(view).into_response()
}

/// GET /api/messages
pub async fn get_messages(State(state): State<Arc<AppState>>) -> Json<Vec<GeneratedMessage>> {
    Json(state.session.messages().await)
}

/// GET /api/notifications
pub async fn get_notifications(State(state): State<Arc<AppState>>) -> Json<Vec<Notification>> {
    Json(state.session.controller().notifier().active())
}

/// DELETE /api/notifications/:id
pub async fn dismiss_notification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    match state.session.controller().notifier().dismiss(id).await {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(AppError::NotFound(format!("Notification {} is not active", id))),
    }
}

/// POST /api/leads/reload
///
/// Explicit retry: refetches the whole collection.
pub async fn reload_leads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = state.session.reload().await?;
    Ok(Json(json!({ "status": "ready", "leads": count })))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

/// POST /api/search
pub async fn search_leads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /api/search - query: {:?}", request.query);
    let count = state.session.set_search(request.query.clone()).await?;
    Ok(Json(json!({
        "status": "ready",
        "search": request.query,
        "leads": count,
    })))
}

/// POST /api/leads
///
/// Creates a lead on the backend, then reloads the collection.
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    Json(lead): Json<NewLead>,
) -> Result<(StatusCode, Json<CreatedLead>), AppError> {
    let created = state.session.create_lead(lead).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

fn parse_editor_kind(kind: &str) -> Result<EditorKind, AppError> {
    match kind {
        "rescore" => Ok(EditorKind::Rescore),
        "interaction" => Ok(EditorKind::Interaction),
        other => Err(AppError::BadRequest(format!(
            "Unknown editor '{}', expected 'rescore' or 'interaction'",
            other
        ))),
    }
}

/// PUT /api/leads/:id/editor/:kind
pub async fn open_editor(
    State(state): State<Arc<AppState>>,
    Path((id, kind)): Path<(LeadId, String)>,
) -> Result<StatusCode, AppError> {
    let kind = parse_editor_kind(&kind)?;
    state.session.controller().open_editor(kind, id);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/leads/:id/editor/:kind
pub async fn dismiss_editor(
    State(state): State<Arc<AppState>>,
    Path((id, kind)): Path<(LeadId, String)>,
) -> Result<StatusCode, AppError> {
    let kind = parse_editor_kind(&kind)?;
    state.session.controller().dismiss_editor(kind, id);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/leads/:id/weights
pub async fn update_weights(
    State(state): State<Arc<AppState>>,
    Path(id): Path<LeadId>,
    Json(weights): Json<Weights>,
) -> StatusCode {
    state.session.controller().update_weights(id, weights);
    StatusCode::NO_CONTENT
}

/// PUT /api/leads/:id/interaction
pub async fn update_interaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<LeadId>,
    Json(draft): Json<InteractionDraft>,
) -> StatusCode {
    state.session.controller().update_interaction(id, draft);
    StatusCode::NO_CONTENT
}

/// Runs an action on its own task so a disconnecting caller does not cancel the
/// backend call or the store update that follows it.
async fn run_detached<F, Fut>(
    state: &AppState,
    action: F,
) -> Result<Json<ActionOutcome>, AppError>
where
    F: FnOnce(Arc<LifecycleController>) -> Fut,
    Fut: Future<Output = Result<ActionOutcome, AppError>> + Send + 'static,
{
    let controller = Arc::clone(state.session.controller());
    let outcome = tokio::spawn(action(controller))
        .await
        .map_err(|e| AppError::InternalError(format!("Action task failed: {}", e)))??;
    Ok(Json(outcome))
}

/// POST /api/leads/:id/rescore
pub async fn rescore_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<LeadId>,
) -> Result<Json<ActionOutcome>, AppError> {
    tracing::info!("POST /api/leads/{}/rescore", id);
    run_detached(&state, move |controller| async move {
        controller.submit_rescore(id).await
    })
    .await
}

/// POST /api/leads/:id/message
pub async fn generate_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<LeadId>,
) -> Result<Json<ActionOutcome>, AppError> {
    tracing::info!("POST /api/leads/{}/message", id);
    run_detached(&state, move |controller| async move {
        controller.generate_message(id).await
    })
    .await
}

/// POST /api/leads/:id/interaction
pub async fn submit_interaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<LeadId>,
) -> Result<Json<ActionOutcome>, AppError> {
    tracing::info!("POST /api/leads/{}/interaction", id);
    run_detached(&state, move |controller| async move {
        controller.submit_interaction(id).await
    })
    .await
}
