// Session ingestion HTTP route

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    routing::put,
    Json, Router,
};
use crashlane_core::{parse_session, IngestError, IngestOutcome, IngestPipeline, IngestRequest};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use uuid::Uuid;

use crate::common::{AcceptedResponse, ErrorResponse};

/// App state for session routes
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<IngestPipeline>) -> Self {
        Self { pipeline }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/apps/:app_id/sessions", put(put_session))
        .with_state(state)
}

/// First address in X-Forwarded-For, else the peer address
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
}

fn error_response(err: &IngestError) -> (StatusCode, Json<ErrorResponse>) {
    let body = ErrorResponse::new(err.category());
    if err.is_client_error() {
        (StatusCode::BAD_REQUEST, Json(body.with_details(err.to_string())))
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
    }
}

/// PUT /v1/apps/{app_id}/sessions - Ingest one session
#[utoipa::path(
    put,
    path = "/v1/apps/{app_id}/sessions",
    params(
        ("app_id" = Uuid, Path, description = "Application ID")
    ),
    request_body(content = String, description = "Session document", content_type = "application/json"),
    responses(
        (status = 202, description = "Session accepted", body = AcceptedResponse),
        (status = 400, description = "Malformed or invalid session", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn put_session(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>), (StatusCode, Json<ErrorResponse>)> {
    let app_id = Uuid::parse_str(&app_id).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("invalid app id").with_details(e.to_string())),
        )
    })?;

    let session = parse_session(&body, app_id).map_err(|e| {
        tracing::warn!(%app_id, "Rejected session payload: {}", e);
        error_response(&e)
    })?;
    let session_id = session.session_id;

    let request = IngestRequest {
        session,
        client_ip: client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)),
        bytes_in: body.len() as u64,
    };

    match state.pipeline.ingest(request).await {
        Ok(IngestOutcome::AlreadyAccepted { .. }) => {
            Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::known_session())))
        }
        Ok(IngestOutcome::Accepted { .. }) => {
            Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::accepted())))
        }
        Err(e) if e.is_client_error() => {
            tracing::warn!(%app_id, %session_id, "Rejected session: {}", e);
            Err(error_response(&e))
        }
        Err(e) => {
            tracing::error!(%app_id, %session_id, "Failed to ingest session: {}", e);
            Err(error_response(&e))
        }
    }
}
