//! Route handler functions for all HTTP endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors,
//! interacts with the repositories or the gateway, and returns JSON
//! responses. Extractor rejections are folded into [`ApiError`] so every
//! failure carries the same JSON body.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::{ORIGIN, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use frontdesk_core::types::{
    ChatMessage, KnowledgeDocument, NewKnowledgeDocument, NewSession, SenderKind, SessionMetadata,
    SessionStatus, SessionSummary,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Default page size for the staff session list.
const DEFAULT_SESSION_LIMIT: u64 = 50;
const MAX_SESSION_LIMIT: u64 = 500;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct SessionListParams {
    pub status: Option<String>,
    pub limit: Option<u64>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub connections: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub session_id: Uuid,
    pub marked: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeListResponse {
    pub documents: Vec<KnowledgeDocument>,
    pub total: usize,
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid session id '{}'", raw)))
}

pub(crate) fn header_value(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// =============================================================================
// Public handlers
// =============================================================================

/// GET /health - liveness and basic counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        connections: state.gateway.connection_count(),
    })
}

/// POST /sessions - open a session before the visitor connects the socket.
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionStatusResponse>), ApiError> {
    let Json(body) = body?;

    let metadata = SessionMetadata {
        origin: header_value(&headers, ORIGIN),
        user_agent: header_value(&headers, USER_AGENT),
        extra: body.metadata.unwrap_or_default(),
    };
    let session = state.sessions().create(&NewSession {
        visitor_name: non_blank(body.name),
        visitor_contact: non_blank(body.contact),
        metadata,
    })?;

    tracing::info!(session_id = %session.id, "Session opened over HTTP");

    Ok((
        StatusCode::CREATED,
        Json(SessionStatusResponse {
            session_id: session.id,
            status: session.status,
        }),
    ))
}

/// GET /sessions/{id}/messages - full ordered history.
pub async fn session_messages(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let session_id = parse_session_id(&raw_id)?;
    if state.sessions().get(session_id)?.is_none() {
        return Err(ApiError::NotFound(format!("Session {} not found", session_id)));
    }

    let messages = state.messages().history(session_id)?;
    Ok(Json(MessagesResponse {
        session_id,
        messages,
    }))
}

// =============================================================================
// Staff handlers
// =============================================================================

/// GET /sessions - sessions by most recent activity, optionally by status.
pub async fn list_sessions(
    State(state): State<AppState>,
    params: Result<Query<SessionListParams>, QueryRejection>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let Query(params) = params?;

    let status = match params.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(raw.parse::<SessionStatus>().map_err(|_| {
            ApiError::BadRequest(format!(
                "Invalid status '{}'. Must be one of: open, active, closed",
                raw
            ))
        })?),
    };
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SESSION_LIMIT)
        .clamp(1, MAX_SESSION_LIMIT);

    let sessions = state.sessions().list(status, limit)?;
    Ok(Json(SessionListResponse {
        total: sessions.len(),
        sessions,
    }))
}

/// POST /sessions/{id}/close - close through the gateway so rooms hear it.
pub async fn close_session(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let session_id = parse_session_id(&raw_id)?;
    let change = state.gateway.close_session(session_id).await?;
    Ok(Json(SessionStatusResponse {
        session_id,
        status: change.to,
    }))
}

/// POST /sessions/{id}/read - mark the visitor's messages as read.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let session_id = parse_session_id(&raw_id)?;
    if state.sessions().get(session_id)?.is_none() {
        return Err(ApiError::NotFound(format!("Session {} not found", session_id)));
    }

    let marked = state.messages().mark_read(session_id, SenderKind::Visitor)?;
    Ok(Json(MarkReadResponse { session_id, marked }))
}

/// GET /knowledge - every grounding document in authoring order.
pub async fn list_knowledge(
    State(state): State<AppState>,
) -> Result<Json<KnowledgeListResponse>, ApiError> {
    let documents = state.knowledge().list()?;
    Ok(Json(KnowledgeListResponse {
        total: documents.len(),
        documents,
    }))
}

/// POST /knowledge - author a grounding document.
pub async fn create_knowledge(
    State(state): State<AppState>,
    body: Result<Json<NewKnowledgeDocument>, JsonRejection>,
) -> Result<(StatusCode, Json<KnowledgeDocument>), ApiError> {
    let Json(new) = body?;
    let document = state.knowledge().create(&new)?;
    tracing::info!(document_id = %document.id, title = %document.title, "Knowledge document added");
    Ok((StatusCode::CREATED, Json(document)))
}
