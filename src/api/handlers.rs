//! API Handlers
//!
//! Internal HTTP handlers for the emit API, stats and health endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::auth::{AuthService, ConversationAuthorizer, RecordStore};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::gateway::{RoomFanoutGateway, TransportGate};
use crate::lookup::CampusAdminLookup;
use crate::models::{
    EmitResponse, EmitToCampusAdminsRequest, EmitToCampusRoomsRequest,
    EmitToConversationRequest, EmitToUserRoomsRequest, EmitToUsersRequest, HealthResponse,
    StatsResponse,
};
use crate::registry::ConnectionRegistry;
use crate::transport::WsTransport;

/// Application state shared across all handlers.
///
/// Every component is behind an `Arc`; cloning the state is cheap.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<TransportGate>,
    pub fanout: Arc<RoomFanoutGateway>,
    pub lookup: Arc<CampusAdminLookup>,
    pub transport: Arc<WsTransport>,
    pub registry: Arc<ConnectionRegistry>,
    /// Shared secret for the emit API; `None` disables it
    pub emit_api_key: Option<Arc<str>>,
}

impl AppState {
    /// Wires the gateway components from configuration and runs the gate's
    /// one-time initialization.
    pub fn new(
        auth: Arc<dyn AuthService>,
        store: Arc<dyn RecordStore>,
        authorizer: Arc<dyn ConversationAuthorizer>,
        config: &Config,
    ) -> Self {
        let transport = Arc::new(WsTransport::new());
        let registry = Arc::new(ConnectionRegistry::with_policy(
            config.displaced_connection_policy(),
        ));
        let lookup = Arc::new(CampusAdminLookup::new(store, config.admin_cache_options()));
        let fanout = Arc::new(
            RoomFanoutGateway::new(registry.clone(), transport.clone()).with_authorizer(authorizer),
        );
        let gate = Arc::new(TransportGate::new(auth, transport.clone(), fanout.clone()));
        gate.init();

        Self {
            gate,
            fanout,
            lookup,
            transport,
            registry,
            emit_api_key: config.emit_api_key.as_deref().map(Arc::from),
        }
    }
}

/// Handler for POST /emit/users
///
/// Delivers to each user's registered connection.
pub async fn emit_users_handler(
    State(state): State<AppState>,
    Json(req): Json<EmitToUsersRequest>,
) -> Result<Json<EmitResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let delivered = state
        .fanout
        .emit_to_users(&req.user_ids, &req.event, &req.payload);
    Ok(Json(EmitResponse::new(delivered)))
}

/// Handler for POST /emit/user-rooms
///
/// Without user ids the event goes to the global user room.
pub async fn emit_user_rooms_handler(
    State(state): State<AppState>,
    Json(req): Json<EmitToUserRoomsRequest>,
) -> Result<Json<EmitResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let delivered = match req.user_ids.as_deref() {
        Some(user_ids) if !user_ids.is_empty() => {
            state
                .fanout
                .emit_to_specific_user_rooms(user_ids, &req.event, &req.payload)
        }
        _ => state.fanout.emit_to_global_user_room(&req.event, &req.payload),
    };
    Ok(Json(EmitResponse::new(delivered)))
}

/// Handler for POST /emit/campus-rooms
///
/// Without campus ids the event goes to the global campus room.
pub async fn emit_campus_rooms_handler(
    State(state): State<AppState>,
    Json(req): Json<EmitToCampusRoomsRequest>,
) -> Result<Json<EmitResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let delivered = match req.campus_ids.as_deref() {
        Some(campus_ids) if !campus_ids.is_empty() => {
            state
                .fanout
                .emit_to_campus_specific_rooms(campus_ids, &req.event, &req.payload)
        }
        _ => state.fanout.emit_to_global_campus_room(&req.event, &req.payload),
    };
    Ok(Json(EmitResponse::new(delivered)))
}

/// Handler for POST /emit/campus-admins
///
/// Resolves the campus admins through the lookup cache; a record store
/// failure surfaces as 503.
pub async fn emit_campus_admins_handler(
    State(state): State<AppState>,
    Json(req): Json<EmitToCampusAdminsRequest>,
) -> Result<Json<EmitResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let delivered = state
        .fanout
        .emit_to_campus_admins(&state.lookup, &req.campus_id, &req.event, &req.payload)
        .await?;
    Ok(Json(EmitResponse::new(delivered)))
}

/// Handler for POST /emit/conversation
pub async fn emit_conversation_handler(
    State(state): State<AppState>,
    Json(req): Json<EmitToConversationRequest>,
) -> Result<Json<EmitResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let delivered = state
        .fanout
        .emit_to_conversation(&req.conversation_id, &req.event, &req.payload);
    Ok(Json(EmitResponse::new(delivered)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let admin_cache = state.lookup.stats().await;

    Json(StatsResponse {
        registered_users: state.registry.len(),
        open_sockets: state.transport.connection_count(),
        active_rooms: state.transport.room_count(),
        sessions: state.gate.session_count(),
        admin_cache: admin_cache.into(),
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
