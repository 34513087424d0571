//! Request and Response models for the internal emit API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    EmitToCampusAdminsRequest, EmitToCampusRoomsRequest, EmitToConversationRequest,
    EmitToUserRoomsRequest, EmitToUsersRequest,
};
pub use responses::{AdminCacheStats, EmitResponse, ErrorResponse, HealthResponse, StatsResponse};
