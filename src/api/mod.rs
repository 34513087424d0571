//! API Module
//!
//! HTTP handlers and routing for the realtime gateway.
//!
//! # Endpoints
//! Every `/emit/*` route requires the `x-api-key` header to match
//! `EMIT_API_KEY`; only `/stats` and `/health` allow cross-origin requests.
//!
//! - `GET /ws` - Authenticated WebSocket upgrade
//! - `POST /emit/users` - Deliver to users' registered connections
//! - `POST /emit/user-rooms` - Deliver to user rooms (global when no ids)
//! - `POST /emit/campus-rooms` - Deliver to campus rooms (global when no ids)
//! - `POST /emit/campus-admins` - Deliver to a campus's admins
//! - `POST /emit/conversation` - Deliver to a conversation room
//! - `GET /stats` - Gateway and admin cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod ws;

pub use handlers::*;
pub use middleware::{require_emit_key, API_KEY_HEADER};
pub use routes::create_router;
pub use ws::ws_handler;
