//! Campus Realtime - an authenticated WebSocket fan-out gateway
//!
//! Maps users to live connections, joins them to user, campus and
//! conversation rooms, and delivers events by user, room or campus admin
//! role. Campus admin lookups go through a bounded TTL cache.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod lookup;
pub mod models;
pub mod registry;
pub mod tasks;
pub mod transport;

pub use api::{create_router, AppState};
pub use config::Config;
pub use directory::StaticDirectory;
pub use tasks::spawn_sweep_task;
