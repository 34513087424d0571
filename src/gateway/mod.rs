//! Gateway Module
//!
//! Connection lifecycle (authentication gate) and room-based fan-out.

pub mod events;
pub mod fanout;
pub mod gate;

pub use events::ControlEvent;
pub use fanout::{rooms_for, RoomFanoutGateway};
pub use gate::{ConnectionState, GatewayHooks, Handshake, NoopHooks, TransportGate};
