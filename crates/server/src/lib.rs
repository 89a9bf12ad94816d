//! HTTP and WebSocket surface of the receptionist
//!
//! Carrier-facing endpoints: the voice webhook (call entry + admission),
//! the emergency fallback, the media stream websocket, and health probes.

pub mod entry;
pub mod http;
pub mod state;
pub mod twiml;

pub use entry::{route_call, InboundCall, RoutingDirective};
pub use http::create_router;
pub use state::AppState;
