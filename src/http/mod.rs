//! HTTP surface: the control API and the WebSocket attach channel.

mod handlers;
mod routes;
mod state;
mod ws;

pub use routes::create_router;
pub use state::AppState;
