//! Realtime messaging for the social network backend: a hub of live WebSocket
//! connections with presence notifications, direct, group and broadcast chat,
//! and best-effort persistence of chat history.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod ws;

pub use config::Config;
pub use error::{AppError, Result};
pub use routes::build_router;
pub use state::AppState;
