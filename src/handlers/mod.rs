pub mod auth;
pub mod groups;
pub mod history;
pub mod presence;
pub mod ws;

pub use auth::AuthUser;
pub use ws::ws_handler;
