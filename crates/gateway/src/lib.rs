mod app;
mod connections;
pub mod handlers;

pub use app::{router, AppState};
pub use connections::ConnectionManager;

/// Close code sent when a socket is opened without a `user_id`.
pub const MISSING_USER_ID_CLOSE_CODE: u16 = 4001;
