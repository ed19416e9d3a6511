mod app;
mod handler;

pub use app::{router, AppState};
