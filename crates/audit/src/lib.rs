mod app;
mod handler;
mod model;
pub mod repository;
mod routes;

pub use app::{router, AppState};
pub use model::{AuditEntry, AuditFilter};
