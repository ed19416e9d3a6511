mod app;
pub mod auth;
mod error;
pub mod model;
pub mod repository;
mod routes;
pub mod validate;

pub use app::{router, AppState};
pub use error::CommandError;
