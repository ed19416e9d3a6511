mod app;
mod client;
mod handler;
pub mod schedule;

pub use app::{router, AppState};
pub use client::CommandClient;
