//! Service wiring: handlers and application state

pub mod app;
pub mod handlers;

pub use app::AppState;
pub use handlers::ChatHandlers;
