pub mod auth;
pub mod error;
pub mod server;
pub mod subtasks;
pub mod tasks;
pub mod workload;

pub use error::ApiError;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
