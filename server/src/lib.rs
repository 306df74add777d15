pub mod auth;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod router;
pub mod state;
pub mod types;
pub mod utils;
pub mod webhook;

pub use error::AppError;
pub use state::{AppState, ServerMetadata, build_state};

#[cfg(test)]
pub mod test_support;
