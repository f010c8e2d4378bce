//! JSON HTTP API.

pub mod admin;
pub mod error;
pub mod handlers;
pub mod types;

pub use error::{ApiError, ApiResult};
