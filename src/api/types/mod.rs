//! Request, response and error types of the HTTP API

pub mod error;
pub mod json;
pub mod query;

pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
pub use json::Json;
pub use query::{QueryRequest, QueryResponse};
