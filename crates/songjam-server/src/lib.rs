//! HTTP surface: third-party proxy routes, deployment and Space endpoints.

#![deny(unsafe_code)]

pub mod error;
pub mod extract;
pub mod routes;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ApiError, ApiResult, ErrorBody};
pub use server::{build_router, start, AppState, ServerHandle};
