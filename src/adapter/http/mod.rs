//! HTTP Adapter Modules
//!
//! Google APIへのHTTPアクセス

pub mod error_response;
pub mod retry;
pub mod service;

pub use service::{GoogleService, RequestConfig};
