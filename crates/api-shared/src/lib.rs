//! # API Shared
//!
//! Shared utilities and definitions for the clinic APIs.
//!
//! Contains:
//! - The uniform `{code, message, data}` response envelope and the error-to-code mapping
//! - Shared services like `HealthService`
//! - API-key validation
//!
//! Used by `api-rest` and the command line for common functionality.

pub mod auth;
pub mod envelope;
pub mod health;

pub use auth::{validate_api_key, AuthError, API_KEY_HEADER};
pub use envelope::{status_code_for, ApiResponse};
pub use health::{HealthRes, HealthService};
