//! Uniform response envelope.
//!
//! Every API response, success or failure, is `{code, message, data}`; list responses also
//! carry `pagination`. `code` mirrors the HTTP status.

use clinic_core::{ClinicError, Page, Pagination};
use serde::{Deserialize, Serialize};

pub const OK: u16 = 200;
pub const BAD_REQUEST: u16 = 400;
pub const UNAUTHORIZED: u16 = 401;
pub const NOT_FOUND: u16 = 404;
pub const CONFLICT: u16 = 409;
pub const INTERNAL_ERROR: u16 = 500;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            code: OK,
            message: message.into(),
            data: Some(data),
            pagination: None,
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            pagination: None,
        }
    }

    pub fn from_error(err: &ClinicError) -> Self {
        Self::error(status_code_for(err), err.to_string())
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn page(message: impl Into<String>, page: Page<T>) -> Self {
        Self {
            code: OK,
            message: message.into(),
            data: Some(page.data),
            pagination: Some(page.pagination),
        }
    }
}

/// Maps a core error onto the envelope code.
pub fn status_code_for(err: &ClinicError) -> u16 {
    match err {
        ClinicError::NotFound { .. } => NOT_FOUND,
        ClinicError::InvalidCredentials => UNAUTHORIZED,
        e if e.is_invalid_input() => BAD_REQUEST,
        e if e.is_conflict() => CONFLICT,
        _ => INTERNAL_ERROR,
    }
}
