//! Extractors and responders that keep every answer inside the response envelope.
//!
//! axum's stock `Json`, `Path` and `Query` reject with plain-text bodies and a mix of 400, 415
//! and 422. The wrappers here turn every rejection into a `400` envelope instead.

use api_shared::envelope::BAD_REQUEST;
use api_shared::ApiResponse;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clinic_core::ClinicResult;
use serde::Serialize;

/// JSON body whose rejection is a `400` envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiRejection))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose rejection is a `400` envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiRejection))]
pub struct ApiPath<T>(pub T);

/// Query string whose rejection is a `400` envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiRejection))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug)]
pub struct ApiRejection(String);

impl From<JsonRejection> for ApiRejection {
    fn from(rejection: JsonRejection) -> Self {
        Self(rejection.body_text())
    }
}

impl From<PathRejection> for ApiRejection {
    fn from(rejection: PathRejection) -> Self {
        Self(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiRejection {
    fn from(rejection: QueryRejection) -> Self {
        Self(rejection.body_text())
    }
}

impl IntoResponse for ApiRejection {
    fn into_response(self) -> Response {
        tracing::debug!("request rejected: {}", self.0);
        Reply(ApiResponse::<()>::error(BAD_REQUEST, self.0)).into_response()
    }
}

/// An envelope sent with the HTTP status equal to its `code`.
pub struct Reply<T>(pub ApiResponse<T>);

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

/// Wraps a service result: `message` on success, the error's own text otherwise.
pub fn reply<T>(result: ClinicResult<T>, message: &str) -> Reply<T> {
    match result {
        Ok(data) => Reply(ApiResponse::ok(message, data)),
        Err(err) => {
            let envelope = ApiResponse::from_error(&err);
            if envelope.code >= 500 {
                tracing::error!("request failed: {:?}", err);
            }
            Reply(envelope)
        }
    }
}
