//! `/admissions` handlers.

use crate::extract::{reply, ApiJson, ApiPath, ApiQuery, Reply};
use crate::AppState;
use api_shared::ApiResponse;
use axum::extract::State;
use clinic_core::{Admission, AdmissionPatch, NewAdmission};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListAdmissionsParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// Case-insensitive substring of the patient name.
    pub patient_name: Option<String>,
}

#[utoipa::path(
    post,
    path = "/admissions",
    tag = "admissions",
    request_body = NewAdmission,
    responses(
        (status = 200, description = "Patient admitted with price \"0\"", body = Admission),
        (status = 400, description = "Malformed or invalid body")
    )
)]
pub async fn admit(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewAdmission>,
) -> Reply<Admission> {
    reply(state.admissions.admit(input), "admitted")
}

#[utoipa::path(
    get,
    path = "/admissions",
    tag = "admissions",
    params(ListAdmissionsParams),
    responses(
        (status = 200, description = "One page of admissions, latest admission first, with `pagination`", body = [Admission])
    )
)]
pub async fn find_all(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListAdmissionsParams>,
) -> Reply<Vec<Admission>> {
    let page = state.admissions.page_request(params.page, params.page_size);
    match state
        .admissions
        .find_all(page, params.patient_name.as_deref())
    {
        Ok(page) => Reply(ApiResponse::page("fetched", page)),
        Err(err) => reply(Err(err), "fetched"),
    }
}

#[utoipa::path(
    get,
    path = "/admissions/{id}",
    tag = "admissions",
    params(("id" = u64, Path, description = "Admission id")),
    responses(
        (status = 200, description = "The admission", body = Admission),
        (status = 404, description = "No admission with this id")
    )
)]
pub async fn find_one(State(state): State<AppState>, ApiPath(id): ApiPath<u64>) -> Reply<Admission> {
    reply(state.admissions.find_one(id), "fetched")
}

#[utoipa::path(
    patch,
    path = "/admissions/{id}",
    tag = "admissions",
    params(("id" = u64, Path, description = "Admission id")),
    request_body = AdmissionPatch,
    responses(
        (status = 200, description = "Updated admission", body = Admission),
        (status = 400, description = "Empty or malformed patch"),
        (status = 404, description = "No admission with this id")
    )
)]
/// Partial update. Setting `status` to `1` discharges and prices the stay.
pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(patch): ApiJson<AdmissionPatch>,
) -> Reply<Admission> {
    reply(state.admissions.update(id, patch), "updated")
}

#[utoipa::path(
    delete,
    path = "/admissions/{id}",
    tag = "admissions",
    params(("id" = u64, Path, description = "Admission id")),
    responses(
        (status = 200, description = "Deleted; `data` is null"),
        (status = 404, description = "No admission with this id")
    )
)]
pub async fn remove(State(state): State<AppState>, ApiPath(id): ApiPath<u64>) -> Reply<()> {
    reply(state.admissions.remove(id), "deleted")
}

#[utoipa::path(
    post,
    path = "/admissions/{id}/discharge",
    tag = "admissions",
    params(("id" = u64, Path, description = "Admission id")),
    responses(
        (status = 200, description = "Discharged; `price` holds the fee", body = Admission),
        (status = 404, description = "No admission with this id"),
        (status = 409, description = "Already discharged")
    )
)]
/// Discharge now. Every started day costs 100.
pub async fn discharge(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Reply<Admission> {
    reply(state.admissions.discharge(id), "discharged")
}
