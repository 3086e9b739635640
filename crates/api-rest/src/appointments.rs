//! `/appointments` handlers.

use crate::extract::{reply, ApiJson, ApiPath, ApiQuery, Reply};
use crate::AppState;
use api_shared::ApiResponse;
use axum::extract::State;
use clinic_core::{
    Appointment, AppointmentPatch, AppointmentQuery, NewAppointment, TriageCompletion,
    VisitCompletion,
};
use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters for listing appointments.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListAppointmentsParams {
    /// 1-based page number; values below 1 are treated as 1.
    pub page: Option<i64>,
    /// Records per page, clamped to 1..=100.
    pub page_size: Option<i64>,
    /// Case-insensitive substring of the patient name.
    pub search: Option<String>,
    /// `pending`, `confirmed`, `cancelled` or `all`.
    pub status: Option<String>,
    /// `pending`, `in_progress`, `completed`, `skipped` or `all`.
    pub triage_status: Option<String>,
    /// `pending`, `in_progress`, `completed`, `missed` or `all`.
    pub visit_status: Option<String>,
}

#[utoipa::path(
    post,
    path = "/appointments",
    tag = "appointments",
    request_body = NewAppointment,
    responses(
        (status = 200, description = "Appointment registered (enveloped)", body = Appointment),
        (status = 400, description = "Malformed or invalid body"),
        (status = 500, description = "Storage failure")
    )
)]
/// Register a patient.
///
/// Statuses not supplied in the body start at `pending`.
pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewAppointment>,
) -> Reply<Appointment> {
    reply(state.appointments.create(input), "created")
}

#[utoipa::path(
    get,
    path = "/appointments",
    tag = "appointments",
    params(ListAppointmentsParams),
    responses(
        (status = 200, description = "One page of appointments, newest first, with `pagination`", body = [Appointment]),
        (status = 400, description = "Unknown status filter or malformed paging value")
    )
)]
pub async fn find_all(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListAppointmentsParams>,
) -> Reply<Vec<Appointment>> {
    let page = state
        .appointments
        .page_request(params.page, params.page_size);
    let query = match AppointmentQuery::from_raw(
        page,
        params.search,
        params.status.as_deref(),
        params.triage_status.as_deref(),
        params.visit_status.as_deref(),
    ) {
        Ok(query) => query,
        Err(err) => return Reply(ApiResponse::from_error(&err)),
    };

    match state.appointments.find_all(&query) {
        Ok(page) => Reply(ApiResponse::page("fetched", page)),
        Err(err) => reply(Err(err), "fetched"),
    }
}

#[utoipa::path(
    get,
    path = "/appointments/pending-triage",
    tag = "appointments",
    responses(
        (status = 200, description = "Registrations waiting for triage, oldest first", body = [Appointment])
    )
)]
pub async fn pending_triage(State(state): State<AppState>) -> Reply<Vec<Appointment>> {
    reply(state.appointments.pending_triage(), "fetched")
}

#[utoipa::path(
    get,
    path = "/appointments/pending-visit",
    tag = "appointments",
    responses(
        (status = 200, description = "Triaged registrations waiting to be seen, most urgent first", body = [Appointment])
    )
)]
pub async fn pending_visit(State(state): State<AppState>) -> Reply<Vec<Appointment>> {
    reply(state.appointments.pending_visit(), "fetched")
}

#[utoipa::path(
    get,
    path = "/appointments/patient/{id_card}",
    tag = "appointments",
    params(("id_card" = String, Path, description = "National id card number")),
    responses(
        (status = 200, description = "All registrations for the patient", body = [Appointment])
    )
)]
pub async fn find_by_patient_id_card(
    State(state): State<AppState>,
    ApiPath(id_card): ApiPath<String>,
) -> Reply<Vec<Appointment>> {
    reply(state.appointments.find_by_patient_id_card(&id_card), "fetched")
}

#[utoipa::path(
    get,
    path = "/appointments/{id}",
    tag = "appointments",
    params(("id" = u64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "The appointment", body = Appointment),
        (status = 404, description = "No appointment with this id")
    )
)]
pub async fn find_one(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Reply<Appointment> {
    reply(state.appointments.find_one(id), "fetched")
}

#[utoipa::path(
    patch,
    path = "/appointments/{id}",
    tag = "appointments",
    params(("id" = u64, Path, description = "Appointment id")),
    request_body = AppointmentPatch,
    responses(
        (status = 200, description = "Updated appointment", body = Appointment),
        (status = 400, description = "Empty or malformed patch"),
        (status = 404, description = "No appointment with this id"),
        (status = 409, description = "Record changed concurrently")
    )
)]
/// Administrative override.
///
/// Writes any supplied field directly, including the three statuses, without consulting the
/// transition tables.
pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(patch): ApiJson<AppointmentPatch>,
) -> Reply<Appointment> {
    reply(state.appointments.update(id, patch), "updated")
}

#[utoipa::path(
    delete,
    path = "/appointments/{id}",
    tag = "appointments",
    params(("id" = u64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Deleted; `data` is null"),
        (status = 404, description = "No appointment with this id")
    )
)]
pub async fn remove(State(state): State<AppState>, ApiPath(id): ApiPath<u64>) -> Reply<()> {
    reply(state.appointments.remove(id), "deleted")
}

#[utoipa::path(
    patch,
    path = "/appointments/{id}/confirm",
    tag = "appointments",
    params(("id" = u64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment after the transition", body = Appointment),
        (status = 404, description = "No appointment with this id"),
        (status = 409, description = "Transition not allowed from the current state")
    )
)]
/// Confirm the registration.
pub async fn confirm(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Reply<Appointment> {
    reply(state.appointments.confirm(id), "confirmed")
}

#[utoipa::path(
    patch,
    path = "/appointments/{id}/cancel",
    tag = "appointments",
    params(("id" = u64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment after the transition", body = Appointment),
        (status = 404, description = "No appointment with this id"),
        (status = 409, description = "Transition not allowed from the current state")
    )
)]
/// Cancel the registration.
pub async fn cancel(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Reply<Appointment> {
    reply(state.appointments.cancel(id), "cancelled")
}

#[utoipa::path(
    patch,
    path = "/appointments/{id}/start-triage",
    tag = "appointments",
    params(("id" = u64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment after the transition", body = Appointment),
        (status = 404, description = "No appointment with this id"),
        (status = 409, description = "Transition not allowed from the current state")
    )
)]
/// Move triage to `in_progress`.
pub async fn start_triage(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Reply<Appointment> {
    reply(state.appointments.start_triage(id), "triage started")
}

#[utoipa::path(
    patch,
    path = "/appointments/{id}/skip-triage",
    tag = "appointments",
    params(("id" = u64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment after the transition", body = Appointment),
        (status = 404, description = "No appointment with this id"),
        (status = 409, description = "Transition not allowed from the current state")
    )
)]
/// Bypass triage. Repeating it is harmless.
pub async fn skip_triage(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Reply<Appointment> {
    reply(state.appointments.skip_triage(id), "triage skipped")
}

#[utoipa::path(
    patch,
    path = "/appointments/{id}/start-visit",
    tag = "appointments",
    params(("id" = u64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment after the transition", body = Appointment),
        (status = 404, description = "No appointment with this id"),
        (status = 409, description = "Transition not allowed from the current state")
    )
)]
/// Start the visit and stamp `visitStartTime`.
pub async fn start_visit(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Reply<Appointment> {
    reply(state.appointments.start_visit(id), "visit started")
}

#[utoipa::path(
    patch,
    path = "/appointments/{id}/miss-visit",
    tag = "appointments",
    params(("id" = u64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment after the transition", body = Appointment),
        (status = 404, description = "No appointment with this id"),
        (status = 409, description = "Transition not allowed from the current state")
    )
)]
pub async fn miss_visit(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Reply<Appointment> {
    reply(state.appointments.miss_visit(id), "visit marked missed")
}

#[utoipa::path(
    patch,
    path = "/appointments/{id}/complete-triage",
    tag = "appointments",
    params(("id" = u64, Path, description = "Appointment id")),
    request_body = TriageCompletion,
    responses(
        (status = 200, description = "Appointment with triage completed", body = Appointment),
        (status = 400, description = "Unknown field or priority outside 1..=5"),
        (status = 404, description = "No appointment with this id"),
        (status = 409, description = "Triage cannot complete from the current state")
    )
)]
/// Complete triage, recording room, priority and notes.
pub async fn complete_triage(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(outcome): ApiJson<TriageCompletion>,
) -> Reply<Appointment> {
    reply(
        state.appointments.complete_triage(id, outcome),
        "triage completed",
    )
}

#[utoipa::path(
    patch,
    path = "/appointments/{id}/complete-visit",
    tag = "appointments",
    params(("id" = u64, Path, description = "Appointment id")),
    request_body = VisitCompletion,
    responses(
        (status = 200, description = "Appointment with the visit completed", body = Appointment),
        (status = 400, description = "Unknown field in body"),
        (status = 404, description = "No appointment with this id"),
        (status = 409, description = "Visit cannot complete from the current state")
    )
)]
/// Complete the visit, stamping the end time and recording diagnosis and prescription.
pub async fn complete_visit(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(outcome): ApiJson<VisitCompletion>,
) -> Reply<Appointment> {
    reply(
        state.appointments.complete_visit(id, outcome),
        "visit completed",
    )
}
