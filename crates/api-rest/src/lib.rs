//! # API REST
//!
//! REST API implementation for the clinic.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON envelopes, API-key check, CORS, request tracing)
//!
//! Uses `api-shared` for the envelope and health types and `clinic-core` for everything else.

#![warn(rust_2018_idioms)]

pub mod admissions;
pub mod appointments;
pub mod extract;

use anyhow::Context;
use api_shared::envelope::UNAUTHORIZED;
use api_shared::{validate_api_key, ApiResponse, HealthRes, HealthService, API_KEY_HEADER};
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post};
use axum::Router;
use clinic_core::constants::{DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME, DEFAULT_DATA_DIR};
use clinic_core::{
    transition_policy_from_env_value, AccountService, Admission, AdmissionPatch,
    AdmissionService, Appointment, AppointmentPatch, AppointmentService, AppointmentStatus,
    BootstrapOutcome, ClinicResult, CoreConfig, JsonFileStore, NewAdmission, NewAppointment,
    Pagination, RecordStore, TriageCompletion, TriageStatus, UserAccount, VisitCompletion,
    VisitStatus,
};
use extract::Reply;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Default listen address of the REST server.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3456";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub appointments: AppointmentService,
    pub admissions: AdmissionService,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        appointments: AppointmentService,
        admissions: AdmissionService,
        api_key: Option<String>,
    ) -> Self {
        Self {
            appointments,
            admissions,
            api_key: api_key.map(Arc::from),
        }
    }

    /// Builds services over the JSON file stores under the configured data directory.
    pub fn open(cfg: &CoreConfig, api_key: Option<String>) -> ClinicResult<Self> {
        let appointments: Arc<dyn RecordStore<Appointment>> =
            Arc::new(JsonFileStore::<Appointment>::open(cfg.appointments_dir())?);
        let admissions: Arc<dyn RecordStore<Admission>> =
            Arc::new(JsonFileStore::<Admission>::open(cfg.admissions_dir())?);
        Ok(Self::new(
            AppointmentService::new(appointments, cfg),
            AdmissionService::new(admissions, cfg),
            api_key,
        ))
    }
}

/// Server settings resolved once from the environment.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: listen address (default: "0.0.0.0:3456")
/// - `CLINIC_DATA_DIR`: record storage directory (default: "clinic_data")
/// - `CLINIC_TRANSITION_POLICY`: `permissive` (default) or `strict`
/// - `CLINIC_API_KEY`: when set, required in the `x-api-key` header
/// - `DEFAULT_ADMIN_USERNAME` / `DEFAULT_ADMIN_PASSWORD`: bootstrap administrator
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
    pub core: CoreConfig,
    pub api_key: Option<String>,
    pub admin_username: String,
    pub admin_password: String,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
        let data_dir = std::env::var("CLINIC_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
        let policy =
            transition_policy_from_env_value(std::env::var("CLINIC_TRANSITION_POLICY").ok())?;
        let api_key = std::env::var("CLINIC_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        Ok(Self {
            addr,
            core: CoreConfig::new(PathBuf::from(data_dir), policy)?,
            api_key,
            admin_username: std::env::var("DEFAULT_ADMIN_USERNAME")
                .unwrap_or_else(|_| DEFAULT_ADMIN_USERNAME.into()),
            admin_password: std::env::var("DEFAULT_ADMIN_PASSWORD")
                .unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.into()),
        })
    }
}

/// Makes sure the configured administrator exists in the account store.
pub fn bootstrap_admin(config: &ServerConfig) -> ClinicResult<BootstrapOutcome> {
    let store = JsonFileStore::<UserAccount>::open(config.core.users_dir())?;
    let accounts = AccountService::new(Arc::new(store));
    accounts.bootstrap_default_admin(&config.admin_username, &config.admin_password)
}

/// Bootstraps the administrator, then serves the API until ctrl-c.
///
/// # Errors
/// Returns an error if:
/// - the data directory cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    if bootstrap_admin(&config).context("bootstrapping default administrator")?
        == BootstrapOutcome::Created
    {
        tracing::warn!(
            "created default administrator '{}'; change its password",
            config.admin_username
        );
    }

    let state = AppState::open(&config.core, config.api_key.clone())?;
    tracing::info!(
        data_dir = %config.core.data_dir().display(),
        policy = %config.core.transition_policy(),
        api_key = config.api_key.is_some(),
        "-- Starting clinic REST API on {}",
        config.addr
    );

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutting down");
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        appointments::create,
        appointments::find_all,
        appointments::pending_triage,
        appointments::pending_visit,
        appointments::find_by_patient_id_card,
        appointments::find_one,
        appointments::update,
        appointments::remove,
        appointments::confirm,
        appointments::cancel,
        appointments::start_triage,
        appointments::complete_triage,
        appointments::skip_triage,
        appointments::start_visit,
        appointments::complete_visit,
        appointments::miss_visit,
        admissions::admit,
        admissions::find_all,
        admissions::find_one,
        admissions::update,
        admissions::remove,
        admissions::discharge,
    ),
    components(schemas(
        HealthRes,
        Appointment,
        NewAppointment,
        AppointmentPatch,
        TriageCompletion,
        VisitCompletion,
        AppointmentStatus,
        TriageStatus,
        VisitStatus,
        Admission,
        NewAdmission,
        AdmissionPatch,
        Pagination,
    )),
    tags(
        (name = "appointments", description = "Outpatient registration, triage and visit"),
        (name = "admissions", description = "Inpatient admission and discharge")
    )
)]
pub struct ApiDoc;

/// Builds the full application router.
///
/// `/health` and the API documentation are always open; everything else goes through the
/// API-key check when a key is configured.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/appointments",
            post(appointments::create).get(appointments::find_all),
        )
        .route("/appointments/pending-triage", get(appointments::pending_triage))
        .route("/appointments/pending-visit", get(appointments::pending_visit))
        .route(
            "/appointments/patient/:id_card",
            get(appointments::find_by_patient_id_card),
        )
        .route(
            "/appointments/:id",
            get(appointments::find_one)
                .patch(appointments::update)
                .delete(appointments::remove),
        )
        .route("/appointments/:id/confirm", patch(appointments::confirm))
        .route("/appointments/:id/cancel", patch(appointments::cancel))
        .route("/appointments/:id/start-triage", patch(appointments::start_triage))
        .route(
            "/appointments/:id/complete-triage",
            patch(appointments::complete_triage),
        )
        .route("/appointments/:id/skip-triage", patch(appointments::skip_triage))
        .route("/appointments/:id/start-visit", patch(appointments::start_visit))
        .route(
            "/appointments/:id/complete-visit",
            patch(appointments::complete_visit),
        )
        .route("/appointments/:id/miss-visit", patch(appointments::miss_visit))
        .route("/admissions", post(admissions::admit).get(admissions::find_all))
        .route(
            "/admissions/:id",
            get(admissions::find_one)
                .patch(admissions::update)
                .delete(admissions::remove),
        )
        .route("/admissions/:id/discharge", post(admissions::discharge))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers. Never requires an API key.
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    match validate_api_key(provided, expected) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), "rejected request: {}", e);
            Reply(ApiResponse::<()>::error(UNAUTHORIZED, e.to_string())).into_response()
        }
    }
}
