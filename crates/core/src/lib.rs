//! # Clinic Core
//!
//! Core business logic for the clinic registration system.
//!
//! This crate contains the records, the lifecycle rules and their storage:
//! - Outpatient appointments moving through registration, triage and visit
//! - Inpatient admissions with the per-day discharge fee
//! - Staff accounts with argon2 password hashes and the default-admin bootstrap
//! - JSON file and in-memory record stores with optimistic versioning
//!
//! **No API concerns**: HTTP servers, envelopes and API-key checks belong in `api-rest` or
//! `api-shared`.

pub mod accounts;
pub mod admission;
pub mod appointment;
pub mod config;
pub mod constants;
pub mod error;
pub mod paging;
pub mod store;

pub use accounts::{AccountService, BootstrapOutcome, Role, UserAccount};
pub use admission::{
    compute_fee, Admission, AdmissionPatch, AdmissionService, AdmissionStatus, NewAdmission,
};
pub use appointment::{
    Appointment, AppointmentPatch, AppointmentQuery, AppointmentService, AppointmentStatus,
    NewAppointment, Priority, StatusFilter, TransitionPolicy, TriageCompletion, TriageStatus,
    VisitCompletion, VisitStatus,
};
pub use config::{transition_policy_from_env_value, CoreConfig};
pub use error::{ClinicError, ClinicResult};
pub use paging::{Page, PageRequest, Pagination};
pub use store::{InMemoryStore, JsonFileStore, Record, RecordStore};
