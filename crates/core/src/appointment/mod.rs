//! Outpatient appointments: registration, triage and visit.

mod lifecycle;
mod model;
mod query;
mod service;

pub use lifecycle::{
    advance, AppointmentStatus, Lifecycle, StatusEvent, TransitionPolicy, TriageEvent,
    TriageStatus, VisitEvent, VisitStatus,
};
pub use model::{
    Appointment, AppointmentPatch, NewAppointment, Priority, TriageCompletion, VisitCompletion,
};
pub use query::{AppointmentQuery, StatusFilter};
pub use service::AppointmentService;
