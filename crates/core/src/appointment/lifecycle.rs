//! Appointment lifecycle state machines.
//!
//! A registration moves through three coupled dimensions:
//!
//! ```text
//! status:  pending ──confirm──▶ confirmed
//!             └─────cancel───▶ cancelled
//!
//! triage:  pending ──start──▶ in_progress ──complete──▶ completed
//!             └──────skip──▶ skipped
//!
//! visit:   pending ──start──▶ in_progress ──complete──▶ completed
//!             └──────miss──▶ missed
//! ```
//!
//! Each dimension is a [`Lifecycle`] with its own transition table. Whether the table is
//! enforced is decided by the configured [`TransitionPolicy`]:
//!
//! - [`TransitionPolicy::Permissive`] applies every event unconditionally, matching how the
//!   registration desk has always worked.
//! - [`TransitionPolicy::Strict`] rejects events the table does not allow with
//!   [`ClinicError::InvalidTransition`], and additionally requires a confirmed registration
//!   before any triage or visit event and a finished triage before a visit starts.
//!
//! Under both policies, re-applying an event whose target is the current state succeeds
//! without change.

use super::model::{Appointment, TriageCompletion, VisitCompletion};
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

// ============================================================================
// POLICY
// ============================================================================

/// How strictly transition tables are enforced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Every transition is applied regardless of the current state.
    #[default]
    Permissive,
    /// Disallowed transitions fail with a conflict.
    Strict,
}

impl FromStr for TransitionPolicy {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => Err(ClinicError::InvalidInput(format!(
                "unknown transition policy '{other}' (expected 'permissive' or 'strict')"
            ))),
        }
    }
}

impl fmt::Display for TransitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permissive => f.write_str("permissive"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

// ============================================================================
// GENERIC STATE MACHINE
// ============================================================================

/// One status dimension of an appointment.
pub trait Lifecycle: Copy + Eq + fmt::Display {
    type Event: Copy + fmt::Display;

    /// Name of the dimension, used in conflict messages.
    const DIMENSION: &'static str;

    /// The state an event leads to.
    fn target(event: Self::Event) -> Self;

    /// The transition table: whether `event` may fire from `self`.
    fn permits(self, event: Self::Event) -> bool;
}

/// Computes the next state of one dimension under `policy`.
///
/// # Errors
///
/// Returns [`ClinicError::InvalidTransition`] when the policy is strict, the event is not in
/// the table for `current`, and `current` is not already the target.
pub fn advance<L: Lifecycle>(
    current: L,
    event: L::Event,
    policy: TransitionPolicy,
) -> ClinicResult<L> {
    let target = L::target(event);
    if policy == TransitionPolicy::Permissive || current == target || current.permits(event) {
        return Ok(target);
    }
    Err(ClinicError::InvalidTransition {
        dimension: L::DIMENSION,
        from: current.to_string(),
        event: event.to_string(),
    })
}

macro_rules! status_tags {
    ($ty:ident { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl $ty {
            /// All states, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// The lowercase wire tag.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $tag),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ClinicError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($ty::$variant),)+
                    other => Err(ClinicError::InvalidInput(format!(
                        "unknown {} '{}'",
                        <$ty as Lifecycle>::DIMENSION,
                        other
                    ))),
                }
            }
        }
    };
}

// ============================================================================
// REGISTRATION STATUS
// ============================================================================

/// Registration-level disposition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusEvent {
    Confirm,
    Cancel,
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirm => f.write_str("confirm"),
            Self::Cancel => f.write_str("cancel"),
        }
    }
}

impl Lifecycle for AppointmentStatus {
    type Event = StatusEvent;
    const DIMENSION: &'static str = "status";

    fn target(event: StatusEvent) -> Self {
        match event {
            StatusEvent::Confirm => Self::Confirmed,
            StatusEvent::Cancel => Self::Cancelled,
        }
    }

    fn permits(self, _event: StatusEvent) -> bool {
        matches!(self, Self::Pending)
    }
}

status_tags!(AppointmentStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
});

// ============================================================================
// TRIAGE STATUS
// ============================================================================

/// Progress of the triage sub-workflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriageEvent {
    Start,
    Complete,
    Skip,
}

impl fmt::Display for TriageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start triage"),
            Self::Complete => f.write_str("complete triage"),
            Self::Skip => f.write_str("skip triage"),
        }
    }
}

impl Lifecycle for TriageStatus {
    type Event = TriageEvent;
    const DIMENSION: &'static str = "triage status";

    fn target(event: TriageEvent) -> Self {
        match event {
            TriageEvent::Start => Self::InProgress,
            TriageEvent::Complete => Self::Completed,
            TriageEvent::Skip => Self::Skipped,
        }
    }

    fn permits(self, event: TriageEvent) -> bool {
        matches!(
            (self, event),
            (Self::Pending, TriageEvent::Start)
                | (Self::Pending, TriageEvent::Skip)
                | (Self::InProgress, TriageEvent::Complete)
        )
    }
}

status_tags!(TriageStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Skipped => "skipped",
});

impl TriageStatus {
    /// Whether triage no longer blocks the visit.
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

// ============================================================================
// VISIT STATUS
// ============================================================================

/// Progress of the clinical encounter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Missed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitEvent {
    Start,
    Complete,
    Miss,
}

impl fmt::Display for VisitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start visit"),
            Self::Complete => f.write_str("complete visit"),
            Self::Miss => f.write_str("mark visit missed"),
        }
    }
}

impl Lifecycle for VisitStatus {
    type Event = VisitEvent;
    const DIMENSION: &'static str = "visit status";

    fn target(event: VisitEvent) -> Self {
        match event {
            VisitEvent::Start => Self::InProgress,
            VisitEvent::Complete => Self::Completed,
            VisitEvent::Miss => Self::Missed,
        }
    }

    fn permits(self, event: VisitEvent) -> bool {
        matches!(
            (self, event),
            (Self::Pending, VisitEvent::Start)
                | (Self::Pending, VisitEvent::Miss)
                | (Self::InProgress, VisitEvent::Complete)
        )
    }
}

status_tags!(VisitStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Missed => "missed",
});

// ============================================================================
// TRANSITIONS ON THE RECORD
// ============================================================================

impl Appointment {
    pub fn confirm(&mut self, policy: TransitionPolicy) -> ClinicResult<()> {
        self.status = advance(self.status, StatusEvent::Confirm, policy)?;
        Ok(())
    }

    pub fn cancel(&mut self, policy: TransitionPolicy) -> ClinicResult<()> {
        self.status = advance(self.status, StatusEvent::Cancel, policy)?;
        Ok(())
    }

    pub fn start_triage(&mut self, policy: TransitionPolicy) -> ClinicResult<()> {
        self.apply_triage(TriageEvent::Start, policy)
    }

    /// Completes triage and records the room, priority and notes that were supplied.
    ///
    /// Fields left as `None` in `outcome` keep their current value.
    pub fn complete_triage(
        &mut self,
        outcome: TriageCompletion,
        policy: TransitionPolicy,
    ) -> ClinicResult<()> {
        self.apply_triage(TriageEvent::Complete, policy)?;

        if let Some(room_id) = outcome.room_id {
            self.room_id = Some(room_id);
        }
        if let Some(priority) = outcome.priority {
            self.priority = Some(priority);
        }
        if let Some(notes) = outcome.triage_notes {
            self.triage_notes = Some(notes);
        }
        Ok(())
    }

    pub fn skip_triage(&mut self, policy: TransitionPolicy) -> ClinicResult<()> {
        self.apply_triage(TriageEvent::Skip, policy)
    }

    /// Starts the visit and stamps `visit_start_time` with `now`. Under the strict policy a
    /// repeated start is a self-transition and keeps the first stamp.
    pub fn start_visit(&mut self, policy: TransitionPolicy, now: DateTime<Utc>) -> ClinicResult<()> {
        if policy == TransitionPolicy::Strict
            && self.visit_status != VisitStatus::InProgress
            && !self.triage_status.is_resolved()
        {
            return Err(ClinicError::InvalidTransition {
                dimension: TriageStatus::DIMENSION,
                from: self.triage_status.to_string(),
                event: VisitEvent::Start.to_string(),
            });
        }
        let previous = self.visit_status;
        self.apply_visit(VisitEvent::Start, policy)?;
        if keeps_stamp(policy, previous, VisitStatus::InProgress, self.visit_start_time) {
            return Ok(());
        }
        self.visit_start_time = Some(now);
        Ok(())
    }

    /// Completes the visit, stamps `visit_end_time` with `now` and records the outcome. Under the
    /// strict policy a repeated completion keeps the first end stamp.
    pub fn complete_visit(
        &mut self,
        outcome: VisitCompletion,
        policy: TransitionPolicy,
        now: DateTime<Utc>,
    ) -> ClinicResult<()> {
        let previous = self.visit_status;
        self.apply_visit(VisitEvent::Complete, policy)?;
        if !keeps_stamp(policy, previous, VisitStatus::Completed, self.visit_end_time) {
            self.visit_end_time = Some(now);
        }

        if let Some(diagnosis) = outcome.diagnosis {
            self.diagnosis = Some(diagnosis);
        }
        if let Some(prescription) = outcome.prescription {
            self.prescription = Some(prescription);
        }
        Ok(())
    }

    pub fn miss_visit(&mut self, policy: TransitionPolicy) -> ClinicResult<()> {
        self.apply_visit(VisitEvent::Miss, policy)
    }

    fn apply_triage(&mut self, event: TriageEvent, policy: TransitionPolicy) -> ClinicResult<()> {
        self.require_confirmed(event, policy)?;
        self.triage_status = advance(self.triage_status, event, policy)?;
        Ok(())
    }

    fn apply_visit(&mut self, event: VisitEvent, policy: TransitionPolicy) -> ClinicResult<()> {
        self.require_confirmed(event, policy)?;
        self.visit_status = advance(self.visit_status, event, policy)?;
        Ok(())
    }

    /// Triage and visit work only happens on confirmed registrations under a strict policy.
    fn require_confirmed(
        &self,
        event: impl fmt::Display,
        policy: TransitionPolicy,
    ) -> ClinicResult<()> {
        if policy == TransitionPolicy::Strict && self.status != AppointmentStatus::Confirmed {
            return Err(ClinicError::InvalidTransition {
                dimension: AppointmentStatus::DIMENSION,
                from: self.status.to_string(),
                event: event.to_string(),
            });
        }
        Ok(())
    }
}

/// True when a repeated strict transition into `target` should leave an existing stamp alone.
fn keeps_stamp(
    policy: TransitionPolicy,
    previous: VisitStatus,
    target: VisitStatus,
    stamp: Option<DateTime<Utc>>,
) -> bool {
    policy == TransitionPolicy::Strict && previous == target && stamp.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::model::tests::sample_appointment;
    use crate::appointment::Priority;
    use chrono::Duration;

    const STRICT: TransitionPolicy = TransitionPolicy::Strict;
    const PERMISSIVE: TransitionPolicy = TransitionPolicy::Permissive;

    fn confirmed() -> Appointment {
        let mut appointment = sample_appointment();
        appointment.confirm(STRICT).unwrap();
        appointment
    }

    #[test]
    fn wire_tags_round_trip_through_from_str() {
        for status in TriageStatus::ALL {
            assert_eq!(status.as_str().parse::<TriageStatus>().unwrap(), *status);
        }
        for status in VisitStatus::ALL {
            assert_eq!(status.as_str().parse::<VisitStatus>().unwrap(), *status);
        }
        assert!("in progress".parse::<TriageStatus>().is_err());
    }

    #[test]
    fn serde_uses_snake_case_tags() {
        let json = serde_json::to_string(&TriageStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let status: VisitStatus = serde_json::from_str("\"missed\"").unwrap();
        assert_eq!(status, VisitStatus::Missed);
    }

    #[test]
    fn permissive_confirm_overrides_cancelled() {
        let mut appointment = sample_appointment();
        appointment.cancel(PERMISSIVE).unwrap();
        appointment.confirm(PERMISSIVE).unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn strict_confirm_of_cancelled_is_conflict() {
        let mut appointment = sample_appointment();
        appointment.cancel(STRICT).unwrap();
        let err = appointment.confirm(STRICT).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "cannot confirm when status is cancelled");
        assert_eq!(appointment.status, AppointmentStatus::Cancelled);
    }

    #[test]
    fn confirm_leaves_other_dimensions_untouched() {
        let mut appointment = sample_appointment();
        let before = appointment.clone();
        appointment.confirm(PERMISSIVE).unwrap();
        assert_eq!(appointment.triage_status, before.triage_status);
        assert_eq!(appointment.visit_status, before.visit_status);
        assert_eq!(appointment.patient_name, before.patient_name);
        assert_eq!(appointment.room_id, None);
    }

    #[test]
    fn skip_triage_is_idempotent_under_both_policies() {
        for policy in [PERMISSIVE, STRICT] {
            let mut appointment = confirmed();
            appointment.skip_triage(policy).unwrap();
            appointment.skip_triage(policy).unwrap();
            assert_eq!(appointment.triage_status, TriageStatus::Skipped);
        }
    }

    #[test]
    fn strict_triage_requires_confirmed_registration() {
        let mut appointment = sample_appointment();
        let err = appointment.start_triage(STRICT).unwrap_err();
        assert!(matches!(
            err,
            ClinicError::InvalidTransition { dimension: "status", .. }
        ));
        assert_eq!(appointment.triage_status, TriageStatus::Pending);
    }

    #[test]
    fn strict_complete_triage_requires_in_progress() {
        let mut appointment = confirmed();
        let err = appointment
            .complete_triage(TriageCompletion::default(), STRICT)
            .unwrap_err();
        assert!(err.is_conflict());

        appointment.start_triage(STRICT).unwrap();
        appointment
            .complete_triage(
                TriageCompletion {
                    room_id: Some(3),
                    priority: Some(Priority::new(2).unwrap()),
                    triage_notes: Some("fever, prioritise".into()),
                },
                STRICT,
            )
            .unwrap();
        assert_eq!(appointment.triage_status, TriageStatus::Completed);
        assert_eq!(appointment.room_id, Some(3));
        assert_eq!(appointment.priority.map(Priority::get), Some(2));
    }

    #[test]
    fn complete_triage_keeps_fields_that_were_not_supplied() {
        let mut appointment = confirmed();
        appointment.room_id = Some(7);
        appointment.start_triage(STRICT).unwrap();
        appointment
            .complete_triage(
                TriageCompletion {
                    triage_notes: Some("stable".into()),
                    ..TriageCompletion::default()
                },
                STRICT,
            )
            .unwrap();
        assert_eq!(appointment.room_id, Some(7));
        assert_eq!(appointment.triage_notes.as_deref(), Some("stable"));
    }

    #[test]
    fn strict_start_visit_requires_resolved_triage() {
        let mut appointment = confirmed();
        let err = appointment.start_visit(STRICT, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            ClinicError::InvalidTransition { dimension: "triage status", .. }
        ));
        assert!(appointment.visit_start_time.is_none());

        appointment.skip_triage(STRICT).unwrap();
        appointment.start_visit(STRICT, Utc::now()).unwrap();
        assert_eq!(appointment.visit_status, VisitStatus::InProgress);
    }

    #[test]
    fn visit_timestamps_follow_transitions() {
        let mut appointment = confirmed();
        appointment.skip_triage(STRICT).unwrap();

        let started = Utc::now();
        appointment.start_visit(STRICT, started).unwrap();
        assert_eq!(appointment.visit_start_time, Some(started));
        assert!(appointment.visit_end_time.is_none());

        let ended = started + Duration::minutes(15);
        appointment
            .complete_visit(
                VisitCompletion {
                    diagnosis: Some("D".into()),
                    prescription: Some("P".into()),
                },
                STRICT,
                ended,
            )
            .unwrap();
        assert_eq!(appointment.visit_status, VisitStatus::Completed);
        assert_eq!(appointment.visit_end_time, Some(ended));
        assert_eq!(appointment.diagnosis.as_deref(), Some("D"));
        assert_eq!(appointment.prescription.as_deref(), Some("P"));
    }

    #[test]
    fn strict_miss_after_start_is_conflict() {
        let mut appointment = confirmed();
        appointment.skip_triage(STRICT).unwrap();
        appointment.start_visit(STRICT, Utc::now()).unwrap();
        assert!(appointment.miss_visit(STRICT).unwrap_err().is_conflict());
        assert!(appointment.miss_visit(PERMISSIVE).is_ok());
        assert_eq!(appointment.visit_status, VisitStatus::Missed);
    }

    #[test]
    fn repeated_strict_start_visit_keeps_first_stamp() {
        let mut appointment = confirmed();
        appointment.skip_triage(STRICT).unwrap();
        let first = Utc::now();
        appointment.start_visit(STRICT, first).unwrap();
        appointment
            .start_visit(STRICT, first + Duration::minutes(5))
            .unwrap();
        assert_eq!(appointment.visit_start_time, Some(first));
    }

    #[test]
    fn repeated_permissive_visit_calls_restamp() {
        let mut appointment = sample_appointment();
        let first = Utc::now();
        let later = first + Duration::minutes(5);

        appointment.start_visit(PERMISSIVE, first).unwrap();
        appointment.start_visit(PERMISSIVE, later).unwrap();
        assert_eq!(appointment.visit_start_time, Some(later));

        appointment
            .complete_visit(VisitCompletion::default(), PERMISSIVE, first)
            .unwrap();
        appointment
            .complete_visit(VisitCompletion::default(), PERMISSIVE, later)
            .unwrap();
        assert_eq!(appointment.visit_end_time, Some(later));
    }

    #[test]
    fn advance_table_matches_diagram() {
        assert!(TriageStatus::Pending.permits(TriageEvent::Start));
        assert!(TriageStatus::Pending.permits(TriageEvent::Skip));
        assert!(!TriageStatus::Pending.permits(TriageEvent::Complete));
        assert!(!TriageStatus::Skipped.permits(TriageEvent::Start));
        assert!(VisitStatus::InProgress.permits(VisitEvent::Complete));
        assert!(!VisitStatus::Missed.permits(VisitEvent::Start));
        assert!(!AppointmentStatus::Confirmed.permits(StatusEvent::Cancel));
    }
}
