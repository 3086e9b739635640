//! Appointment lifecycle engine.
//!
//! Every operation is a single read-modify-write against one record: load it, apply the
//! transition (or patch) in memory, and hand it back to the store. The store's version check
//! turns a concurrent write to the same record into [`ClinicError::StaleRecord`] instead of a
//! silent lost update.

use super::lifecycle::{TransitionPolicy, TriageStatus, VisitStatus};
use super::model::{Appointment, AppointmentPatch, NewAppointment, TriageCompletion, VisitCompletion};
use super::query::AppointmentQuery;
use crate::config::CoreConfig;
use crate::paging::{paginate, Page, PageRequest};
use crate::store::{Record, RecordStore};
use crate::{ClinicError, ClinicResult};
use chrono::Utc;
use std::sync::Arc;

/// Service owning the appointment lifecycle.
#[derive(Clone)]
pub struct AppointmentService {
    store: Arc<dyn RecordStore<Appointment>>,
    policy: TransitionPolicy,
    max_page_size: u64,
}

impl AppointmentService {
    /// Creates a service over `store` using the policy and paging limits from `cfg`.
    pub fn new(store: Arc<dyn RecordStore<Appointment>>, cfg: &CoreConfig) -> Self {
        Self {
            store,
            policy: cfg.transition_policy(),
            max_page_size: cfg.max_page_size(),
        }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Clamps raw paging parameters to this service's limits.
    pub fn page_request(&self, page: Option<i64>, page_size: Option<i64>) -> PageRequest {
        PageRequest::new(page, page_size, self.max_page_size)
    }

    // ------------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------------

    /// Registers a patient. Statuses not supplied start at `pending`.
    pub fn create(&self, input: NewAppointment) -> ClinicResult<Appointment> {
        let created = self.store.create(input.into_record())?;
        tracing::info!(
            id = created.id,
            doctor_id = created.doctor_id,
            department_id = created.department_id,
            "appointment registered"
        );
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns [`ClinicError::NotFound`] if no appointment has this id.
    pub fn find_one(&self, id: u64) -> ClinicResult<Appointment> {
        self.store.find_by_id(id)?.ok_or(ClinicError::NotFound {
            kind: Appointment::KIND,
            id,
        })
    }

    /// Administrative override: merges every present patch field, bypassing the transition
    /// tables.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidInput`] for an empty patch, or [`ClinicError::NotFound`].
    pub fn update(&self, id: u64, patch: AppointmentPatch) -> ClinicResult<Appointment> {
        if patch.is_empty() {
            return Err(ClinicError::InvalidInput(
                "update must change at least one field".into(),
            ));
        }
        let mut appointment = self.find_one(id)?;
        patch.apply_to(&mut appointment);
        let saved = self.store.update(appointment)?;
        tracing::info!(id, "appointment updated by administrative override");
        Ok(saved)
    }

    pub fn remove(&self, id: u64) -> ClinicResult<()> {
        if !self.store.delete(id)? {
            return Err(ClinicError::NotFound {
                kind: Appointment::KIND,
                id,
            });
        }
        tracing::info!(id, "appointment removed");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // QUERIES
    // ------------------------------------------------------------------------

    /// Lists appointments matching every criterion in `query`, newest first.
    pub fn find_all(&self, query: &AppointmentQuery) -> ClinicResult<Page<Appointment>> {
        let mut matches = self.store.find_many(&|a| query.matches(a))?;
        newest_first(&mut matches);
        tracing::debug!(
            total = matches.len(),
            page = query.page.page(),
            page_size = query.page.page_size(),
            "appointment query"
        );
        Ok(paginate(matches, query.page))
    }

    /// All registrations for one national id card number, newest first.
    pub fn find_by_patient_id_card(&self, id_card: &str) -> ClinicResult<Vec<Appointment>> {
        let id_card = id_card.trim();
        let mut matches = self.store.find_many(&|a| a.patient_id_card == id_card)?;
        newest_first(&mut matches);
        Ok(matches)
    }

    /// Registrations still waiting for triage.
    pub fn pending_triage(&self) -> ClinicResult<Vec<Appointment>> {
        let mut matches = self
            .store
            .find_many(&|a| a.triage_status == TriageStatus::Pending)?;
        oldest_first(&mut matches);
        Ok(matches)
    }

    /// Triaged registrations still waiting to be seen.
    pub fn pending_visit(&self) -> ClinicResult<Vec<Appointment>> {
        let mut matches = self.store.find_many(&|a| {
            a.visit_status == VisitStatus::Pending && a.triage_status == TriageStatus::Completed
        })?;
        // Most urgent first; unprioritised records go last.
        matches.sort_by_key(|a| (a.priority.map_or(u8::MAX, |p| p.get()), a.created_at, a.id));
        Ok(matches)
    }

    // ------------------------------------------------------------------------
    // TRANSITIONS
    // ------------------------------------------------------------------------

    pub fn confirm(&self, id: u64) -> ClinicResult<Appointment> {
        self.transition(id, "confirm", |a, policy| a.confirm(policy))
    }

    pub fn cancel(&self, id: u64) -> ClinicResult<Appointment> {
        self.transition(id, "cancel", |a, policy| a.cancel(policy))
    }

    pub fn start_triage(&self, id: u64) -> ClinicResult<Appointment> {
        self.transition(id, "start_triage", |a, policy| a.start_triage(policy))
    }

    pub fn complete_triage(&self, id: u64, outcome: TriageCompletion) -> ClinicResult<Appointment> {
        self.transition(id, "complete_triage", move |a, policy| {
            a.complete_triage(outcome, policy)
        })
    }

    pub fn skip_triage(&self, id: u64) -> ClinicResult<Appointment> {
        self.transition(id, "skip_triage", |a, policy| a.skip_triage(policy))
    }

    pub fn start_visit(&self, id: u64) -> ClinicResult<Appointment> {
        self.transition(id, "start_visit", |a, policy| a.start_visit(policy, Utc::now()))
    }

    pub fn complete_visit(&self, id: u64, outcome: VisitCompletion) -> ClinicResult<Appointment> {
        self.transition(id, "complete_visit", move |a, policy| {
            a.complete_visit(outcome, policy, Utc::now())
        })
    }

    pub fn miss_visit(&self, id: u64) -> ClinicResult<Appointment> {
        self.transition(id, "miss_visit", |a, policy| a.miss_visit(policy))
    }

    fn transition<F>(&self, id: u64, action: &'static str, apply: F) -> ClinicResult<Appointment>
    where
        F: FnOnce(&mut Appointment, TransitionPolicy) -> ClinicResult<()>,
    {
        let mut appointment = self.find_one(id)?;
        if let Err(err) = apply(&mut appointment, self.policy) {
            tracing::warn!(id, action, policy = %self.policy, "transition rejected: {}", err);
            return Err(err);
        }
        let saved = self.store.update(appointment)?;
        tracing::info!(
            id,
            action,
            status = %saved.status,
            triage_status = %saved.triage_status,
            visit_status = %saved.visit_status,
            "appointment transition applied"
        );
        Ok(saved)
    }
}

fn newest_first(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn oldest_first(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::model::tests::new_appointment;
    use crate::appointment::{AppointmentStatus, Priority, StatusFilter};
    use crate::store::InMemoryStore;
    use std::path::PathBuf;

    fn service(policy: TransitionPolicy) -> AppointmentService {
        let cfg = CoreConfig::new(PathBuf::from("unused"), policy).unwrap();
        AppointmentService::new(Arc::new(InMemoryStore::<Appointment>::new()), &cfg)
    }

    fn registered(service: &AppointmentService) -> Appointment {
        service
            .create(new_appointment("Zhang San", "110101199001011234"))
            .expect("create should succeed")
    }

    #[test]
    fn create_then_find_one_returns_defaults() {
        let service = service(TransitionPolicy::Permissive);
        let created = registered(&service);

        let found = service.find_one(created.id).unwrap();
        assert_eq!(found, created);
        assert_eq!(found.status, AppointmentStatus::Pending);
        assert_eq!(found.triage_status, TriageStatus::Pending);
        assert_eq!(found.visit_status, VisitStatus::Pending);
        assert_eq!(found.patient_name, "Zhang San");
        assert!(found.id > 0);
        assert_eq!(found.version, 1);
    }

    #[test]
    fn every_single_record_operation_reports_not_found() {
        let service = service(TransitionPolicy::Strict);
        let missing = 999;

        let results: Vec<ClinicResult<()>> = vec![
            service.find_one(missing).map(drop),
            service.confirm(missing).map(drop),
            service.cancel(missing).map(drop),
            service.start_triage(missing).map(drop),
            service
                .complete_triage(missing, TriageCompletion::default())
                .map(drop),
            service.skip_triage(missing).map(drop),
            service.start_visit(missing).map(drop),
            service
                .complete_visit(missing, VisitCompletion::default())
                .map(drop),
            service.miss_visit(missing).map(drop),
            service
                .update(
                    missing,
                    AppointmentPatch {
                        doctor_id: Some(3),
                        ..AppointmentPatch::default()
                    },
                )
                .map(drop),
            service.remove(missing),
        ];

        for result in results {
            assert!(
                matches!(result, Err(ClinicError::NotFound { id: 999, .. })),
                "expected NotFound, got {result:?}"
            );
        }
    }

    #[test]
    fn confirm_changes_only_status() {
        let service = service(TransitionPolicy::Permissive);
        let created = registered(&service);

        let confirmed = service.confirm(created.id).unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
        assert_eq!(confirmed.triage_status, created.triage_status);
        assert_eq!(confirmed.visit_status, created.visit_status);
        assert_eq!(confirmed.patient_id_card, created.patient_id_card);
        assert_eq!(confirmed.description, created.description);
        assert_eq!(confirmed.version, created.version + 1);
    }

    #[test]
    fn visit_flow_stamps_ordered_times() {
        let service = service(TransitionPolicy::Strict);
        let id = registered(&service).id;
        service.confirm(id).unwrap();
        service.skip_triage(id).unwrap();

        let before_start = Utc::now();
        let started = service.start_visit(id).unwrap();
        let start_time = started.visit_start_time.expect("start time set");
        assert!(start_time >= before_start);
        assert_eq!(started.visit_status, VisitStatus::InProgress);

        let completed = service
            .complete_visit(
                id,
                VisitCompletion {
                    diagnosis: Some("D".into()),
                    prescription: Some("P".into()),
                },
            )
            .unwrap();
        assert_eq!(completed.visit_status, VisitStatus::Completed);
        assert!(completed.visit_end_time.expect("end time set") >= start_time);
        assert_eq!(completed.diagnosis.as_deref(), Some("D"));
        assert_eq!(completed.prescription.as_deref(), Some("P"));
    }

    #[test]
    fn skip_triage_twice_succeeds() {
        let service = service(TransitionPolicy::Permissive);
        let id = registered(&service).id;
        assert_eq!(
            service.skip_triage(id).unwrap().triage_status,
            TriageStatus::Skipped
        );
        assert_eq!(
            service.skip_triage(id).unwrap().triage_status,
            TriageStatus::Skipped
        );
    }

    #[test]
    fn strict_rejection_leaves_record_unchanged() {
        let service = service(TransitionPolicy::Strict);
        let id = registered(&service).id;
        service.cancel(id).unwrap();

        let err = service.confirm(id).unwrap_err();
        assert!(err.is_conflict());

        let stored = service.find_one(id).unwrap();
        assert_eq!(stored.status, AppointmentStatus::Cancelled);
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn complete_triage_records_outcome() {
        let service = service(TransitionPolicy::Strict);
        let id = registered(&service).id;
        service.confirm(id).unwrap();
        service.start_triage(id).unwrap();

        let triaged = service
            .complete_triage(
                id,
                TriageCompletion {
                    room_id: Some(3),
                    priority: Some(Priority::new(2).unwrap()),
                    triage_notes: Some("triage complete".into()),
                },
            )
            .unwrap();
        assert_eq!(triaged.triage_status, TriageStatus::Completed);
        assert_eq!(triaged.room_id, Some(3));
        assert_eq!(triaged.priority, Priority::new(2).ok());
        assert_eq!(triaged.triage_notes.as_deref(), Some("triage complete"));
        assert!(triaged.visit_start_time.is_none());
    }

    #[test]
    fn update_applies_patch_and_rejects_empty_patch() {
        let service = service(TransitionPolicy::Strict);
        let id = registered(&service).id;

        let err = service.update(id, AppointmentPatch::default()).unwrap_err();
        assert!(err.is_invalid_input());

        let updated = service
            .update(
                id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Cancelled),
                    description: Some(Some("rescheduled by phone".into())),
                    ..AppointmentPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Cancelled);
        assert_eq!(updated.description.as_deref(), Some("rescheduled by phone"));
    }

    #[test]
    fn update_can_reset_triage_and_clear_its_outcome() {
        let service = service(TransitionPolicy::Permissive);
        let id = registered(&service).id;
        service
            .complete_triage(
                id,
                TriageCompletion {
                    room_id: Some(3),
                    ..TriageCompletion::default()
                },
            )
            .unwrap();

        let patch: AppointmentPatch =
            serde_json::from_str(r#"{"triageStatus": "pending", "roomId": null}"#).unwrap();
        let reset = service.update(id, patch).unwrap();
        assert_eq!(reset.triage_status, TriageStatus::Pending);
        assert_eq!(reset.room_id, None);
        assert_eq!(service.find_one(id).unwrap().room_id, None);
    }

    #[test]
    fn remove_deletes_record() {
        let service = service(TransitionPolicy::Permissive);
        let id = registered(&service).id;
        service.remove(id).unwrap();
        assert!(matches!(
            service.find_one(id),
            Err(ClinicError::NotFound { .. })
        ));
    }

    #[test]
    fn find_all_paginates_newest_first() {
        let service = service(TransitionPolicy::Permissive);
        for n in 0..25 {
            service
                .create(new_appointment(&format!("Patient {n}"), "id"))
                .unwrap();
        }

        let query = AppointmentQuery::new(service.page_request(Some(2), Some(10)));
        let page = service.find_all(&query).unwrap();
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.pagination.total, 25);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(page.pagination.page, 2);

        let first = service
            .find_all(&AppointmentQuery::new(service.page_request(Some(1), Some(1))))
            .unwrap();
        assert_eq!(first.data[0].patient_name, "Patient 24");
    }

    #[test]
    fn find_all_composes_filters_conjunctively() {
        let service = service(TransitionPolicy::Permissive);
        let both = registered(&service).id;
        let status_only = registered(&service).id;
        let triage_only = registered(&service).id;

        service.confirm(both).unwrap();
        service.start_triage(both).unwrap();
        service
            .complete_triage(both, TriageCompletion::default())
            .unwrap();

        service.confirm(status_only).unwrap();

        service.start_triage(triage_only).unwrap();
        service
            .complete_triage(triage_only, TriageCompletion::default())
            .unwrap();

        let mut query = AppointmentQuery::new(service.page_request(None, None));
        query.status = StatusFilter::Only(AppointmentStatus::Confirmed);
        query.triage_status = StatusFilter::Only(TriageStatus::Completed);

        let page = service.find_all(&query).unwrap();
        let ids: Vec<u64> = page.data.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![both]);
    }

    #[test]
    fn find_by_patient_id_card_matches_exactly() {
        let service = service(TransitionPolicy::Permissive);
        service.create(new_appointment("A", "1111")).unwrap();
        service.create(new_appointment("A again", "1111")).unwrap();
        service.create(new_appointment("B", "11110")).unwrap();

        let found = service.find_by_patient_id_card("1111").unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|a| a.patient_id_card == "1111"));
    }

    #[test]
    fn work_queues_follow_triage_and_visit_state() {
        let service = service(TransitionPolicy::Permissive);
        let waiting = registered(&service).id;
        let urgent = registered(&service).id;
        let routine = registered(&service).id;

        for (id, priority) in [(routine, 4), (urgent, 1)] {
            service.start_triage(id).unwrap();
            service
                .complete_triage(
                    id,
                    TriageCompletion {
                        priority: Some(Priority::new(priority).unwrap()),
                        ..TriageCompletion::default()
                    },
                )
                .unwrap();
        }

        let triage_queue: Vec<u64> = service
            .pending_triage()
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(triage_queue, vec![waiting]);

        let visit_queue: Vec<u64> = service
            .pending_visit()
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(visit_queue, vec![urgent, routine]);
    }
}
