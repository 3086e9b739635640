//! Inpatient admissions and the discharge fee.
//!
//! An admission is either `admitted` or `discharged`. Discharging stamps the discharge time and
//! prices the stay at a flat [`DAILY_RATE`] per started day.

use crate::constants::{DAILY_RATE, MILLIS_PER_DAY};
use crate::paging::{paginate, Page, PageRequest};
use crate::store::{Record, RecordStore};
use crate::{ClinicError, ClinicResult, CoreConfig};
use chrono::{DateTime, Utc};
use clinic_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use utoipa::ToSchema;

// ============================================================================
// MODEL
// ============================================================================

/// Admission state, stored and sent as `0` (admitted) or `1` (discharged).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AdmissionStatus {
    #[default]
    Admitted,
    Discharged,
}

impl TryFrom<u8> for AdmissionStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Admitted),
            1 => Ok(Self::Discharged),
            other => Err(format!(
                "admission status must be 0 (admitted) or 1 (discharged), got {other}"
            )),
        }
    }
}

impl From<AdmissionStatus> for u8 {
    fn from(status: AdmissionStatus) -> Self {
        match status {
            AdmissionStatus::Admitted => 0,
            AdmissionStatus::Discharged => 1,
        }
    }
}

impl fmt::Display for AdmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admitted => f.write_str("admitted"),
            Self::Discharged => f.write_str("discharged"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    pub id: u64,
    pub patient_name: String,
    pub doctor_name: String,
    pub admission_time: DateTime<Utc>,
    pub discharge_time: Option<DateTime<Utc>>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    /// Integer amount as a decimal string; `"0"` until discharge.
    pub price: String,
    pub room: Option<String>,
    pub bed: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = u8)]
    pub status: AdmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Record for Admission {
    const KIND: &'static str = "Admission";

    fn id(&self) -> u64 {
        self.id
    }
    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }
    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl Admission {
    /// Discharges the patient at `at` and prices the stay.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::AlreadyDischarged`] if the admission is already closed.
    pub fn discharge(&mut self, at: DateTime<Utc>) -> ClinicResult<()> {
        if self.status == AdmissionStatus::Discharged {
            return Err(ClinicError::AlreadyDischarged(self.id));
        }
        self.status = AdmissionStatus::Discharged;
        self.discharge_time = Some(at);
        self.price = compute_fee(self.admission_time, at).to_string();
        Ok(())
    }

    fn reopen(&mut self) {
        self.status = AdmissionStatus::Admitted;
        self.discharge_time = None;
        self.price = "0".into();
    }
}

/// Fee for a stay: every started day costs [`DAILY_RATE`].
///
/// A discharge before the admission time is priced as zero days.
pub fn compute_fee(admitted_at: DateTime<Utc>, discharged_at: DateTime<Utc>) -> u64 {
    let millis = (discharged_at - admitted_at).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    let days = (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
    days as u64 * DAILY_RATE
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewAdmission {
    #[schema(value_type = String)]
    pub patient_name: NonEmptyText,
    #[schema(value_type = String)]
    pub doctor_name: NonEmptyText,
    /// Defaults to the time of the request.
    #[serde(default)]
    pub admission_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub bed: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewAdmission {
    fn into_record(self, now: DateTime<Utc>) -> Admission {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Admission {
            id: 0,
            patient_name: self.patient_name.into_string(),
            doctor_name: self.doctor_name.into_string(),
            admission_time: self.admission_time.unwrap_or(now),
            discharge_time: None,
            diagnosis: self.diagnosis,
            treatment: self.treatment,
            price: "0".into(),
            room: self.room,
            bed: self.bed,
            notes: self.notes,
            status: AdmissionStatus::Admitted,
            created_at: epoch,
            updated_at: epoch,
            version: 0,
        }
    }
}

/// Partial update. Setting `status` to discharged on an open admission runs the discharge;
/// setting it to admitted on a closed one reopens it and clears the fee.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdmissionPatch {
    #[schema(value_type = Option<String>)]
    pub patient_name: Option<NonEmptyText>,
    #[schema(value_type = Option<String>)]
    pub doctor_name: Option<NonEmptyText>,
    pub admission_time: Option<DateTime<Utc>>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub room: Option<String>,
    pub bed: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = Option<u8>)]
    pub status: Option<AdmissionStatus>,
}

impl AdmissionPatch {
    pub fn is_empty(&self) -> bool {
        self.patient_name.is_none()
            && self.doctor_name.is_none()
            && self.admission_time.is_none()
            && self.diagnosis.is_none()
            && self.treatment.is_none()
            && self.room.is_none()
            && self.bed.is_none()
            && self.notes.is_none()
            && self.status.is_none()
    }

    fn apply_to(self, admission: &mut Admission, now: DateTime<Utc>) -> ClinicResult<()> {
        if let Some(name) = self.patient_name {
            admission.patient_name = name.into_string();
        }
        if let Some(name) = self.doctor_name {
            admission.doctor_name = name.into_string();
        }
        if let Some(at) = self.admission_time {
            admission.admission_time = at;
        }
        for (slot, value) in [
            (&mut admission.diagnosis, self.diagnosis),
            (&mut admission.treatment, self.treatment),
            (&mut admission.room, self.room),
            (&mut admission.bed, self.bed),
            (&mut admission.notes, self.notes),
        ] {
            if value.is_some() {
                *slot = value;
            }
        }

        match (admission.status, self.status) {
            (AdmissionStatus::Admitted, Some(AdmissionStatus::Discharged)) => {
                admission.discharge(now)?
            }
            (AdmissionStatus::Discharged, Some(AdmissionStatus::Admitted)) => admission.reopen(),
            _ => {}
        }
        Ok(())
    }
}

// ============================================================================
// SERVICE
// ============================================================================

#[derive(Clone)]
pub struct AdmissionService {
    store: Arc<dyn RecordStore<Admission>>,
    max_page_size: u64,
}

impl AdmissionService {
    pub fn new(store: Arc<dyn RecordStore<Admission>>, cfg: &CoreConfig) -> Self {
        Self {
            store,
            max_page_size: cfg.max_page_size(),
        }
    }

    pub fn page_request(&self, page: Option<i64>, page_size: Option<i64>) -> PageRequest {
        PageRequest::new(page, page_size, self.max_page_size)
    }

    /// Opens an admission with price `"0"`.
    pub fn admit(&self, input: NewAdmission) -> ClinicResult<Admission> {
        let admitted = self.store.create(input.into_record(Utc::now()))?;
        tracing::info!(id = admitted.id, "patient admitted");
        Ok(admitted)
    }

    /// Lists admissions, most recent admission first, optionally filtered by a
    /// case-insensitive patient name substring.
    pub fn find_all(
        &self,
        page: PageRequest,
        patient_name: Option<&str>,
    ) -> ClinicResult<Page<Admission>> {
        let needle = patient_name
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty());
        let mut matches = self.store.find_many(&|a: &Admission| {
            needle
                .as_deref()
                .map_or(true, |n| a.patient_name.to_lowercase().contains(n))
        })?;
        matches.sort_by(|a, b| {
            b.admission_time
                .cmp(&a.admission_time)
                .then(b.id.cmp(&a.id))
        });
        Ok(paginate(matches, page))
    }

    pub fn find_one(&self, id: u64) -> ClinicResult<Admission> {
        self.store.find_by_id(id)?.ok_or(ClinicError::NotFound {
            kind: Admission::KIND,
            id,
        })
    }

    pub fn update(&self, id: u64, patch: AdmissionPatch) -> ClinicResult<Admission> {
        if patch.is_empty() {
            return Err(ClinicError::InvalidInput(
                "update must change at least one field".into(),
            ));
        }
        let mut admission = self.find_one(id)?;
        patch.apply_to(&mut admission, Utc::now())?;
        let saved = self.store.update(admission)?;
        tracing::info!(id, status = %saved.status, "admission updated");
        Ok(saved)
    }

    pub fn remove(&self, id: u64) -> ClinicResult<()> {
        if !self.store.delete(id)? {
            return Err(ClinicError::NotFound {
                kind: Admission::KIND,
                id,
            });
        }
        tracing::info!(id, "admission removed");
        Ok(())
    }

    /// Discharges now and stores the computed fee.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::NotFound`] if no admission has this id
    /// - [`ClinicError::AlreadyDischarged`] if it was discharged before
    pub fn discharge(&self, id: u64) -> ClinicResult<Admission> {
        let mut admission = self.find_one(id)?;
        admission.discharge(Utc::now())?;
        let saved = self.store.update(admission)?;
        tracing::info!(id, price = %saved.price, "patient discharged");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::TransitionPolicy;
    use crate::store::InMemoryStore;
    use chrono::{Duration, TimeZone};
    use std::path::PathBuf;

    fn service() -> AdmissionService {
        let cfg = CoreConfig::new(PathBuf::from("unused"), TransitionPolicy::Permissive).unwrap();
        AdmissionService::new(Arc::new(InMemoryStore::<Admission>::new()), &cfg)
    }

    fn new_admission(name: &str) -> NewAdmission {
        NewAdmission {
            patient_name: NonEmptyText::new(name).unwrap(),
            doctor_name: NonEmptyText::new("Dr. Chen").unwrap(),
            admission_time: None,
            diagnosis: Some("pneumonia".into()),
            treatment: None,
            room: Some("301".into()),
            bed: Some("2".into()),
            notes: None,
        }
    }

    #[test]
    fn fee_counts_started_days() {
        let admitted = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let discharged = Utc.with_ymd_and_hms(2025, 1, 3, 5, 0, 0).unwrap();
        assert_eq!(compute_fee(admitted, discharged), 300);
        assert_eq!(compute_fee(admitted, admitted + Duration::days(2)), 200);
        assert_eq!(compute_fee(admitted, admitted + Duration::milliseconds(1)), 100);
    }

    #[test]
    fn fee_is_zero_for_empty_or_negative_stays() {
        let admitted = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(compute_fee(admitted, admitted), 0);
        assert_eq!(compute_fee(admitted, admitted - Duration::hours(3)), 0);
    }

    #[test]
    fn discharge_prices_the_stay_once() {
        let mut admission = new_admission("Li Si").into_record(Utc::now());
        admission.admission_time = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        admission
            .discharge(Utc.with_ymd_and_hms(2025, 1, 3, 5, 0, 0).unwrap())
            .unwrap();
        assert_eq!(admission.price, "300");
        assert_eq!(admission.status, AdmissionStatus::Discharged);

        let err = admission.discharge(Utc::now()).unwrap_err();
        assert!(matches!(err, ClinicError::AlreadyDischarged(_)));
        assert_eq!(admission.price, "300");
    }

    #[test]
    fn status_serialises_as_integer() {
        let mut admission = new_admission("Li Si").into_record(Utc::now());
        let json = serde_json::to_value(&admission).unwrap();
        assert_eq!(json["status"], 0);
        assert_eq!(json["price"], "0");

        admission.status = AdmissionStatus::Discharged;
        let json = serde_json::to_value(&admission).unwrap();
        assert_eq!(json["status"], 1);

        let bad = serde_json::from_str::<AdmissionPatch>(r#"{"status": 7}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn admit_then_discharge_through_service() {
        let service = service();
        let admitted = service.admit(new_admission("Wang Wu")).unwrap();
        assert_eq!(admitted.price, "0");
        assert_eq!(admitted.status, AdmissionStatus::Admitted);

        let discharged = service.discharge(admitted.id).unwrap();
        assert_eq!(discharged.status, AdmissionStatus::Discharged);
        assert!(discharged.discharge_time.is_some());
        // Same-second discharge still counts as one started day at most.
        assert!(discharged.price == "0" || discharged.price == "100");

        let err = service.discharge(admitted.id).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn update_to_discharged_runs_discharge() {
        let service = service();
        let admitted = service
            .admit(NewAdmission {
                admission_time: Some(Utc::now() - Duration::hours(30)),
                ..new_admission("Zhao Liu")
            })
            .unwrap();

        let updated = service
            .update(
                admitted.id,
                AdmissionPatch {
                    status: Some(AdmissionStatus::Discharged),
                    notes: Some("stable".into()),
                    ..AdmissionPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, AdmissionStatus::Discharged);
        assert_eq!(updated.price, "200");
        assert_eq!(updated.notes.as_deref(), Some("stable"));
    }

    #[test]
    fn find_all_filters_by_name_newest_admission_first() {
        let service = service();
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        for (offset, name) in [(0, "Li Lei"), (2, "Han Meimei"), (1, "li xiaolong")] {
            service
                .admit(NewAdmission {
                    admission_time: Some(base + Duration::days(offset)),
                    ..new_admission(name)
                })
                .unwrap();
        }

        let page = service
            .find_all(service.page_request(None, None), Some("LI"))
            .unwrap();
        let names: Vec<&str> = page.data.iter().map(|a| a.patient_name.as_str()).collect();
        assert_eq!(names, vec!["li xiaolong", "Li Lei"]);
        assert_eq!(page.pagination.total, 2);
    }

    #[test]
    fn missing_admission_is_not_found() {
        let service = service();
        assert!(matches!(
            service.find_one(7),
            Err(ClinicError::NotFound { id: 7, .. })
        ));
        assert!(matches!(
            service.discharge(7),
            Err(ClinicError::NotFound { id: 7, .. })
        ));
        assert!(matches!(
            service.remove(7),
            Err(ClinicError::NotFound { id: 7, .. })
        ));
    }
}
