//! Appointment records and the inputs that create or change them.

use super::lifecycle::{AppointmentStatus, TriageStatus, VisitStatus};
use crate::store::Record;
use chrono::{DateTime, Utc};
use clinic_types::{NonEmptyText, PhoneNumber};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Triage priority, 1 (most urgent) to 5 (least urgent).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    pub const LOWEST: Priority = Priority(5);

    pub fn new(value: u8) -> Result<Self, String> {
        if (Self::HIGHEST.0..=Self::LOWEST.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("priority must be between 1 and 5, got {value}"))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

/// One outpatient registration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: u64,
    #[schema(example = "Zhang San")]
    pub patient_name: String,
    #[schema(example = "110101199001011234")]
    pub patient_id_card: String,
    pub doctor_id: u64,
    pub department_id: u64,
    pub appointment_time: DateTime<Utc>,
    #[schema(example = "13800138000")]
    pub phone: String,
    #[serde(default)]
    pub description: Option<String>,

    pub status: AppointmentStatus,

    pub triage_status: TriageStatus,
    #[serde(default)]
    pub room_id: Option<u64>,
    #[serde(default)]
    #[schema(value_type = Option<u8>, minimum = 1, maximum = 5)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub triage_notes: Option<String>,

    pub visit_status: VisitStatus,
    #[serde(default)]
    pub visit_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visit_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub prescription: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Record for Appointment {
    const KIND: &'static str = "Appointment";

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

/// Input for registering a patient.
///
/// Status fields may be supplied to import historical registrations; otherwise every
/// dimension starts at `pending`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    #[schema(value_type = String, example = "Zhang San")]
    pub patient_name: NonEmptyText,
    #[schema(value_type = String, example = "110101199001011234")]
    pub patient_id_card: NonEmptyText,
    pub doctor_id: u64,
    pub department_id: u64,
    pub appointment_time: DateTime<Utc>,
    #[schema(value_type = String, example = "13800138000")]
    pub phone: PhoneNumber,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub triage_status: Option<TriageStatus>,
    #[serde(default)]
    pub visit_status: Option<VisitStatus>,
}

impl NewAppointment {
    /// Builds the unsaved record. Id, audit timestamps and version are assigned by the store.
    pub(crate) fn into_record(self) -> Appointment {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Appointment {
            id: 0,
            patient_name: self.patient_name.into_string(),
            patient_id_card: self.patient_id_card.into_string(),
            doctor_id: self.doctor_id,
            department_id: self.department_id,
            appointment_time: self.appointment_time,
            phone: self.phone.into_string(),
            description: self.description,
            status: self.status.unwrap_or_default(),
            triage_status: self.triage_status.unwrap_or_default(),
            room_id: None,
            priority: None,
            triage_notes: None,
            visit_status: self.visit_status.unwrap_or_default(),
            visit_start_time: None,
            visit_end_time: None,
            diagnosis: None,
            prescription: None,
            created_at: epoch,
            updated_at: epoch,
            version: 0,
        }
    }
}

/// Administrative override of any stored field.
///
/// This bypasses the transition tables entirely and is exposed separately from the lifecycle
/// operations. Absent fields are left unchanged; an explicit `null` clears a nullable field.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AppointmentPatch {
    #[schema(value_type = Option<String>)]
    pub patient_name: Option<NonEmptyText>,
    #[schema(value_type = Option<String>)]
    pub patient_id_card: Option<NonEmptyText>,
    pub doctor_id: Option<u64>,
    pub department_id: Option<u64>,
    pub appointment_time: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub phone: Option<PhoneNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub description: Option<Option<String>>,
    pub status: Option<AppointmentStatus>,
    pub triage_status: Option<TriageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<u64>, nullable)]
    pub room_id: Option<Option<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<u8>, nullable, minimum = 1, maximum = 5)]
    pub priority: Option<Option<Priority>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub triage_notes: Option<Option<String>>,
    pub visit_status: Option<VisitStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = DateTime, nullable)]
    pub visit_start_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = DateTime, nullable)]
    pub visit_end_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub diagnosis: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub prescription: Option<Option<String>>,
}

impl AppointmentPatch {
    pub fn is_empty(&self) -> bool {
        self.patient_name.is_none()
            && self.patient_id_card.is_none()
            && self.doctor_id.is_none()
            && self.department_id.is_none()
            && self.appointment_time.is_none()
            && self.phone.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.triage_status.is_none()
            && self.room_id.is_none()
            && self.priority.is_none()
            && self.triage_notes.is_none()
            && self.visit_status.is_none()
            && self.visit_start_time.is_none()
            && self.visit_end_time.is_none()
            && self.diagnosis.is_none()
            && self.prescription.is_none()
    }

    pub(crate) fn apply_to(self, appointment: &mut Appointment) {
        // `Some(None)` clears the slot; `None` leaves it alone.
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(
            &mut appointment.patient_name,
            self.patient_name.map(NonEmptyText::into_string),
        );
        set(
            &mut appointment.patient_id_card,
            self.patient_id_card.map(NonEmptyText::into_string),
        );
        set(&mut appointment.doctor_id, self.doctor_id);
        set(&mut appointment.department_id, self.department_id);
        set(&mut appointment.appointment_time, self.appointment_time);
        set(&mut appointment.phone, self.phone.map(PhoneNumber::into_string));
        set(&mut appointment.description, self.description);
        set(&mut appointment.status, self.status);
        set(&mut appointment.triage_status, self.triage_status);
        set(&mut appointment.room_id, self.room_id);
        set(&mut appointment.priority, self.priority);
        set(&mut appointment.triage_notes, self.triage_notes);
        set(&mut appointment.visit_status, self.visit_status);
        set(&mut appointment.visit_start_time, self.visit_start_time);
        set(&mut appointment.visit_end_time, self.visit_end_time);
        set(&mut appointment.diagnosis, self.diagnosis);
        set(&mut appointment.prescription, self.prescription);
    }
}

/// Outcome recorded when triage completes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TriageCompletion {
    #[serde(default)]
    pub room_id: Option<u64>,
    #[serde(default)]
    #[schema(value_type = Option<u8>, minimum = 1, maximum = 5)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub triage_notes: Option<String>,
}

/// Outcome recorded when the visit completes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VisitCompletion {
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub prescription: Option<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn new_appointment(name: &str, id_card: &str) -> NewAppointment {
        NewAppointment {
            patient_name: NonEmptyText::new(name).unwrap(),
            patient_id_card: NonEmptyText::new(id_card).unwrap(),
            doctor_id: 1,
            department_id: 2,
            appointment_time: Utc.with_ymd_and_hms(2025, 10, 5, 9, 0, 0).unwrap(),
            phone: PhoneNumber::parse("13800138000").unwrap(),
            description: Some("headache and fever".into()),
            status: None,
            triage_status: None,
            visit_status: None,
        }
    }

    pub(crate) fn sample_appointment() -> Appointment {
        new_appointment("Zhang San", "110101199001011234").into_record()
    }

    #[test]
    fn new_appointment_defaults_to_pending_everywhere() {
        let appointment = sample_appointment();
        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(appointment.triage_status, TriageStatus::Pending);
        assert_eq!(appointment.visit_status, VisitStatus::Pending);
        assert!(appointment.room_id.is_none());
        assert!(appointment.visit_start_time.is_none());
    }

    #[test]
    fn new_appointment_deserializes_camel_case_and_validates() {
        let json = r#"{
            "patientName": "  Li Si ",
            "patientIdCard": "110101199001015678",
            "doctorId": 4,
            "departmentId": 9,
            "appointmentTime": "2025-10-05T09:00:00Z",
            "phone": "13900139000"
        }"#;
        let input: NewAppointment = serde_json::from_str(json).unwrap();
        assert_eq!(input.patient_name.as_str(), "Li Si");
        assert!(input.description.is_none());

        let blank = json.replace("  Li Si ", " ");
        assert!(serde_json::from_str::<NewAppointment>(&blank).is_err());
    }

    #[test]
    fn appointment_serializes_lowercase_tags_and_nulls() {
        let json = serde_json::to_value(sample_appointment()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["triageStatus"], "pending");
        assert!(json["roomId"].is_null());
        assert!(json["visitStartTime"].is_null());
        assert_eq!(json["patientIdCard"], "110101199001011234");
    }

    #[test]
    fn priority_rejects_out_of_range_values() {
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(6).is_err());
        assert_eq!(Priority::new(1).unwrap(), Priority::HIGHEST);
        assert!(serde_json::from_str::<Priority>("9").is_err());
    }

    #[test]
    fn triage_completion_rejects_unrelated_fields() {
        let err = serde_json::from_str::<TriageCompletion>(r#"{"roomId": 3, "diagnosis": "x"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("diagnosis"));
    }

    #[test]
    fn patch_overwrites_only_present_fields() {
        let mut appointment = sample_appointment();
        let patch = AppointmentPatch {
            phone: Some(PhoneNumber::parse("010-8888 0000").unwrap()),
            visit_status: Some(VisitStatus::Missed),
            ..AppointmentPatch::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut appointment);

        assert_eq!(appointment.phone, "010-8888 0000");
        assert_eq!(appointment.visit_status, VisitStatus::Missed);
        assert_eq!(appointment.patient_name, "Zhang San");
        assert_eq!(appointment.description.as_deref(), Some("headache and fever"));
    }

    #[test]
    fn patch_null_clears_and_absent_keeps() {
        let mut appointment = sample_appointment();
        appointment.room_id = Some(3);
        appointment.priority = Priority::new(2).ok();
        appointment.triage_notes = Some("stable".into());
        appointment.triage_status = TriageStatus::Completed;

        let patch: AppointmentPatch = serde_json::from_str(
            r#"{"triageStatus": "pending", "roomId": null, "priority": null}"#,
        )
        .unwrap();
        assert_eq!(patch.room_id, Some(None));
        assert!(patch.triage_notes.is_none());
        patch.apply_to(&mut appointment);

        assert_eq!(appointment.triage_status, TriageStatus::Pending);
        assert_eq!(appointment.room_id, None);
        assert_eq!(appointment.priority, None);
        assert_eq!(appointment.triage_notes.as_deref(), Some("stable"));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(AppointmentPatch::default().is_empty());
    }
}
