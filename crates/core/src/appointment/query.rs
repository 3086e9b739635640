//! Listing filters for appointments.

use super::lifecycle::{AppointmentStatus, TriageStatus, VisitStatus};
use super::model::Appointment;
use crate::constants::ALL_FILTER;
use crate::paging::PageRequest;
use crate::{ClinicError, ClinicResult};
use std::str::FromStr;

/// Equality filter on one status dimension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter<T> {
    #[default]
    Any,
    Only(T),
}

impl<T> StatusFilter<T>
where
    T: FromStr<Err = ClinicError> + PartialEq + Copy,
{
    /// Parses a raw query parameter. Absent, blank and `all` mean no filter.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidInput`] for an unknown status tag.
    pub fn parse(raw: Option<&str>) -> ClinicResult<Self> {
        match raw.map(str::trim) {
            None | Some("") | Some(ALL_FILTER) => Ok(Self::Any),
            Some(tag) => tag.parse().map(Self::Only),
        }
    }

    pub fn matches(&self, value: T) -> bool {
        match self {
            Self::Any => true,
            Self::Only(expected) => *expected == value,
        }
    }
}

/// Criteria for `find_all`. All present criteria must hold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppointmentQuery {
    pub page: PageRequest,
    /// Case-insensitive substring of the patient name.
    pub search: Option<String>,
    pub status: StatusFilter<AppointmentStatus>,
    pub triage_status: StatusFilter<TriageStatus>,
    pub visit_status: StatusFilter<VisitStatus>,
}

impl AppointmentQuery {
    pub fn new(page: PageRequest) -> Self {
        Self {
            page,
            search: None,
            status: StatusFilter::Any,
            triage_status: StatusFilter::Any,
            visit_status: StatusFilter::Any,
        }
    }

    /// Builds a query from raw transport parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidInput`] if any status filter is not a known tag.
    pub fn from_raw(
        page: PageRequest,
        search: Option<String>,
        status: Option<&str>,
        triage_status: Option<&str>,
        visit_status: Option<&str>,
    ) -> ClinicResult<Self> {
        Ok(Self {
            page,
            search: search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            status: StatusFilter::parse(status)?,
            triage_status: StatusFilter::parse(triage_status)?,
            visit_status: StatusFilter::parse(visit_status)?,
        })
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        let name_matches = self.search.as_deref().map_or(true, |needle| {
            appointment
                .patient_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });

        name_matches
            && self.status.matches(appointment.status)
            && self.triage_status.matches(appointment.triage_status)
            && self.visit_status.matches(appointment.visit_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::model::tests::sample_appointment;

    fn page() -> PageRequest {
        PageRequest::new(None, None, 100)
    }

    #[test]
    fn all_sentinel_disables_filter() {
        assert_eq!(
            StatusFilter::<AppointmentStatus>::parse(Some("all")).unwrap(),
            StatusFilter::Any
        );
        assert_eq!(
            StatusFilter::<VisitStatus>::parse(None).unwrap(),
            StatusFilter::Any
        );
    }

    #[test]
    fn unknown_tag_is_invalid_input() {
        let err = StatusFilter::<TriageStatus>::parse(Some("done")).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let mut appointment = sample_appointment();
        appointment.patient_name = "Wang Xiaoming".into();

        let query = AppointmentQuery::from_raw(page(), Some("xiao".into()), None, None, None)
            .unwrap();
        assert!(query.matches(&appointment));

        let query = AppointmentQuery::from_raw(page(), Some("li".into()), None, None, None)
            .unwrap();
        assert!(!query.matches(&appointment));
    }

    #[test]
    fn blank_search_is_ignored() {
        let query = AppointmentQuery::from_raw(page(), Some("   ".into()), None, None, None)
            .unwrap();
        assert!(query.search.is_none());
    }

    #[test]
    fn filters_are_conjunctive() {
        let mut appointment = sample_appointment();
        appointment.status = AppointmentStatus::Confirmed;
        appointment.triage_status = TriageStatus::InProgress;

        let query = AppointmentQuery::from_raw(
            page(),
            None,
            Some("confirmed"),
            Some("completed"),
            Some("all"),
        )
        .unwrap();
        assert!(!query.matches(&appointment));

        appointment.triage_status = TriageStatus::Completed;
        assert!(query.matches(&appointment));
    }
}
