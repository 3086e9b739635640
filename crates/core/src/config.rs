//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the core services.
//! Services never read process-wide environment variables during request handling, which keeps
//! behaviour consistent across threads and test harnesses.

use crate::appointment::TransitionPolicy;
use crate::constants::{ADMISSIONS_DIR_NAME, APPOINTMENTS_DIR_NAME, MAX_PAGE_SIZE, USERS_DIR_NAME};
use crate::{ClinicError, ClinicResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    transition_policy: TransitionPolicy,
    max_page_size: u64,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidInput`] if `data_dir` is empty.
    pub fn new(data_dir: PathBuf, transition_policy: TransitionPolicy) -> ClinicResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(ClinicError::InvalidInput(
                "data directory cannot be empty".into(),
            ));
        }

        Ok(Self {
            data_dir,
            transition_policy,
            max_page_size: MAX_PAGE_SIZE,
        })
    }

    /// Overrides the page-size ceiling applied to list queries.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidInput`] if `max_page_size` is zero.
    pub fn with_max_page_size(mut self, max_page_size: u64) -> ClinicResult<Self> {
        if max_page_size == 0 {
            return Err(ClinicError::InvalidInput(
                "max page size must be at least 1".into(),
            ));
        }
        self.max_page_size = max_page_size;
        Ok(self)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn appointments_dir(&self) -> PathBuf {
        self.data_dir.join(APPOINTMENTS_DIR_NAME)
    }

    pub fn admissions_dir(&self) -> PathBuf {
        self.data_dir.join(ADMISSIONS_DIR_NAME)
    }

    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join(USERS_DIR_NAME)
    }

    pub fn transition_policy(&self) -> TransitionPolicy {
        self.transition_policy
    }

    pub fn max_page_size(&self) -> u64 {
        self.max_page_size
    }
}

/// Parse the transition policy from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`TransitionPolicy::Permissive`].
pub fn transition_policy_from_env_value(value: Option<String>) -> ClinicResult<TransitionPolicy> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value.map(|v| v.parse::<TransitionPolicy>()).transpose()?;

    Ok(parsed.unwrap_or_default())
}
