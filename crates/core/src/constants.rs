//! Constants used throughout the clinic core crate.
//!
//! Storage layout names, paging limits and tariff values live here so the services, the
//! stores and the binaries agree on them.

/// Default directory for record storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "clinic_data";

/// Directory name for appointment records.
pub const APPOINTMENTS_DIR_NAME: &str = "appointments";

/// Directory name for admission records.
pub const ADMISSIONS_DIR_NAME: &str = "admissions";

/// Directory name for user accounts.
pub const USERS_DIR_NAME: &str = "users";

/// Advisory lock file held by writers of a record directory.
pub const LOCK_FILENAME: &str = ".lock";

/// File holding the last id handed out by a file-backed store.
pub const ID_COUNTER_FILENAME: &str = "next_id";

/// Extension of individual record files.
pub const RECORD_FILE_EXTENSION: &str = "json";

/// Page number used when a caller does not supply one.
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when a caller does not supply one.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Upper bound applied to caller-supplied page sizes.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Sentinel status filter meaning "do not filter on this dimension".
pub const ALL_FILTER: &str = "all";

/// Flat inpatient tariff per started day.
pub const DAILY_RATE: u64 = 100;

/// Milliseconds in one tariff day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Username of the bootstrap administrator when none is configured.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Password of the bootstrap administrator when none is configured.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
