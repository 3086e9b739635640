use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Simple health service shared by the REST API and the command line.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Static method to check health without creating an instance.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Clinic is alive".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_alive() {
        let res = HealthService::check_health();
        assert!(res.ok);
        assert_eq!(res.message, "Clinic is alive");
    }
}
