//! Health endpoint

use serde::{Deserialize, Serialize};

/// Path served by the health endpoint and skipped by the access log
pub const HEALTH_PATH: &str = "/status";

/// Payload returned by the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    /// Service name
    pub name: String,
    /// Service version
    pub version: String,
    /// Host the process runs on, from the `HOSTNAME` environment variable
    pub hostname: String,
}

impl HealthInfo {
    /// Capture the health payload for this process
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            hostname: std::env::var("HOSTNAME").unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_payload_fields() {
        let info = HealthInfo::new("billing", "1.2.3");
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["name"], "billing");
        assert_eq!(value["version"], "1.2.3");
        assert!(value["hostname"].is_string());
    }
}
