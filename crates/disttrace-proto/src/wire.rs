//! Request/response envelopes that don't belong to a single domain type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::AgentCredentials;
use crate::target::Target;

/// Response to every `/slave/results` POST, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResultResponse {
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Error", default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(rename = "RetryPossible")]
    pub retry_possible: bool,
}

impl SubmitResultResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: String::new(),
            retry_possible: true,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            retry_possible: false,
        }
    }

    pub fn transient_failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            retry_possible: true,
        }
    }
}

/// Body an agent POSTs to `/slave/config` to fetch its current target list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRequest {
    #[serde(rename = "ID")]
    pub id: Uuid,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Secret")]
    pub secret: String,
}

impl From<ConfigRequest> for AgentCredentials {
    fn from(req: ConfigRequest) -> Self {
        AgentCredentials {
            id: req.id,
            name: req.name,
            secret: req.secret,
        }
    }
}

/// The coordinator's reply to a config-fetch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    #[serde(rename = "ID")]
    pub id: Uuid,
    #[serde(rename = "Targets")]
    pub targets: Vec<Target>,
}

/// `GET /api/status` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(rename = "Uptime")]
    pub uptime_secs: i64,
    #[serde(rename = "LastAgentConfigTime")]
    pub last_agent_config_time: Option<DateTime<Utc>>,
    #[serde(rename = "LastAgentConfig")]
    pub last_agent_config: Option<ConfigResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_omits_error_field() {
        let resp = SubmitResultResponse::ok();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["Success"], true);
        assert_eq!(json["RetryPossible"], true);
        assert!(json.get("Error").is_none());
    }

    #[test]
    fn rejected_response_is_not_retryable() {
        let resp = SubmitResultResponse::rejected("bad body");
        assert!(!resp.retry_possible);
        assert!(!resp.success);
    }
}
