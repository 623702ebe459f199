//! Agent ("slave") domain and wire types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate::validate_alphanumeric;

/// A registered measurement agent, as persisted by the Registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(rename = "ID")]
    pub id: Uuid,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Secret")]
    pub secret: String,
}

impl Agent {
    pub fn validate(&self) -> Result<(), String> {
        validate_alphanumeric("Agent.Name", &self.name)?;
        if self.secret.is_empty() {
            return Err("Agent.Secret must not be empty".to_string());
        }
        Ok(())
    }
}

/// Credentials an agent presents on every `/slave/*` request. Identical wire
/// shape to [`Agent`] — the original implementation used a single `Slave`
/// struct for both the registry row and the credential envelope.
pub type AgentCredentials = Agent;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_uses_pascal_case() {
        let agent = Agent {
            id: Uuid::nil(),
            name: "falbala".to_string(),
            secret: "1234".to_string(),
        };
        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json["Name"], "falbala");
        assert_eq!(json["Secret"], "1234");
        assert!(json.get("ID").is_some());
    }

    #[test]
    fn validate_rejects_non_alphanumeric_name() {
        let agent = Agent {
            id: Uuid::nil(),
            name: "fal bala".to_string(),
            secret: "1234".to_string(),
        };
        assert!(agent.validate().is_err());
    }
}
