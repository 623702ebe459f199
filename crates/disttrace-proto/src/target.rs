//! Probing-target domain and wire type.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate::{validate_address, validate_alphanumeric, validate_range};

/// A probing destination with the parameters every agent must honor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "ID")]
    pub id: Uuid,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Retries")]
    pub retries: i32,
    #[serde(rename = "MaxHops")]
    pub max_hops: i32,
    #[serde(rename = "TimeoutMs")]
    pub timeout_ms: i32,
}

impl Target {
    pub fn validate(&self) -> Result<(), String> {
        validate_alphanumeric("Target.Name", &self.name)?;
        validate_address("Target.Address", &self.address)?;
        validate_range("Target.Retries", self.retries as i64, 0, 10)?;
        validate_range("Target.MaxHops", self.max_hops as i64, 1, 100)?;
        validate_range("Target.TimeoutMs", self.timeout_ms as i64, 1, 10_000)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Target {
        Target {
            id: Uuid::nil(),
            name: "google".to_string(),
            address: "8.8.8.8".to_string(),
            retries: 1,
            max_hops: 30,
            timeout_ms: 500,
        }
    }

    #[test]
    fn valid_target_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn out_of_range_retries_fails() {
        let mut t = sample();
        t.retries = 11;
        assert!(t.validate().is_err());
    }

    #[test]
    fn invalid_address_fails() {
        let mut t = sample();
        t.address = "not an address!".to_string();
        assert!(t.validate().is_err());
    }
}
