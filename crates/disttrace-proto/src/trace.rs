//! Traceroute/hop domain types and the agent→coordinator submission envelope.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::agent::AgentCredentials;
use crate::target::Target;
use crate::validate::{validate_dns_name, validate_ip, validate_range};

/// A hop's IPv4 address, wire-encoded as a 4-element byte array (matches the
/// original `tracert.TracerouteHop.Address` JSON shape).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HopAddress(pub [u8; 4]);

impl fmt::Display for HopAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

impl Serialize for HopAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(4)?;
        for byte in self.0 {
            tup.serialize_element(&byte)?;
        }
        tup.end()
    }
}

impl<'de> Deserialize<'de> for HopAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AddrVisitor;
        impl<'de> Visitor<'de> for AddrVisitor {
            type Value = HopAddress;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 4-element byte array")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut bytes = [0u8; 4];
                for byte in &mut bytes {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(4, &self))?;
                }
                Ok(HopAddress(bytes))
            }
        }
        deserializer.deserialize_tuple(4, AddrVisitor)
    }
}

/// A single hop as submitted by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedHop {
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Address")]
    pub address: HopAddress,
    /// Reverse DNS name, empty string when unresolved (the original never
    /// distinguishes "unresolved" from "absent").
    #[serde(rename = "Host", default)]
    pub host: String,
    #[serde(rename = "N")]
    pub n: i32,
    /// Nanoseconds, matching Go's `time.Duration` JSON encoding.
    #[serde(rename = "ElapsedTime")]
    pub elapsed_time_nanos: u64,
    #[serde(rename = "TTL")]
    pub ttl: i32,
}

impl SubmittedHop {
    pub fn validate(&self) -> Result<(), String> {
        validate_ip("Hop.Address", &self.address.to_string())?;
        if !self.host.is_empty() {
            validate_dns_name("Hop.Host", &self.host)?;
        }
        Ok(())
    }
}

/// The full result of one agent's traceroute run, as POSTed to `/slave/results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResultRequest {
    #[serde(rename = "Slave")]
    pub slave: AgentCredentials,
    #[serde(rename = "ID")]
    pub id: Uuid,
    #[serde(rename = "DateTime")]
    pub date_time: DateTime<Utc>,
    #[serde(rename = "Target")]
    pub target: Target,
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "HopCount")]
    pub hop_count: i32,
    #[serde(rename = "Hops")]
    pub hops: Vec<SubmittedHop>,
}

impl SubmitResultRequest {
    /// Validates everything spec §4.E asks the ingestion handler to check,
    /// short of agent-credential authentication (handled separately so the
    /// 401-with-delay path can run before the more expensive field checks).
    pub fn validate(&self) -> Result<(), String> {
        self.slave.validate()?;
        self.target.validate()?;
        validate_range("HopCount", self.hop_count as i64, 1, 100)?;
        for hop in &self.hops {
            hop.validate()?;
        }
        Ok(())
    }
}

/// One persisted traceroute row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traceroute {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub target_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub annotations: String,
}

/// One persisted hop row, linked to its predecessor within the same traceroute.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub id: Uuid,
    pub traceroute_id: Uuid,
    pub index: i32,
    pub ip_address: String,
    pub dns_name: Option<String>,
    pub elapsed_secs: f64,
    pub previous_hop_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_address_round_trips_through_json() {
        let addr = HopAddress([8, 8, 4, 4]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "[8,8,4,4]");
        let back: HopAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0, addr.0);
        assert_eq!(addr.to_string(), "8.8.4.4");
    }

    #[test]
    fn submitted_hop_rejects_bad_hostname() {
        let hop = SubmittedHop {
            success: true,
            address: HopAddress([1, 2, 3, 4]),
            host: "-bad-".to_string(),
            n: 1,
            elapsed_time_nanos: 1_000_000,
            ttl: 0,
        };
        assert!(hop.validate().is_err());
    }

    #[test]
    fn submitted_hop_allows_empty_hostname() {
        let hop = SubmittedHop {
            success: true,
            address: HopAddress([1, 2, 3, 4]),
            host: String::new(),
            n: 1,
            elapsed_time_nanos: 1_000_000,
            ttl: 0,
        };
        assert!(hop.validate().is_ok());
    }
}
