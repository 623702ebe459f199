//! Hand-written validation helpers shared by every domain type.
//!
//! Mirrors the field constraints the original implementation expressed as
//! `govalidator` struct tags (`alphanum`, `host`, `range(...)`) — reimplemented
//! as plain functions rather than a derive-validation crate, matching this
//! workspace's style of explicit, hand-rolled checks returning `Result<(), String>`.

use std::net::IpAddr;

/// Non-empty, ASCII alphanumeric name (matches the original's `alphanum,required`).
pub fn validate_alphanumeric(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!("{field} must be alphanumeric"));
    }
    Ok(())
}

/// A DNS name or a literal IPv4/IPv6 address (matches the original's `host`).
pub fn validate_address(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if value.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    if is_valid_dns_name(value) {
        return Ok(());
    }
    Err(format!("{field} is not a valid DNS name or IP address"))
}

/// Validates a literal IP address string (used for submitted hop addresses).
pub fn validate_ip(field: &str, value: &str) -> Result<(), String> {
    value
        .parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| format!("{field} is not a valid IP address"))
}

/// Validates an optional DNS name (used for submitted hop hostnames).
pub fn validate_dns_name(field: &str, value: &str) -> Result<(), String> {
    if is_valid_dns_name(value) {
        Ok(())
    } else {
        Err(format!("{field} is not a valid DNS name"))
    }
}

/// Label/overall-length rules mirroring `govalidator.IsDNSName`.
fn is_valid_dns_name(value: &str) -> bool {
    if value.is_empty() || value.len() > 253 {
        return false;
    }
    let value = value.strip_suffix('.').unwrap_or(value);
    value.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Inclusive numeric range check (matches the original's `range(lo|hi)`).
pub fn validate_range(field: &str, value: i64, lo: i64, hi: i64) -> Result<(), String> {
    if value < lo || value > hi {
        return Err(format!("{field} must be between {lo} and {hi}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphanumeric_rejects_empty_and_symbols() {
        assert!(validate_alphanumeric("name", "falbala1").is_ok());
        assert!(validate_alphanumeric("name", "").is_err());
        assert!(validate_alphanumeric("name", "has space").is_err());
        assert!(validate_alphanumeric("name", "dash-name").is_err());
    }

    #[test]
    fn address_accepts_ip_and_dns() {
        assert!(validate_address("address", "8.8.8.8").is_ok());
        assert!(validate_address("address", "google.com").is_ok());
        assert!(validate_address("address", "").is_err());
        assert!(validate_address("address", "-bad.com").is_err());
    }

    #[test]
    fn range_is_inclusive() {
        assert!(validate_range("retries", 0, 0, 10).is_ok());
        assert!(validate_range("retries", 10, 0, 10).is_ok());
        assert!(validate_range("retries", 11, 0, 10).is_err());
        assert!(validate_range("retries", -1, 0, 10).is_err());
    }
}
