//! Operator user domain type and password hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::validate::validate_alphanumeric;

/// An operator account. `password_hash` is always
/// `hex(SHA256(plaintext || decimal(salt)))` — never the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "ID")]
    pub id: Uuid,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "PasswordHash")]
    pub password_hash: String,
    #[serde(rename = "Salt")]
    pub salt: i64,
    #[serde(rename = "PasswordNeedsChange")]
    pub password_needs_change: bool,
}

impl User {
    pub fn validate(&self) -> Result<(), String> {
        validate_alphanumeric("User.Name", &self.name)
    }
}

/// Hash a plaintext password with the given salt, matching the original's
/// `sha256.Sum256([]byte(password + strconv.Itoa(salt)))`.
pub fn hash_password(plaintext: &str, salt: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.update(salt.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// A fresh 31-bit salt (matches the original's `rand.Intn(math.MaxInt32)`).
pub fn new_salt() -> i64 {
    use rand::Rng;
    rand::thread_rng().gen_range(0..i32::MAX) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_for_same_salt() {
        let a = hash_password("swordfish", 42);
        let b = hash_password("swordfish", 42);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_differs_across_salts() {
        let a = hash_password("swordfish", 1);
        let b = hash_password("swordfish", 2);
        assert_ne!(a, b);
    }

    #[test]
    fn salt_is_in_31_bit_range() {
        for _ in 0..20 {
            let salt = new_salt();
            assert!((0..i32::MAX as i64).contains(&salt));
        }
    }
}
