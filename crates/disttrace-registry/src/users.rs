//! Operator user CRUD. Passwords are never stored in plaintext: every write
//! path hashes through [`disttrace_proto::hash_password`] with a fresh salt.

use tracing::{debug, info};
use uuid::Uuid;

use disttrace_proto::{hash_password, new_salt, User};
use disttrace_store::Store;

use crate::{map_write_error, RegistryError};

/// A user create/update request carries the plaintext password; the
/// registry hashes it before ever touching the store.
pub struct NewUser {
    pub name: String,
    pub password: String,
    pub password_needs_change: bool,
}

pub struct UserRegistry<'a> {
    store: &'a Store,
}

impl<'a> UserRegistry<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<User>, RegistryError> {
        let rows = self.store.query_rows(
            "SELECT id, name, password_hash, salt, password_needs_change FROM users ORDER BY name",
            [],
            row_to_user,
        )?;
        Ok(rows)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<User>, RegistryError> {
        let row = self.store.query_row(
            "SELECT id, name, password_hash, salt, password_needs_change FROM users WHERE id = ?1",
            rusqlite::params![id.to_string()],
            row_to_user,
        )?;
        Ok(row)
    }

    pub fn create(&self, req: NewUser) -> Result<User, RegistryError> {
        let mut user = User {
            id: Uuid::new_v4(),
            name: req.name,
            password_hash: String::new(),
            salt: new_salt(),
            password_needs_change: req.password_needs_change,
        };
        user.validate().map_err(RegistryError::Validation)?;
        user.password_hash = hash_password(&req.password, user.salt);

        self.store
            .execute(
                "INSERT INTO users (id, name, password_hash, salt, password_needs_change)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    user.id.to_string(),
                    user.name,
                    user.password_hash,
                    user.salt,
                    user.password_needs_change,
                ],
            )
            .map_err(map_write_error)?;

        info!(user_id = %user.id, name = %user.name, "user created");
        Ok(user)
    }

    /// Updates name/flag unconditionally; rehashes the password with a fresh
    /// salt only when `new_password` is `Some` (matches the original's
    /// "rehash only if the plaintext changed" rule — this registry makes
    /// that explicit via the caller passing `None` rather than diffing
    /// against the stored hash).
    pub fn update(&self, id: Uuid, name: String, new_password: Option<String>, password_needs_change: bool) -> Result<User, RegistryError> {
        let existing = self
            .get(id)?
            .ok_or(RegistryError::NotFound(id))?;

        let (password_hash, salt) = match new_password {
            Some(plaintext) => {
                let salt = new_salt();
                (hash_password(&plaintext, salt), salt)
            }
            None => (existing.password_hash, existing.salt),
        };

        let user = User {
            id,
            name,
            password_hash,
            salt,
            password_needs_change,
        };
        user.validate().map_err(RegistryError::Validation)?;

        let rows = self
            .store
            .execute(
                "UPDATE users SET name = ?2, password_hash = ?3, salt = ?4, password_needs_change = ?5
                 WHERE id = ?1",
                rusqlite::params![
                    user.id.to_string(),
                    user.name,
                    user.password_hash,
                    user.salt,
                    user.password_needs_change,
                ],
            )
            .map_err(map_write_error)?;

        debug!(user_id = %user.id, affected_rows = rows, "user update applied");
        Ok(user)
    }

    pub fn delete(&self, id: Uuid) -> Result<(), RegistryError> {
        let rows = self.store.execute(
            "DELETE FROM users WHERE id = ?1",
            rusqlite::params![id.to_string()],
        )?;
        debug!(user_id = %id, affected_rows = rows, "user delete applied");
        Ok(())
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    Ok(User {
        id: id.parse().unwrap_or_default(),
        name: row.get(1)?,
        password_hash: row.get(2)?,
        salt: row.get(3)?,
        password_needs_change: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_hashes_password() {
        let store = Store::open_in_memory().unwrap();
        let registry = UserRegistry::new(&store);
        let created = registry
            .create(NewUser {
                name: "operator1".to_string(),
                password: "swordfish".to_string(),
                password_needs_change: false,
            })
            .unwrap();

        assert_ne!(created.password_hash, "swordfish");
        assert_eq!(
            created.password_hash,
            hash_password("swordfish", created.salt)
        );
    }

    #[test]
    fn update_without_new_password_keeps_existing_hash() {
        let store = Store::open_in_memory().unwrap();
        let registry = UserRegistry::new(&store);
        let created = registry
            .create(NewUser {
                name: "operator1".to_string(),
                password: "swordfish".to_string(),
                password_needs_change: false,
            })
            .unwrap();

        let updated = registry
            .update(created.id, "operator1renamed".to_string(), None, true)
            .unwrap();

        assert_eq!(updated.password_hash, created.password_hash);
        assert_eq!(updated.salt, created.salt);
        assert!(updated.password_needs_change);
    }

    #[test]
    fn update_with_new_password_rehashes_with_fresh_salt() {
        let store = Store::open_in_memory().unwrap();
        let registry = UserRegistry::new(&store);
        let created = registry
            .create(NewUser {
                name: "operator1".to_string(),
                password: "swordfish".to_string(),
                password_needs_change: false,
            })
            .unwrap();

        let updated = registry
            .update(
                created.id,
                created.name.clone(),
                Some("newpassword".to_string()),
                false,
            )
            .unwrap();

        assert_ne!(updated.password_hash, created.password_hash);
    }
}
