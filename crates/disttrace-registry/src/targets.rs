//! Probing-target CRUD.

use tracing::{debug, info};
use uuid::Uuid;

use disttrace_proto::Target;
use disttrace_store::Store;

use crate::{map_write_error, RegistryError};

pub struct TargetRegistry<'a> {
    store: &'a Store,
}

impl<'a> TargetRegistry<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<Target>, RegistryError> {
        let rows = self.store.query_rows(
            "SELECT id, name, address, retries, max_hops, timeout_ms FROM targets ORDER BY name",
            [],
            row_to_target,
        )?;
        Ok(rows)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Target>, RegistryError> {
        let row = self.store.query_row(
            "SELECT id, name, address, retries, max_hops, timeout_ms FROM targets WHERE id = ?1",
            rusqlite::params![id.to_string()],
            row_to_target,
        )?;
        Ok(row)
    }

    pub fn create(&self, mut target: Target) -> Result<Target, RegistryError> {
        target.validate().map_err(RegistryError::Validation)?;
        target.id = Uuid::new_v4();

        self.store
            .execute(
                "INSERT INTO targets (id, name, address, retries, max_hops, timeout_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    target.id.to_string(),
                    target.name,
                    target.address,
                    target.retries,
                    target.max_hops,
                    target.timeout_ms,
                ],
            )
            .map_err(map_write_error)?;

        info!(target_id = %target.id, name = %target.name, "target created");
        Ok(target)
    }

    pub fn update(&self, target: Target) -> Result<Target, RegistryError> {
        target.validate().map_err(RegistryError::Validation)?;

        let rows = self
            .store
            .execute(
                "UPDATE targets SET name = ?2, address = ?3, retries = ?4, max_hops = ?5, timeout_ms = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    target.id.to_string(),
                    target.name,
                    target.address,
                    target.retries,
                    target.max_hops,
                    target.timeout_ms,
                ],
            )
            .map_err(map_write_error)?;

        debug!(target_id = %target.id, affected_rows = rows, "target update applied");
        Ok(target)
    }

    pub fn delete(&self, id: Uuid) -> Result<(), RegistryError> {
        let rows = self.store.execute(
            "DELETE FROM targets WHERE id = ?1",
            rusqlite::params![id.to_string()],
        )?;
        debug!(target_id = %id, affected_rows = rows, "target delete applied");
        Ok(())
    }
}

fn row_to_target(row: &rusqlite::Row<'_>) -> rusqlite::Result<Target> {
    let id: String = row.get(0)?;
    Ok(Target {
        id: id.parse().unwrap_or_default(),
        name: row.get(1)?,
        address: row.get(2)?,
        retries: row.get(3)?,
        max_hops: row.get(4)?,
        timeout_ms: row.get(5)?,
    })
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
    fn create_then_list_then_delete_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let registry = TargetRegistry::new(&store);

        let created = registry.create(sample()).unwrap();
        assert!(registry.list().unwrap().iter().any(|t| t.id == created.id));

        registry.delete(created.id).unwrap();
        assert!(!registry.list().unwrap().iter().any(|t| t.id == created.id));
    }

    #[test]
    fn out_of_range_retries_rejected() {
        let store = Store::open_in_memory().unwrap();
        let registry = TargetRegistry::new(&store);
        let mut target = sample();
        target.retries = 42;

        assert!(matches!(
            registry.create(target),
            Err(RegistryError::Validation(_))
        ));
    }
}
