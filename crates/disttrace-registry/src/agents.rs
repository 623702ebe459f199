//! Agent ("slave") CRUD.

use tracing::{debug, info};
use uuid::Uuid;

use disttrace_proto::Agent;
use disttrace_store::Store;

use crate::{map_write_error, RegistryError};

pub struct AgentRegistry<'a> {
    store: &'a Store,
}

impl<'a> AgentRegistry<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<Agent>, RegistryError> {
        let rows = self.store.query_rows(
            "SELECT id, name, secret FROM agents ORDER BY name",
            [],
            row_to_agent,
        )?;
        Ok(rows)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Agent>, RegistryError> {
        let row = self.store.query_row(
            "SELECT id, name, secret FROM agents WHERE id = ?1",
            rusqlite::params![id.to_string()],
            row_to_agent,
        )?;
        Ok(row)
    }

    pub fn create(&self, mut agent: Agent) -> Result<Agent, RegistryError> {
        agent.validate().map_err(RegistryError::Validation)?;
        agent.id = Uuid::new_v4();

        self.store
            .execute(
                "INSERT INTO agents (id, name, secret) VALUES (?1, ?2, ?3)",
                rusqlite::params![agent.id.to_string(), agent.name, agent.secret],
            )
            .map_err(map_write_error)?;

        info!(agent_id = %agent.id, name = %agent.name, "agent created");
        Ok(agent)
    }

    pub fn update(&self, agent: Agent) -> Result<Agent, RegistryError> {
        agent.validate().map_err(RegistryError::Validation)?;

        let rows = self
            .store
            .execute(
                "UPDATE agents SET name = ?2, secret = ?3 WHERE id = ?1",
                rusqlite::params![agent.id.to_string(), agent.name, agent.secret],
            )
            .map_err(map_write_error)?;

        debug!(agent_id = %agent.id, affected_rows = rows, "agent update applied");
        Ok(agent)
    }

    pub fn delete(&self, id: Uuid) -> Result<(), RegistryError> {
        let rows = self.store.execute(
            "DELETE FROM agents WHERE id = ?1",
            rusqlite::params![id.to_string()],
        )?;
        debug!(agent_id = %id, affected_rows = rows, "agent delete applied");
        Ok(())
    }
}

fn row_to_agent(row: &rusqlite::Row<'_>) -> rusqlite::Result<Agent> {
    let id: String = row.get(0)?;
    Ok(Agent {
        id: id.parse().unwrap_or_default(),
        name: row.get(1)?,
        secret: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Agent {
        Agent {
            id: Uuid::nil(),
            name: "falbala".to_string(),
            secret: "1234".to_string(),
        }
    }

    #[test]
    fn create_assigns_server_side_id() {
        let store = Store::open_in_memory().unwrap();
        let registry = AgentRegistry::new(&store);
        let created = registry.create(sample()).unwrap();
        assert_ne!(created.id, Uuid::nil());
    }

    #[test]
    fn round_trips_through_list() {
        let store = Store::open_in_memory().unwrap();
        let registry = AgentRegistry::new(&store);
        let created = registry.create(sample()).unwrap();

        let listed = registry.list().unwrap();
        assert!(listed.iter().any(|a| a.id == created.id));
    }

    #[test]
    fn delete_removes_from_list() {
        let store = Store::open_in_memory().unwrap();
        let registry = AgentRegistry::new(&store);
        let created = registry.create(sample()).unwrap();

        registry.delete(created.id).unwrap();
        let listed = registry.list().unwrap();
        assert!(!listed.iter().any(|a| a.id == created.id));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let registry = AgentRegistry::new(&store);
        registry.create(sample()).unwrap();

        let err = registry.create(sample()).unwrap_err();
        assert!(matches!(err, RegistryError::NameTaken));
    }

    #[test]
    fn invalid_name_is_rejected_before_writing() {
        let store = Store::open_in_memory().unwrap();
        let registry = AgentRegistry::new(&store);
        let mut agent = sample();
        agent.name = "not valid!".to_string();

        assert!(matches!(
            registry.create(agent),
            Err(RegistryError::Validation(_))
        ));
        assert!(registry.list().unwrap().is_empty());
    }
}
