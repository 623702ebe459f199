//! Shared coordinator state: the store handle, the token authority, process
//! start time (for `/api/status` uptime), and the single-writer "last
//! transmitted slave config" cell the status endpoint reads.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use disttrace_auth::TokenAuthority;
use disttrace_proto::ConfigResponse;
use disttrace_store::Store;

/// The config-fetch response most recently handed to an agent, and when —
/// updated only by the `/slave/config` handler, read only by `/api/status`.
/// Staleness is acceptable (spec §5).
#[derive(Debug, Clone)]
pub struct LastAgentConfig {
    pub response: ConfigResponse,
    pub transmitted_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CoordinatorState {
    pub store: Arc<Store>,
    pub tokens: Arc<TokenAuthority>,
    pub started_at: DateTime<Utc>,
    pub last_agent_config: Arc<Mutex<Option<LastAgentConfig>>>,
}

impl CoordinatorState {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            tokens: Arc::new(TokenAuthority::new()),
            started_at: Utc::now(),
            last_agent_config: Arc::new(Mutex::new(None)),
        }
    }

    pub fn record_agent_config(&self, response: ConfigResponse) {
        let mut guard = self.last_agent_config.lock().expect("state mutex poisoned");
        *guard = Some(LastAgentConfig {
            response,
            transmitted_at: Utc::now(),
        });
    }
}
