//! AgentConfigPoller (spec component F): periodically pulls this agent's
//! target list from the coordinator and publishes it for the scheduler to
//! read.
//!
//! The original implementation passes configuration around as a `**Cfg`
//! double pointer so a background poller can swap the pointee out from
//! under readers without a lock (spec §9's "double-pointer configuration
//! handoff" note). Here that's replaced by a single atomic pointer swap:
//! [`arc_swap::ArcSwap`] holds the current [`EffectiveConfig`], the poller
//! is the only writer (`.store`), and every other task takes an immutable
//! snapshot (`.load`) before use — matching the re-architecture spec.md §9
//! calls for.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{Timelike, Utc};
use disttrace_proto::{AgentCredentials, ConfigRequest, ConfigResponse, Target};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The target list this agent is currently configured to probe, plus the
/// agent UUID the coordinator assigned on the most recent fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub agent_id: Uuid,
    pub targets: Vec<Target>,
}

impl EffectiveConfig {
    pub fn empty() -> Self {
        Self {
            agent_id: Uuid::nil(),
            targets: Vec::new(),
        }
    }
}

impl From<ConfigResponse> for EffectiveConfig {
    fn from(resp: ConfigResponse) -> Self {
        Self {
            agent_id: resp.id,
            targets: resp.targets,
        }
    }
}

/// Shared, atomically-swappable config cell. Cheap to clone: it's an `Arc`
/// around the swap point.
#[derive(Clone)]
pub struct ConfigCell(Arc<ArcSwap<EffectiveConfig>>);

impl ConfigCell {
    pub fn new(initial: EffectiveConfig) -> Self {
        Self(Arc::new(ArcSwap::new(Arc::new(initial))))
    }

    /// A read-consistent snapshot for the duration of one scheduler tick
    /// (spec §5's "config snapshot visible to the scheduler is read-consistent
    /// for the duration of a tick" guarantee — callers load once per tick and
    /// keep using the same `Arc`).
    pub fn load(&self) -> Arc<EffectiveConfig> {
        self.0.load_full()
    }

    fn store(&self, new: EffectiveConfig) {
        self.0.store(Arc::new(new));
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("coordinator returned {0}")]
    BadStatus(reqwest::StatusCode),
}

/// Polls `POST /slave/config` on the coordinator every clock-minute and
/// publishes the result to a [`ConfigCell`] when it differs from the
/// currently effective configuration.
pub struct ConfigPoller {
    client: reqwest::Client,
    master_url: String,
    credentials: AgentCredentials,
    cell: ConfigCell,
}

impl ConfigPoller {
    pub fn new(master_host: &str, master_port: u16, credentials: AgentCredentials, cell: ConfigCell) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds with a fixed timeout");

        Self {
            client,
            master_url: format!("http://{master_host}:{master_port}/slave/config"),
            credentials,
            cell,
        }
    }

    pub fn cell(&self) -> ConfigCell {
        self.cell.clone()
    }

    /// One fetch-and-maybe-publish cycle. Failures (network, non-2xx, parse,
    /// validate) are the caller's to log; they always leave the effective
    /// config untouched.
    async fn poll_once(&self) -> Result<Option<EffectiveConfig>, PollError> {
        let req = ConfigRequest {
            id: self.credentials.id,
            name: self.credentials.name.clone(),
            secret: self.credentials.secret.clone(),
        };

        let resp = self.client.post(&self.master_url).json(&req).send().await?;
        if !resp.status().is_success() {
            return Err(PollError::BadStatus(resp.status()));
        }

        let body: ConfigResponse = resp.json().await?;
        for target in &body.targets {
            if let Err(e) = target.validate() {
                warn!(target = %target.name, error = %e, "fetched config failed validation, ignoring");
                return Ok(None);
            }
        }

        Ok(Some(EffectiveConfig::from(body)))
    }

    /// Runs until `cancel` fires. Wakes on every whole clock-minute, matching
    /// the original's `time.Now().Truncate(time.Minute)` re-arm.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("config poller starting");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("config poller received quiesce signal, bye");
                    return;
                }
                _ = tokio::time::sleep(duration_until_next_minute()) => {}
            }

            debug!("polling coordinator for current target list");
            match self.poll_once().await {
                Ok(Some(fresh)) => {
                    let current = self.cell.load();
                    if *current != fresh {
                        info!(targets = fresh.targets.len(), "configuration changed, applying");
                        self.cell.store(fresh);
                    } else {
                        debug!("configuration unchanged");
                    }
                }
                Ok(None) => {
                    warn!("fetched configuration failed validation, keeping previous config");
                }
                Err(e) => {
                    warn!(error = %e, "couldn't fetch configuration from coordinator");
                }
            }
        }
    }
}

fn duration_until_next_minute() -> Duration {
    let now = Utc::now();
    let secs_into_minute = now.second() as u64;
    let nanos = now.timestamp_subsec_nanos() as u64;
    let elapsed = Duration::from_secs(secs_into_minute) + Duration::from_nanos(nanos);
    Duration::from_secs(60).saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_starts_at_initial_value() {
        let cell = ConfigCell::new(EffectiveConfig::empty());
        assert!(cell.load().targets.is_empty());
    }

    #[test]
    fn cell_store_is_visible_to_a_previously_taken_clone() {
        let cell = ConfigCell::new(EffectiveConfig::empty());
        let reader = cell.clone();

        let mut fresh = EffectiveConfig::empty();
        fresh.agent_id = Uuid::new_v4();
        cell.store(fresh.clone());

        assert_eq!(*reader.load(), fresh);
    }

    #[test]
    fn duration_until_next_minute_never_exceeds_sixty_seconds() {
        let d = duration_until_next_minute();
        assert!(d <= Duration::from_secs(60));
    }
}
