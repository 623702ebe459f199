//! AgentScheduler (spec component G): the minute-aligned (plus 10s slack)
//! tick driver that walks the effective target list and hands each
//! completed probe to the transmit queue.
//!
//! State machine per tick, verbatim from spec §4.G:
//! `Idle → Snapshotting → Probing(target_i) → Enqueueing → Probing(target_{i+1})
//! ... → Idle`, with a quiesce signal forcing `Terminated` at the next
//! boundary. The "at most one probe in flight" invariant is enforced with a
//! [`tokio::sync::Mutex`] held across every `Prober::probe` call — acquiring
//! it is the only way any task in this process invokes the prober, so
//! overlap is structurally impossible rather than merely advisory.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use disttrace_probe::Prober;
use disttrace_proto::{AgentCredentials, HopAddress, SubmitResultRequest, SubmittedHop, Target};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ConfigCell;

/// One full tick's slack after the minute boundary (spec §4.G).
const TICK_SLACK: Duration = Duration::from_secs(10);

pub struct Scheduler {
    credentials: AgentCredentials,
    config: ConfigCell,
    prober: Arc<dyn Prober>,
    probe_lock: Arc<Mutex<()>>,
    results: mpsc::Sender<SubmitResultRequest>,
}

impl Scheduler {
    pub fn new(
        credentials: AgentCredentials,
        config: ConfigCell,
        prober: Arc<dyn Prober>,
        results: mpsc::Sender<SubmitResultRequest>,
    ) -> Self {
        Self {
            credentials,
            config,
            prober,
            probe_lock: Arc::new(Mutex::new(())),
            results,
        }
    }

    /// Runs ticks until `cancel` fires. A tick in progress always finishes
    /// its current target before the quiesce check (spec: "after handing
    /// off, re-check the quiesce flag and exit cleanly if set").
    pub async fn run(&self, cancel: CancellationToken) {
        info!("scheduler starting");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduler received quiesce signal before next tick, bye");
                    return;
                }
                _ = tokio::time::sleep(duration_until_next_tick()) => {}
            }

            self.run_tick(&cancel).await;

            if cancel.is_cancelled() {
                info!("scheduler quiescing after completing in-flight tick");
                return;
            }
        }
    }

    async fn run_tick(&self, cancel: &CancellationToken) {
        let snapshot = self.config.load();
        debug!(targets = snapshot.targets.len(), "tick: snapshot taken");

        for target in &snapshot.targets {
            if cancel.is_cancelled() {
                warn!("quiesce signalled mid-tick, abandoning remaining targets");
                return;
            }

            match self.probe_one(target).await {
                Ok(request) => {
                    if self.results.try_send(request).is_err() {
                        warn!(target = %target.name, "transmit queue full or closed, dropping result");
                    }
                }
                Err(e) => {
                    warn!(target = %target.name, error = %e, "probe failed, no result to enqueue");
                }
            }

            if cancel.is_cancelled() {
                info!("quiesce signalled after enqueue, exiting tick early");
                return;
            }
        }
    }

    async fn probe_one(&self, target: &Target) -> Result<SubmitResultRequest, disttrace_probe::ProbeError> {
        let date_time = Utc::now();
        let _permit = self.probe_lock.lock().await;
        let hops = self.prober.probe(target).await?;
        drop(_permit);

        let success = hops.last().map(|h| h.success).unwrap_or(false);
        let hop_count = hops.len() as i32;
        let submitted_hops = hops
            .into_iter()
            .map(|hop| SubmittedHop {
                success: hop.success,
                address: hop.address,
                host: hop.host,
                n: hop.n,
                elapsed_time_nanos: hop.elapsed.as_nanos() as u64,
                ttl: hop.ttl,
            })
            .collect();

        Ok(SubmitResultRequest {
            slave: self.credentials.clone(),
            id: Uuid::new_v4(),
            date_time,
            target: target.clone(),
            success,
            hop_count,
            hops: submitted_hops,
        })
    }
}

fn duration_until_next_tick() -> Duration {
    let now = Utc::now();
    let secs_into_minute = now.second() as u64;
    let nanos = now.timestamp_subsec_nanos() as u64;
    let elapsed = Duration::from_secs(secs_into_minute) + Duration::from_nanos(nanos);
    let until_minute = Duration::from_secs(60).saturating_sub(elapsed);
    until_minute + TICK_SLACK
}

/// A hop address helper used only by the synthetic `--debug-results`
/// injection path in `main.rs`; kept here since it's the only place that
/// builds a [`HopAddress`] outside the probe crate itself.
pub fn loopback_hop_address() -> HopAddress {
    HopAddress([127, 0, 0, 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use disttrace_probe::StubProber;
    use uuid::Uuid;

    fn sample_target() -> Target {
        Target {
            id: Uuid::new_v4(),
            name: "google".to_string(),
            address: "8.8.8.8".to_string(),
            retries: 1,
            max_hops: 5,
            timeout_ms: 500,
        }
    }

    fn sample_credentials() -> AgentCredentials {
        AgentCredentials {
            id: Uuid::new_v4(),
            name: "falbala".to_string(),
            secret: "1234".to_string(),
        }
    }

    #[tokio::test]
    async fn tick_enqueues_one_result_per_target() {
        let (tx, mut rx) = mpsc::channel(10);
        let cell = ConfigCell::new(crate::config::EffectiveConfig {
            agent_id: Uuid::new_v4(),
            targets: vec![sample_target(), sample_target()],
        });
        let scheduler = Scheduler::new(sample_credentials(), cell, Arc::new(StubProber::new()), tx);

        let cancel = CancellationToken::new();
        scheduler.run_tick(&cancel).await;

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[tokio::test]
    async fn quiesce_mid_tick_stops_remaining_targets() {
        let (tx, mut rx) = mpsc::channel(10);
        let cell = ConfigCell::new(crate::config::EffectiveConfig {
            agent_id: Uuid::new_v4(),
            targets: vec![sample_target(), sample_target(), sample_target()],
        });
        let scheduler = Scheduler::new(sample_credentials(), cell, Arc::new(StubProber::new()), tx);

        let cancel = CancellationToken::new();
        cancel.cancel();
        scheduler.run_tick(&cancel).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn probes_never_overlap_in_wall_clock_time() {
        let prober = Arc::new(StubProber::new());
        let (tx, mut rx) = mpsc::channel(10);
        let cell = ConfigCell::new(crate::config::EffectiveConfig {
            agent_id: Uuid::new_v4(),
            targets: vec![sample_target(), sample_target(), sample_target()],
        });
        let scheduler = Scheduler::new(sample_credentials(), cell, prober.clone(), tx);

        let cancel = CancellationToken::new();
        scheduler.run_tick(&cancel).await;
        while rx.try_recv().is_ok() {}

        let invocations = prober.invocations();
        assert_eq!(invocations.len(), 3);
        for pair in invocations.windows(2) {
            assert!(pair[0].finished_at <= pair[1].started_at);
        }
    }
}
