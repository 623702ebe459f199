//! The black-box probing interface (spec component B) and a deterministic
//! stand-in implementation.
//!
//! Real packet emission/TTL iteration is explicitly out of scope (spec §1)
//! — `StubProber` exists so the scheduler, queue, and transmitter have
//! something to drive end to end in tests without touching raw sockets.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use disttrace_proto::{HopAddress, Target};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe for target {target} timed out")]
    Timeout { target: String },
    #[error("probe for target {target} failed: {reason}")]
    Failed { target: String, reason: String },
}

/// One hop as returned by a probe, pre-validation, pre-wire-envelope.
#[derive(Debug, Clone)]
pub struct ProbedHop {
    pub success: bool,
    pub address: HopAddress,
    pub host: String,
    pub n: i32,
    pub elapsed: Duration,
    pub ttl: i32,
}

/// Given `(address, maxHops, retries, timeoutMs)` (carried on [`Target`]),
/// returns an ordered hop list. Implementations own their own retry/timeout
/// handling internally — the scheduler calls this once per target per tick.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Target) -> Result<Vec<ProbedHop>, ProbeError>;
}

/// Records one probe call's wall-clock window, so tests can assert the
/// "at most one probe in flight" concurrency invariant (spec §8 property 7).
#[derive(Debug, Clone)]
pub struct ProbeInvocation {
    pub target_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Deterministic, dependency-free [`Prober`]: sleeps a small jittered
/// duration per synthetic hop and returns a hop chain whose length is
/// derived from the target's own UUID, so repeated runs against the same
/// target are stable.
pub struct StubProber {
    invocations: Arc<Mutex<Vec<ProbeInvocation>>>,
}

impl StubProber {
    pub fn new() -> Self {
        Self {
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every invocation recorded so far, in call order.
    pub fn invocations(&self) -> Vec<ProbeInvocation> {
        self.invocations.lock().expect("invocations mutex poisoned").clone()
    }
}

impl Default for StubProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for StubProber {
    async fn probe(&self, target: &Target) -> Result<Vec<ProbedHop>, ProbeError> {
        let started_at = Utc::now();
        debug!(target = %target.name, "stub probe starting");

        let hop_count = synthetic_hop_count(target);
        let mut hops = Vec::with_capacity(hop_count as usize);

        for ttl in 0..hop_count {
            let jitter_ms = 1 + (synthetic_seed(target, ttl) % 4);
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

            hops.push(ProbedHop {
                success: ttl == hop_count - 1,
                address: synthetic_address(target, ttl),
                host: String::new(),
                n: 1,
                elapsed: Duration::from_millis(jitter_ms),
                ttl,
            });
        }

        let finished_at = Utc::now();
        self.invocations
            .lock()
            .expect("invocations mutex poisoned")
            .push(ProbeInvocation {
                target_id: target.id,
                started_at,
                finished_at,
            });

        debug!(target = %target.name, hops = hops.len(), "stub probe finished");
        Ok(hops)
    }
}

fn synthetic_seed(target: &Target, salt: i32) -> u64 {
    let bytes = target.id.as_bytes();
    let mut acc = salt as u64;
    for &b in bytes {
        acc = acc.wrapping_mul(31).wrapping_add(b as u64);
    }
    acc
}

fn synthetic_hop_count(target: &Target) -> i32 {
    let span = target.max_hops.max(1);
    1 + (synthetic_seed(target, 0) % span as u64) as i32
}

fn synthetic_address(target: &Target, ttl: i32) -> HopAddress {
    let seed = synthetic_seed(target, ttl + 1);
    HopAddress([
        10,
        ((seed >> 16) & 0xFF) as u8,
        ((seed >> 8) & 0xFF) as u8,
        ((seed ^ ttl as u64) & 0xFF) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_target() -> Target {
        Target {
            id: Uuid::new_v4(),
            name: "google".to_string(),
            address: "8.8.8.8".to_string(),
            retries: 1,
            max_hops: 10,
            timeout_ms: 500,
        }
    }

    #[tokio::test]
    async fn probe_is_deterministic_for_same_target() {
        let prober = StubProber::new();
        let target = sample_target();

        let first: Vec<_> = prober.probe(&target).await.unwrap();
        let second: Vec<_> = prober.probe(&target).await.unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.address.0, b.address.0);
        }
    }

    #[tokio::test]
    async fn last_hop_is_marked_successful() {
        let prober = StubProber::new();
        let hops = prober.probe(&sample_target()).await.unwrap();
        assert!(hops.last().unwrap().success);
    }

    #[tokio::test]
    async fn records_one_invocation_per_probe_call() {
        let prober = StubProber::new();
        let target = sample_target();
        prober.probe(&target).await.unwrap();
        prober.probe(&target).await.unwrap();

        let invocations = prober.invocations();
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[0].target_id, target.id);
    }
}
