//! AgentTxQueue (spec component H): a bounded in-memory queue of completed
//! results plus the retrying transmitter that drains it.
//!
//! Backed by a [`tokio::sync::mpsc::channel`] of capacity 100. `enqueue` is
//! `try_send`: on a full queue the item is dropped and a warning logged —
//! backpressure here is drop-newest, not block, per spec §4.H ("probe
//! cadence is fixed and the coordinator outage is visible from the
//! mounting log volume"). The channel's single consumer is the
//! transmitter task below.

use std::time::Duration;

use disttrace_proto::{SubmitResultRequest, SubmitResultResponse};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Queue capacity (spec §4.H).
pub const QUEUE_CAPACITY: usize = 100;

/// Per-item delivery attempts before giving up (spec §4.H).
const MAX_ATTEMPTS: u32 = 3;

/// Wait between retries of the same item.
const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Cooperative yield between distinct successfully-delivered items.
const BETWEEN_ITEMS_DELAY: Duration = Duration::from_secs(1);

/// Per-request timeout on the transmitter's HTTP client (spec §5).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The non-blocking producer half. Cheap to clone (an `mpsc::Sender` already
/// is); scheduler ticks hold one of these.
#[derive(Clone)]
pub struct TxQueueHandle(mpsc::Sender<SubmitResultRequest>);

impl TxQueueHandle {
    /// Non-blocking enqueue. Drops the item and logs a warning on a full
    /// queue rather than ever blocking the scheduler.
    pub fn enqueue(&self, item: SubmitResultRequest) {
        if let Err(mpsc::error::TrySendError::Full(item)) = self.0.try_send(item) {
            warn!(target = %item.target.name, "transmit queue full, dropping result (backpressure)");
        }
    }
}

/// Builds a fresh bounded queue: a [`TxQueueHandle`] for producers and a
/// receiver for the transmitter loop.
pub fn channel() -> (TxQueueHandle, mpsc::Receiver<SubmitResultRequest>) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    (TxQueueHandle(tx), rx)
}

#[derive(Debug, thiserror::Error)]
enum SendOutcome {
    #[error("delivered")]
    Delivered,
    #[error("retryable failure")]
    Retry,
    #[error("permanently rejected: {0}")]
    Rejected(String),
}

/// Holds at most one in-flight item, POSTs it to
/// `http://{master}:{port}/slave/results`, and classifies the outcome per
/// spec §4.H. Runs until the queue closes or, on quiesce, until the current
/// in-flight item finishes — a best-effort, not exhaustive, drain: items
/// still queued when quiesce fires may be lost, matching the at-most-once
/// delivery contract.
pub struct Transmitter {
    client: reqwest::Client,
    results_url: String,
}

impl Transmitter {
    pub fn new(master_host: &str, master_port: u16) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with a fixed timeout");

        Self {
            client,
            results_url: format!("http://{master_host}:{master_port}/slave/results"),
        }
    }

    pub async fn run(&self, mut results: mpsc::Receiver<SubmitResultRequest>, cancel: CancellationToken) {
        info!("transmitter starting");
        loop {
            let item = tokio::select! {
                item = results.recv() => item,
                _ = cancel.cancelled() => {
                    info!("transmitter quiescing, no in-flight item to finish");
                    return;
                }
            };

            let Some(item) = item else {
                info!("transmit queue closed, transmitter exiting");
                return;
            };

            self.deliver_with_retry(item).await;

            if cancel.is_cancelled() {
                info!("transmitter drained in-flight item, quiescing (best-effort drain)");
                return;
            }

            tokio::time::sleep(BETWEEN_ITEMS_DELAY).await;
        }
    }

    async fn deliver_with_retry(&self, item: SubmitResultRequest) {
        let target = item.target.name.clone();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.send_once(&item).await {
                SendOutcome::Delivered => {
                    debug!(target = %target, attempts, "result delivered");
                    return;
                }
                SendOutcome::Rejected(reason) => {
                    warn!(target = %target, reason, "result permanently rejected by coordinator");
                    return;
                }
                SendOutcome::Retry => {
                    if attempts >= MAX_ATTEMPTS {
                        warn!(target = %target, attempts, "result discarded after max attempts");
                        return;
                    }
                    warn!(target = %target, attempts, "transient failure, retrying after delay");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    async fn send_once(&self, item: &SubmitResultRequest) -> SendOutcome {
        let resp = match self.client.post(&self.results_url).json(item).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "transport error posting result");
                return SendOutcome::Retry;
            }
        };

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "non-2xx response posting result");
            return SendOutcome::Retry;
        }

        match resp.json::<SubmitResultResponse>().await {
            Ok(envelope) if envelope.success => SendOutcome::Delivered,
            Ok(envelope) if envelope.retry_possible => SendOutcome::Retry,
            Ok(envelope) => SendOutcome::Rejected(envelope.error),
            Err(e) => {
                warn!(error = %e, "malformed response envelope");
                SendOutcome::Retry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disttrace_proto::{AgentCredentials, Target};
    use uuid::Uuid;

    fn sample_item() -> SubmitResultRequest {
        SubmitResultRequest {
            slave: AgentCredentials {
                id: Uuid::new_v4(),
                name: "falbala".to_string(),
                secret: "1234".to_string(),
            },
            id: Uuid::new_v4(),
            date_time: chrono::Utc::now(),
            target: Target {
                id: Uuid::new_v4(),
                name: "google".to_string(),
                address: "8.8.8.8".to_string(),
                retries: 1,
                max_hops: 5,
                timeout_ms: 500,
            },
            success: true,
            hop_count: 1,
            hops: vec![],
        }
    }

    #[test]
    fn enqueue_delivers_under_capacity() {
        let (handle, mut rx) = channel();
        handle.enqueue(sample_item());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn enqueue_drops_newest_item_when_queue_is_full() {
        let (tx, _rx) = mpsc::channel::<SubmitResultRequest>(1);
        let handle = TxQueueHandle(tx);
        handle.enqueue(sample_item());
        // second enqueue: queue is full, receiver still holds the first item
        handle.enqueue(sample_item());
        // no panic, no block — that's the whole contract under test here.
    }
}
