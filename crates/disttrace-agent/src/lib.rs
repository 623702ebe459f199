//! The agent runtime (spec §1.1): config polling, minute-aligned scheduling
//! with a process-wide probe mutex, a bounded result queue, and a retrying
//! transmitter.
#![forbid(unsafe_code)]

pub mod config;
pub mod queue;
pub mod scheduler;

pub use config::{ConfigCell, ConfigPoller, EffectiveConfig};
pub use queue::{channel, Transmitter, TxQueueHandle};
pub use scheduler::Scheduler;
