//! Wire and domain types shared between the dist-traceroute coordinator and
//! its agents: agents, targets, operator users, traceroutes/hops, and the
//! HTTP request/response envelopes that carry them.
#![forbid(unsafe_code)]

pub mod agent;
pub mod target;
pub mod trace;
pub mod user;
pub mod validate;
pub mod wire;

pub use agent::{Agent, AgentCredentials};
pub use target::Target;
pub use trace::{Hop, HopAddress, SubmitResultRequest, SubmittedHop, Traceroute};
pub use user::{hash_password, new_salt, User};
pub use wire::{ConfigRequest, ConfigResponse, StatusResponse, SubmitResultResponse};
