//! Empty by design — this crate exists to host `tests/integration.rs`, the
//! scenario tests run end to end against an in-process coordinator.
