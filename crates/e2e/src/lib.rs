//! Runbook Rig end-to-end suite
//!
//! Concrete scenarios plus the fixtures they run against. The fast tests
//! drive the scenarios against the in-memory mock cloud; the live runner
//! in `tests/live.rs` points the same scenarios at a real account.

pub mod fixtures;
pub mod scenarios;

pub use scenarios::EncryptRootVolume;
