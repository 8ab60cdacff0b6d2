//! One-off utility functions shared across the trade loop engine
#![deny(missing_docs)]

use std::time::{SystemTime, UNIX_EPOCH};

pub mod concurrency;
pub mod metered_channels;

/// Returns the current unix timestamp in milliseconds
///
/// This is the only place in the engine that is allowed to call
/// `SystemTime::now` directly; every other component takes its notion of
/// "now" through this function so that tests can reason about it.
pub fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as u64
}

/// Returns the current unix timestamp in seconds
pub fn now_seconds() -> u64 {
    now_millis() / 1000
}
