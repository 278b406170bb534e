//! gatebridge/src/state.rs
//! Process-global state: the logging reload handle and aggregate counters.

use lazy_static::lazy_static;
use std::sync::atomic::AtomicU64;
use tracing_subscriber::{filter::EnvFilter, reload::Handle as ReloadHandle};

// Aggregate counters, read by callers who want a cheap metrics snapshot
// without touching the pool or registry locks.
pub static ACTIVE_CONNECTIONS: AtomicU64 = AtomicU64::new(0);
pub static TOTAL_REQUESTS: AtomicU64 = AtomicU64::new(0);
pub static TOTAL_CALLBACK_INVOCATIONS: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    pub static ref RELOAD_HANDLE: std::sync::Mutex<Option<ReloadHandle<EnvFilter, tracing_subscriber::Registry>>> =
        std::sync::Mutex::new(None);
}
