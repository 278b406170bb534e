//! gatebridge/src/logging.rs
//! Logging initialization and runtime updates.

use crate::state::RELOAD_HANDLE;
use std::sync::Once;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{filter::EnvFilter, fmt, reload::Layer as ReloadLayer};

static LOG_INIT: Once = Once::new();

// Initialize logging once
pub fn init_logging(default: &str) {
    LOG_INIT.call_once(|| {
        let filter = EnvFilter::new(default);
        let (reload_layer, handle) = ReloadLayer::new(filter);
        let subscriber = tracing_subscriber::registry()
            .with(reload_layer)
            .with(fmt::layer());
        tracing::subscriber::set_global_default(subscriber).ok();
        *RELOAD_HANDLE.lock().unwrap() = Some(handle);
    });
}

/// Reload the global filter at runtime. Returns `false` if logging has not
/// been initialized yet.
pub fn set_log_level(level: &str) -> bool {
    if let Some(handle) = RELOAD_HANDLE.lock().unwrap().as_ref() {
        handle.reload(EnvFilter::new(level)).is_ok()
    } else {
        false
    }
}
