//! Notification hook — single-callback fan-out of applied events.
//!
//! The callback is registered once at startup (typically by the WebSocket
//! layer) and invoked synchronously from inside the state-machine
//! operations. A panicking callback must never take the indexer down, so
//! invocations are unwind-guarded.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

pub const CNS_REGISTRATION: &str = "cns_registration";
pub const CNS_UPDATE: &str = "cns_update";
pub const CNS_TRANSFER: &str = "cns_transfer";
pub const TOKEN_DEPLOY: &str = "token_deploy";
pub const TOKEN_MINT: &str = "token_mint";

/// `(event_kind, payload_json, height, tx_index)`
pub type NotificationCallback = Box<dyn Fn(&str, &str, u64, u64) + Send + Sync>;

/// Holds the registered callback, if any.
#[derive(Default)]
pub struct NotificationSink {
    callback: Option<NotificationCallback>,
}

impl NotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_callback(&mut self, callback: impl Fn(&str, &str, u64, u64) + Send + Sync + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Deliver an event. No-op without a registered callback; panics from
    /// the callback are caught and logged.
    pub fn emit(&self, kind: &str, payload: &str, height: u64, tx_index: u64) {
        let Some(callback) = &self.callback else {
            return;
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| callback(kind, payload, height, tx_index)));
        if outcome.is_err() {
            warn!(kind, height, tx_index, "Notification callback panicked");
        }
    }
}

impl std::fmt::Debug for NotificationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSink")
            .field("registered", &self.callback.is_some())
            .finish()
    }
}
