//! Connectivity signals consumed by the core.
//!
//! Two read-only inputs: a manual "go offline" toggle and a best-effort
//! "network reachable" observation from the platform. Both are watch
//! channels so tasks can both read the current value and await changes
//! (the reconnect timer aborts the moment the user goes offline).

use tokio::sync::watch;

#[derive(Clone)]
pub struct Connectivity {
    manual_offline_tx: watch::Sender<bool>,
    reachable_tx: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new() -> Self {
        let (manual_offline_tx, _) = watch::channel(false);
        let (reachable_tx, _) = watch::channel(true);
        Self {
            manual_offline_tx,
            reachable_tx,
        }
    }

    pub fn set_manual_offline(&self, offline: bool) {
        self.manual_offline_tx.send_replace(offline);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable_tx.send_replace(reachable);
    }

    pub fn manual_offline(&self) -> bool {
        *self.manual_offline_tx.borrow()
    }

    pub fn reachable(&self) -> bool {
        *self.reachable_tx.borrow()
    }

    pub fn watch_manual_offline(&self) -> watch::Receiver<bool> {
        self.manual_offline_tx.subscribe()
    }

    pub fn watch_reachable(&self) -> watch::Receiver<bool> {
        self.reachable_tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new()
    }
}
