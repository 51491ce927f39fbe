//! Alert channel state machine.
//!
//! One long-lived task owns the connection lifecycle: connect, read until
//! the stream drops, back off, reconnect. The manual offline toggle wins
//! over everything, including a backoff timer already counting down.

use super::backoff;
use super::dedup::Deduplicator;
use super::transport::AlertTransport;
use super::types::{Alert, ConnectionState};
use crate::config::CoreConfig;
use crate::connectivity::Connectivity;
use crate::events::{EventBus, UiEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Rate limiter for user-facing connectivity notices. The channel keeps
/// reconnecting on its own schedule; the user only hears about it once per
/// cooldown.
struct NoticeGate {
    cooldown: Duration,
    last: Option<Instant>,
}

impl NoticeGate {
    fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.cooldown => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

pub struct AlertChannel {
    transport: Arc<dyn AlertTransport>,
    connectivity: Connectivity,
    events: EventBus,
    config: CoreConfig,
    state_tx: watch::Sender<ConnectionState>,
    alerts_tx: broadcast::Sender<Alert>,
}

impl AlertChannel {
    pub fn new(
        transport: Arc<dyn AlertTransport>,
        connectivity: Connectivity,
        events: EventBus,
        config: CoreConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (alerts_tx, _) = broadcast::channel(64);
        Self {
            transport,
            connectivity,
            events,
            config,
            state_tx,
            alerts_tx,
        }
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Deduplicated alerts, in arrival order.
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts_tx.subscribe()
    }

    /// Drive the channel until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut offline = self.connectivity.watch_manual_offline();
        let mut dedup = Deduplicator::new(self.config.dedup_window(), self.config.dedup_cap);
        let mut notices = NoticeGate::new(self.config.notice_cooldown());
        let mut attempt: u32 = 0;
        let mut was_down = false;
        let mut ever_connected = false;

        loop {
            if *shutdown.borrow() {
                break;
            }

            if *offline.borrow() {
                self.set_state(ConnectionState::Disconnected);
                attempt = 0;
                tokio::select! {
                    _ = offline.changed() => continue,
                    _ = shutdown.changed() => continue,
                }
            }

            self.set_state(ConnectionState::Connecting);
            let connection = tokio::select! {
                result = self.transport.connect() => result,
                _ = offline.changed() => continue,
                _ = shutdown.changed() => continue,
            };

            match connection {
                // A connect only counts once the post-connect ping goes out
                Ok(mut connection) => match connection.ping().await {
                    Ok(()) => {
                        info!("alert channel connected");
                        self.set_state(ConnectionState::Connected);
                        attempt = 0;
                        ever_connected = true;
                        if was_down && notices.allow(Instant::now()) {
                            self.events.publish(UiEvent::Notice {
                                message: "Connection restored".to_string(),
                            });
                        }
                        was_down = false;

                        loop {
                            tokio::select! {
                                next = connection.next_alert() => match next {
                                    Ok(Some(alert)) => self.deliver(alert, &mut dedup),
                                    Ok(None) => {
                                        debug!("alert stream closed by server");
                                        break;
                                    }
                                    Err(e) => {
                                        warn!(error = %e, "alert stream dropped");
                                        break;
                                    }
                                },
                                _ = offline.changed() => break,
                                _ = shutdown.changed() => break,
                            }
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "post-connect ping failed");
                    }
                },
                Err(e) => {
                    debug!(error = %e, "alert channel connect failed");
                }
            }

            if *shutdown.borrow() || *offline.borrow() {
                continue;
            }

            // Either connect failed or an established stream dropped. Never
            // having been connected is not a loss; startup against a dead
            // server stays quiet and just keeps retrying.
            was_down = true;
            if ever_connected && notices.allow(Instant::now()) {
                self.events.publish(UiEvent::Notice {
                    message: "Connection lost, retrying".to_string(),
                });
            }

            attempt = backoff::next_attempt(attempt);
            let delay = backoff::delay_for_attempt(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off");
            self.set_state(ConnectionState::BackingOff);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = offline.changed() => {}
                _ = shutdown.changed() => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    fn deliver(&self, alert: Alert, dedup: &mut Deduplicator) {
        let key = alert.dedup_key();
        if !dedup.check(&key, Instant::now()) {
            debug!(key, "duplicate alert suppressed");
            return;
        }
        // No subscribers is fine, the alert is simply not displayed
        let _ = self.alerts_tx.send(alert);
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}
