//! Popup scheduler: one popup on screen at a time.
//!
//! Alerts arriving while a popup is visible queue behind it and each popup
//! carries a batch label ("2 of 5") so the user knows more are coming. The
//! batch counter resets once the queue drains. Every shown popup bumps a
//! generation counter; the auto-dismiss timer captures the generation it
//! was armed for and does nothing if another popup has taken the screen
//! since.

use crate::events::{EventBus, UiEvent};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PopupContent {
    pub title: String,
    pub body: String,
}

struct Inner {
    queue: VecDeque<PopupContent>,
    showing: bool,
    shown_in_batch: usize,
    generation: u64,
}

#[derive(Clone)]
pub struct PopupScheduler {
    events: EventBus,
    auto_dismiss: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl PopupScheduler {
    pub fn new(events: EventBus, auto_dismiss: Duration) -> Self {
        Self {
            events,
            auto_dismiss,
            inner: Arc::new(Mutex::new(Inner {
                queue: VecDeque::new(),
                showing: false,
                shown_in_batch: 0,
                generation: 0,
            })),
        }
    }

    /// Queue a popup. Shows immediately when the screen is free.
    pub fn enqueue(&self, content: PopupContent) {
        let mut inner = self.lock();
        if inner.showing {
            inner.queue.push_back(content);
        } else {
            self.show(&mut inner, content);
        }
    }

    /// Dismiss the visible popup, advancing to the next queued one.
    pub fn dismiss(&self) {
        let mut inner = self.lock();
        if !inner.showing {
            return;
        }
        self.hide_and_advance(&mut inner);
    }

    pub fn is_showing(&self) -> bool {
        self.lock().showing
    }

    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    fn show(&self, inner: &mut Inner, content: PopupContent) {
        inner.showing = true;
        inner.shown_in_batch += 1;
        inner.generation += 1;

        let batch_label = format!(
            "{} of {}",
            inner.shown_in_batch,
            inner.shown_in_batch + inner.queue.len()
        );
        self.events.publish(UiEvent::ShowPopup {
            title: content.title,
            body: content.body,
            batch_label,
        });

        let generation = inner.generation;
        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(scheduler.auto_dismiss).await;
            scheduler.dismiss_if_current(generation);
        });
    }

    /// Timer callback. A manual dismissal moves the generation forward, so
    /// a stale timer never touches the popup shown after it.
    fn dismiss_if_current(&self, generation: u64) {
        let mut inner = self.lock();
        if !inner.showing || inner.generation != generation {
            debug!(generation, "stale auto-dismiss timer ignored");
            return;
        }
        self.hide_and_advance(&mut inner);
    }

    fn hide_and_advance(&self, inner: &mut Inner) {
        self.events.publish(UiEvent::HidePopup);
        match inner.queue.pop_front() {
            Some(next) => self.show(inner, next),
            None => {
                inner.showing = false;
                inner.shown_in_batch = 0;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Inner never panics while locked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventReceiver;
    use tokio::time::advance;

    fn content(title: &str) -> PopupContent {
        PopupContent {
            title: title.to_string(),
            body: String::new(),
        }
    }

    fn scheduler() -> (PopupScheduler, EventReceiver) {
        let events = EventBus::default();
        let rx = events.subscribe();
        (
            PopupScheduler::new(events, Duration::from_secs(10)),
            rx,
        )
    }

    async fn expect_show(rx: &mut EventReceiver) -> (String, String) {
        match rx.recv().await.unwrap().payload {
            UiEvent::ShowPopup {
                title, batch_label, ..
            } => (title, batch_label),
            other => panic!("expected ShowPopup, got {:?}", other),
        }
    }

    async fn expect_hide(rx: &mut EventReceiver) {
        match rx.recv().await.unwrap().payload {
            UiEvent::HidePopup => {}
            other => panic!("expected HidePopup, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_batch_labels_count_up() {
        let (scheduler, mut rx) = scheduler();
        // "a" takes the free screen at once, so its label is computed
        // before "b" and "c" arrive; the later labels see the full batch
        scheduler.enqueue(content("a"));
        scheduler.enqueue(content("b"));
        scheduler.enqueue(content("c"));

        let (title, label) = expect_show(&mut rx).await;
        assert_eq!((title.as_str(), label.as_str()), ("a", "1 of 1"));

        scheduler.dismiss();
        expect_hide(&mut rx).await;
        let (title, label) = expect_show(&mut rx).await;
        assert_eq!((title.as_str(), label.as_str()), ("b", "2 of 3"));

        scheduler.dismiss();
        expect_hide(&mut rx).await;
        let (title, label) = expect_show(&mut rx).await;
        assert_eq!((title.as_str(), label.as_str()), ("c", "3 of 3"));
    }

    #[tokio::test]
    async fn test_batch_resets_after_drain() {
        let (scheduler, mut rx) = scheduler();
        scheduler.enqueue(content("a"));
        expect_show(&mut rx).await;
        scheduler.dismiss();
        expect_hide(&mut rx).await;
        assert!(!scheduler.is_showing());

        // A fresh popup starts a new batch
        scheduler.enqueue(content("b"));
        let (_, label) = expect_show(&mut rx).await;
        assert_eq!(label, "1 of 1");
    }

    #[tokio::test]
    async fn test_late_arrival_grows_batch_total() {
        let (scheduler, mut rx) = scheduler();
        scheduler.enqueue(content("a"));
        let (_, label) = expect_show(&mut rx).await;
        assert_eq!(label, "1 of 1");

        // Arrives while "a" is showing
        scheduler.enqueue(content("b"));
        scheduler.dismiss();
        expect_hide(&mut rx).await;
        let (_, label) = expect_show(&mut rx).await;
        assert_eq!(label, "2 of 2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_dismiss_after_timeout() {
        let (scheduler, mut rx) = scheduler();
        scheduler.enqueue(content("a"));
        expect_show(&mut rx).await;

        expect_hide(&mut rx).await;
        assert!(!scheduler.is_showing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_does_not_dismiss_next_popup() {
        let (scheduler, mut rx) = scheduler();
        scheduler.enqueue(content("a"));
        scheduler.enqueue(content("b"));
        expect_show(&mut rx).await;

        // Manual dismissal at t+3s shows "b" and arms a fresh timer
        advance(Duration::from_secs(3)).await;
        scheduler.dismiss();
        expect_hide(&mut rx).await;
        expect_show(&mut rx).await;

        // At t+10s the timer armed for "a" fires; "b" must survive it
        advance(Duration::from_secs(7)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(scheduler.is_showing());
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));

        // "b" goes down on its own timer at t+13s
        advance(Duration::from_secs(3)).await;
        expect_hide(&mut rx).await;
        assert!(!scheduler.is_showing());
    }
}
