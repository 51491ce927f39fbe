use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commands::WriteKind;

/// Sequence number for ordering events
pub type EventSequence = u64;

/// Envelope for everything published to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreEvent {
    pub sequence: EventSequence,
    pub timestamp: DateTime<Utc>,
    pub payload: UiEvent,
}

/// Presentation-affecting events. The UI drains these on its own thread;
/// the core never calls into the UI directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// Display the next popup notification
    ShowPopup {
        title: String,
        body: String,
        batch_label: String,
    },

    /// The currently shown popup was dismissed (timer or queue drain)
    HidePopup,

    /// Soft connectivity notice, rate-limited at the source
    Notice { message: String },

    /// Hard error worth showing to the user
    Error { message: String },

    /// A write could not be sent and was queued for later replay
    WriteQueued { kind: WriteKind },

    /// A sweep over the pending queue finished
    SweepFinished {
        sent: usize,
        failed: usize,
        remaining: usize,
    },
}
