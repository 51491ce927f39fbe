//! Event bus carrying presentation-affecting state changes out of the core.

mod bus;
mod types;

pub use bus::{EventBus, EventReceiver, EventSender};
pub use types::{CoreEvent, EventSequence, UiEvent};
