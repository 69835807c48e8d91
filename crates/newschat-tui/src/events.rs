//! Events consumed by the session reducer.

use crossterm::event::Event;
use newschat_core::{ChatLine, Snapshot};

/// Everything that can drive a session's state forward.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Raw input from the connection (keys, paste, resize).
    Terminal(Event),
    /// An already-decoded action.
    Action(SessionAction),
    /// A chat line delivered by the hub.
    ChatLine(ChatLine),
    /// Fresh cache contents, answering [`crate::UiEffect::ReloadNews`].
    NewsLoaded(Snapshot),
}

/// Decoded user intent, independent of which key produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    Resize { width: u16, height: u16 },
    SwitchTab,
    NavigateDown,
    NavigateUp,
    ToggleDetail,
    /// Esc / Ctrl+C: closes the detail view if open, otherwise quits.
    Cancel,
    ComposeInput(String),
    ComposeBackspace,
    Submit,
}

impl From<SessionAction> for UiEvent {
    fn from(action: SessionAction) -> Self {
        UiEvent::Action(action)
    }
}
