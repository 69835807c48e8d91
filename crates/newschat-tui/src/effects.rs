//! UI effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! The reducer only mutates the session's own state; reading the shared
//! cache, talking to the hub, and writing frames all happen in the runtime.

use newschat_core::ChatLine;

/// Effects returned by the reducer for the runtime to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEffect {
    /// Rendered output changed; draw and send a frame.
    Render,

    /// Pull the current cache snapshot and feed it back as
    /// [`crate::UiEvent::NewsLoaded`].
    ReloadNews,

    /// Send a chat line to every other session.
    Broadcast(ChatLine),

    /// End this session's interactive loop.
    Quit,
}
