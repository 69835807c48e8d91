//! Per-session terminal UI for newschat.
//!
//! Each connected user gets one [`Session`]: a pure reducer (`update`) over
//! [`SessionState`], a render function, and a small runtime that feeds it
//! input events and hub deliveries and writes rendered frames back to the
//! connection.

pub mod common;
pub mod effects;
pub mod events;
pub mod input;
pub mod render;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod update;

pub use effects::UiEffect;
pub use events::{SessionAction, UiEvent};
pub use runtime::{Connection, Session, SessionContext};
pub use state::{SessionState, View};
pub use update::update;
