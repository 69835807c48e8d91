//! Key map: raw terminal events to session actions.
//!
//! The mapping depends on the active view. In the news view letters are
//! commands (`j`/`k`/`d`); in the chat view they are typed into the
//! compose buffer.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::events::SessionAction;
use crate::state::{SessionState, View};

/// Maps a terminal event to an action, or `None` if it means nothing here.
pub fn map_event(state: &SessionState, event: &Event) -> Option<SessionAction> {
    match event {
        Event::Key(key) => map_key(state, *key),
        Event::Paste(text) if state.view == View::Chat => {
            Some(SessionAction::ComposeInput(text.clone()))
        }
        Event::Resize(width, height) => Some(SessionAction::Resize {
            width: *width,
            height: *height,
        }),
        _ => None,
    }
}

fn map_key(state: &SessionState, key: KeyEvent) -> Option<SessionAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return Some(SessionAction::Cancel),
        KeyCode::Esc => return Some(SessionAction::Cancel),
        KeyCode::Tab | KeyCode::BackTab => return Some(SessionAction::SwitchTab),
        _ => {}
    }

    match state.view {
        View::News => match key.code {
            KeyCode::Char('j') | KeyCode::Down => Some(SessionAction::NavigateDown),
            KeyCode::Char('k') | KeyCode::Up => Some(SessionAction::NavigateUp),
            KeyCode::Char('d') => Some(SessionAction::ToggleDetail),
            _ => None,
        },
        View::Chat => match key.code {
            KeyCode::Enter => Some(SessionAction::Submit),
            KeyCode::Backspace => Some(SessionAction::ComposeBackspace),
            KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                Some(SessionAction::ComposeInput(c.to_string()))
            }
            _ => None,
        },
    }
}
