//! Session reducer (update function).
//!
//! All state mutations happen here. The runtime calls `update(state, event)`
//! and executes the returned effects. Nothing in this module touches the
//! hub, the cache, or the connection.

use newschat_core::{ChatLine, Snapshot};

use crate::effects::UiEffect;
use crate::events::{SessionAction, UiEvent};
use crate::input;
use crate::state::{COMPOSE_CHAR_LIMIT, SessionState, View, clamp_size};

/// The main reducer function.
///
/// Takes the current state and an event, mutates state, and returns effects
/// for the runtime to execute. Events that make no sense in the current
/// view are ignored and yield no effects.
pub fn update(state: &mut SessionState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Terminal(term_event) => match input::map_event(state, &term_event) {
            Some(action) => handle_action(state, action),
            None => vec![],
        },
        UiEvent::Action(action) => handle_action(state, action),
        UiEvent::ChatLine(line) => handle_chat_line(state, line),
        UiEvent::NewsLoaded(snapshot) => handle_news_loaded(state, snapshot),
    }
}

fn handle_action(state: &mut SessionState, action: SessionAction) -> Vec<UiEffect> {
    match action {
        SessionAction::Resize { width, height } => {
            let size = clamp_size(width, height);
            if state.size == size {
                return vec![];
            }
            state.size = size;
            vec![UiEffect::Render]
        }
        SessionAction::SwitchTab => switch_tab(state),
        SessionAction::NavigateDown => {
            navigate(state, |selected, len| (selected + 1).min(len - 1))
        }
        SessionAction::NavigateUp => navigate(state, |selected, _| selected.saturating_sub(1)),
        SessionAction::ToggleDetail => {
            if state.view != View::News {
                return vec![];
            }
            state.show_detail = !state.show_detail;
            vec![UiEffect::Render]
        }
        SessionAction::Cancel => {
            if state.detail_visible() {
                state.show_detail = false;
                return vec![UiEffect::Render];
            }
            state.should_quit = true;
            vec![UiEffect::Quit]
        }
        SessionAction::ComposeInput(text) => compose_input(state, &text),
        SessionAction::ComposeBackspace => {
            if state.view != View::Chat || state.compose.pop().is_none() {
                return vec![];
            }
            vec![UiEffect::Render]
        }
        SessionAction::Submit => submit(state),
    }
}

fn switch_tab(state: &mut SessionState) -> Vec<UiEffect> {
    state.view = state.view.toggled();
    state.compose.clear();
    match state.view {
        View::Chat => {
            state.has_unread = false;
            vec![UiEffect::Render]
        }
        View::News => vec![UiEffect::ReloadNews, UiEffect::Render],
    }
}

/// Moves the selection with `step(selected, len)`; `len` is never zero.
fn navigate(state: &mut SessionState, step: impl Fn(usize, usize) -> usize) -> Vec<UiEffect> {
    if state.view != View::News || state.news.is_empty() {
        return vec![];
    }
    let next = step(state.selected, state.news.len());
    if next == state.selected {
        return vec![];
    }
    state.selected = next;
    vec![UiEffect::Render]
}

fn compose_input(state: &mut SessionState, text: &str) -> Vec<UiEffect> {
    if state.view != View::Chat {
        return vec![];
    }
    let room = COMPOSE_CHAR_LIMIT.saturating_sub(state.compose_len());
    let before = state.compose.len();
    state
        .compose
        .extend(text.chars().filter(|c| !c.is_control()).take(room));
    if state.compose.len() == before {
        return vec![];
    }
    vec![UiEffect::Render]
}

fn submit(state: &mut SessionState) -> Vec<UiEffect> {
    if state.view != View::Chat || state.compose.is_empty() {
        return vec![];
    }
    let body = std::mem::take(&mut state.compose);
    let line = ChatLine::new(state.user.clone(), body);
    state.push_chat_line(line.clone());
    vec![UiEffect::Broadcast(line), UiEffect::Render]
}

fn handle_chat_line(state: &mut SessionState, line: ChatLine) -> Vec<UiEffect> {
    state.push_chat_line(line);
    match state.view {
        View::Chat => vec![UiEffect::Render],
        // Only the tab label changes, and only the first time.
        View::News if state.has_unread => vec![],
        View::News => {
            state.has_unread = true;
            vec![UiEffect::Render]
        }
    }
}

fn handle_news_loaded(state: &mut SessionState, snapshot: Snapshot) -> Vec<UiEffect> {
    if state.news.same_as(&snapshot) {
        return vec![];
    }
    state.news = snapshot;
    state.clamp_selection();
    vec![UiEffect::Render]
}
