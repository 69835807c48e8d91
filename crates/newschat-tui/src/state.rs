//! Per-session state.
//!
//! A `SessionState` belongs to exactly one connection. Other sessions never
//! touch it; they only reach it through chat lines delivered by the hub.

use std::sync::Arc;

use newschat_core::{ChatLine, HeadlineItem, Snapshot};

/// Maximum characters in a chat message.
pub const COMPOSE_CHAR_LIMIT: usize = 280;

/// Chat lines kept per session; older lines are dropped.
pub const CHAT_LOG_LIMIT: usize = 1000;

/// Terminal size assumed until the connection reports one.
pub const DEFAULT_SIZE: (u16, u16) = (80, 24);

/// Largest terminal a client may report. Bigger reports are clamped.
pub const MAX_SIZE: (u16, u16) = (500, 200);

/// Bounds a client-reported size to `1..=MAX_SIZE` on both axes.
pub fn clamp_size(width: u16, height: u16) -> (u16, u16) {
    (width.clamp(1, MAX_SIZE.0), height.clamp(1, MAX_SIZE.1))
}

/// Top-level tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    News,
    Chat,
}

impl View {
    pub fn toggled(self) -> Self {
        match self {
            View::News => View::Chat,
            View::Chat => View::News,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    /// Identity shown as the sender of this session's messages.
    pub user: String,
    pub view: View,
    /// Headlines as of the last pull from the cache.
    pub news: Snapshot,
    pub selected: usize,
    /// Detail box for the selected headline. Only shown in the news view.
    pub show_detail: bool,
    pub compose: String,
    pub chat_log: Vec<ChatLine>,
    pub has_unread: bool,
    /// Terminal (width, height).
    pub size: (u16, u16),
    pub should_quit: bool,
    /// Banner shown above the news list.
    pub welcome: Option<Arc<str>>,
}

impl SessionState {
    pub fn new(user: impl Into<String>, news: Snapshot) -> Self {
        Self {
            user: user.into(),
            view: View::News,
            news,
            selected: 0,
            show_detail: false,
            compose: String::new(),
            chat_log: Vec::new(),
            has_unread: false,
            size: DEFAULT_SIZE,
            should_quit: false,
            welcome: None,
        }
    }

    #[must_use]
    pub fn with_welcome(mut self, welcome: Option<Arc<str>>) -> Self {
        self.welcome = welcome;
        self
    }

    #[must_use]
    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.size = clamp_size(width, height);
        self
    }

    pub fn detail_visible(&self) -> bool {
        self.view == View::News && self.show_detail
    }

    pub fn selected_item(&self) -> Option<&HeadlineItem> {
        self.news.get(self.selected)
    }

    /// Appends to the chat log, dropping the oldest lines past
    /// [`CHAT_LOG_LIMIT`].
    pub fn push_chat_line(&mut self, line: ChatLine) {
        self.chat_log.push(line);
        let excess = self.chat_log.len().saturating_sub(CHAT_LOG_LIMIT);
        self.chat_log.drain(..excess);
    }

    pub fn compose_len(&self) -> usize {
        self.compose.chars().count()
    }

    /// Keeps `selected` inside the current list.
    pub(crate) fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.news.len().saturating_sub(1));
    }
}
