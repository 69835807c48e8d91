//! Core engine for newschat.
//!
//! Holds everything that is shared between sessions: the headline cache and
//! its refresher, the session hub used for chat fan-out, plus configuration,
//! authentication predicates, and logging setup.

pub mod auth;
pub mod cache;
pub mod chat;
pub mod config;
pub mod hub;
pub mod logging;
pub mod news;
pub mod refresher;

pub use cache::{CacheStore, Snapshot};
pub use chat::ChatLine;
pub use hub::{HubEvent, Registration, SessionHandle, SessionHub, SessionId};
pub use news::{Article, ContentSource, HeadlineItem, NewsApiClient};
pub use refresher::CacheRefresher;
