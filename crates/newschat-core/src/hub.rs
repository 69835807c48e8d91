//! Session hub for tracking live sessions and broadcasting events.
//!
//! The hub is responsible for:
//! - Tracking every live interactive session and its delivery channel
//! - Broadcasting events to all registered sessions
//! - Treating delivery to a closed session as a no-op
//!
//! It holds no UI state. Each session owns its own state and only learns
//! about other sessions through the events delivered to its inbox.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::chat::ChatLine;

/// Opaque identifier of one registered session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Events fanned out by the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    ChatLine(ChatLine),
}

/// Receiving side of a session's inbox.
pub type HubReceiver = mpsc::UnboundedReceiver<HubEvent>;

/// Delivery handle returned by [`SessionHub::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    id: SessionId,
    user: String,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

struct Entry {
    user: String,
    tx: mpsc::UnboundedSender<HubEvent>,
}

/// Registry of live sessions.
///
/// Broadcasts run under the registry lock, so every recipient sees
/// broadcasts in the order the calls were made. Sends never wait on the
/// recipient: inboxes are unbounded and a send only enqueues.
pub struct SessionHub {
    sessions: Mutex<HashMap<SessionId, Entry>>,
    next_id: AtomicU64,
}

impl SessionHub {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a session for `user`.
    ///
    /// Returns the delivery handle and the receiver the session drains.
    pub fn register(&self, user: &str) -> (SessionHandle, HubReceiver) {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let count = {
            let mut sessions = self.sessions.lock();
            sessions.insert(
                id,
                Entry {
                    user: user.to_string(),
                    tx,
                },
            );
            sessions.len()
        };
        tracing::info!(session = %id, user, active = count, "Registered session");
        (
            SessionHandle {
                id,
                user: user.to_string(),
            },
            rx,
        )
    }

    /// Registers a session and wraps the handle in a guard that
    /// deregisters on drop.
    pub fn register_guarded(self: &Arc<Self>, user: &str) -> (Registration, HubReceiver) {
        let (handle, rx) = self.register(user);
        (
            Registration {
                hub: Arc::clone(self),
                handle,
                active: true,
            },
            rx,
        )
    }

    /// Removes a session. Returns false if it was already gone.
    pub fn deregister(&self, handle: &SessionHandle) -> bool {
        let (removed, count) = {
            let mut sessions = self.sessions.lock();
            let removed = sessions.remove(&handle.id).is_some();
            (removed, sessions.len())
        };
        if removed {
            tracing::info!(session = %handle.id, user = %handle.user, active = count, "Deregistered session");
        }
        removed
    }

    /// Delivers `event` to every registered session.
    ///
    /// Returns the number of sessions the event was queued for.
    pub fn broadcast(&self, event: &HubEvent) -> usize {
        self.deliver(event, None)
    }

    /// Delivers `event` to every registered session except `origin`.
    pub fn broadcast_from(&self, origin: &SessionHandle, event: &HubEvent) -> usize {
        self.deliver(event, Some(origin.id))
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Users of all registered sessions, ordered by registration.
    pub fn users(&self) -> Vec<String> {
        let sessions = self.sessions.lock();
        let mut entries: Vec<_> = sessions.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        entries
            .into_iter()
            .map(|(_, entry)| entry.user.clone())
            .collect()
    }

    fn deliver(&self, event: &HubEvent, skip: Option<SessionId>) -> usize {
        let mut sessions = self.sessions.lock();
        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, entry) in sessions.iter() {
            if Some(*id) == skip {
                continue;
            }
            if entry.tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }

        for id in dead {
            if let Some(entry) = sessions.remove(&id) {
                tracing::debug!(session = %id, user = %entry.user, "Dropped closed session during broadcast");
            }
        }

        delivered
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHub")
            .field("sessions", &self.len())
            .finish_non_exhaustive()
    }
}

/// Registration guard. Deregisters the session exactly once, either
/// explicitly or when dropped.
#[derive(Debug)]
pub struct Registration {
    hub: Arc<SessionHub>,
    handle: SessionHandle,
    active: bool,
}

impl Registration {
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn hub(&self) -> &Arc<SessionHub> {
        &self.hub
    }

    pub fn deregister(&mut self) {
        if self.active {
            self.active = false;
            self.hub.deregister(&self.handle);
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.deregister();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn line(body: &str) -> HubEvent {
        HubEvent::ChatLine(ChatLine::new("alice", body))
    }

    fn drain(rx: &mut HubReceiver) -> Vec<HubEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_broadcast_reaches_every_session() {
        let hub = SessionHub::new();
        let (_a, mut rx_a) = hub.register("alice");
        let (_b, mut rx_b) = hub.register("bob");

        assert_eq!(hub.broadcast(&line("hello")), 2);

        assert_eq!(drain(&mut rx_a), vec![line("hello")]);
        assert_eq!(drain(&mut rx_b), vec![line("hello")]);
    }

    #[test]
    fn test_broadcast_from_skips_origin() {
        let hub = SessionHub::new();
        let (alice, mut rx_a) = hub.register("alice");
        let (_bob, mut rx_b) = hub.register("bob");

        assert_eq!(hub.broadcast_from(&alice, &line("hi")), 1);

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![line("hi")]);
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let hub = SessionHub::new();
        let (handle, _rx) = hub.register("alice");

        assert!(hub.deregister(&handle));
        assert!(!hub.deregister(&handle));
        assert!(hub.is_empty());
    }

    #[test]
    fn test_dead_handle_is_a_no_op() {
        let hub = SessionHub::new();
        let (_a, rx_a) = hub.register("alice");
        let (_b, mut rx_b) = hub.register("bob");
        drop(rx_a);

        assert_eq!(hub.broadcast(&line("still here")), 1);
        assert_eq!(drain(&mut rx_b), vec![line("still here")]);
        assert_eq!(hub.users(), vec!["bob".to_string()]);
    }

    #[test]
    fn test_broadcast_order_is_preserved_per_recipient() {
        let hub = SessionHub::new();
        let (_a, mut rx_a) = hub.register("alice");
        let (_b, mut rx_b) = hub.register("bob");

        for body in ["one", "two", "three"] {
            hub.broadcast(&line(body));
        }

        let expected = vec![line("one"), line("two"), line("three")];
        assert_eq!(drain(&mut rx_a), expected);
        assert_eq!(drain(&mut rx_b), expected);
    }

    #[test]
    fn test_concurrent_broadcasts_arrive_in_same_order_everywhere() {
        let hub = SessionHub::new();
        let (_a, mut rx_a) = hub.register("alice");
        let (_b, mut rx_b) = hub.register("bob");

        thread::scope(|scope| {
            for sender in 0..4 {
                let hub = &hub;
                scope.spawn(move || {
                    for i in 0..50 {
                        hub.broadcast(&line(&format!("{sender}-{i}")));
                    }
                });
            }
        });

        let seen_a = drain(&mut rx_a);
        let seen_b = drain(&mut rx_b);
        assert_eq!(seen_a.len(), 200);
        assert_eq!(seen_a, seen_b);
    }

    #[test]
    fn test_deregister_mid_broadcast() {
        let hub = SessionHub::new();
        let (_s1, mut rx1) = hub.register("s1");
        let (s2, mut rx2) = hub.register("s2");
        let (_s3, mut rx3) = hub.register("s3");

        thread::scope(|scope| {
            scope.spawn(|| hub.broadcast(&line("M")));
            scope.spawn(|| hub.deregister(&s2));
        });

        assert_eq!(drain(&mut rx1), vec![line("M")]);
        assert_eq!(drain(&mut rx3), vec![line("M")]);
        assert!(drain(&mut rx2).len() <= 1);
        assert_eq!(hub.len(), 2);
    }

    #[test]
    fn test_registration_guard_deregisters_once() {
        let hub = Arc::new(SessionHub::new());
        let (mut registration, _rx) = hub.register_guarded("alice");
        let (_other, _rx_other) = hub.register("bob");
        assert_eq!(hub.len(), 2);

        registration.deregister();
        assert_eq!(hub.len(), 1);

        drop(registration);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_registration_guard_deregisters_on_drop() {
        let hub = Arc::new(SessionHub::new());
        {
            let (_registration, _rx) = hub.register_guarded("alice");
            assert_eq!(hub.len(), 1);
        }
        assert!(hub.is_empty());
    }
}
