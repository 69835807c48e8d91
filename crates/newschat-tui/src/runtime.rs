//! Session runtime: runs one connection's event loop and executes effects.
//!
//! This is the boundary where side effects happen. The reducer stays pure
//! and produces effects; the runtime reads the shared cache, talks to the
//! hub, and ships rendered frames to the connection.
//!
//! A session task waits on exactly two sources: the connection's input
//! events and its hub inbox. Events from both are processed one at a time.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::event::Event;
use newschat_core::hub::HubReceiver;
use newschat_core::{CacheStore, HubEvent, Registration, SessionHub};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::{SessionState, clamp_size};
use crate::terminal::{self, RemoteTerminal};
use crate::{render, update};

const GOODBYE: &str = "Bye from newschat!\r\n";

/// Process-wide services shared by every session.
#[derive(Clone)]
pub struct SessionContext {
    pub hub: Arc<SessionHub>,
    pub cache: Arc<CacheStore>,
    pub welcome: Option<Arc<str>>,
}

impl SessionContext {
    pub fn new(hub: Arc<SessionHub>, cache: Arc<CacheStore>) -> Self {
        Self {
            hub,
            cache,
            welcome: None,
        }
    }

    #[must_use]
    pub fn with_welcome(mut self, welcome: Option<Arc<str>>) -> Self {
        self.welcome = welcome;
        self
    }
}

/// One authenticated connection as seen by the session layer.
pub struct Connection {
    pub user: String,
    /// Initial terminal (width, height).
    pub size: (u16, u16),
    pub input: mpsc::Receiver<Event>,
    pub frames: mpsc::Sender<Vec<u8>>,
}

/// A live session: state, remote terminal and hub registration.
pub struct Session {
    state: SessionState,
    terminal: RemoteTerminal,
    registration: Registration,
    inbox: HubReceiver,
    cache: Arc<CacheStore>,
    frames: mpsc::Sender<Vec<u8>>,
}

impl Session {
    /// Registers with the hub and builds the initial state from the
    /// current cache contents.
    ///
    /// Registration happens here, before the loop starts, so lines
    /// broadcast between open and run are already queued in the inbox.
    pub fn open(
        ctx: &SessionContext,
        user: &str,
        size: (u16, u16),
        frames: mpsc::Sender<Vec<u8>>,
    ) -> Result<Self> {
        let (width, height) = clamp_size(size.0, size.1);
        let terminal = terminal::setup_terminal(width, height)?;
        let (registration, inbox) = ctx.hub.register_guarded(user);
        let state = SessionState::new(user, ctx.cache.read())
            .with_welcome(ctx.welcome.clone())
            .with_size(width, height);

        info!(
            session = %registration.handle().id(),
            user,
            width,
            height,
            "Session opened"
        );
        Ok(Self {
            state,
            terminal,
            registration,
            inbox,
            cache: Arc::clone(&ctx.cache),
            frames,
        })
    }

    /// Opens a session for `conn` and runs it to completion.
    pub async fn serve(
        ctx: &SessionContext,
        conn: Connection,
        shutdown: CancellationToken,
    ) -> Result<SessionState> {
        let session = Self::open(ctx, &conn.user, conn.size, conn.frames)?;
        session.run(conn.input, shutdown).await
    }

    /// Runs the event loop until the user quits, the input closes, the
    /// connection stops accepting frames, or `shutdown` fires.
    ///
    /// The session is deregistered before this returns.
    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<Event>,
        shutdown: CancellationToken,
    ) -> Result<SessionState> {
        let result = self.event_loop(&mut input, &shutdown).await;
        self.close().await;
        result.map(|()| self.state)
    }

    async fn event_loop(
        &mut self,
        input: &mut mpsc::Receiver<Event>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        let id = self.id();
        let mut dirty = true; // initial frame

        while !self.state.should_quit {
            if dirty {
                if !self.flush().await? {
                    debug!(session = %id, "Connection stopped accepting frames");
                    break;
                }
                dirty = false;
            }

            let event = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    debug!(session = %id, "Shutdown requested");
                    break;
                }
                Some(HubEvent::ChatLine(line)) = self.inbox.recv() => UiEvent::ChatLine(line),
                received = input.recv() => match received {
                    Some(event) => UiEvent::Terminal(event),
                    None => break,
                },
            };

            dirty |= self.dispatch(event);
        }
        Ok(())
    }

    /// Runs `event` and any follow-up events through the reducer. Returns
    /// true if a redraw is needed.
    fn dispatch(&mut self, event: UiEvent) -> bool {
        let mut dirty = false;
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in update::update(&mut self.state, event) {
                match effect {
                    UiEffect::Render => dirty = true,
                    UiEffect::ReloadNews => {
                        queue.push_back(UiEvent::NewsLoaded(self.cache.read()));
                    }
                    UiEffect::Broadcast(line) => {
                        let event = HubEvent::ChatLine(line);
                        let delivered = self
                            .registration
                            .hub()
                            .broadcast_from(self.registration.handle(), &event);
                        debug!(session = %self.id(), delivered, "Broadcast chat line");
                    }
                    UiEffect::Quit => {}
                }
            }
        }
        dirty
    }

    /// Draws the current state and sends it as one frame. Returns false if
    /// the connection is gone.
    async fn flush(&mut self) -> Result<bool> {
        let (width, height) = self.state.size;
        terminal::sync_size(&mut self.terminal, width, height)?;
        let state = &self.state;
        self.terminal
            .draw(|frame| render::render(state, frame))
            .context("Failed to draw frame")?;
        let bytes = self.terminal.backend_mut().writer_mut().take();
        Ok(self.frames.send(bytes).await.is_ok())
    }

    /// Deregisters, then makes a best-effort attempt to restore the
    /// client's terminal.
    async fn close(&mut self) {
        self.registration.deregister();
        info!(session = %self.id(), user = %self.state.user, "Session closed");

        match terminal::restore_terminal(&mut self.terminal, GOODBYE) {
            Ok(bytes) => {
                let _ = self.frames.send(bytes).await;
            }
            Err(err) => debug!(session = %self.id(), error = %err, "Failed to restore terminal"),
        }
    }

    fn id(&self) -> newschat_core::SessionId {
        self.registration.handle().id()
    }
}
