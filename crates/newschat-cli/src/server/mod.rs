//! TCP listener and per-connection plumbing.
//!
//! Each accepted socket gets a reader task (bytes to terminal events), a
//! writer task (frames to bytes), the login dialogue, and finally a session
//! from `newschat-tui`. All of them are tracked so shutdown can wait for
//! them.

mod login;
mod telnet;

use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::event::Event;
use newschat_core::auth::Authenticator;
use newschat_tui::state::DEFAULT_SIZE;
use newschat_tui::{Connection, Session, SessionContext};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, info_span, warn};

const INPUT_BUFFER: usize = 64;
const FRAME_BUFFER: usize = 8;

/// Everything a connection handler needs.
#[derive(Clone)]
pub struct ServerContext {
    pub sessions: SessionContext,
    pub auth: Arc<Authenticator>,
}

/// Accepts connections until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    ctx: ServerContext,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) -> Result<()> {
    loop {
        let accepted = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                let ctx = ctx.clone();
                let shutdown = shutdown.clone();
                tracker.spawn(
                    async move {
                        if let Err(err) = handle_connection(stream, &ctx, shutdown).await {
                            warn!(error = format!("{err:#}"), "Connection failed");
                        }
                    }
                    .instrument(info_span!("conn", %peer)),
                );
            }
            Err(err) => warn!(error = %err, "Failed to accept connection"),
        }
    }
    info!("Listener stopped");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    ctx: &ServerContext,
    shutdown: CancellationToken,
) -> Result<()> {
    debug!("Accepted connection");
    stream.set_nodelay(true).context("set TCP_NODELAY")?;
    let (reader, mut writer) = stream.into_split();

    writer
        .write_all(&telnet::NEGOTIATION)
        .await
        .context("send telnet negotiation")?;

    let (events_tx, mut events_rx) = mpsc::channel(INPUT_BUFFER);
    let reader = spawn_reader(reader, events_tx, shutdown.clone());

    let outcome = tokio::select! {
        () = shutdown.cancelled() => None,
        result = tokio::time::timeout(
            login::LOGIN_TIMEOUT,
            login::login(&mut events_rx, &mut writer, &ctx.auth, DEFAULT_SIZE),
        ) => Some(result),
    };
    let logged_in = match outcome {
        None => None,
        Some(Ok(result)) => result?,
        Some(Err(_elapsed)) => {
            let _ = writer.write_all(b"\r\nLogin timed out.\r\n").await;
            None
        }
    };

    let Some(logged_in) = logged_in else {
        reader.abort();
        let _ = writer.shutdown().await;
        return Ok(());
    };

    let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);
    let writer = spawn_writer(writer, frames_rx);

    let conn = Connection {
        user: logged_in.user,
        size: logged_in.size,
        input: events_rx,
        frames: frames_tx,
    };
    let result = Session::serve(&ctx.sessions, conn, shutdown).await;

    // The session dropped its frame sender, so the writer drains and exits.
    if let Err(err) = writer.await {
        debug!(error = %err, "Writer task ended abnormally");
    }
    reader.abort();
    result.map(|_| ())
}

/// Reads from the socket and forwards decoded events until EOF, an error,
/// shutdown, or the receiver going away.
fn spawn_reader(
    mut reader: OwnedReadHalf,
    events: mpsc::Sender<Event>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut decoder = telnet::Decoder::new();
            let mut buf = [0u8; 1024];
            loop {
                let read = tokio::select! {
                    () = shutdown.cancelled() => break,
                    read = reader.read(&mut buf) => read,
                };
                let n = match read {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(err) => {
                        debug!(error = %err, "Read failed");
                        break;
                    }
                };
                for event in decoder.feed(&buf[..n]) {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }
        .in_current_span(),
    )
}

/// Writes frames to the socket until the sender is dropped or a write fails.
fn spawn_writer(
    mut writer: OwnedWriteHalf,
    mut frames: mpsc::Receiver<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            while let Some(frame) = frames.recv().await {
                if let Err(err) = writer.write_all(&frame).await {
                    debug!(error = %err, "Write failed");
                    return;
                }
            }
            let _ = writer.shutdown().await;
        }
        .in_current_span(),
    )
}
