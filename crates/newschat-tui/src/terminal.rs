//! Remote terminal lifecycle.
//!
//! A session never owns a real tty. Ratatui draws into a [`FrameWriter`]
//! and the bytes it produces are shipped to the connection as one frame.
//! Setup and restore are plain escape sequences queued into the same
//! writer, so the client's terminal is put back even when it only ever
//! sees bytes.

use std::io::{self, Write};

use anyhow::{Context, Result};
use crossterm::cursor::{MoveTo, Show};
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::queue;
use crossterm::style::ResetColor;
use crossterm::terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::{Terminal, TerminalOptions, Viewport};

use crate::state::clamp_size;

/// In-memory sink for rendered output.
#[derive(Debug, Default)]
pub struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    /// Takes everything written since the last call.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

impl Write for FrameWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub type RemoteTerminal = Terminal<CrosstermBackend<FrameWriter>>;

/// Creates a fixed-size terminal whose first frame switches the client to
/// the alternate screen and clears it.
pub fn setup_terminal(width: u16, height: u16) -> Result<RemoteTerminal> {
    let mut writer = FrameWriter::default();
    queue!(
        writer,
        EnterAlternateScreen,
        EnableBracketedPaste,
        Clear(ClearType::All)
    )
    .context("Failed to queue terminal setup")?;

    let options = TerminalOptions {
        viewport: Viewport::Fixed(viewport(width, height)),
    };
    Terminal::with_options(CrosstermBackend::new(writer), options)
        .context("Failed to create terminal")
}

/// Matches the viewport to the client's reported size.
pub fn sync_size(terminal: &mut RemoteTerminal, width: u16, height: u16) -> Result<()> {
    let area = viewport(width, height);
    if terminal.get_frame().area() != area {
        terminal.resize(area).context("Failed to resize terminal")?;
    }
    Ok(())
}

fn viewport(width: u16, height: u16) -> Rect {
    let (width, height) = clamp_size(width, height);
    Rect::new(0, 0, width, height)
}

/// Queues the sequences that hand the client's terminal back and returns
/// the final frame.
pub fn restore_terminal(terminal: &mut RemoteTerminal, goodbye: &str) -> Result<Vec<u8>> {
    let writer = terminal.backend_mut().writer_mut();
    queue!(
        writer,
        ResetColor,
        Show,
        DisableBracketedPaste,
        LeaveAlternateScreen,
        MoveTo(0, 0)
    )
    .context("Failed to queue terminal restore")?;
    writer
        .write_all(goodbye.as_bytes())
        .context("Failed to write goodbye")?;
    Ok(writer.take())
}
