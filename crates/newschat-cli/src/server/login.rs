//! Line-mode login dialogue run before a session starts.
//!
//! Asks for a username, then a public key line (for users on the
//! allow-list) and the configured challenge questions. Resize reports that
//! arrive meanwhile are remembered so the session opens at the right size.

use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{Event, KeyCode, KeyModifiers};
use newschat_core::auth::Authenticator;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Whole dialogue must finish within this.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_LINE: usize = 256;
const MAX_USERNAME: usize = 32;

/// Outcome of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedIn {
    pub user: String,
    pub size: (u16, u16),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Echo {
    Plain,
    Masked,
}

struct Prompter<'a, W> {
    events: &'a mut mpsc::Receiver<Event>,
    out: &'a mut W,
    size: (u16, u16),
}

impl<W: AsyncWrite + Unpin> Prompter<'_, W> {
    async fn write(&mut self, text: &str) -> Result<()> {
        self.out
            .write_all(text.as_bytes())
            .await
            .context("write to connection")?;
        self.out.flush().await.context("flush connection")
    }

    /// Reads one line. `None` means the user cancelled or the connection
    /// closed.
    async fn read_line(&mut self, prompt: &str, echo: Echo) -> Result<Option<String>> {
        self.write(prompt).await?;
        let mut line = String::new();
        loop {
            let Some(event) = self.events.recv().await else {
                return Ok(None);
            };
            match event {
                Event::Resize(width, height) => self.size = (width, height),
                Event::Key(key) => match key.code {
                    KeyCode::Enter => {
                        self.write("\r\n").await?;
                        return Ok(Some(line));
                    }
                    KeyCode::Esc => return Ok(None),
                    KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(None);
                    }
                    KeyCode::Backspace => {
                        if line.pop().is_some() {
                            self.write("\x08 \x08").await?;
                        }
                    }
                    KeyCode::Char(c)
                        if key.modifiers.is_empty() && line.chars().count() < MAX_LINE =>
                    {
                        line.push(c);
                        match echo {
                            Echo::Plain => self.write(c.encode_utf8(&mut [0; 4])).await?,
                            Echo::Masked => self.write("*").await?,
                        }
                    }
                    _ => {}
                },
                Event::Paste(text) => {
                    let room = MAX_LINE.saturating_sub(line.chars().count());
                    let accepted: String =
                        text.chars().filter(|c| !c.is_control()).take(room).collect();
                    if echo == Echo::Plain {
                        self.write(&accepted).await?;
                    }
                    line.push_str(&accepted);
                }
                _ => {}
            }
        }
    }
}

fn valid_username(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_USERNAME
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Runs the login dialogue. Returns `None` if the user was rejected or
/// left.
pub async fn login<W: AsyncWrite + Unpin>(
    events: &mut mpsc::Receiver<Event>,
    out: &mut W,
    auth: &Authenticator,
    initial_size: (u16, u16),
) -> Result<Option<LoggedIn>> {
    let mut prompter = Prompter {
        events,
        out,
        size: initial_size,
    };

    prompter.write("Welcome to newschat.\r\n\r\n").await?;
    let user = loop {
        let Some(name) = prompter.read_line("login: ", Echo::Plain).await? else {
            return Ok(None);
        };
        let name = name.trim().to_string();
        if valid_username(&name) {
            break name;
        }
        prompter
            .write("Usernames are 1-32 letters, digits, '.', '_' or '-'.\r\n")
            .await?;
    };

    // A typed key line is not proof of possession; the challenge is always
    // required and the key only narrows who passes it.
    let accepted = if auth.is_open() {
        info!(user = %user, "Login accepted without authentication");
        true
    } else if auth.challenge().is_empty() {
        warn!(user = %user, "No challenge configured; login rejected");
        false
    } else {
        let key_ok = if auth.has_key_for(&user) {
            let Some(key) = prompter.read_line("public key: ", Echo::Plain).await? else {
                return Ok(None);
            };
            auth.check_public_key(&user, &key)
        } else {
            true
        };
        let prompts: Vec<String> = auth.challenge().prompts().map(str::to_string).collect();
        let mut answers = Vec::with_capacity(prompts.len());
        for prompt in &prompts {
            let Some(answer) = prompter.read_line(prompt, Echo::Masked).await? else {
                return Ok(None);
            };
            answers.push(answer);
        }
        auth.check_challenge(&user, &answers) && key_ok
    };

    if !accepted {
        prompter.write("Access denied.\r\n").await?;
        return Ok(None);
    }

    Ok(Some(LoggedIn {
        user,
        size: prompter.size,
    }))
}
