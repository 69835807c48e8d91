//! Telnet byte stream decoding.
//!
//! Turns the raw bytes of a character-mode telnet connection into terminal
//! events: option negotiation is consumed, NAWS reports become resizes, and
//! the remaining data is decoded as keys, escape sequences and bracketed
//! pastes.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use newschat_tui::state::COMPOSE_CHAR_LIMIT;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;
const OPT_NAWS: u8 = 31;

const ESC: u8 = 0x1b;
const PASTE_END: &[u8] = b"\x1b[201~";

/// Paste bytes kept; the rest of an oversized paste is dropped.
const MAX_PASTE: usize = COMPOSE_CHAR_LIMIT * 4;
const MAX_SUB: usize = 16;
const MAX_CSI: usize = 16;

/// Sent once on connect: the server echoes, go-ahead is suppressed, and
/// the client should report its window size.
pub const NEGOTIATION: [u8; 9] = [
    IAC, WILL, OPT_ECHO, IAC, WILL, OPT_SGA, IAC, DO, OPT_NAWS,
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Data,
    /// Previous data byte was CR; a following LF or NUL belongs to it.
    CarriageReturn,
    Iac,
    /// WILL/WONT/DO/DONT seen; the option byte follows.
    Negotiation,
    Sub,
    SubIac,
    Escape,
    /// Inside `ESC [` or `ESC O`; collecting parameter bytes.
    Csi,
    Paste,
}

/// Incremental decoder. Feed it bytes as they arrive; sequences split across
/// reads are carried over.
#[derive(Debug, Default)]
pub struct Decoder {
    state: State,
    /// State to go back to once an IAC command is consumed.
    resume: State,
    sub: Vec<u8>,
    csi: Vec<u8>,
    utf8: Vec<u8>,
    paste: Vec<u8>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `bytes`, returning the events they complete.
    ///
    /// A lone ESC at the end of a read is reported as the Esc key: escape
    /// sequences sent by a terminal arrive in one write.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        for &byte in bytes {
            self.step(byte, &mut events);
        }
        if self.state == State::Escape {
            self.state = State::Data;
            events.push(key(KeyCode::Esc));
        }
        events
    }

    fn step(&mut self, byte: u8, events: &mut Vec<Event>) {
        match self.state {
            State::Iac => self.on_iac(byte),
            State::Negotiation => self.state = self.resume,
            State::Sub => match byte {
                IAC => self.state = State::SubIac,
                _ => self.push_sub(byte),
            },
            State::SubIac => match byte {
                SE => {
                    if let Some(event) = self.finish_sub() {
                        events.push(event);
                    }
                    self.state = self.resume;
                }
                IAC => {
                    self.push_sub(IAC);
                    self.state = State::Sub;
                }
                _ => self.state = State::Sub,
            },
            _ if byte == IAC => {
                self.resume = self.state;
                self.state = State::Iac;
            }
            State::CarriageReturn => {
                self.state = State::Data;
                if byte != b'\n' && byte != 0 {
                    self.on_data(byte, events);
                }
            }
            State::Data => self.on_data(byte, events),
            State::Escape => self.on_escape(byte, events),
            State::Csi => self.on_csi(byte, events),
            State::Paste => self.on_paste(byte, events),
        }
    }

    fn on_iac(&mut self, byte: u8) {
        self.state = match byte {
            WILL | WONT | DO | DONT => State::Negotiation,
            SB => {
                self.sub.clear();
                State::Sub
            }
            _ => self.resume,
        };
    }

    fn push_sub(&mut self, byte: u8) {
        // Anything longer than this is not a subnegotiation we handle.
        if self.sub.len() < MAX_SUB {
            self.sub.push(byte);
        }
    }

    fn on_paste(&mut self, byte: u8, events: &mut Vec<Event>) {
        self.paste.push(byte);
        if self.paste.ends_with(PASTE_END) {
            self.paste.truncate(self.paste.len() - PASTE_END.len());
            let text = String::from_utf8_lossy(&self.paste).replace("\r\n", "\n");
            self.paste.clear();
            self.state = State::Data;
            events.push(Event::Paste(text));
        } else if self.paste.len() >= MAX_PASTE + PASTE_END.len() {
            // Keep the first MAX_PASTE bytes plus a tail long enough to spot
            // the end marker.
            self.paste.remove(MAX_PASTE);
        }
    }

    fn finish_sub(&mut self) -> Option<Event> {
        match self.sub.as_slice() {
            [OPT_NAWS, w1, w0, h1, h0] => {
                let width = u16::from_be_bytes([*w1, *w0]);
                let height = u16::from_be_bytes([*h1, *h0]);
                (width > 0 && height > 0).then_some(Event::Resize(width, height))
            }
            _ => None,
        }
    }

    fn on_data(&mut self, byte: u8, events: &mut Vec<Event>) {
        if !self.utf8.is_empty() || byte >= 0x80 {
            self.on_utf8(byte, events);
            return;
        }
        match byte {
            ESC => self.state = State::Escape,
            b'\r' => {
                self.state = State::CarriageReturn;
                events.push(key(KeyCode::Enter));
            }
            b'\n' => events.push(key(KeyCode::Enter)),
            b'\t' => events.push(key(KeyCode::Tab)),
            0x7f | 0x08 => events.push(key(KeyCode::Backspace)),
            0x01..=0x1a => events.push(Event::Key(KeyEvent::new(
                KeyCode::Char(char::from(byte + 0x60)),
                KeyModifiers::CONTROL,
            ))),
            0x20..=0x7e => events.push(key(KeyCode::Char(char::from(byte)))),
            _ => {}
        }
    }

    fn on_utf8(&mut self, byte: u8, events: &mut Vec<Event>) {
        self.utf8.push(byte);
        let expected = match self.utf8[0] {
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf7 => 4,
            _ => {
                self.utf8.clear();
                return;
            }
        };
        if self.utf8.len() < expected {
            return;
        }
        if let Ok(text) = std::str::from_utf8(&self.utf8) {
            events.extend(text.chars().map(|c| key(KeyCode::Char(c))));
        }
        self.utf8.clear();
    }

    fn on_escape(&mut self, byte: u8, events: &mut Vec<Event>) {
        match byte {
            b'[' | b'O' => {
                self.csi.clear();
                self.state = State::Csi;
            }
            ESC => events.push(key(KeyCode::Esc)),
            0x20..=0x7e => {
                // Alt+key arrives as ESC followed by the key.
                self.state = State::Data;
                events.push(Event::Key(KeyEvent::new(
                    KeyCode::Char(char::from(byte)),
                    KeyModifiers::ALT,
                )));
            }
            _ => {
                self.state = State::Data;
                events.push(key(KeyCode::Esc));
                self.on_data(byte, events);
            }
        }
    }

    fn on_csi(&mut self, byte: u8, events: &mut Vec<Event>) {
        if matches!(byte, b'0'..=b'9' | b';') {
            if self.csi.len() < MAX_CSI {
                self.csi.push(byte);
            } else {
                self.csi.clear();
                self.state = State::Data;
            }
            return;
        }
        self.state = State::Data;
        let code = match (byte, self.csi.as_slice()) {
            (b'A', _) => KeyCode::Up,
            (b'B', _) => KeyCode::Down,
            (b'C', _) => KeyCode::Right,
            (b'D', _) => KeyCode::Left,
            (b'H', _) => KeyCode::Home,
            (b'F', _) => KeyCode::End,
            (b'Z', _) => KeyCode::BackTab,
            (b'~', b"3") => KeyCode::Delete,
            (b'~', b"200") => {
                self.paste.clear();
                self.state = State::Paste;
                return;
            }
            _ => return,
        };
        events.push(key(code));
    }
}

fn key(code: KeyCode) -> Event {
    Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
}
