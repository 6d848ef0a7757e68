//! Best-effort keystroke decoder over a non-blocking byte stream.
//!
//! Each poll inspects one small fixed window of raw bytes and produces at
//! most one logical key event. The decoder recognizes the common xterm/vt
//! sequences (plain characters, alt-chords, F1-F10, arrows); anything else
//! is discarded for the tick. It is intentionally not a byte-exact parser
//! for every terminal in existence.

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd;
use std::fmt;
use std::io;
use std::os::fd::RawFd;
use std::str::FromStr;

/// Lookahead window size. Long enough for the vt F-key sequences
/// (`ESC [ 2 1 ~`), which are the longest we decode.
pub const WINDOW: usize = 6;

const ESC: u8 = 0x1b;

/// A logical key identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Alt(char),
    /// F1..=F10.
    F(u8),
    Up,
    Down,
    Left,
    Right,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Alt(c) => write!(f, "alt-{c}"),
            Key::F(n) => write!(f, "F{n}"),
            Key::Up => write!(f, "up"),
            Key::Down => write!(f, "down"),
            Key::Left => write!(f, "left"),
            Key::Right => write!(f, "right"),
        }
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("alt-") {
            let mut chars = rest.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(Key::Alt(c));
            }
            return Err(format!("unknown key: {s}"));
        }
        if let Some(num) = lower.strip_prefix('f') {
            if let Ok(n @ 1..=10) = num.parse::<u8>() {
                return Ok(Key::F(n));
            }
        }
        match lower.as_str() {
            "up" => return Ok(Key::Up),
            "down" => return Ok(Key::Down),
            "left" => return Ok(Key::Left),
            "right" => return Ok(Key::Right),
            "space" => return Ok(Key::Char(' ')),
            _ => {}
        }
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(Key::Char(c));
        }
        Err(format!("unknown key: {s}"))
    }
}

/// Non-blocking source of raw input bytes, read in fixed windows.
pub trait ByteSource {
    /// Fill as much of the zeroed `window` as is available right now.
    /// No pending input leaves the window all zeroes.
    fn fill_window(&mut self, window: &mut [u8; WINDOW]) -> io::Result<()>;
}

/// Stdin switched into `O_NONBLOCK`, bypassing libc buffering.
pub struct NonblockStdin {
    fd: RawFd,
}

impl NonblockStdin {
    pub fn new() -> io::Result<Self> {
        let fd: RawFd = 0;
        let flags = fcntl(fd, FcntlArg::F_GETFL)?;
        let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
        fcntl(fd, FcntlArg::F_SETFL(flags))?;
        Ok(Self { fd })
    }
}

impl ByteSource for NonblockStdin {
    fn fill_window(&mut self, window: &mut [u8; WINDOW]) -> io::Result<()> {
        window.fill(0);
        match unistd::read(self.fd, window) {
            Ok(_) => Ok(()),
            Err(Errno::EAGAIN) => Ok(()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }
}

/// Byte-window key decoder. Remembers the last decoded key for the
/// status row.
#[derive(Default)]
pub struct KeyDecoder {
    last_key: Option<Key>,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one input window and decode at most one key event.
    /// Unrecognized windows are silently dropped for this tick.
    pub fn poll<S: ByteSource>(&mut self, source: &mut S) -> io::Result<Option<Key>> {
        let mut window = [0u8; WINDOW];
        source.fill_window(&mut window)?;
        let key = decode(&window);
        if key.is_some() {
            self.last_key = key;
        }
        Ok(key)
    }

    pub fn last_key(&self) -> Option<Key> {
        self.last_key
    }
}

fn printable(b: u8) -> bool {
    (0x20..=0x7e).contains(&b)
}

/// Decode one lookahead window. Precedence: plain printable byte, then
/// alt-chord (ESC + printable and nothing else), then the known
/// function/arrow key sequences.
fn decode(window: &[u8; WINDOW]) -> Option<Key> {
    match window[0] {
        0 => None,
        b if printable(b) => Some(Key::Char(b as char)),
        ESC => decode_escape(window),
        _ => None,
    }
}

fn decode_escape(window: &[u8; WINDOW]) -> Option<Key> {
    let b1 = window[1];

    if printable(b1) && window[2] == 0 {
        return Some(Key::Alt(b1 as char));
    }

    match (b1, window[2]) {
        // xterm SS3 family: ESC O P..S
        (b'O', b @ b'P'..=b'S') if window[3] == 0 => Some(Key::F(1 + b - b'P')),
        // CSI arrows: ESC [ A..D
        (b'[', b'A') if window[3] == 0 => Some(Key::Up),
        (b'[', b'B') if window[3] == 0 => Some(Key::Down),
        (b'[', b'C') if window[3] == 0 => Some(Key::Right),
        (b'[', b'D') if window[3] == 0 => Some(Key::Left),
        // vt function keys: ESC [ 1 5 ~ .. ESC [ 2 1 ~
        (b'[', b'1') if window[4] == b'~' && window[5] == 0 => match window[3] {
            b'5' => Some(Key::F(5)),
            b'7' => Some(Key::F(6)),
            b'8' => Some(Key::F(7)),
            b'9' => Some(Key::F(8)),
            _ => None,
        },
        (b'[', b'2') if window[4] == b'~' && window[5] == 0 => match window[3] {
            b'0' => Some(Key::F(9)),
            b'1' => Some(Key::F(10)),
            _ => None,
        },
        _ => None,
    }
}
