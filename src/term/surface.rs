use crate::term::Style;
use crate::weak_error;
use crossterm::cursor::MoveTo;
use crossterm::style::{Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{queue, terminal};
use std::env;
use std::io::{self, Write};

/// Single output sink for the whole application.
///
/// Wraps a writer and emits ANSI/VT escape sequences through crossterm's
/// command API (cursor addressing is 1-based on the wire, 0-based here).
/// Terminal geometry is an environment probe that may fail; the cached
/// dimensions then stay empty and every consumer must treat the surface
/// as having zero renderable area until a later probe succeeds.
pub struct Surface<W: Write> {
    out: W,
    dimensions: Option<(u16, u16)>,
    colors: bool,
}

impl<W: Write> Surface<W> {
    /// Create a surface over `out` with unknown geometry.
    pub fn new(out: W) -> Self {
        Self {
            out,
            dimensions: None,
            colors: detect_color_support(),
        }
    }

    /// Create a surface with fixed geometry and color support, for rendering
    /// into in-memory sinks.
    pub fn with_dimensions(out: W, width: u16, height: u16) -> Self {
        Self {
            out,
            dimensions: Some((width, height)),
            colors: false,
        }
    }

    /// Re-read terminal geometry. On probe failure the cached value is
    /// dropped and rendering degrades to a no-op until the next probe.
    pub fn probe_dimensions(&mut self) {
        self.dimensions = weak_error!(terminal::size(), "terminal geometry probe failed:");
    }

    pub fn dimensions(&self) -> Option<(u16, u16)> {
        self.dimensions
    }

    pub fn width(&self) -> u16 {
        self.dimensions.map(|(w, _)| w).unwrap_or(0)
    }

    pub fn height(&self) -> u16 {
        self.dimensions.map(|(_, h)| h).unwrap_or(0)
    }

    pub fn supports_color(&self) -> bool {
        self.colors
    }

    /// Absolute cursor addressing, 0-based column/row.
    pub fn move_to(&mut self, x: u16, y: u16) -> io::Result<()> {
        queue!(self.out, MoveTo(x, y))
    }

    /// Write `text` at the current cursor position, bracketed by SGR codes
    /// when a style is requested and color output is available.
    pub fn write(&mut self, text: &str, style: Style) -> io::Result<()> {
        if !self.colors || style == Style::Plain {
            return queue!(self.out, Print(text));
        }

        if style.bold() {
            queue!(self.out, SetAttribute(Attribute::Bold))?;
        }
        if let Some(fg) = style.foreground() {
            queue!(self.out, SetForegroundColor(fg))?;
        }
        if let Some(bg) = style.background() {
            queue!(self.out, SetBackgroundColor(bg))?;
        }
        queue!(self.out, Print(text))?;
        queue!(self.out, SetAttribute(Attribute::Reset), ResetColor)
    }

    pub fn clear_screen(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Borrow the underlying sink (test inspection).
    pub fn sink(&self) -> &W {
        &self.out
    }
}

/// Crude color probe: respects `NO_COLOR` and dumb terminals. A wrong
/// positive only costs a few SGR sequences on screens that ignore them.
fn detect_color_support() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    match env::var("TERM") {
        Ok(term) => term != "dumb",
        Err(_) => false,
    }
}
