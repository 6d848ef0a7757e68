//! Raw-terminal building blocks: an escape-sequence output surface,
//! rectangular scrollable viewports on top of it, and a non-blocking
//! byte-level key decoder.

use crossterm::style::Color;

pub mod input;
pub mod surface;
pub mod viewport;

pub use input::{ByteSource, Key, KeyDecoder, NonblockStdin};
pub use surface::Surface;
pub use viewport::Viewport;

/// Visual style of one emitted line or cell run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Plain,
    Bold,
    /// Current line / current frame marker.
    Accent,
    /// Error indicator in the status row.
    Alert,
}

impl Style {
    pub(crate) fn foreground(self) -> Option<Color> {
        match self {
            Style::Plain | Style::Bold => None,
            Style::Accent => Some(Color::Blue),
            Style::Alert => Some(Color::Red),
        }
    }

    pub(crate) fn background(self) -> Option<Color> {
        None
    }

    pub(crate) fn bold(self) -> bool {
        self == Style::Bold
    }
}
