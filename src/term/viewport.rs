use crate::term::surface::Surface;
use crate::term::Style;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

/// A positioned rectangle over the terminal surface holding an ordered line
/// buffer with an optional scroll offset.
///
/// Rendering clips to whatever area the surface still offers from the
/// viewport origin, so a viewport placed (or resized) past the terminal
/// bounds simply renders nothing.
#[derive(Debug, Default)]
pub struct Viewport {
    x: u16,
    y: u16,
    width: u16,
    height: u16,
    scroll: i32,
    lines: Vec<(String, Style)>,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(&mut self, x: u16, y: u16) {
        self.x = x;
        self.y = y;
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    /// Set the scroll offset. Negative values are accepted here and clamped
    /// at render time, so transient underflow in input handlers cannot break
    /// a frame.
    pub fn set_scroll(&mut self, scroll: i32) {
        self.scroll = scroll;
    }

    pub fn scroll(&self) -> i32 {
        self.scroll
    }

    pub fn scroll_by(&mut self, delta: i32) {
        self.scroll += delta;
    }

    pub fn push_line(&mut self, text: impl Into<String>, style: Style) {
        self.lines.push((text.into(), style));
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Render the buffer into `surface`.
    ///
    /// A blank pass wipes the effective rectangle first, so stale content
    /// from a previous larger render never survives. The content pass then
    /// draws the buffer slice starting at the (clamped) scroll offset; a
    /// scroll past the end of the buffer yields a blank viewport, not an
    /// error.
    pub fn render<W: Write>(&self, surface: &mut Surface<W>) -> io::Result<()> {
        let Some((sw, sh)) = surface.dimensions() else {
            return Ok(());
        };

        let eff_width = self.width.min(sw.saturating_sub(self.x)) as usize;
        let eff_height = self.height.min(sh.saturating_sub(self.y)) as usize;
        if eff_width == 0 || eff_height == 0 {
            return Ok(());
        }

        let blank = " ".repeat(eff_width);
        for row in 0..eff_height {
            surface.move_to(self.x, self.y + row as u16)?;
            surface.write(&blank, Style::Plain)?;
        }

        let offset = self.scroll.max(0) as usize;
        for (row, (text, style)) in self.lines.iter().skip(offset).take(eff_height).enumerate() {
            let line = clip_columns(&sanitize(text), eff_width);
            surface.move_to(self.x, self.y + row as u16)?;
            surface.write(&line, *style)?;
        }

        Ok(())
    }
}

/// Strip control characters that would corrupt cursor bookkeeping if they
/// reached the terminal inside a positioned write.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '\t' | '\0'))
        .collect()
}

/// Truncate `text` to at most `max` display columns.
fn clip_columns(text: &str, max: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn render_to_string(vp: &Viewport, width: u16, height: u16) -> String {
        let mut surface = Surface::with_dimensions(Vec::new(), width, height);
        vp.render(&mut surface).unwrap();
        String::from_utf8(surface.sink().clone()).unwrap()
    }

    #[test]
    fn test_render_clips_to_surface() {
        struct TestCase {
            origin: (u16, u16),
            size: (u16, u16),
            surface: (u16, u16),
            // longest run of spaces the blank pass may produce
            max_blank: usize,
        }

        let cases = [
            TestCase {
                origin: (0, 0),
                size: (10, 3),
                surface: (6, 2),
                max_blank: 6,
            },
            TestCase {
                origin: (4, 1),
                size: (10, 10),
                surface: (8, 5),
                max_blank: 4,
            },
            TestCase {
                origin: (9, 9),
                size: (5, 5),
                surface: (6, 6),
                max_blank: 0,
            },
        ];

        for tc in cases {
            let mut vp = Viewport::new();
            vp.set_position(tc.origin.0, tc.origin.1);
            vp.set_size(tc.size.0, tc.size.1);
            vp.push_line("xxxxxxxxxxxxxxxxxxxx", Style::Plain);

            let out = render_to_string(&vp, tc.surface.0, tc.surface.1);
            let longest_blank = out
                .split(|c: char| c != ' ')
                .map(str::len)
                .max()
                .unwrap_or(0);
            assert!(
                longest_blank <= tc.max_blank,
                "blank run {longest_blank} exceeds {}",
                tc.max_blank
            );
        }
    }

    #[test]
    fn test_zero_area_render_is_noop() {
        let mut vp = Viewport::new();
        vp.set_position(10, 10);
        vp.set_size(5, 5);
        vp.push_line("content", Style::Plain);

        // origin is already outside the 8x8 surface
        let out = render_to_string(&vp, 8, 8);
        assert!(out.is_empty());
    }

    #[test]
    fn test_scroll_past_buffer_renders_blank_only() {
        let mut vp = Viewport::new();
        vp.set_size(10, 3);
        vp.push_line("alpha", Style::Plain);
        vp.push_line("beta", Style::Plain);
        vp.set_scroll(5);

        let out = render_to_string(&vp, 20, 5);
        assert!(!out.contains("alpha"));
        assert!(!out.contains("beta"));
    }

    #[test]
    fn test_negative_scroll_is_clamped_at_render() {
        let mut vp = Viewport::new();
        vp.set_size(10, 3);
        vp.push_line("alpha", Style::Plain);
        vp.set_scroll(0);
        vp.scroll_by(-3);
        assert_eq!(vp.scroll(), -3);

        let out = render_to_string(&vp, 20, 5);
        assert!(out.contains("alpha"));
    }

    #[test]
    fn test_scroll_slices_from_offset() {
        let mut vp = Viewport::new();
        vp.set_size(20, 2);
        vp.push_line("line zero", Style::Plain);
        vp.push_line("line one", Style::Plain);
        vp.push_line("line two", Style::Plain);
        vp.set_scroll(1);

        let out = render_to_string(&vp, 40, 10);
        assert!(!out.contains("line zero"));
        assert!(out.contains("line one"));
        assert!(out.contains("line two"));
    }

    #[test]
    fn test_control_characters_never_emitted() {
        let mut vp = Viewport::new();
        vp.set_size(30, 2);
        vp.push_line("a\nb\rc\td\0e", Style::Plain);

        let out = render_to_string(&vp, 40, 10);
        assert!(out.contains("abcde"));
        for c in ['\n', '\r', '\t', '\0'] {
            assert!(!out.contains(c), "control char {c:?} leaked");
        }
    }

    #[test]
    fn test_truncation_by_display_width() {
        assert_eq!(clip_columns("hello", 3), "hel");
        // wide glyphs count as two columns
        assert_eq!(clip_columns("日本語", 4), "日本");
        assert_eq!(clip_columns("ab", 10), "ab");
    }
}
