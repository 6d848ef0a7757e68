//! The fixed-rate event loop tying input, session and rendering together.

use crate::app::keymap::{Action, KeyMap};
use crate::error::Error;
use crate::session::proto::Protocol;
use crate::session::{SessionController, SessionState};
use crate::term::{ByteSource, KeyDecoder, Style, Surface, Viewport};
use log::{debug, error, warn};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub mod keymap;
pub mod render;

/// Preferred width of the stack/variables pane, shrunk on narrow terminals.
const INFO_PANE_WIDTH: u16 = 100;
/// Rows above the panes (waiting indicator / headline space).
const TOP_MARGIN: u16 = 2;

/// Sleep share of the frame budget left after this tick's work.
/// Over-budget ticks get no sleep; ticks are never skipped or batched.
fn remaining_budget(budget: Duration, elapsed: Duration) -> Option<Duration> {
    budget.checked_sub(elapsed)
}

pub struct App<P: Protocol, W: Write, S: ByteSource> {
    session: SessionController<P>,
    surface: Surface<W>,
    input: S,
    decoder: KeyDecoder,
    keymap: KeyMap,

    source_view: Viewport,
    info_view: Viewport,

    target_fps: u32,
    resized: Arc<AtomicBool>,
    quit: bool,
    effective_fps: f64,
    /// Last recoverable error, shown in the status row until the next
    /// successful state change.
    status_error: Option<String>,
}

impl<P: Protocol, W: Write, S: ByteSource> App<P, W, S> {
    pub fn new(
        session: SessionController<P>,
        surface: Surface<W>,
        input: S,
        keymap: KeyMap,
        target_fps: u32,
        resized: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session,
            surface,
            input,
            decoder: KeyDecoder::new(),
            keymap,
            source_view: Viewport::new(),
            info_view: Viewport::new(),
            target_fps: target_fps.max(1),
            resized,
            quit: false,
            effective_fps: 0.0,
            status_error: None,
        }
    }

    pub fn session(&self) -> &SessionController<P> {
        &self.session
    }

    pub fn surface_mut(&mut self) -> &mut Surface<W> {
        &mut self.surface
    }

    /// Initialize the session, fire the asynchronous target wait and set up
    /// the initial screen.
    pub fn start(&mut self) -> Result<(), Error> {
        self.session.init()?;
        self.session.begin_wait_for_target()?;

        if self.surface.dimensions().is_none() {
            self.surface.probe_dimensions();
        }
        self.layout();
        self.surface.clear_screen()?;
        self.surface.flush()?;
        Ok(())
    }

    /// [`App::start`], then run ticks until a quit action.
    pub fn run(&mut self) -> Result<(), Error> {
        self.start()?;
        let budget = Duration::from_secs_f64(1.0 / self.target_fps as f64);
        while !self.quit {
            self.tick(budget)?;
        }
        Ok(())
    }

    /// One loop iteration: input, attachment poll, render, frame-budget
    /// sleep. Public so tests can drive the loop without wall-clock pacing.
    pub fn tick(&mut self, budget: Duration) -> Result<(), Error> {
        let started = Instant::now();
        let mut update = false;

        if let Some(key) = self.decoder.poll(&mut self.input)? {
            debug!(target: "plbug", "key: {key}");
            update = true;
            let actions = self.keymap.actions(&key).to_vec();
            for action in actions {
                if let Err(e) = self.apply(action) {
                    if !e.is_recoverable() {
                        return Err(e);
                    }
                    warn!(target: "plbug", "{action} failed: {e:#}");
                    self.status_error = Some(e.to_string());
                }
                if self.quit {
                    return Ok(());
                }
            }
        }

        // re-probe on resize, and keep probing while geometry is unknown
        // so a failed startup probe recovers without waiting for SIGWINCH
        if self.resized.swap(false, Ordering::Relaxed) || self.surface.dimensions().is_none() {
            self.surface.probe_dimensions();
            self.layout();
            update = true;
        }

        if self.session.state() == SessionState::WaitingForTarget {
            match self.session.poll_attachment() {
                Ok(true) => {
                    self.status_error = None;
                    if let Err(e) = self.session.refresh_all() {
                        self.on_recoverable(e)?;
                    }
                    update = true;
                }
                Ok(false) => {}
                Err(e) => self.on_recoverable(e)?,
            }
        }

        if update {
            self.render()?;
        }

        if !self.session.is_attached() {
            self.surface.move_to(0, 0)?;
            self.surface.write("waiting for target", Style::Plain)?;
        }

        if let Some(rest) = remaining_budget(budget, started.elapsed()) {
            thread::sleep(rest);
        }
        let frame_time = started.elapsed();
        self.effective_fps = if frame_time.is_zero() {
            self.target_fps as f64
        } else {
            1.0 / frame_time.as_secs_f64()
        };

        self.render_status_row()?;
        self.surface.flush()?;
        Ok(())
    }

    /// Execute one bound action against the application context. Handlers
    /// run to completion here, before the render phase of the same tick
    /// reads session state.
    fn apply(&mut self, action: Action) -> Result<(), Error> {
        match action {
            Action::Quit => self.quit = true,
            Action::FrameUp => {
                self.session.select_frame(-1)?;
            }
            Action::FrameDown => {
                self.session.select_frame(1)?;
            }
            Action::StepInto => self.session.step_into()?,
            Action::StepOver => self.session.step_over()?,
            Action::Continue => self.session.continue_run()?,
            Action::Abort => self.session.abort()?,
            Action::ScrollUp => self.source_view.scroll_by(-1),
            Action::ScrollDown => self.source_view.scroll_by(1),
            Action::RefreshAll => self.session.refresh_all()?,
            Action::RefreshFrame => self.session.refresh_frame()?,
        }
        self.status_error = None;
        Ok(())
    }

    /// Recoverable errors keep the loop (and the last-known-good snapshot)
    /// alive and surface in the status row instead.
    fn on_recoverable(&mut self, e: Error) -> Result<(), Error> {
        if !e.is_recoverable() {
            return Err(e);
        }
        error!(target: "plbug", "{e:#}");
        self.status_error = Some(e.to_string());
        Ok(())
    }

    /// Recompute viewport geometry from the current surface dimensions.
    /// With no known geometry both panes collapse to zero area and render
    /// becomes a no-op until a probe succeeds.
    fn layout(&mut self) {
        let width = self.surface.width();
        let height = self.surface.height();
        let pane_height = height.saturating_sub(TOP_MARGIN + 1);

        let info_width = INFO_PANE_WIDTH.min(width / 2);
        let source_width = width.saturating_sub(info_width);

        self.source_view.set_position(0, TOP_MARGIN);
        self.source_view.set_size(source_width, pane_height);

        self.info_view.set_position(source_width, TOP_MARGIN);
        self.info_view.set_size(info_width, pane_height);
    }

    fn render(&mut self) -> Result<(), Error> {
        self.surface.clear_screen()?;
        render::populate_source(&self.session, &mut self.source_view);
        render::populate_info(&self.session, &mut self.info_view);
        self.source_view.render(&mut self.surface)?;
        self.info_view.render(&mut self.surface)?;
        Ok(())
    }

    fn render_status_row(&mut self) -> Result<(), Error> {
        let Some((width, height)) = self.surface.dimensions() else {
            return Ok(());
        };
        let row = height.saturating_sub(1);

        let summary = render::status_summary(self.session.state(), self.status_error.as_deref());
        let style = if self.status_error.is_some() {
            Style::Alert
        } else {
            Style::Plain
        };
        self.surface.move_to(0, row)?;
        self.surface.write(&summary, style)?;

        let cell = render::status_cell(self.decoder.last_key(), self.effective_fps);
        let x = (width as usize).saturating_sub(cell.len()) as u16;
        self.surface.move_to(x, row)?;
        self.surface.write(&cell, Style::Plain)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frame_budget_arithmetic() {
        struct TestCase {
            fps: u32,
            work_ms: u64,
            // remaining sleep, in whole µs (None = over budget)
            expected_us: Option<u128>,
        }

        let cases = [
            // 30 fps gives a fractional ~33333µs budget, not a truncated 33ms
            TestCase {
                fps: 30,
                work_ms: 10,
                expected_us: Some(23333),
            },
            TestCase {
                fps: 30,
                work_ms: 40,
                expected_us: None,
            },
            TestCase {
                fps: 10,
                work_ms: 0,
                expected_us: Some(100000),
            },
        ];

        for tc in cases {
            let budget = Duration::from_secs_f64(1.0 / tc.fps as f64);
            let rest = remaining_budget(budget, Duration::from_millis(tc.work_ms));
            assert_eq!(rest.map(|d| d.as_micros()), tc.expected_us);
        }
    }
}
