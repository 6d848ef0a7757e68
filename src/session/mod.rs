//! Debug-session controller: attachment lifecycle, snapshots of the remote
//! state and the sequencing rules around the engine's command surface.

use crate::error::Error;
use crate::session::proto::{Channel, Oid, Protocol, WaitStatus};
use crate::session::types::{Breakpoint, SourceListing, StackFrame, Variable};
use log::{debug, info};

pub mod proto;
pub mod sim;
pub mod types;

/// Attachment lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionState {
    #[strum(serialize = "uninitialized")]
    Uninitialized,
    #[strum(serialize = "waiting for target")]
    WaitingForTarget,
    #[strum(serialize = "attached")]
    Attached,
    #[strum(serialize = "aborted")]
    Aborted,
}

/// Owner of all session-derived data.
///
/// Issues engine commands through `P` and keeps the last successfully
/// fetched snapshot of stack, source, variables and breakpoints. Snapshot
/// fields are only overwritten after a whole refresh round-trip succeeded,
/// so a failed remote call leaves the last-known-good data on screen.
pub struct SessionController<P: Protocol> {
    proto: P,
    channel: Option<Channel>,
    state: SessionState,
    starting_breakpoint: Option<Oid>,

    stack: Vec<StackFrame>,
    source: SourceListing,
    variables: Vec<Variable>,
    breakpoints: Vec<Breakpoint>,
    current_frame: usize,
}

impl<P: Protocol> SessionController<P> {
    pub fn new(proto: P) -> Self {
        Self {
            proto,
            channel: None,
            state: SessionState::Uninitialized,
            starting_breakpoint: None,
            stack: Vec::new(),
            source: SourceListing::default(),
            variables: Vec::new(),
            breakpoints: Vec::new(),
            current_frame: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Borrow the underlying engine transport (inspection, tests).
    pub fn protocol(&self) -> &P {
        &self.proto
    }

    pub fn is_attached(&self) -> bool {
        self.state == SessionState::Attached
    }

    pub fn stack(&self) -> &[StackFrame] {
        &self.stack
    }

    pub fn source(&self) -> &SourceListing {
        &self.source
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// The stack frame whose source and variables are on display.
    pub fn selected_frame(&self) -> Option<&StackFrame> {
        self.stack.get(self.current_frame)
    }

    /// The session needs at least one breakpoint to function; remember the
    /// function to break on before [`SessionController::init`].
    pub fn set_starting_breakpoint(&mut self, func: Oid) {
        self.starting_breakpoint = Some(func);
    }

    /// Allocate the session channel and register the starting global
    /// breakpoint.
    pub fn init(&mut self) -> Result<(), Error> {
        self.expect_state(SessionState::Uninitialized, "init")?;
        let func = self.starting_breakpoint.ok_or(Error::NoStartingBreakpoint)?;

        let channel = self.proto.create_listener()?;
        self.channel = Some(channel);
        self.proto.set_global_breakpoint(channel, func, None)?;
        self.state = SessionState::WaitingForTarget;

        info!(target: "session", "listener on channel {channel}, breakpoint on oid {func}");
        Ok(())
    }

    /// Fire the asynchronous wait-for-target command. Returns immediately;
    /// completion is observed through [`SessionController::poll_attachment`].
    pub fn begin_wait_for_target(&mut self) -> Result<(), Error> {
        self.expect_state(SessionState::WaitingForTarget, "begin_wait_for_target")?;
        let channel = self.channel("begin_wait_for_target")?;
        self.proto.begin_wait_for_target(channel)?;
        Ok(())
    }

    /// Non-blocking attachment check. Returns `true` exactly once, on the
    /// tick the outstanding wait command completed; the session is then
    /// attached. Pending is the normal steady state, not an error.
    pub fn poll_attachment(&mut self) -> Result<bool, Error> {
        match self.state {
            SessionState::WaitingForTarget => {}
            SessionState::Attached => return Ok(false),
            state => {
                return Err(Error::InvalidState {
                    op: "poll_attachment",
                    state,
                })
            }
        }

        let channel = self.channel("poll_attachment")?;
        match self.proto.poll_wait_complete(channel)? {
            WaitStatus::Pending => Ok(false),
            WaitStatus::Ready => {
                self.state = SessionState::Attached;
                info!(target: "session", "target attached on channel {channel}");
                Ok(true)
            }
        }
    }

    /// Re-fetch the whole snapshot: stack, then source and variables for
    /// the innermost frame, then breakpoints. The current-frame cursor
    /// resets to 0. Nothing is committed unless every fetch succeeded.
    pub fn refresh_all(&mut self) -> Result<(), Error> {
        self.expect_state(SessionState::Attached, "refresh_all")?;
        let channel = self.channel("refresh_all")?;

        let stack = self.proto.get_stack(channel)?;
        let source = match stack.first() {
            Some(frame) => SourceListing::from_text(&self.proto.get_source(channel, frame.func)?),
            None => SourceListing::default(),
        };
        let variables = self.proto.get_variables(channel)?;
        let breakpoints = self.proto.get_breakpoints(channel)?;

        self.stack = stack;
        self.current_frame = 0;
        self.source = source;
        self.variables = variables;
        self.breakpoints = breakpoints;
        debug!(target: "session", "snapshot refreshed, {} frames", self.stack.len());
        Ok(())
    }

    /// Re-fetch source and variables for the currently selected frame,
    /// leaving stack and cursor untouched. Used after frame navigation,
    /// where a stack re-fetch would reset the cursor.
    pub fn refresh_frame(&mut self) -> Result<(), Error> {
        self.expect_state(SessionState::Attached, "refresh_frame")?;
        let channel = self.channel("refresh_frame")?;

        let source = match self.stack.get(self.current_frame) {
            Some(frame) => SourceListing::from_text(&self.proto.get_source(channel, frame.func)?),
            None => SourceListing::default(),
        };
        let variables = self.proto.get_variables(channel)?;

        self.source = source;
        self.variables = variables;
        Ok(())
    }

    pub fn step_into(&mut self) -> Result<(), Error> {
        self.expect_state(SessionState::Attached, "step_into")?;
        let channel = self.channel("step_into")?;
        self.proto.step_into(channel)?;
        Ok(())
    }

    pub fn step_over(&mut self) -> Result<(), Error> {
        self.expect_state(SessionState::Attached, "step_over")?;
        let channel = self.channel("step_over")?;
        self.proto.step_over(channel)?;
        Ok(())
    }

    pub fn continue_run(&mut self) -> Result<(), Error> {
        self.expect_state(SessionState::Attached, "continue")?;
        let channel = self.channel("continue")?;
        self.proto.continue_run(channel)?;
        Ok(())
    }

    /// Abort the target. A first-class engine command, not a cancellation
    /// of the channel; afterwards the session accepts no further commands.
    pub fn abort(&mut self) -> Result<(), Error> {
        self.expect_state(SessionState::Attached, "abort")?;
        let channel = self.channel("abort")?;
        self.proto.abort_target(channel)?;
        self.state = SessionState::Aborted;
        info!(target: "session", "target aborted");
        Ok(())
    }

    /// Move the current-frame cursor by one position, clamped to the stack
    /// bounds (a no-op at either end), and notify the engine of the new
    /// selection. Returns whether the cursor moved; the caller is expected
    /// to follow a move with [`SessionController::refresh_frame`].
    pub fn select_frame(&mut self, delta: i32) -> Result<bool, Error> {
        self.expect_state(SessionState::Attached, "select_frame")?;
        let channel = self.channel("select_frame")?;

        if self.stack.is_empty() {
            return Ok(false);
        }
        let target = self.current_frame as i64 + delta as i64;
        if target < 0 || target >= self.stack.len() as i64 {
            return Ok(false);
        }

        self.proto.select_frame(channel, target as u32)?;
        self.current_frame = target as usize;
        Ok(true)
    }

    /// Register an additional global breakpoint; `line` of `None` breaks on
    /// function entry.
    pub fn add_global_breakpoint(&mut self, func: Oid, line: Option<u32>) -> Result<(), Error> {
        match self.state {
            SessionState::WaitingForTarget | SessionState::Attached => {}
            state => {
                return Err(Error::InvalidState {
                    op: "add_global_breakpoint",
                    state,
                })
            }
        }
        let channel = self.channel("add_global_breakpoint")?;
        self.proto.set_global_breakpoint(channel, func, line)?;
        Ok(())
    }

    fn expect_state(&self, expected: SessionState, op: &'static str) -> Result<(), Error> {
        if self.state != expected {
            return Err(Error::InvalidState {
                op,
                state: self.state,
            });
        }
        Ok(())
    }

    fn channel(&self, op: &'static str) -> Result<Channel, Error> {
        self.channel.ok_or(Error::InvalidState {
            op,
            state: self.state,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::session::proto::ProtocolError;
    use crate::session::sim::{Call, SimulatedTarget, INVOICE_REPORT_OID, ORDER_TOTAL_OID};

    fn attached_session(polls: u32) -> SessionController<SimulatedTarget> {
        let mut session = SessionController::new(SimulatedTarget::new(polls));
        session.set_starting_breakpoint(ORDER_TOTAL_OID);
        session.init().unwrap();
        session.begin_wait_for_target().unwrap();
        while !session.poll_attachment().unwrap() {}
        session
    }

    #[test]
    fn test_init_requires_breakpoint() {
        let mut session = SessionController::new(SimulatedTarget::new(0));
        assert!(matches!(session.init(), Err(Error::NoStartingBreakpoint)));
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.set_starting_breakpoint(ORDER_TOTAL_OID);
        session.init().unwrap();
        assert_eq!(session.state(), SessionState::WaitingForTarget);
    }

    #[test]
    fn test_commands_before_init_fail() {
        let mut session = SessionController::new(SimulatedTarget::new(0));
        assert!(matches!(
            session.begin_wait_for_target(),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            session.step_into(),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            session.poll_attachment(),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_attachment_polls_until_ready_then_once() {
        let mut session = SessionController::new(SimulatedTarget::new(3));
        session.set_starting_breakpoint(ORDER_TOTAL_OID);
        session.init().unwrap();
        session.begin_wait_for_target().unwrap();

        assert!(!session.poll_attachment().unwrap());
        assert!(!session.poll_attachment().unwrap());
        assert!(!session.poll_attachment().unwrap());
        assert!(session.poll_attachment().unwrap());
        assert_eq!(session.state(), SessionState::Attached);
        // transition is reported exactly once
        assert!(!session.poll_attachment().unwrap());
    }

    #[test]
    fn test_refresh_resets_cursor_and_orders_fetches() {
        let mut session = attached_session(0);
        session.refresh_all().unwrap();
        assert_eq!(session.stack().len(), 2);
        assert_eq!(session.current_frame(), 0);
        assert!(!session.source().is_empty());
        assert_eq!(session.variables().len(), 2);
        assert_eq!(session.breakpoints().len(), 1);

        let calls = session.proto.calls();
        let refresh_tail = &calls[calls.len() - 4..];
        assert_eq!(refresh_tail[0], Call::GetStack);
        assert!(matches!(refresh_tail[1], Call::GetSource(_)));
        assert_eq!(refresh_tail[2], Call::GetVariables);
        assert_eq!(refresh_tail[3], Call::GetBreakpoints);
    }

    #[test]
    fn test_select_frame_clamps_at_bounds() {
        let mut session = attached_session(0);
        session.refresh_all().unwrap();

        // index 0 is the lower bound
        assert!(!session.select_frame(-1).unwrap());
        assert_eq!(session.current_frame(), 0);

        assert!(session.select_frame(1).unwrap());
        assert_eq!(session.current_frame(), 1);
        assert!(session.proto.calls().contains(&Call::SelectFrame(1)));

        // last frame is the upper bound
        assert!(!session.select_frame(1).unwrap());
        assert_eq!(session.current_frame(), 1);
    }

    #[test]
    fn test_add_global_breakpoint() {
        // rejected before the channel exists
        let mut session = SessionController::new(SimulatedTarget::new(0));
        assert!(matches!(
            session.add_global_breakpoint(ORDER_TOTAL_OID, Some(7)),
            Err(Error::InvalidState { .. })
        ));

        // accepted while waiting and while attached, entry vs. line form
        session.set_starting_breakpoint(ORDER_TOTAL_OID);
        session.init().unwrap();
        session.add_global_breakpoint(INVOICE_REPORT_OID, Some(6)).unwrap();

        session.begin_wait_for_target().unwrap();
        while !session.poll_attachment().unwrap() {}
        session.add_global_breakpoint(INVOICE_REPORT_OID, None).unwrap();

        let registered: Vec<_> = session
            .proto
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::SetGlobalBreakpoint(..)))
            .cloned()
            .collect();
        assert_eq!(
            registered,
            vec![
                // entry breakpoint registered by init
                Call::SetGlobalBreakpoint(ORDER_TOTAL_OID, None),
                Call::SetGlobalBreakpoint(INVOICE_REPORT_OID, Some(6)),
                Call::SetGlobalBreakpoint(INVOICE_REPORT_OID, None),
            ]
        );

        // rejected again once the session is gone
        session.abort().unwrap();
        assert!(matches!(
            session.add_global_breakpoint(ORDER_TOTAL_OID, None),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_abort_ends_the_session() {
        let mut session = attached_session(0);
        session.abort().unwrap();
        assert_eq!(session.state(), SessionState::Aborted);
        assert!(matches!(
            session.step_into(),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            session.refresh_all(),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_failed_refresh_keeps_last_snapshot() {
        struct FailingStack(SimulatedTarget);

        impl Protocol for FailingStack {
            fn create_listener(&mut self) -> Result<Channel, ProtocolError> {
                self.0.create_listener()
            }
            fn set_global_breakpoint(
                &mut self,
                ch: Channel,
                func: Oid,
                line: Option<u32>,
            ) -> Result<(), ProtocolError> {
                self.0.set_global_breakpoint(ch, func, line)
            }
            fn begin_wait_for_target(&mut self, ch: Channel) -> Result<(), ProtocolError> {
                self.0.begin_wait_for_target(ch)
            }
            fn poll_wait_complete(&mut self, ch: Channel) -> Result<WaitStatus, ProtocolError> {
                self.0.poll_wait_complete(ch)
            }
            fn step_into(&mut self, ch: Channel) -> Result<(), ProtocolError> {
                self.0.step_into(ch)
            }
            fn step_over(&mut self, ch: Channel) -> Result<(), ProtocolError> {
                self.0.step_over(ch)
            }
            fn continue_run(&mut self, ch: Channel) -> Result<(), ProtocolError> {
                self.0.continue_run(ch)
            }
            fn abort_target(&mut self, ch: Channel) -> Result<(), ProtocolError> {
                self.0.abort_target(ch)
            }
            fn select_frame(&mut self, ch: Channel, frame: u32) -> Result<(), ProtocolError> {
                self.0.select_frame(ch, frame)
            }
            fn get_stack(&mut self, ch: Channel) -> Result<Vec<StackFrame>, ProtocolError> {
                self.0.get_stack(ch)
            }
            fn get_source(&mut self, _: Channel, _: Oid) -> Result<String, ProtocolError> {
                Err(ProtocolError::ConnectionLost)
            }
            fn get_variables(&mut self, ch: Channel) -> Result<Vec<Variable>, ProtocolError> {
                self.0.get_variables(ch)
            }
            fn get_breakpoints(&mut self, ch: Channel) -> Result<Vec<Breakpoint>, ProtocolError> {
                self.0.get_breakpoints(ch)
            }
        }

        let mut good = attached_session(0);
        good.refresh_all().unwrap();
        let stack_before = good.stack().to_vec();

        let mut session = SessionController::new(FailingStack(SimulatedTarget::new(0)));
        session.set_starting_breakpoint(ORDER_TOTAL_OID);
        session.init().unwrap();
        session.begin_wait_for_target().unwrap();
        while !session.poll_attachment().unwrap() {}

        // seed a snapshot by hand, then fail a refresh
        session.stack = stack_before.clone();
        session.current_frame = 1;
        assert!(matches!(
            session.refresh_all(),
            Err(Error::Protocol(ProtocolError::ConnectionLost))
        ));
        assert_eq!(session.stack(), stack_before.as_slice());
        assert_eq!(session.current_frame(), 1);
    }
}
