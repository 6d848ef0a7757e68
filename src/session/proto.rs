//! Command surface of the remote debugger engine.
//!
//! The engine lives inside the target database and is reached only through
//! query-style calls correlated by a session channel. This module owns the
//! call signatures and error shape; the transport behind them (libpq, a
//! pooler, the in-process simulator) is an implementation detail of the
//! [`Protocol`] impl.

use crate::session::types::{Breakpoint, StackFrame, Variable};

/// Engine identifier of a function (a PostgreSQL object id).
pub type Oid = u32;

/// Identifier correlating all calls of one debugging session.
pub type Channel = i32;

/// Outcome of a non-blocking check on the outstanding wait-for-target call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The target has not trapped into a breakpoint yet. Normal steady
    /// state while waiting, not an error.
    Pending,
    Ready,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("engine rejected `{command}`: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
    #[error("malformed `{command}` result: {message}")]
    Malformed {
        command: &'static str,
        message: String,
    },
    #[error("connection to the debugger engine lost")]
    ConnectionLost,
}

/// Request/response surface of the engine. Every call is synchronous and
/// opaque except [`Protocol::begin_wait_for_target`], which only fires the
/// command; completion is observed through [`Protocol::poll_wait_complete`].
pub trait Protocol {
    fn create_listener(&mut self) -> Result<Channel, ProtocolError>;

    /// Register a global breakpoint; `line` of `None` breaks on function
    /// entry.
    fn set_global_breakpoint(
        &mut self,
        channel: Channel,
        func: Oid,
        line: Option<u32>,
    ) -> Result<(), ProtocolError>;

    /// Fire the asynchronous wait-for-target command without blocking.
    fn begin_wait_for_target(&mut self, channel: Channel) -> Result<(), ProtocolError>;

    /// Non-blocking completion check for the outstanding wait command.
    fn poll_wait_complete(&mut self, channel: Channel) -> Result<WaitStatus, ProtocolError>;

    fn step_into(&mut self, channel: Channel) -> Result<(), ProtocolError>;
    fn step_over(&mut self, channel: Channel) -> Result<(), ProtocolError>;
    fn continue_run(&mut self, channel: Channel) -> Result<(), ProtocolError>;
    fn abort_target(&mut self, channel: Channel) -> Result<(), ProtocolError>;

    fn select_frame(&mut self, channel: Channel, frame: u32) -> Result<(), ProtocolError>;

    fn get_stack(&mut self, channel: Channel) -> Result<Vec<StackFrame>, ProtocolError>;
    fn get_source(&mut self, channel: Channel, func: Oid) -> Result<String, ProtocolError>;
    fn get_variables(&mut self, channel: Channel) -> Result<Vec<Variable>, ProtocolError>;
    fn get_breakpoints(&mut self, channel: Channel) -> Result<Vec<Breakpoint>, ProtocolError>;
}
