use crate::session::proto::ProtocolError;
use crate::session::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- session lifecycle -----------------------------------------
    #[error("a debugging session needs at least one breakpoint to start")]
    NoStartingBreakpoint,
    #[error("`{op}` is not available while the session is {state}")]
    InvalidState {
        op: &'static str,
        state: SessionState,
    },

    // --------------------------------- external failures -----------------------------------------
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the event loop may keep running after this error: lifecycle
    /// misuse and remote-call failures are displayed in the status row while
    /// the last-known-good snapshot stays on screen, everything else tears
    /// the application down.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::NoStartingBreakpoint => false,
            Error::InvalidState { .. } => true,
            Error::Protocol(_) => true,
            Error::Io(_) => false,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "plbug", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "plbug", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}
