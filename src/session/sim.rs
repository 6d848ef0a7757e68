//! Scripted in-process debugger engine.
//!
//! Replays a small canned PL/pgSQL session: a reporting function calling a
//! per-order total. Lets the UI run without a database and gives the tests
//! a deterministic engine whose attach moment is controlled by a poll
//! countdown.

use crate::session::proto::{Channel, Oid, Protocol, ProtocolError, WaitStatus};
use crate::session::types::{Breakpoint, StackFrame, Variable};

pub const ORDER_TOTAL_OID: Oid = 24610;
pub const INVOICE_REPORT_OID: Oid = 24611;

const ORDER_TOTAL_SRC: &str = "\
create function order_total(p_order integer) returns numeric as $$
declare
  v_total numeric := 0;
  v_row record;
begin
  for v_row in select price, qty from order_lines where order_id = p_order loop
    v_total := v_total + v_row.price * v_row.qty;
  end loop;
  return v_total;
end;
$$ language plpgsql;";

const INVOICE_REPORT_SRC: &str = "\
create function invoice_report() returns numeric as $$
declare
  v_sum numeric := 0;
begin
  for v_order in select id from orders loop
    v_sum := v_sum + order_total(v_order.id);
  end loop;
  return v_sum;
end;
$$ language plpgsql;";

/// Call journal entry, recorded in invocation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateListener,
    SetGlobalBreakpoint(Oid, Option<u32>),
    BeginWait,
    PollWait,
    StepInto,
    StepOver,
    ContinueRun,
    AbortTarget,
    SelectFrame(u32),
    GetStack,
    GetSource(Oid),
    GetVariables,
    GetBreakpoints,
}

pub struct SimulatedTarget {
    channel: Option<Channel>,
    wait_fired: bool,
    polls_until_attach: u32,
    attached: bool,
    aborted: bool,
    /// Line frame 0 is stopped at inside `order_total`.
    current_line: u32,
    breakpoints: Vec<Breakpoint>,
    calls: Vec<Call>,
}

impl SimulatedTarget {
    /// `polls_until_attach` non-blocking checks report `Pending` before the
    /// simulated target traps into its breakpoint.
    pub fn new(polls_until_attach: u32) -> Self {
        Self {
            channel: None,
            wait_fired: false,
            polls_until_attach,
            attached: false,
            aborted: false,
            current_line: 6,
            breakpoints: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    fn ensure_channel(&self, channel: Channel, command: &'static str) -> Result<(), ProtocolError> {
        if self.channel != Some(channel) {
            return Err(ProtocolError::Command {
                command,
                message: format!("unknown channel {channel}"),
            });
        }
        Ok(())
    }

    fn ensure_live(&self, command: &'static str) -> Result<(), ProtocolError> {
        if self.aborted {
            return Err(ProtocolError::Command {
                command,
                message: "target was aborted".to_string(),
            });
        }
        if !self.attached {
            return Err(ProtocolError::Command {
                command,
                message: "no target attached".to_string(),
            });
        }
        Ok(())
    }

    fn advance_line(&mut self) {
        // wrap inside the executable body of order_total
        self.current_line += 1;
        if self.current_line > 9 {
            self.current_line = 6;
        }
    }
}

impl Protocol for SimulatedTarget {
    fn create_listener(&mut self) -> Result<Channel, ProtocolError> {
        self.calls.push(Call::CreateListener);
        let channel = 1;
        self.channel = Some(channel);
        Ok(channel)
    }

    fn set_global_breakpoint(
        &mut self,
        channel: Channel,
        func: Oid,
        line: Option<u32>,
    ) -> Result<(), ProtocolError> {
        self.calls.push(Call::SetGlobalBreakpoint(func, line));
        self.ensure_channel(channel, "set_global_breakpoint")?;
        let target_name = match func {
            ORDER_TOTAL_OID => "public.order_total",
            INVOICE_REPORT_OID => "public.invoice_report",
            _ => "public.unknown",
        };
        self.breakpoints.push(Breakpoint {
            func,
            line_number: line,
            target_name: target_name.to_string(),
        });
        Ok(())
    }

    fn begin_wait_for_target(&mut self, channel: Channel) -> Result<(), ProtocolError> {
        self.calls.push(Call::BeginWait);
        self.ensure_channel(channel, "begin_wait_for_target")?;
        self.wait_fired = true;
        Ok(())
    }

    fn poll_wait_complete(&mut self, channel: Channel) -> Result<WaitStatus, ProtocolError> {
        self.calls.push(Call::PollWait);
        self.ensure_channel(channel, "poll_wait_complete")?;
        if !self.wait_fired {
            return Err(ProtocolError::Command {
                command: "poll_wait_complete",
                message: "no outstanding wait".to_string(),
            });
        }
        if self.polls_until_attach > 0 {
            self.polls_until_attach -= 1;
            return Ok(WaitStatus::Pending);
        }
        self.attached = true;
        self.wait_fired = false;
        Ok(WaitStatus::Ready)
    }

    fn step_into(&mut self, channel: Channel) -> Result<(), ProtocolError> {
        self.calls.push(Call::StepInto);
        self.ensure_channel(channel, "step_into")?;
        self.ensure_live("step_into")?;
        self.advance_line();
        Ok(())
    }

    fn step_over(&mut self, channel: Channel) -> Result<(), ProtocolError> {
        self.calls.push(Call::StepOver);
        self.ensure_channel(channel, "step_over")?;
        self.ensure_live("step_over")?;
        self.advance_line();
        Ok(())
    }

    fn continue_run(&mut self, channel: Channel) -> Result<(), ProtocolError> {
        self.calls.push(Call::ContinueRun);
        self.ensure_channel(channel, "continue_run")?;
        self.ensure_live("continue_run")?;
        // runs until the global breakpoint traps again
        self.current_line = 6;
        Ok(())
    }

    fn abort_target(&mut self, channel: Channel) -> Result<(), ProtocolError> {
        self.calls.push(Call::AbortTarget);
        self.ensure_channel(channel, "abort_target")?;
        self.ensure_live("abort_target")?;
        self.aborted = true;
        self.attached = false;
        Ok(())
    }

    fn select_frame(&mut self, channel: Channel, frame: u32) -> Result<(), ProtocolError> {
        self.calls.push(Call::SelectFrame(frame));
        self.ensure_channel(channel, "select_frame")?;
        self.ensure_live("select_frame")?;
        if frame > 1 {
            return Err(ProtocolError::Command {
                command: "select_frame",
                message: format!("no frame {frame}"),
            });
        }
        Ok(())
    }

    fn get_stack(&mut self, channel: Channel) -> Result<Vec<StackFrame>, ProtocolError> {
        self.calls.push(Call::GetStack);
        self.ensure_channel(channel, "get_stack")?;
        self.ensure_live("get_stack")?;
        Ok(vec![
            StackFrame {
                level: 0,
                target_name: "public.order_total".to_string(),
                func: ORDER_TOTAL_OID,
                args: "p_order := 42".to_string(),
                line_number: self.current_line,
            },
            StackFrame {
                level: 1,
                target_name: "public.invoice_report".to_string(),
                func: INVOICE_REPORT_OID,
                args: "".to_string(),
                line_number: 6,
            },
        ])
    }

    fn get_source(&mut self, channel: Channel, func: Oid) -> Result<String, ProtocolError> {
        self.calls.push(Call::GetSource(func));
        self.ensure_channel(channel, "get_source")?;
        self.ensure_live("get_source")?;
        match func {
            ORDER_TOTAL_OID => Ok(ORDER_TOTAL_SRC.to_string()),
            INVOICE_REPORT_OID => Ok(INVOICE_REPORT_SRC.to_string()),
            _ => Err(ProtocolError::Command {
                command: "get_source",
                message: format!("unknown function {func}"),
            }),
        }
    }

    fn get_variables(&mut self, channel: Channel) -> Result<Vec<Variable>, ProtocolError> {
        self.calls.push(Call::GetVariables);
        self.ensure_channel(channel, "get_variables")?;
        self.ensure_live("get_variables")?;
        Ok(vec![
            Variable {
                name: "p_order".to_string(),
                value: "42".to_string(),
                dtype: "integer".to_string(),
                var_class: "A".to_string(),
                line_number: 0,
                unique: false,
                constant: true,
                not_null: false,
            },
            Variable {
                name: "v_total".to_string(),
                value: "129.90".to_string(),
                dtype: "numeric".to_string(),
                var_class: "L".to_string(),
                line_number: 3,
                unique: false,
                constant: false,
                not_null: false,
            },
        ])
    }

    fn get_breakpoints(&mut self, channel: Channel) -> Result<Vec<Breakpoint>, ProtocolError> {
        self.calls.push(Call::GetBreakpoints);
        self.ensure_channel(channel, "get_breakpoints")?;
        Ok(self.breakpoints.clone())
    }
}
