//! Snapshot-to-viewport population. Pure buffer building; nothing here
//! touches the terminal.

use crate::session::proto::Protocol;
use crate::session::types::{Breakpoint, Variable};
use crate::session::SessionController;
use crate::term::{Style, Viewport};

/// Fill the source pane: bold function header, a spacer, then numbered
/// source lines with the frame's current line highlighted.
pub fn populate_source<P: Protocol>(session: &SessionController<P>, view: &mut Viewport) {
    view.clear();

    let Some(frame) = session.selected_frame() else {
        return;
    };

    view.push_line(format!("       {}", frame.target_name), Style::Bold);
    view.push_line("", Style::Plain);

    for (idx, line) in session.source().lines().iter().enumerate() {
        let number = idx as u32 + 1;
        let style = if number == frame.line_number {
            Style::Accent
        } else {
            Style::Plain
        };
        view.push_line(format!("{number:>4}: {line}"), style);
    }
}

/// Fill the right-hand pane: call stack, variables table, breakpoints.
pub fn populate_info<P: Protocol>(session: &SessionController<P>, view: &mut Viewport) {
    view.clear();

    for frame in session.stack() {
        let style = if frame.level as usize == session.current_frame() {
            Style::Accent
        } else {
            Style::Plain
        };
        view.push_line(
            format!(
                "{} » {}:{} » {}",
                frame.level, frame.target_name, frame.func, frame.args
            ),
            style,
        );
    }

    view.push_line("", Style::Plain);
    view.push_line("", Style::Plain);

    view.push_line(variables_header(), Style::Bold);
    for var in session.variables() {
        view.push_line(variable_row(var), Style::Plain);
    }

    view.push_line("", Style::Plain);
    view.push_line("", Style::Plain);

    view.push_line("breakpoints", Style::Bold);
    for bp in session.breakpoints() {
        view.push_line(breakpoint_row(bp), Style::Plain);
    }
}

fn variables_header() -> String {
    format!(
        "{:<20}{:<30}{:<30}{:<6}{:<6}{:<3}{:<3}{:<3}",
        "name", "value", "dtype", "class", "line", "U", "C", "N"
    )
}

fn variable_row(var: &Variable) -> String {
    format!(
        "{:<20}{:<30}{:<30}{:<6}{:<6}{:<3}{:<3}{:<3}",
        var.name,
        var.value,
        var.dtype,
        var.var_class,
        var.line_number,
        flag(var.unique),
        flag(var.constant),
        flag(var.not_null)
    )
}

fn breakpoint_row(bp: &Breakpoint) -> String {
    let place = match bp.line_number {
        Some(line) => format!(":{line}"),
        None => " (entry)".to_string(),
    };
    format!("{}{} [oid {}]", bp.target_name, place, bp.func)
}

fn flag(set: bool) -> &'static str {
    if set {
        "t"
    } else {
        "f"
    }
}

/// Bottom-right status cell: the decoded last key and the measured
/// refresh rate.
pub fn status_cell(last_key: Option<impl ToString>, fps: f64) -> String {
    let key = last_key.map(|k| k.to_string()).unwrap_or_default();
    format!("{:<8}  fps: {:.2}", format!("[{key}]"), fps)
}

/// Bottom-left status cell: session phase, or the last recoverable error.
pub fn status_summary(state: impl ToString, error: Option<&str>) -> String {
    match error {
        Some(err) => {
            // keep it one line
            let err = err.chars().filter(|c| !c.is_control()).collect::<String>();
            format!("error: {err}")
        }
        None => state.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::session::sim::{SimulatedTarget, ORDER_TOTAL_OID};
    use crate::term::Surface;

    fn attached_session() -> SessionController<SimulatedTarget> {
        let mut session = SessionController::new(SimulatedTarget::new(0));
        session.set_starting_breakpoint(ORDER_TOTAL_OID);
        session.init().unwrap();
        session.begin_wait_for_target().unwrap();
        assert!(session.poll_attachment().unwrap());
        session.refresh_all().unwrap();
        session
    }

    #[test]
    fn test_source_pane_numbers_and_header() {
        let session = attached_session();
        let mut view = Viewport::new();
        view.set_size(120, 40);
        populate_source(&session, &mut view);

        let mut surface = Surface::with_dimensions(Vec::new(), 200, 50);
        view.render(&mut surface).unwrap();
        let out = String::from_utf8(surface.sink().clone()).unwrap();

        assert!(out.contains("public.order_total"));
        assert!(out.contains("   1: create function order_total"));
        assert!(out.contains("   6: "));
    }

    #[test]
    fn test_info_pane_lists_stack_vars_and_breakpoints() {
        let session = attached_session();
        let mut view = Viewport::new();
        view.set_size(120, 40);
        populate_info(&session, &mut view);

        let mut surface = Surface::with_dimensions(Vec::new(), 200, 50);
        view.render(&mut surface).unwrap();
        let out = String::from_utf8(surface.sink().clone()).unwrap();

        assert!(out.contains("0 » public.order_total"));
        assert!(out.contains("1 » public.invoice_report"));
        assert!(out.contains("v_total"));
        assert!(out.contains("numeric"));
        assert!(out.contains("public.order_total (entry)"));
    }

    #[test]
    fn test_status_cells() {
        assert_eq!(status_cell(Some("F5"), 29.966), "[F5]      fps: 29.97");
        assert_eq!(status_cell(None::<&str>, 30.0), "[]        fps: 30.00");
        assert_eq!(
            status_summary("attached", Some("engine rejected `step_into`")),
            "error: engine rejected `step_into`"
        );
        assert_eq!(status_summary("waiting for target", None), "waiting for target");
    }
}
