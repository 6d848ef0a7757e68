use anyhow::Context;
use clap::Parser;
use crossterm::cursor::{Hide, Show};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType};
use crossterm::{execute, style::ResetColor};
use plbug::app::keymap::KeyMap;
use plbug::app::App;
use plbug::session::sim::{SimulatedTarget, ORDER_TOTAL_OID};
use plbug::session::SessionController;
use plbug::term::{NonblockStdin, Surface};
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// OID of the function to set the starting global breakpoint on.
    #[arg(long, default_value_t = ORDER_TOTAL_OID)]
    breakpoint: u32,

    /// Target refresh rate.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Append diagnostics to this file (never to the terminal). Level via
    /// RUST_LOG.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Keymap override (default: ~/.config/plbug/keymap.toml).
    #[arg(long)]
    keymap: Option<PathBuf>,

    /// Ticks the simulated target stays unattached before trapping into
    /// the breakpoint.
    #[arg(long, default_value_t = 60)]
    attach_delay: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.log_file.as_ref())?;

    let keymap = KeyMap::from_file(args.keymap.as_deref()).unwrap_or_default();

    let mut session = SessionController::new(SimulatedTarget::new(args.attach_delay));
    session.set_starting_breakpoint(args.breakpoint);

    let input = NonblockStdin::new().context("switch stdin to non-blocking")?;
    let surface = Surface::new(io::stdout());

    let resized = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGWINCH, Arc::clone(&resized))
        .context("register resize notification")?;

    enable_raw_mode()?;
    execute!(io::stdout(), Hide)?;
    let mut app = App::new(session, surface, input, keymap, args.fps, resized);
    let result = app.run();

    disable_raw_mode()?;
    execute!(io::stdout(), ResetColor, Clear(ClearType::All), Show)?;

    result.context("event loop failed")
}

fn init_logger(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            // raw-mode screen, logs have nowhere safe to go
            builder.target(env_logger::Target::Pipe(Box::new(io::sink())));
        }
    }
    builder.init();
    Ok(())
}
