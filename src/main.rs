//! fleet_model - trace-driven autoscaling scheduler for a three-queue
//! batch fleet.
//!
//! Reads job records from stdin (plus any input files), writes the vm
//! launch/terminate commands interleaved with the echoed jobs to stdout.
//! Diagnostics go to stderr so the data channel stays clean.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fleet_model::core::{Scheduler, Tunables};
use fleet_model::error::RunError;
use fleet_model::trace::{Outcome, RecordWriter, Replay, UtilLog};

/// Autoscaling scheduler for a three-queue batch fleet, replayed from a
/// job trace.
#[derive(Debug, Parser)]
#[command(name = "fleet_model", version, about, long_about = None)]
struct Cli {
    /// Write per-job utilization counters to this file.
    log_file: Option<PathBuf>,

    /// Additional input files, read after stdin.
    inputs: Vec<PathBuf>,
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_interrupt(_: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

fn install_signal_handlers() {
    use nix::sys::signal::{SigHandler, Signal, signal};

    unsafe {
        let _ = signal(Signal::SIGTERM, SigHandler::Handler(handle_interrupt));
        let _ = signal(Signal::SIGINT, SigHandler::Handler(handle_interrupt));
        // A closed consumer must surface as a write error, not kill us.
        let _ = signal(Signal::SIGPIPE, SigHandler::SigIgn);
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    install_signal_handlers();
    let cli = Cli::parse();

    match run(cli) {
        // A signal mid-run is a clean stop without the shutdown burst.
        Ok(Outcome::Completed) | Ok(Outcome::Interrupted) => ExitCode::SUCCESS,
        Err(err) if err.is_broken_pipe() => {
            debug!("downstream closed the pipe");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(error = %err, "run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Outcome, RunError> {
    let mut input: Box<dyn Read> = Box::new(io::stdin().lock());
    for path in &cli.inputs {
        input = Box::new(input.chain(File::open(path)?));
    }

    let cfg = Tunables::default();
    let log = match &cli.log_file {
        Some(path) => Some(UtilLog::create(path, cfg.min_idle_fraction)?),
        None => None,
    };
    let out = RecordWriter::new(io::BufWriter::new(io::stdout().lock()));

    Replay::new(Scheduler::new(cfg), out, log)
        .with_interrupt(&INTERRUPTED)
        .run(io::BufReader::new(input))
}
