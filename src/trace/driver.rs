//! The replay loop: pulls job records off the input, drives the
//! scheduler, and interleaves its commands with the echoed records.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::core::{Scheduler, Stamp};
use crate::error::RunError;
use crate::trace::record::JobRecord;
use crate::trace::writer::{RecordWriter, UtilLog};

/// How a replay ended. An interrupt skips the shutdown burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Interrupted,
}

/// Owns one pass over a trace. Logical time advances only with the
/// records it feeds to the scheduler.
pub struct Replay<'a, W: Write> {
    sched: Scheduler,
    out: RecordWriter<W>,
    log: Option<UtilLog>,
    interrupt: Option<&'a AtomicBool>,
    last_seen: Option<Stamp>,
}

impl<'a, W: Write> Replay<'a, W> {
    pub fn new(sched: Scheduler, out: RecordWriter<W>, log: Option<UtilLog>) -> Self {
        Self {
            sched,
            out,
            log,
            interrupt: None,
            last_seen: None,
        }
    }

    /// Checked between records; when the flag is raised the replay stops
    /// without a shutdown burst.
    pub fn with_interrupt(mut self, flag: &'a AtomicBool) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Runs to end of stream, then retires the remaining fleet at the
    /// last seen timestamp. The side log is flushed on every exit path.
    pub fn run<R: BufRead>(mut self, input: R) -> Result<Outcome, RunError> {
        let outcome = self.drive(input);
        if let Some(mut log) = self.log.take() {
            let _ = log.flush();
        }
        outcome
    }

    fn drive<R: BufRead>(&mut self, input: R) -> Result<Outcome, RunError> {
        for line in input.lines() {
            if self.interrupted() {
                return Ok(Outcome::Interrupted);
            }
            let line = match line {
                Ok(line) => line,
                Err(err) if err.kind() == io::ErrorKind::Interrupted && self.interrupted() => {
                    return Ok(Outcome::Interrupted);
                }
                Err(err) => return Err(err.into()),
            };
            if line.trim().is_empty() {
                continue;
            }
            self.feed(&line)?;
        }

        if let Some(at) = self.last_seen {
            for command in &self.sched.shutdown(at) {
                self.out.command(command)?;
            }
        }
        self.out.flush()?;

        let stats = self.sched.stats();
        info!(
            jobs = stats.jobs,
            unplaced = stats.unplaced,
            launched = stats.launched,
            retired = stats.retired,
            billed_hours = stats.billed_hours,
            mean_start_delay = stats.mean_start_delay,
            "replay complete"
        );
        Ok(Outcome::Completed)
    }

    fn feed(&mut self, line: &str) -> Result<(), RunError> {
        let job = JobRecord::parse(line)?;
        self.last_seen = Some(job.at);

        let scheduled = self
            .sched
            .schedule(job.at, job.queue, &job.uid, job.length_secs)?;
        for command in &scheduled.commands {
            self.out.command(command)?;
        }
        self.out.echo(line)?;

        if let Some(log) = &mut self.log {
            log.sample(job.at, job.queue, scheduled.pool_size, scheduled.free_real)?;
        }
        Ok(())
    }

    fn interrupted(&self) -> bool {
        self.interrupt.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
