//! Output sinks: the downstream record stream and the optional side log
//! of utilization counters.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::core::{Command, Queue, Stamp};

/// Writes command records and echoed job lines downstream, in the order
/// they occur. A closed consumer surfaces as `BrokenPipe` from here.
pub struct RecordWriter<W: Write> {
    out: W,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn command(&mut self, command: &Command) -> io::Result<()> {
        writeln!(self.out, "{command}")
    }

    /// Echoes an input job line verbatim.
    pub fn echo(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Append-only, line-atomic sink for per-job utilization counters.
pub struct UtilLog {
    out: BufWriter<File>,
    min_idle_fraction: f64,
}

impl UtilLog {
    pub fn create(path: &Path, min_idle_fraction: f64) -> io::Result<Self> {
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
            min_idle_fraction,
        })
    }

    pub fn sample(
        &mut self,
        at: Stamp,
        queue: Queue,
        pool_size: usize,
        free_real: usize,
    ) -> io::Result<()> {
        let min_idle = (pool_size as f64 * self.min_idle_fraction).floor() as usize;
        writeln!(self.out, "{at} {queue} {pool_size} {free_real} {min_idle}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_keep_emission_order() {
        let at = Stamp::parse("2013-03-01", "00:00:27").unwrap();
        let mut writer = RecordWriter::new(Vec::new());
        writer
            .command(&Command::Launch {
                at,
                queue: Queue::Export,
            })
            .unwrap();
        writer.echo("2013-03-01 00:00:27 uid1 export 10.999").unwrap();
        writer
            .command(&Command::Terminate {
                at,
                queue: Queue::Export,
            })
            .unwrap();

        let text = String::from_utf8(writer.out).unwrap();
        assert_eq!(
            text,
            "2013-03-01 00:00:27 launch export\n\
             2013-03-01 00:00:27 uid1 export 10.999\n\
             2013-03-01 00:00:27 terminate export\n"
        );
    }

    #[test]
    fn util_log_line_shape() {
        let path = std::env::temp_dir().join(format!("fleet_model_utillog_{}", std::process::id()));
        let at = Stamp::parse("2013-03-01", "00:00:27").unwrap();

        let mut log = UtilLog::create(&path, 0.4).unwrap();
        log.sample(at, Queue::Export, 41, 12).unwrap();
        log.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "2013-03-01 00:00:27 export 41 12 16\n");
        std::fs::remove_file(&path).ok();
    }
}
