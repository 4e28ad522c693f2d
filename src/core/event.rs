use std::fmt;

use super::clock::Stamp;
use super::state::Queue;

/// Vm lifecycle command, written downstream interleaved with echoed jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Launch { at: Stamp, queue: Queue },
    Terminate { at: Stamp, queue: Queue },
}

impl Command {
    pub fn at(&self) -> Stamp {
        match *self {
            Command::Launch { at, .. } | Command::Terminate { at, .. } => at,
        }
    }

    pub fn queue(&self) -> Queue {
        match *self {
            Command::Launch { queue, .. } | Command::Terminate { queue, .. } => queue,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Launch { at, queue } => write!(f, "{at} launch {queue}"),
            Command::Terminate { at, queue } => write!(f, "{at} terminate {queue}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format() {
        let at = Stamp::parse("2013-03-01", "00:00:27").unwrap();
        let launch = Command::Launch {
            at,
            queue: Queue::Export,
        };
        let stop = Command::Terminate {
            at,
            queue: Queue::General,
        };
        assert_eq!(launch.to_string(), "2013-03-01 00:00:27 launch export");
        assert_eq!(stop.to_string(), "2013-03-01 00:00:27 terminate general");
        assert_eq!(launch.queue(), Queue::Export);
        assert_eq!(stop.at(), at);
    }
}
