use crate::core::{Queue, Stamp};
use crate::error::TraceError;

/// One parsed input line: `YYYY-MM-DD HH:MM:SS <uid> <queue> <length>`.
/// The uid is opaque and echoed verbatim; the length is seconds and may
/// be fractional.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub at: Stamp,
    pub uid: String,
    pub queue: Queue,
    pub length_secs: f64,
}

impl JobRecord {
    pub fn parse(line: &str) -> Result<Self, TraceError> {
        let mut fields = line.split_whitespace();
        let (Some(date), Some(time), Some(uid), Some(queue), Some(length), None) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            return Err(TraceError::Malformed {
                line: line.to_owned(),
            });
        };

        let at = Stamp::parse(date, time)?;
        let queue = Queue::parse(queue)?;
        let length_secs: f64 = length.parse().map_err(|_| TraceError::Length {
            text: length.to_owned(),
        })?;
        if !length_secs.is_finite() || length_secs < 0.0 {
            return Err(TraceError::Length {
                text: length.to_owned(),
            });
        }

        Ok(Self {
            at,
            uid: uid.to_owned(),
            queue,
            length_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_job_line() {
        let job = JobRecord::parse("2013-03-01 00:00:27 uid1 export 10.999").unwrap();
        assert_eq!(job.at.to_string(), "2013-03-01 00:00:27");
        assert_eq!(job.uid, "uid1");
        assert_eq!(job.queue, Queue::Export);
        assert_eq!(job.length_secs, 10.999);
    }

    #[test]
    fn rejects_wrong_field_counts() {
        assert!(matches!(
            JobRecord::parse("2013-03-01 00:00:27 uid1 export"),
            Err(TraceError::Malformed { .. })
        ));
        assert!(matches!(
            JobRecord::parse("2013-03-01 00:00:27 uid1 export 1.0 extra"),
            Err(TraceError::Malformed { .. })
        ));
    }

    #[test]
    fn rejects_unknown_queue() {
        assert!(matches!(
            JobRecord::parse("2013-03-01 00:00:27 uid1 video 1.0"),
            Err(TraceError::UnknownQueue { name }) if name == "video"
        ));
    }

    #[test]
    fn rejects_bad_lengths() {
        for line in [
            "2013-03-01 00:00:27 uid1 export abc",
            "2013-03-01 00:00:27 uid1 export -1.0",
            "2013-03-01 00:00:27 uid1 export NaN",
        ] {
            assert!(matches!(
                JobRecord::parse(line),
                Err(TraceError::Length { .. })
            ));
        }
    }

    #[test]
    fn rejects_bad_timestamp() {
        assert!(matches!(
            JobRecord::parse("2013-13-01 00:00:27 uid1 export 1.0"),
            Err(TraceError::Timestamp { .. })
        ));
    }
}
