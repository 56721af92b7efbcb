//! Byte-level I/O tracing for dive-computer sessions.
//!
//! Every read, write, purge, and close against a traced transport is
//! recorded with the elapsed time since the session began, without
//! altering the data or control flow the inner transport sees. The trace
//! can be snapshotted from another thread (a diagnostics viewer) while an
//! import is running and rendered as a human-readable hex dump for bug
//! reports.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::DcError;
use crate::transport::IoTransport;

/// Payload of one trace entry.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceKind {
    /// Successful read: bytes requested and the bytes returned.
    Read { requested: usize, data: Vec<u8> },
    /// Failed read: bytes requested and the rendered error.
    ReadError { requested: usize, message: String },
    /// Successful write of the given bytes.
    Write { data: Vec<u8> },
    /// Failed write: bytes attempted and the rendered error.
    WriteError { attempted: usize, message: String },
    /// Timeout change requested by the engine, in milliseconds
    /// (negative = wait indefinitely).
    Timeout { ms: i32 },
    Purge,
    Close,
}

/// One recorded operation, timestamped relative to the session start.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceEntry {
    /// Seconds since the trace session began. Monotonically increasing
    /// for entries appended by the same thread.
    pub elapsed_sec: f64,
    pub kind: TraceKind,
}

struct TraceShared {
    start: Instant,
    entries: Mutex<Vec<TraceEntry>>,
}

/// Shared handle to one trace session.
///
/// Cloning the handle shares the underlying session; the bridge holds a
/// clone so timeout changes land in the same trace as the I/O they affect.
/// Appends and snapshots are serialized through a single lock with one
/// push or one copy per critical section.
#[derive(Clone)]
pub struct TraceLog {
    shared: Arc<TraceShared>,
}

impl TraceLog {
    pub fn new() -> Self {
        TraceLog {
            shared: Arc::new(TraceShared {
                start: Instant::now(),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    fn record(&self, kind: TraceKind) {
        let elapsed_sec = self.shared.start.elapsed().as_secs_f64();
        let mut entries = self.shared.entries.lock().unwrap();
        entries.push(TraceEntry { elapsed_sec, kind });
    }

    /// Record a timeout change coming from the bridge layer. Timeout
    /// changes are not transport operations but are diagnostically
    /// significant, so they get their own recording path.
    pub fn record_timeout_change(&self, ms: i32) {
        self.record(TraceKind::Timeout { ms });
    }

    /// Copy of all entries recorded so far.
    pub fn snapshot(&self) -> Vec<TraceEntry> {
        self.shared.entries.lock().unwrap().clone()
    }

    /// Render the trace, one line per entry: signed relative timestamp,
    /// operation tag, byte counts, and an uppercase hex dump of any
    /// payload.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for entry in self.snapshot() {
            out.push_str(&format_entry(&entry));
            out.push('\n');
        }
        out
    }
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_entry(entry: &TraceEntry) -> String {
    let t = entry.elapsed_sec;
    match &entry.kind {
        TraceKind::Read { requested, data } => {
            if data.is_empty() {
                format!("{:+.3} read {}/{}", t, requested, data.len())
            } else {
                format!("{:+.3} read {}/{} {}", t, requested, data.len(), hex_dump(data))
            }
        }
        TraceKind::ReadError { requested, message } => {
            format!("{:+.3} read {}/0 ({})", t, requested, message)
        }
        TraceKind::Write { data } => {
            if data.is_empty() {
                format!("{:+.3} write {}", t, data.len())
            } else {
                format!("{:+.3} write {} {}", t, data.len(), hex_dump(data))
            }
        }
        TraceKind::WriteError { attempted, message } => {
            format!("{:+.3} write {} ({})", t, attempted, message)
        }
        TraceKind::Timeout { ms } => format!("{:+.3} timeout {}ms", t, ms),
        TraceKind::Purge => format!("{:+.3} purge", t),
        TraceKind::Close => format!("{:+.3} close", t),
    }
}

/// Transport decorator that records every operation into a [`TraceLog`].
///
/// Delegates to the inner transport first and appends exactly one entry
/// per operation reflecting its outcome; callers cannot tell a traced
/// transport from a plain one except through [`TracedTransport::log`].
/// Decorators compose: a traced transport can wrap another traced one.
pub struct TracedTransport<T> {
    inner: T,
    log: TraceLog,
}

impl<T: IoTransport> TracedTransport<T> {
    pub fn new(inner: T) -> Self {
        TracedTransport {
            inner,
            log: TraceLog::new(),
        }
    }

    /// Handle to this decorator's trace session.
    pub fn log(&self) -> TraceLog {
        self.log.clone()
    }
}

impl<T: IoTransport> IoTransport for TracedTransport<T> {
    fn device_name(&self) -> Option<String> {
        self.inner.device_name()
    }

    fn read(&mut self, count: usize, timeout: Option<Duration>) -> Result<Vec<u8>, DcError> {
        let result = self.inner.read(count, timeout);
        match &result {
            Ok(data) => self.log.record(TraceKind::Read {
                requested: count,
                data: data.clone(),
            }),
            Err(err) => self.log.record(TraceKind::ReadError {
                requested: count,
                message: err.to_string(),
            }),
        }
        result
    }

    fn write(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<(), DcError> {
        let result = self.inner.write(data, timeout);
        match &result {
            Ok(()) => self.log.record(TraceKind::Write {
                data: data.to_vec(),
            }),
            Err(err) => self.log.record(TraceKind::WriteError {
                attempted: data.len(),
                message: err.to_string(),
            }),
        }
        result
    }

    fn purge(&mut self) -> Result<(), DcError> {
        let result = self.inner.purge();
        self.log.record(TraceKind::Purge);
        result
    }

    fn close(&mut self) -> Result<(), DcError> {
        let result = self.inner.close();
        self.log.record(TraceKind::Close);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dc_mock::MockTransport;

    #[test]
    fn test_trace_records_reads_and_writes() {
        let mock = MockTransport::new().with_buffered(vec![0x4A, 0x00, 0xFF]);
        let mut traced = TracedTransport::new(mock);
        let log = traced.log();

        let data = traced.read(2, Some(Duration::from_secs(1))).unwrap();
        assert_eq!(data, vec![0x4A, 0x00]);
        traced.write(&[0x01, 0x02], None).unwrap();

        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].kind,
            TraceKind::Read {
                requested: 2,
                data: vec![0x4A, 0x00],
            }
        );
        assert_eq!(
            entries[1].kind,
            TraceKind::Write {
                data: vec![0x01, 0x02],
            }
        );
        assert!(entries[1].elapsed_sec >= entries[0].elapsed_sec);
    }

    #[test]
    fn test_trace_does_not_interfere() {
        // The inner transport must observe exactly the same operations
        // with and without the decorator.
        let mock = MockTransport::new().with_buffered(vec![1, 2, 3, 4]);
        let mut traced = TracedTransport::new(mock);

        assert_eq!(traced.read(3, None).unwrap(), vec![1, 2, 3]);
        traced.write(&[9], None).unwrap();
        traced.purge().unwrap();
        traced.close().unwrap();

        let inner = traced.inner;
        assert_eq!(inner.written(), vec![vec![9]]);
        assert_eq!(inner.purge_calls(), 1);
        assert_eq!(inner.close_calls(), 1);
    }

    #[test]
    fn test_trace_records_failures() {
        let mock = MockTransport::new().with_write_error(DcError::Timeout);
        let mut traced = TracedTransport::new(mock);
        let log = traced.log();

        assert_eq!(
            traced.write(&[1, 2, 3], Some(Duration::from_millis(10))),
            Err(DcError::Timeout)
        );
        let err = traced.read(8, Some(Duration::from_millis(10))).unwrap_err();
        assert_eq!(err, DcError::Timeout);

        let entries = log.snapshot();
        assert_eq!(
            entries[0].kind,
            TraceKind::WriteError {
                attempted: 3,
                message: "timed out waiting for the dive computer".to_string(),
            }
        );
        assert_eq!(
            entries[1].kind,
            TraceKind::ReadError {
                requested: 8,
                message: "timed out waiting for the dive computer".to_string(),
            }
        );
    }

    #[test]
    fn test_dump_format() {
        let log = TraceLog::new();
        log.record(TraceKind::Read {
            requested: 2,
            data: vec![0x4A, 0x00],
        });
        log.record(TraceKind::Write {
            data: vec![0xDE, 0xAD, 0xBE],
        });
        log.record_timeout_change(5000);
        log.record(TraceKind::Purge);
        log.record(TraceKind::Close);

        let dump = log.dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with('+'));
        assert!(lines[0].ends_with(" read 2/2 4A 00"));
        assert!(lines[1].ends_with(" write 3 DE AD BE"));
        assert!(lines[2].ends_with(" timeout 5000ms"));
        assert!(lines[3].ends_with(" purge"));
        assert!(lines[4].ends_with(" close"));

        // Timestamp is signed with exactly three decimals.
        let stamp = lines[0].split_whitespace().next().unwrap();
        let (_, frac) = stamp.split_once('.').unwrap();
        assert_eq!(frac.len(), 3);
    }

    #[test]
    fn test_snapshot_from_another_thread() {
        let mock = MockTransport::new().with_buffered(vec![0; 64]);
        let mut traced = TracedTransport::new(mock);
        let log = traced.log();

        let reader = std::thread::spawn(move || {
            // A concurrent dump must never observe a torn entry; it sees
            // some prefix of the appended sequence.
            for _ in 0..50 {
                let entries = log.snapshot();
                for pair in entries.windows(2) {
                    assert!(pair[0].elapsed_sec <= pair[1].elapsed_sec);
                }
            }
        });

        for _ in 0..16 {
            traced.read(4, None).unwrap();
        }
        reader.join().unwrap();

        assert_eq!(traced.log().snapshot().len(), 16);
    }
}
