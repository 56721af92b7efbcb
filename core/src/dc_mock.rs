//! Test doubles for the engine boundary and the transport capability.
//!
//! Shipped as a regular module (like the storage and BLE seams) so
//! platform shells and integration tests can exercise the bridge without
//! a real dive computer or a linked decode engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::engine::{BridgeToken, ContextToken, CustomCallbacks, Engine, StreamToken};
use crate::error::DcError;
use crate::transport::IoTransport;

#[derive(Default)]
struct MockTransportState {
    buffered: Vec<u8>,
    written: Vec<Vec<u8>>,
    arrival_delay: Option<Duration>,
    read_error: Option<DcError>,
    write_error: Option<DcError>,
    close_error: Option<DcError>,
    purge_calls: usize,
    close_calls: usize,
    disconnected: bool,
}

/// Scripted transport double.
///
/// Clones share state, so a test can hand one clone to the bridge and
/// keep another as a probe — including for out-of-band [`disconnect`]
/// from a different thread, the way cancellation works in production.
///
/// [`disconnect`]: MockTransport::disconnect
#[derive(Clone, Default)]
pub struct MockTransport {
    name: Option<String>,
    state: Arc<Mutex<MockTransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Bytes the device will yield to subsequent reads, in order.
    pub fn with_buffered(self, data: Vec<u8>) -> Self {
        self.state.lock().unwrap().buffered = data;
        self
    }

    /// Buffered bytes only become readable after this delay, on every
    /// read. A finite timeout shorter than the delay fails with
    /// [`DcError::Timeout`]; an indefinite timeout waits it out.
    pub fn with_arrival_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().arrival_delay = Some(delay);
        self
    }

    pub fn with_read_error(self, err: DcError) -> Self {
        self.state.lock().unwrap().read_error = Some(err);
        self
    }

    pub fn with_write_error(self, err: DcError) -> Self {
        self.state.lock().unwrap().write_error = Some(err);
        self
    }

    pub fn with_close_error(self, err: DcError) -> Self {
        self.state.lock().unwrap().close_error = Some(err);
        self
    }

    /// Simulate the link dropping out-of-band: every pending and future
    /// operation fails with [`DcError::Disconnected`].
    pub fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().written.clone()
    }

    pub fn purge_calls(&self) -> usize {
        self.state.lock().unwrap().purge_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().unwrap().close_calls
    }
}

impl IoTransport for MockTransport {
    fn device_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn read(&mut self, count: usize, timeout: Option<Duration>) -> Result<Vec<u8>, DcError> {
        let delay = {
            let state = self.state.lock().unwrap();
            if state.disconnected {
                return Err(DcError::Disconnected);
            }
            if let Some(err) = &state.read_error {
                return Err(err.clone());
            }
            state.arrival_delay
        };

        if let Some(delay) = delay {
            match timeout {
                Some(t) if t < delay => return Err(DcError::Timeout),
                _ => thread::sleep(delay),
            }
        }

        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(DcError::Disconnected);
        }
        if state.buffered.len() < count {
            // Never a short read; insufficient data within the timeout is
            // a timeout.
            return Err(DcError::Timeout);
        }
        Ok(state.buffered.drain(..count).collect())
    }

    fn write(&mut self, data: &[u8], _timeout: Option<Duration>) -> Result<(), DcError> {
        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(DcError::Disconnected);
        }
        if let Some(err) = &state.write_error {
            return Err(err.clone());
        }
        state.written.push(data.to_vec());
        Ok(())
    }

    fn purge(&mut self) -> Result<(), DcError> {
        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(DcError::Disconnected);
        }
        state.purge_calls += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DcError> {
        let mut state = self.state.lock().unwrap();
        state.close_calls += 1;
        match &state.close_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// One recorded `custom_open` registration.
#[derive(Clone, Copy)]
pub struct OpenRecord {
    pub context: ContextToken,
    pub callbacks: CustomCallbacks,
    pub userdata: BridgeToken,
    /// Stream token the engine issued, `None` if the open was scripted to
    /// fail.
    pub issued: Option<StreamToken>,
}

/// Scripted engine double.
///
/// Records every registration so tests can drive the six callbacks the
/// way the engine's worker thread would, and counts context allocation
/// and release for lifetime assertions.
pub struct MockEngine {
    fail_context: Option<i32>,
    fail_open: Option<i32>,
    next: AtomicU64,
    opened: Mutex<Vec<OpenRecord>>,
    freed: Mutex<Vec<ContextToken>>,
}

impl MockEngine {
    pub fn new() -> Self {
        MockEngine {
            fail_context: None,
            fail_open: None,
            next: AtomicU64::new(1),
            opened: Mutex::new(Vec::new()),
            freed: Mutex::new(Vec::new()),
        }
    }

    /// Engine whose context allocation fails with `status`.
    pub fn failing_context(status: i32) -> Self {
        MockEngine {
            fail_context: Some(status),
            ..Self::new()
        }
    }

    /// Engine whose stream registration fails with `status`.
    pub fn failing_open(status: i32) -> Self {
        MockEngine {
            fail_open: Some(status),
            ..Self::new()
        }
    }

    pub fn last_open(&self) -> Option<OpenRecord> {
        self.opened.lock().unwrap().last().copied()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn freed(&self) -> Vec<ContextToken> {
        self.freed.lock().unwrap().clone()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MockEngine {
    fn context_new(&self) -> Result<ContextToken, i32> {
        if let Some(status) = self.fail_context {
            return Err(status);
        }
        Ok(ContextToken(self.next.fetch_add(1, Ordering::Relaxed)))
    }

    fn context_free(&self, context: ContextToken) {
        self.freed.lock().unwrap().push(context);
    }

    fn custom_open(
        &self,
        context: ContextToken,
        callbacks: CustomCallbacks,
        userdata: BridgeToken,
    ) -> Result<StreamToken, i32> {
        let issued = match self.fail_open {
            Some(_) => None,
            None => Some(StreamToken(self.next.fetch_add(1, Ordering::Relaxed))),
        };
        self.opened.lock().unwrap().push(OpenRecord {
            context,
            callbacks,
            userdata,
            issued,
        });
        match (self.fail_open, issued) {
            (Some(status), _) => Err(status),
            (None, Some(token)) => Ok(token),
            (None, None) => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_read_is_timeout() {
        let mut mock = MockTransport::new().with_buffered(vec![1, 2]);
        let err = mock.read(4, Some(Duration::from_millis(10))).unwrap_err();
        assert_eq!(err, DcError::Timeout);
        // The buffered bytes are still there for a later, smaller read.
        assert_eq!(mock.read(2, None).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_reads_drain_in_order() {
        let mut mock = MockTransport::new().with_buffered(vec![1, 2, 3, 4, 5]);
        assert_eq!(mock.read(2, None).unwrap(), vec![1, 2]);
        assert_eq!(mock.read(3, None).unwrap(), vec![3, 4, 5]);
    }

    #[test]
    fn test_disconnect_fails_promptly_from_another_thread() {
        let mock = MockTransport::new()
            .with_buffered(vec![0; 8])
            .with_arrival_delay(Duration::from_millis(100));
        let probe = mock.clone();

        let handle = thread::spawn(move || {
            let mut mock = mock;
            mock.read(8, None)
        });
        thread::sleep(Duration::from_millis(20));
        probe.disconnect();

        assert_eq!(handle.join().unwrap(), Err(DcError::Disconnected));
        assert_eq!(probe.clone().write(&[1], None), Err(DcError::Disconnected));
    }

    #[test]
    fn test_mock_engine_records_registrations() {
        let engine = MockEngine::new();
        let context = engine.context_new().unwrap();
        let callbacks = CustomCallbacks {
            set_timeout: |_, _| crate::engine::Status::Success,
            read: |_, _| (crate::engine::Status::Success, 0),
            write: |_, _| (crate::engine::Status::Success, 0),
            purge: |_| crate::engine::Status::Success,
            sleep: |_, _| crate::engine::Status::Success,
            close: |_| crate::engine::Status::Success,
        };
        let issued = engine.custom_open(context, callbacks, 42).unwrap();

        let record = engine.last_open().unwrap();
        assert_eq!(record.context, context);
        assert_eq!(record.userdata, 42);
        assert_eq!(record.issued, Some(issued));
        assert_eq!(engine.open_count(), 1);
    }
}
