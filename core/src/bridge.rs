//! Stream bridge between a blocking transport and the decode engine.
//!
//! The engine drives all stream I/O through a six-callback table that
//! carries only a raw correlation token. Instead of round-tripping typed
//! ownership through an untyped pointer, bridges live in a process-wide
//! registry keyed by token: registration inserts the entry (the engine's
//! one logical ownership reference) and the close callback removes it
//! exactly once. Every other callback borrows the bridge by looking the
//! token up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::engine::{BridgeToken, CustomCallbacks, DcContext, Engine, Status, StreamToken};
use crate::error::DcError;
use crate::trace::TraceLog;
use crate::transport::IoTransport;

/// Timeout used for reads and writes before the engine's first
/// set-timeout callback.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

static REGISTRY: LazyLock<Mutex<HashMap<BridgeToken, Arc<StreamBridge>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn registry_insert(bridge: Arc<StreamBridge>) -> BridgeToken {
    let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    REGISTRY.lock().unwrap().insert(token, bridge);
    token
}

fn registry_get(token: BridgeToken) -> Option<Arc<StreamBridge>> {
    REGISTRY.lock().unwrap().get(&token).cloned()
}

fn registry_remove(token: BridgeToken) -> Option<Arc<StreamBridge>> {
    REGISTRY.lock().unwrap().remove(&token)
}

struct BridgeState {
    transport: Box<dyn IoTransport>,
    timeout: Option<Duration>,
}

/// Adapter presenting one transport to the engine as a native stream.
///
/// The engine invokes the callbacks one at a time from a single worker
/// thread per session, so the transport sits behind a plain mutex; the
/// lock also covers the current timeout, which the engine updates through
/// its set-timeout callback between I/O calls.
pub struct StreamBridge {
    state: Mutex<BridgeState>,
    trace: Option<TraceLog>,
}

/// Opaque stream handle returned by a successful [`StreamBridge::open`],
/// used for subsequent protocol operations against the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DcStream {
    handle: StreamToken,
    token: BridgeToken,
}

impl DcStream {
    /// The engine-issued stream token.
    pub fn handle(&self) -> StreamToken {
        self.handle
    }

    /// The correlation token this stream's bridge is registered under.
    pub fn bridge_token(&self) -> BridgeToken {
        self.token
    }
}

impl StreamBridge {
    /// Register `transport` with the engine and return the opaque stream
    /// handle.
    ///
    /// Pass the [`TraceLog`] of a tracing decorator as `trace` so timeout
    /// changes land in the same trace as the I/O they affect. If the
    /// engine rejects the registration it will never call back, so the
    /// registry entry is reclaimed before the error is returned.
    pub fn open(
        engine: &Arc<dyn Engine>,
        context: &DcContext,
        transport: Box<dyn IoTransport>,
        trace: Option<TraceLog>,
    ) -> Result<DcStream, DcError> {
        let device = transport.device_name();
        let bridge = Arc::new(StreamBridge {
            state: Mutex::new(BridgeState {
                transport,
                timeout: Some(DEFAULT_TIMEOUT),
            }),
            trace,
        });
        let token = registry_insert(bridge);
        match engine.custom_open(context.token(), CALLBACKS, token) {
            Ok(handle) => {
                debug!(token, stream = handle.0, device = device.as_deref(), "stream opened");
                Ok(DcStream { handle, token })
            }
            Err(status) => {
                registry_remove(token);
                warn!(token, status, "stream registration failed");
                Err(DcError::engine(status))
            }
        }
    }

    fn set_timeout(&self, ms: i32) -> Status {
        let timeout = if ms < 0 {
            None
        } else {
            Some(Duration::from_millis(ms as u64))
        };
        self.state.lock().unwrap().timeout = timeout;
        if let Some(log) = &self.trace {
            log.record_timeout_change(ms);
        }
        trace!(ms, "timeout changed");
        Status::Success
    }

    fn read(&self, buf: &mut [u8]) -> (Status, usize) {
        let mut state = self.state.lock().unwrap();
        let timeout = state.timeout;
        match state.transport.read(buf.len(), timeout) {
            Ok(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                (Status::Success, n)
            }
            Err(err) => (status_for(&err), 0),
        }
    }

    fn write(&self, data: &[u8]) -> (Status, usize) {
        let owned = data.to_vec();
        let mut state = self.state.lock().unwrap();
        let timeout = state.timeout;
        match state.transport.write(&owned, timeout) {
            Ok(()) => (Status::Success, owned.len()),
            Err(err) => (status_for(&err), 0),
        }
    }

    fn purge(&self) -> Status {
        match self.state.lock().unwrap().transport.purge() {
            Ok(()) => Status::Success,
            Err(_) => Status::Io,
        }
    }

    fn close(&self) -> Status {
        match self.state.lock().unwrap().transport.close() {
            Ok(()) => Status::Success,
            Err(_) => Status::Io,
        }
    }
}

/// Engine status for a transport failure reaching the callback layer.
fn status_for(err: &DcError) -> Status {
    match err {
        DcError::Timeout => Status::Timeout,
        _ => Status::Io,
    }
}

const CALLBACKS: CustomCallbacks = CustomCallbacks {
    set_timeout: cb_set_timeout,
    read: cb_read,
    write: cb_write,
    purge: cb_purge,
    sleep: cb_sleep,
    close: cb_close,
};

fn cb_set_timeout(token: BridgeToken, ms: i32) -> Status {
    match registry_get(token) {
        Some(bridge) => bridge.set_timeout(ms),
        None => {
            warn!(token, "set_timeout callback with unknown token");
            Status::InvalidArgs
        }
    }
}

fn cb_read(token: BridgeToken, buf: &mut [u8]) -> (Status, usize) {
    match registry_get(token) {
        Some(bridge) => bridge.read(buf),
        None => {
            warn!(token, "read callback with unknown token");
            (Status::InvalidArgs, 0)
        }
    }
}

fn cb_write(token: BridgeToken, data: &[u8]) -> (Status, usize) {
    match registry_get(token) {
        Some(bridge) => bridge.write(data),
        None => {
            warn!(token, "write callback with unknown token");
            (Status::InvalidArgs, 0)
        }
    }
}

fn cb_purge(token: BridgeToken) -> Status {
    match registry_get(token) {
        Some(bridge) => bridge.purge(),
        None => {
            warn!(token, "purge callback with unknown token");
            Status::InvalidArgs
        }
    }
}

// Protocol pacing only; no transport semantics, so no lookup.
fn cb_sleep(_token: BridgeToken, ms: u32) -> Status {
    thread::sleep(Duration::from_millis(u64::from(ms)));
    Status::Success
}

// The single designated release point for the registry entry. Removing
// the entry first guarantees the reference is reclaimed even when the
// transport's own close fails, and makes a repeated close from a confused
// engine teardown a no-op instead of a double release.
fn cb_close(token: BridgeToken) -> Status {
    match registry_remove(token) {
        Some(bridge) => {
            let status = bridge.close();
            debug!(token, status = status.code(), "stream closed");
            status
        }
        None => {
            warn!(token, "close callback for a stream that is already closed");
            Status::Success
        }
    }
}
