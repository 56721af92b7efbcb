//! Boundary types for the external binary-protocol decode engine.
//!
//! The engine owns protocol framing and device-specific parsing; this
//! crate only feeds it bytes. Everything it is allowed to see from us is
//! defined here: the numeric status vocabulary, the six-callback
//! registration table, and the opaque session/stream tokens. The engine
//! itself sits behind the [`Engine`] trait so the bridge can be exercised
//! against a scripted double in tests.

use std::sync::Arc;

use tracing::debug;

use crate::error::DcError;

// ============================================================================
// Status codes
// ============================================================================

/// Status codes fixed by the decode engine. Every engine entry point and
/// every registered callback speaks in these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    Done = 1,
    Unsupported = -1,
    InvalidArgs = -2,
    NoMemory = -3,
    NoDevice = -4,
    NoAccess = -5,
    Io = -6,
    Timeout = -7,
    Protocol = -8,
    DataFormat = -9,
    Cancelled = -10,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Human-readable message for an engine status code.
///
/// Total over the closed code space, with an explicit fallback that keeps
/// the raw code visible instead of masking unrecognized values.
pub fn describe(status: i32) -> String {
    match status {
        0 => "success".to_string(),
        1 => "done".to_string(),
        -1 => "unsupported operation".to_string(),
        -2 => "invalid arguments".to_string(),
        -3 => "out of memory".to_string(),
        -4 => "no device found".to_string(),
        -5 => "access denied".to_string(),
        -6 => "input/output error".to_string(),
        -7 => "timeout".to_string(),
        -8 => "protocol error".to_string(),
        -9 => "data format error".to_string(),
        -10 => "cancelled".to_string(),
        other => format!("unknown error (code {})", other),
    }
}

// ============================================================================
// Tokens and the callback table
// ============================================================================

/// Raw correlation token passed with every registered callback.
///
/// The callback table is a foreign interface with no type system of its
/// own, so callbacks receive this token instead of a typed reference and
/// look the bridge up in its registry.
pub type BridgeToken = u64;

/// Opaque engine session token, held by [`DcContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextToken(pub u64);

/// Opaque engine stream token, issued on successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamToken(pub u64);

/// The fixed six-callback registration table the engine drives all stream
/// I/O through. `read` and `write` report the actual byte count alongside
/// the status; `read` must never fill past the supplied buffer.
#[derive(Clone, Copy)]
pub struct CustomCallbacks {
    pub set_timeout: fn(BridgeToken, i32) -> Status,
    pub read: fn(BridgeToken, &mut [u8]) -> (Status, usize),
    pub write: fn(BridgeToken, &[u8]) -> (Status, usize),
    pub purge: fn(BridgeToken) -> Status,
    pub sleep: fn(BridgeToken, u32) -> Status,
    pub close: fn(BridgeToken) -> Status,
}

// ============================================================================
// The engine itself
// ============================================================================

/// Entry points of the decode engine used by this subsystem.
///
/// `Err` values carry the engine's raw status code; callers wrap them with
/// [`DcError::engine`]. After a successful `custom_open` the engine may
/// invoke any registered callback from its worker thread until it fires
/// the close callback exactly once.
pub trait Engine: Send + Sync {
    fn context_new(&self) -> Result<ContextToken, i32>;

    fn context_free(&self, context: ContextToken);

    fn custom_open(
        &self,
        context: ContextToken,
        callbacks: CustomCallbacks,
        userdata: BridgeToken,
    ) -> Result<StreamToken, i32>;
}

/// Owned handle to one engine session.
///
/// Frees the underlying session exactly once, when dropped. The caller
/// must keep the context alive until every stream opened from it has been
/// closed by the engine.
pub struct DcContext {
    engine: Arc<dyn Engine>,
    token: ContextToken,
}

impl std::fmt::Debug for DcContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DcContext").field("token", &self.token).finish_non_exhaustive()
    }
}

impl DcContext {
    pub fn new(engine: Arc<dyn Engine>) -> Result<Self, DcError> {
        let token = engine.context_new().map_err(DcError::engine)?;
        debug!(context = token.0, "engine context allocated");
        Ok(DcContext { engine, token })
    }

    pub fn token(&self) -> ContextToken {
        self.token
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }
}

impl Drop for DcContext {
    fn drop(&mut self) {
        debug!(context = self.token.0, "engine context released");
        self.engine.context_free(self.token);
    }
}
