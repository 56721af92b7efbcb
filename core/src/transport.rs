use std::time::Duration;

use crate::error::DcError;

/// The blocking byte-transport contract a dive-computer link must satisfy.
///
/// Implementations are provided by the platform link layer (a live BLE
/// GATT connection on device, a mock in tests) and consumed by the stream
/// bridge, which presents them to the decode engine. All operations block
/// the calling thread; there is no polling variant.
///
/// A `timeout` of `None` means wait indefinitely. Implementations that
/// detect a detached link must fail every pending and future operation
/// with [`DcError::Disconnected`] promptly rather than hang.
pub trait IoTransport: Send {
    /// Best-effort identifying string for the connected device.
    fn device_name(&self) -> Option<String>;

    /// Read exactly `count` bytes, blocking until they are available or
    /// `timeout` elapses.
    ///
    /// A successful return always holds exactly `count` bytes; short reads
    /// are not part of the contract and must surface as
    /// [`DcError::Timeout`] instead.
    fn read(&mut self, count: usize, timeout: Option<Duration>) -> Result<Vec<u8>, DcError>;

    /// Write all of `data`, blocking until the link has accepted it or
    /// `timeout` elapses.
    fn write(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<(), DcError>;

    /// Discard any buffered inbound and outbound data.
    ///
    /// Used by the engine's resynchronization logic; must be safe to call
    /// at any time, including immediately after construction.
    fn purge(&mut self) -> Result<(), DcError>;

    /// Release the link. The bridge guarantees it calls this at most once;
    /// after `close` returns no further operation is issued.
    fn close(&mut self) -> Result<(), DcError>;
}
