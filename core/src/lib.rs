pub mod bridge;
pub mod dc_mock;
pub mod device;
pub mod engine;
pub mod error;
pub mod trace;
pub mod transport;

pub use bridge::{DcStream, StreamBridge, DEFAULT_TIMEOUT};
pub use device::{identify, BleDeviceInfo, KnownDevice};
pub use engine::{
    describe, BridgeToken, ContextToken, CustomCallbacks, DcContext, Engine, Status, StreamToken,
};
pub use error::DcError;
pub use trace::{TraceEntry, TraceKind, TraceLog, TracedTransport};
pub use transport::IoTransport;
