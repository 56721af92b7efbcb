use thiserror::Error;

/// Error type for dive-computer communication and import.
///
/// This is the complete failure vocabulary of the subsystem; no layer
/// introduces kinds outside this set. `Engine` is the only variant that
/// carries a raw numeric status, so bug reports can quote the engine's
/// own code alongside the rendered message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DcError {
    #[error("dive computer engine error {status}: {message}")]
    Engine { status: i32, message: String },

    #[error("timed out waiting for the dive computer")]
    Timeout,

    #[error("the dive computer disconnected")]
    Disconnected,

    #[error("this dive computer is not supported")]
    UnsupportedDevice,

    #[error("this dive has already been imported")]
    DuplicateDive,

    #[error("import was cancelled")]
    Cancelled,
}

impl DcError {
    /// Wrap a non-success engine status code, rendering its message from
    /// the fixed status table.
    pub fn engine(status: i32) -> Self {
        DcError::Engine {
            status,
            message: crate::engine::describe(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_error_display() {
        let err = DcError::Engine {
            status: -7,
            message: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "dive computer engine error -7: timeout");

        let err = DcError::Timeout;
        assert_eq!(err.to_string(), "timed out waiting for the dive computer");

        let err = DcError::Disconnected;
        assert_eq!(err.to_string(), "the dive computer disconnected");

        let err = DcError::DuplicateDive;
        assert_eq!(err.to_string(), "this dive has already been imported");
    }

    #[test]
    fn test_engine_constructor_uses_status_table() {
        let err = DcError::engine(-6);
        assert_eq!(
            err,
            DcError::Engine {
                status: -6,
                message: "input/output error".to_string(),
            }
        );
    }
}
