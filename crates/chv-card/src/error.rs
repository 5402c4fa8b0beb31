//! Error types for card holder verification
//!
//! Transport and protocol errors are fatal for the current call. Hardware
//! reported PIN entry outcomes arrive as `PinEntryFailed`, carrying the raw
//! status word. Only the remaining-tries pattern is retried, and that happens
//! inside the service before an error is ever produced.

use chv_common::{FeatureId, PinFailure, StatusWord};
use thiserror::Error;

use crate::structure::PinOperation;

/// Result type alias for card holder verification operations
pub type Result<T> = std::result::Result<T, ChvError>;

#[derive(Error, Debug)]
pub enum ChvError {
    /// Underlying PC/SC failure
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    #[error("Card service is not open")]
    NotOpen,

    /// Transport failure not originating from PC/SC
    #[error("Transport error: {0}")]
    Transport(String),

    /// Command data does not fit a short APDU (at most 255 bytes)
    #[error("Command data too long: {0} bytes, at most 255 fit in one APDU")]
    CommandDataTooLong(usize),

    /// Card response shorter than a status word
    #[error("Malformed response APDU: {}", hex::encode_upper(.0))]
    MalformedResponse(Vec<u8>),

    /// A control command answered with bytes the protocol does not allow
    #[error("Unexpected response to {command}: {}", hex::encode_upper(.response))]
    UnexpectedResponse {
        command: FeatureId,
        response: Vec<u8>,
    },

    /// The reader rejected the PIN structure passed to a start command (0x57)
    #[error("Invalid parameter in PIN_{operation} structure")]
    InvalidStructureParameter { operation: PinOperation },

    #[error("Unexpected response to GET_KEY_PRESSED: {0:02x}")]
    UnexpectedKeyCode(u8),

    #[error("PIN_Operation_Aborted (0x40)")]
    OperationAborted,

    /// Terminal PIN entry outcome reported by the card or reader
    #[error("PIN {} failed: {status} ({failure})", .operation.description())]
    PinEntryFailed {
        operation: PinOperation,
        status: StatusWord,
        failure: PinFailure,
    },

    /// Host dialog path was taken but no listener supplied a PIN
    #[error("No PIN was entered")]
    NoPinEntered,

    #[error("Reader does not support {0}")]
    FeatureUnavailable(FeatureId),
}

impl ChvError {
    /// Status word of a hardware reported failure
    pub fn status(&self) -> Option<StatusWord> {
        match self {
            ChvError::PinEntryFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}
