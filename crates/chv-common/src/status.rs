//! Status words returned by the card or by the reader's PIN entry subsystem

use std::fmt;

/// Two byte completion code (SW1 SW2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(pub u16);

impl StatusWord {
    pub const SUCCESS: StatusWord = StatusWord(0x9000);
    /// Reader: PIN entry timed out
    pub const SPE_TIMEOUT: StatusWord = StatusWord(0x6400);
    /// Reader: user pressed Cancel
    pub const SPE_CANCELLED: StatusWord = StatusWord(0x6401);
    /// Reader: PIN shorter or longer than the configured bounds
    pub const SPE_LENGTH_OUT_OF_RANGE: StatusWord = StatusWord(0x6403);
    /// Reader: aborted by the host
    pub const SPE_HOST_ABORTED: StatusWord = StatusWord(0x6480);
    /// Reader: invalid parameter in the PIN structure
    pub const SPE_INVALID_PARAMETER: StatusWord = StatusWord(0x6B80);
    /// Card: verification failed, no tries left
    pub const NO_TRIES_LEFT: StatusWord = StatusWord(0x63C0);

    pub fn new(sw1: u8, sw2: u8) -> Self {
        Self(((sw1 as u16) << 8) | (sw2 as u16))
    }

    pub fn sw1(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn sw2(self) -> u8 {
        self.0 as u8
    }

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Remaining verification attempts if this is a 63Cx word
    pub fn tries_remaining(self) -> Option<u8> {
        if self.0 & 0xFFF0 == 0x63C0 {
            Some((self.0 & 0x000F) as u8)
        } else {
            None
        }
    }

    pub fn classify(self) -> StatusOutcome {
        if self.is_success() {
            StatusOutcome::Success
        } else if let Some(tries) = self.tries_remaining() {
            StatusOutcome::TriesRemaining(tries)
        } else {
            StatusOutcome::Failed(PinFailure::from_status(self))
        }
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// What a status word means for a PIN operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Success,
    /// Wrong PIN; the card allows this many further attempts (possibly zero)
    TriesRemaining(u8),
    Failed(PinFailure),
}

/// Terminal reason a PIN operation did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinFailure {
    Timeout,
    Cancelled,
    LengthOutOfRange,
    HostAborted,
    InvalidParameter,
    NoTriesLeft,
    Unknown,
}

impl PinFailure {
    pub fn from_status(status: StatusWord) -> Self {
        match status {
            StatusWord::SPE_TIMEOUT => PinFailure::Timeout,
            StatusWord::SPE_CANCELLED => PinFailure::Cancelled,
            StatusWord::SPE_LENGTH_OUT_OF_RANGE => PinFailure::LengthOutOfRange,
            StatusWord::SPE_HOST_ABORTED => PinFailure::HostAborted,
            StatusWord::SPE_INVALID_PARAMETER => PinFailure::InvalidParameter,
            StatusWord::NO_TRIES_LEFT => PinFailure::NoTriesLeft,
            _ => PinFailure::Unknown,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            PinFailure::Timeout => "SPE operation timed out.",
            PinFailure::Cancelled => "SPE operation was cancelled by the 'Cancel' button.",
            PinFailure::LengthOutOfRange => {
                "User entered too short or too long PIN regarding MIN/MAX PIN length."
            }
            PinFailure::HostAborted => {
                "SPE operation was aborted by the 'Cancel' operation at the host system."
            }
            PinFailure::InvalidParameter => "Invalid parameter in passed structure.",
            PinFailure::NoTriesLeft => "No more tries left.",
            PinFailure::Unknown => "Unknown error.",
        }
    }
}

impl fmt::Display for PinFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Attempt counter state within one verify or modify call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryState {
    /// No wrong PIN has been entered yet
    #[default]
    NoPriorFailure,
    /// The last attempt failed and the card allows this many more
    TriesRemaining(u8),
}

impl RetryState {
    pub fn tries_remaining(self) -> Option<u8> {
        match self {
            RetryState::NoPriorFailure => None,
            RetryState::TriesRemaining(tries) => Some(tries),
        }
    }
}
