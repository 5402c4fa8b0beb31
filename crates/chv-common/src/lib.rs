//! CHV Common - Shared definitions for secure PIN entry (SPE) readers
//!
//! Feature identifiers and control codes from PC/SC part 10, reader and
//! card status words, and the host platform knobs that change how control
//! codes are addressed.

use std::fmt;

pub mod platform;
pub mod status;

pub use platform::HostPlatform;
pub use status::{PinFailure, RetryState, StatusOutcome, StatusWord};

/// Request id of GET_FEATURE_REQUEST, the "which features do you support" query
pub const FEATURE_REQUEST_CODE: u32 = 3400;

/// SPE capability advertised by a reader in its feature list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum FeatureId {
    VerifyPinStart = 0x01,
    VerifyPinFinish = 0x02,
    ModifyPinStart = 0x03,
    ModifyPinFinish = 0x04,
    GetKeyPressed = 0x05,
    VerifyPinDirect = 0x06,
    ModifyPinDirect = 0x07,
    MctReaderDirect = 0x08,
    MctUniversal = 0x09,
    IfdPinProperties = 0x0A,
    Abort = 0x0B,
    SetSpeMessage = 0x0C,
    VerifyPinDirectAppId = 0x0D,
    ModifyPinDirectAppId = 0x0E,
    WriteDisplay = 0x0F,
    GetKey = 0x10,
    IfdDisplayProperties = 0x11,
    GetTlvProperties = 0x12,
    CcidEscCommand = 0x13,
}

impl FeatureId {
    /// Every known feature, in tag order
    pub const ALL: [FeatureId; 19] = [
        FeatureId::VerifyPinStart,
        FeatureId::VerifyPinFinish,
        FeatureId::ModifyPinStart,
        FeatureId::ModifyPinFinish,
        FeatureId::GetKeyPressed,
        FeatureId::VerifyPinDirect,
        FeatureId::ModifyPinDirect,
        FeatureId::MctReaderDirect,
        FeatureId::MctUniversal,
        FeatureId::IfdPinProperties,
        FeatureId::Abort,
        FeatureId::SetSpeMessage,
        FeatureId::VerifyPinDirectAppId,
        FeatureId::ModifyPinDirectAppId,
        FeatureId::WriteDisplay,
        FeatureId::GetKey,
        FeatureId::IfdDisplayProperties,
        FeatureId::GetTlvProperties,
        FeatureId::CcidEscCommand,
    ];

    /// Look up a feature by its tag byte
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01..=0x13 => Some(Self::ALL[(tag - 1) as usize]),
            _ => None,
        }
    }

    /// Tag byte as it appears in the feature list
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// PC/SC part 10 name of the feature
    pub fn name(self) -> &'static str {
        match self {
            FeatureId::VerifyPinStart => "FEATURE_VERIFY_PIN_START",
            FeatureId::VerifyPinFinish => "FEATURE_VERIFY_PIN_FINISH",
            FeatureId::ModifyPinStart => "FEATURE_MODIFY_PIN_START",
            FeatureId::ModifyPinFinish => "FEATURE_MODIFY_PIN_FINISH",
            FeatureId::GetKeyPressed => "FEATURE_GET_KEY_PRESSED",
            FeatureId::VerifyPinDirect => "FEATURE_VERIFY_PIN_DIRECT",
            FeatureId::ModifyPinDirect => "FEATURE_MODIFY_PIN_DIRECT",
            FeatureId::MctReaderDirect => "FEATURE_MCT_READER_DIRECT",
            FeatureId::MctUniversal => "FEATURE_MCT_UNIVERSAL",
            FeatureId::IfdPinProperties => "FEATURE_IFD_PIN_PROPERTIES",
            FeatureId::Abort => "FEATURE_ABORT",
            FeatureId::SetSpeMessage => "FEATURE_SET_SPE_MESSAGE",
            FeatureId::VerifyPinDirectAppId => "FEATURE_VERIFY_PIN_DIRECT_APP_ID",
            FeatureId::ModifyPinDirectAppId => "FEATURE_MODIFY_PIN_DIRECT_APP_ID",
            FeatureId::WriteDisplay => "FEATURE_WRITE_DISPLAY",
            FeatureId::GetKey => "FEATURE_GET_KEY",
            FeatureId::IfdDisplayProperties => "FEATURE_IFD_DISPLAY_PROPERTIES",
            FeatureId::GetTlvProperties => "FEATURE_GET_TLV_PROPERTIES",
            FeatureId::CcidEscCommand => "FEATURE_CCID_ESC_COMMAND",
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Platform control-channel identifier (an SCardControl ioctl)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlCode(pub u32);

impl ControlCode {
    pub fn value(self) -> u32 {
        self.0
    }

    /// Decode a big-endian control code as carried in a feature list record
    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}
