//! Host platform differences that leak into the reader protocol

use crate::ControlCode;

/// Operating system family the PC/SC stack runs on.
///
/// Control code addressing differs between WinSCard and pcsc-lite, and a few
/// reader quirks only show up on one of them. Everything platform dependent
/// goes through this type so the protocol code can be tested for either host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostPlatform {
    Windows,
    /// pcsc-lite and the macOS PC/SC framework
    Unix,
}

impl HostPlatform {
    /// Platform this binary was compiled for
    pub fn detect() -> Self {
        if cfg!(windows) {
            HostPlatform::Windows
        } else {
            HostPlatform::Unix
        }
    }

    pub fn is_windows(self) -> bool {
        self == HostPlatform::Windows
    }

    /// SCARD_CTL_CODE for this platform
    pub fn control_code(self, code: u32) -> ControlCode {
        match self {
            HostPlatform::Windows => ControlCode((0x31 << 16) | (code << 2)),
            HostPlatform::Unix => ControlCode(0x4200_0000 + code),
        }
    }

    /// Control code of GET_FEATURE_REQUEST
    pub fn feature_request_code(self) -> ControlCode {
        self.control_code(crate::FEATURE_REQUEST_CODE)
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::detect()
    }
}
