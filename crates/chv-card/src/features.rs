//! Reader feature discovery (GET_FEATURE_REQUEST)
//!
//! A reader answers the feature request with a flat list of 6 byte records:
//!
//! ```text
//! tag (1) | length = 4 (1) | control code (4, big-endian)
//! ```

use std::collections::BTreeMap;

use chv_common::{ControlCode, FeatureId, HostPlatform};
use tracing::{debug, trace, warn};

use crate::error::{ChvError, Result};
use crate::quirks::ReaderProfile;
use crate::structure::PinOperation;
use crate::transport::Transport;

/// Size of one feature record
pub const FEATURE_RECORD_LEN: usize = 6;

/// Features a reader supports and the control codes that address them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityCatalog {
    features: BTreeMap<FeatureId, ControlCode>,
}

impl CapabilityCatalog {
    /// Parse a GET_FEATURE_REQUEST response.
    ///
    /// A trailing partial record is ignored, unknown tags are skipped, and a
    /// tag that appears twice keeps its last control code.
    pub fn discover(raw: &[u8]) -> Self {
        let mut features = BTreeMap::new();

        for record in raw.chunks_exact(FEATURE_RECORD_LEN) {
            let code = ControlCode::from_be_bytes([record[2], record[3], record[4], record[5]]);
            match FeatureId::from_tag(record[0]) {
                Some(feature) => {
                    trace!(feature = %feature, code = %code, "Reader feature");
                    features.insert(feature, code);
                }
                None => trace!(tag = record[0], "Skipping unknown feature tag"),
            }
        }

        Self { features }
    }

    /// Ask the reader for its features.
    ///
    /// Readers without SPE support commonly fail this request, so a failed
    /// transmission yields an empty catalog instead of an error.
    pub fn query<T: Transport + ?Sized>(transport: &mut T, platform: HostPlatform) -> Self {
        match transport.transmit_control(platform.feature_request_code(), &[]) {
            Ok(raw) => {
                let catalog = Self::discover(&raw);
                debug!(count = catalog.len(), "Reader features discovered");
                catalog
            }
            Err(err) => {
                warn!(error = %err, "Feature request failed, assuming no SPE support");
                Self::default()
            }
        }
    }

    pub fn get(&self, feature: FeatureId) -> Option<ControlCode> {
        self.features.get(&feature).copied()
    }

    /// Control code for `feature`, or an error if the reader lacks it
    pub fn require(&self, feature: FeatureId) -> Result<ControlCode> {
        self.get(feature)
            .ok_or(ChvError::FeatureUnavailable(feature))
    }

    pub fn contains(&self, feature: FeatureId) -> bool {
        self.features.contains_key(&feature)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, ControlCode)> + '_ {
        self.features.iter().map(|(feature, code)| (*feature, *code))
    }

    pub fn flags(&self) -> CapabilityFlags {
        let polling = |start, finish| {
            self.contains(start) && self.contains(FeatureId::GetKeyPressed) && self.contains(finish)
        };
        CapabilityFlags {
            verify_polling: polling(FeatureId::VerifyPinStart, FeatureId::VerifyPinFinish),
            verify_direct: self.contains(FeatureId::VerifyPinDirect),
            modify_polling: polling(FeatureId::ModifyPinStart, FeatureId::ModifyPinFinish),
            modify_direct: self.contains(FeatureId::ModifyPinDirect),
        }
    }
}

/// PIN entry capabilities derived from a catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityFlags {
    /// start, get-key-pressed and finish are all present
    pub verify_polling: bool,
    pub verify_direct: bool,
    pub modify_polling: bool,
    pub modify_direct: bool,
}

impl CapabilityFlags {
    pub fn any(&self) -> bool {
        self.verify_polling || self.verify_direct || self.modify_polling || self.modify_direct
    }
}

/// How a PIN gets collected for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPath {
    /// PIN typed on the host and sent in a plain command
    HostDialog,
    PollingVerify,
    DirectVerify,
    PollingModify,
    DirectModify,
}

impl EntryPath {
    pub fn uses_pinpad(self) -> bool {
        self != EntryPath::HostDialog
    }

    pub fn description(self) -> &'static str {
        match self {
            EntryPath::HostDialog => "host dialog",
            EntryPath::PollingVerify => "pinpad (VERIFY_PIN_START/FINISH)",
            EntryPath::DirectVerify => "pinpad (VERIFY_PIN_DIRECT)",
            EntryPath::PollingModify => "pinpad (MODIFY_PIN_START/FINISH)",
            EntryPath::DirectModify => "pinpad (MODIFY_PIN_DIRECT)",
        }
    }
}

/// Entry paths selected once per reader session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPaths {
    pub verify: EntryPath,
    pub modify: EntryPath,
}

impl EntryPaths {
    /// Direct entry wins over polling, polling over the host dialog
    pub fn select(flags: CapabilityFlags, profile: &ReaderProfile) -> Self {
        let direct = profile.direct_entry;

        let verify = if flags.verify_direct && direct {
            EntryPath::DirectVerify
        } else if flags.verify_polling {
            EntryPath::PollingVerify
        } else {
            EntryPath::HostDialog
        };

        let modify = if flags.modify_direct && direct {
            EntryPath::DirectModify
        } else if flags.modify_polling {
            EntryPath::PollingModify
        } else {
            EntryPath::HostDialog
        };

        Self { verify, modify }
    }

    pub fn for_operation(&self, operation: PinOperation) -> EntryPath {
        match operation {
            PinOperation::Verify => self.verify,
            PinOperation::Modify => self.modify,
        }
    }
}
