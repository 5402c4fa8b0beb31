//! Per-model reader quirks
//!
//! Pinpad readers disagree on timeouts and PIN length bounds, and a few
//! driver/OS combinations fail direct PIN entry outright. The table below
//! records the deviations observed on real hardware; anything it does not
//! match runs with the defaults.

use chv_common::HostPlatform;
use tracing::debug;

/// Protocol parameters used to build PIN structures for one reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderProfile {
    /// bTimeOut, seconds
    pub timeout1: u8,
    /// bTimeOut2, seconds
    pub timeout2: u8,
    pub min_extra_pin_digits: u8,
    pub max_extra_pin_digits: u8,
    /// bInsertionOffsetOld
    pub old_pin_insert_offset: u8,
    /// bInsertionOffsetNew
    pub new_pin_insert_offset: u8,
    pub number_of_messages: u8,
    /// bConfirmPIN: bit 0 confirm new PIN, bit 1 enter current PIN
    pub confirm_pin_mask: u8,
    /// bEntryValidationCondition
    pub validation_condition: u8,
    /// Whether the *_PIN_DIRECT features may be used at all
    pub direct_entry: bool,
}

impl Default for ReaderProfile {
    fn default() -> Self {
        Self {
            // 60s, the maximum ReinerSCT readers accept
            timeout1: 0x3C,
            // reader default; SCM readers need an explicit value
            timeout2: 0x00,
            min_extra_pin_digits: 0x00,
            max_extra_pin_digits: 0x04,
            old_pin_insert_offset: 0x00,
            // right after the longest current PIN
            new_pin_insert_offset: 0x04,
            number_of_messages: 0x01,
            confirm_pin_mask: 0x03,
            // validation key pressed
            validation_condition: 0x02,
            direct_entry: true,
        }
    }
}

/// One known reader model and the profile fields it overrides
pub struct ReaderQuirk {
    pub model: &'static str,
    /// Lower-case display name prefixes that identify the model
    pub prefixes: &'static [&'static str],
    apply: fn(&mut ReaderProfile, HostPlatform),
}

impl ReaderQuirk {
    pub fn matches(&self, lowercase_name: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| lowercase_name.starts_with(prefix))
    }
}

/// Known readers, first match wins
pub static READER_QUIRKS: &[ReaderQuirk] = &[
    ReaderQuirk {
        model: "Gemalto GemPC Pinpad",
        prefixes: &["gemplus gempc pinpad", "gemalto gempc pinpad"],
        apply: gempc_pinpad,
    },
    ReaderQuirk {
        model: "Omnikey CardMan 3621",
        prefixes: &["omnikey cardman 3621"],
        apply: omnikey_3621,
    },
    ReaderQuirk {
        model: "SCM SPR 532",
        prefixes: &[
            "scm spr 532",
            "scm microsystems inc. sprx32 usb smart card reader",
        ],
        apply: scm_spr532,
    },
    ReaderQuirk {
        model: "Cherry SmartBoard xx44",
        prefixes: &["cherry smartboard xx44"],
        apply: cherry_smartboard,
    },
    ReaderQuirk {
        model: "Cherry SmartTerminal ST-2xxx",
        prefixes: &["cherry gmbh smartterminal st-2xxx"],
        apply: cherry_st2xxx,
    },
];

fn gempc_pinpad(profile: &mut ReaderProfile, platform: HostPlatform) {
    // The Gemalto Windows driver fails the control transmission for direct entry
    if platform.is_windows() {
        profile.direct_entry = false;
    }
    profile.min_extra_pin_digits = 0x04;
    profile.max_extra_pin_digits = 0x08;
}

fn omnikey_3621(profile: &mut ReaderProfile, _platform: HostPlatform) {
    profile.min_extra_pin_digits = 0x01;
}

fn scm_spr532(profile: &mut ReaderProfile, platform: HostPlatform) {
    profile.timeout1 = 0x3C;
    profile.timeout2 = 0x0F;
    if !platform.is_windows() {
        profile.min_extra_pin_digits = 0x01;
    }
}

fn cherry_smartboard(profile: &mut ReaderProfile, _platform: HostPlatform) {
    profile.min_extra_pin_digits = 0x01;
}

fn cherry_st2xxx(profile: &mut ReaderProfile, platform: HostPlatform) {
    profile.timeout1 = 0x3C;
    profile.timeout2 = 0x0F;
    if !platform.is_windows() {
        profile.min_extra_pin_digits = 0x01;
    }
}

/// Quirk entry for a reader display name, if any
pub fn find_quirk(reader_name: &str) -> Option<&'static ReaderQuirk> {
    let name = reader_name.to_lowercase();
    READER_QUIRKS.iter().find(|quirk| quirk.matches(&name))
}

/// Profile for `reader_name`: `defaults` with the matching model's overrides
pub fn apply_quirks(
    defaults: &ReaderProfile,
    reader_name: &str,
    platform: HostPlatform,
) -> ReaderProfile {
    let mut profile = defaults.clone();
    match find_quirk(reader_name) {
        Some(quirk) => {
            debug!(reader = %reader_name, model = quirk.model, "Applying reader quirks");
            (quirk.apply)(&mut profile, platform);
        }
        None => debug!(reader = %reader_name, "No reader quirks, using defaults"),
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn profile_for(name: &str, platform: HostPlatform) -> ReaderProfile {
        apply_quirks(&ReaderProfile::default(), name, platform)
    }

    #[test]
    fn test_unknown_reader_keeps_defaults() {
        let profile = profile_for("REINER SCT cyberJack pinpad(a) 00 00", HostPlatform::Unix);
        assert_eq!(profile, ReaderProfile::default());
    }

    #[test]
    fn test_scm_spr532_unix() {
        let profile = profile_for("SCM SPR 532 (60200DC5) 00 00", HostPlatform::Unix);
        assert_eq!(profile.timeout1, 0x3C);
        assert_eq!(profile.timeout2, 0x0F);
        assert_eq!(profile.min_extra_pin_digits, 0x01);
        assert_eq!(profile.max_extra_pin_digits, 0x04);
        assert!(profile.direct_entry);
    }

    #[test]
    fn test_scm_spr532_windows_keeps_min() {
        let profile = profile_for(
            "SCM Microsystems Inc. SPRx32 USB Smart Card Reader 0",
            HostPlatform::Windows,
        );
        assert_eq!(profile.timeout2, 0x0F);
        assert_eq!(profile.min_extra_pin_digits, 0x00);
    }

    #[test]
    fn test_gempc_pinpad_lengths() {
        for name in ["Gemplus GemPC Pinpad 00 00", "Gemalto GemPC Pinpad USB Smart Card Read 0"] {
            let profile = profile_for(name, HostPlatform::Unix);
            assert_eq!(profile.min_extra_pin_digits, 0x04);
            assert_eq!(profile.max_extra_pin_digits, 0x08);
            assert!(profile.direct_entry);
            // insertion offset is not derived from the adjusted maximum
            assert_eq!(profile.new_pin_insert_offset, 0x04);
        }
    }

    #[test]
    fn test_gempc_pinpad_windows_disables_direct_entry() {
        let profile = profile_for("Gemalto GemPC Pinpad USB Smart Card Read 0", HostPlatform::Windows);
        assert!(!profile.direct_entry);
        assert_eq!(profile.min_extra_pin_digits, 0x04);
    }

    #[test]
    fn test_omnikey_and_cherry_smartboard() {
        for name in ["OMNIKEY CardMan 3621 00 00", "Cherry SmartBoard XX44 (00000001) 00 00"] {
            for platform in [HostPlatform::Unix, HostPlatform::Windows] {
                let profile = profile_for(name, platform);
                assert_eq!(profile.min_extra_pin_digits, 0x01);
                assert_eq!(profile.timeout2, 0x00);
            }
        }
    }

    #[test]
    fn test_cherry_st2xxx() {
        let profile = profile_for("Cherry GmbH SmartTerminal ST-2xxx 0", HostPlatform::Windows);
        assert_eq!((profile.timeout1, profile.timeout2), (0x3C, 0x0F));
        assert_eq!(profile.min_extra_pin_digits, 0x00);

        let profile = profile_for("Cherry GmbH SmartTerminal ST-2XXX 00 00", HostPlatform::Unix);
        assert_eq!(profile.min_extra_pin_digits, 0x01);

        // the pcsc-lite name lacks the vendor suffix and is not matched
        let profile = profile_for("Cherry SmartTerminal ST-2XXX (21121010102014) 00 00", HostPlatform::Unix);
        assert_eq!(profile, ReaderProfile::default());
    }

    #[test]
    fn test_custom_defaults_are_seed() {
        let defaults = ReaderProfile {
            timeout1: 0x1E,
            ..ReaderProfile::default()
        };
        let profile = apply_quirks(&defaults, "OMNIKEY CardMan 3621", HostPlatform::Unix);
        assert_eq!(profile.timeout1, 0x1E);
        assert_eq!(profile.min_extra_pin_digits, 0x01);
    }

    #[test]
    fn test_find_quirk_model() {
        assert_eq!(find_quirk("SCM SPR 532 (60200DC5) 00 00").map(|q| q.model), Some("SCM SPR 532"));
        assert!(find_quirk("Yubico YubiKey OTP+FIDO+CCID 00 00").is_none());
    }

    proptest! {
        #[test]
        fn prop_lookup_ignores_case(
            index in 0..READER_QUIRKS.len(),
            suffix in "[ a-zA-Z0-9()]{0,16}",
            mask in any::<u64>(),
            windows in any::<bool>(),
        ) {
            let platform = if windows { HostPlatform::Windows } else { HostPlatform::Unix };
            let name = format!("{}{}", READER_QUIRKS[index].prefixes[0], suffix);
            let mixed: String = name
                .chars()
                .enumerate()
                .map(|(i, c)| if mask >> (i % 64) & 1 == 1 { c.to_ascii_uppercase() } else { c })
                .collect();
            prop_assert_eq!(profile_for(&name, platform), profile_for(&mixed, platform));
            prop_assert_eq!(
                profile_for(&name.to_uppercase(), platform),
                profile_for(&name, platform)
            );
        }
    }
}
