//! Output formatting for reader features and PIN structures

use chv_card::{CapabilityCatalog, PinOperation, ReaderProfile};
use clap::ValueEnum;

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatMode {
    /// Raw hex output
    Raw,
    /// Human-readable formatted output
    Human,
}

impl FormatMode {
    pub fn description(&self) -> &'static str {
        match self {
            FormatMode::Raw => "Raw",
            FormatMode::Human => "Human-Readable",
        }
    }
}

/// Field names and sizes of PIN_VERIFY; the command template takes the rest
const VERIFY_FIELDS: &[(&str, usize)] = &[
    ("bTimeOut", 1),
    ("bTimeOut2", 1),
    ("bmFormatString", 1),
    ("bmPINBlockString", 1),
    ("bmPINLengthFormat", 1),
    ("wPINMaxExtraDigit", 2),
    ("bEntryValidationCondition", 1),
    ("bNumberMessage", 1),
    ("wLangId", 2),
    ("bMsgIndex", 1),
    ("bTeoPrologue", 3),
    ("ulDataLength", 4),
];

const MODIFY_FIELDS: &[(&str, usize)] = &[
    ("bTimeOut", 1),
    ("bTimeOut2", 1),
    ("bmFormatString", 1),
    ("bmPINBlockString", 1),
    ("bmPINLengthFormat", 1),
    ("bInsertionOffsetOld", 1),
    ("bInsertionOffsetNew", 1),
    ("wPINMaxExtraDigit", 2),
    ("bConfirmPIN", 1),
    ("bEntryValidationCondition", 1),
    ("bNumberMessage", 1),
    ("wLangId", 2),
    ("bMsgIndex1", 1),
    ("bMsgIndex2", 1),
    ("bMsgIndex3", 1),
    ("bTeoPrologue", 3),
    ("ulDataLength", 4),
];

/// Split an encoded structure into named fields
pub fn structure_fields(operation: PinOperation, structure: &[u8]) -> Vec<(&'static str, &[u8])> {
    let layout = match operation {
        PinOperation::Verify => VERIFY_FIELDS,
        PinOperation::Modify => MODIFY_FIELDS,
    };

    let mut fields = Vec::with_capacity(layout.len() + 1);
    let mut rest = structure;
    for (name, size) in layout {
        if rest.len() < *size {
            break;
        }
        let (value, tail) = rest.split_at(*size);
        fields.push((*name, value));
        rest = tail;
    }
    if !rest.is_empty() {
        fields.push(("abData", rest));
    }
    fields
}

pub fn format_structure(operation: PinOperation, structure: &[u8], mode: FormatMode) -> String {
    if mode == FormatMode::Raw {
        return hex::encode_upper(structure);
    }

    let mut out = format!("PIN_{} ({} bytes)\n", operation, structure.len());
    for (name, value) in structure_fields(operation, structure) {
        out.push_str(&format!("  {:<26} {}\n", name, hex::encode_upper(value)));
    }
    out
}

pub fn format_catalog(catalog: &CapabilityCatalog, mode: FormatMode) -> String {
    let mut out = String::new();
    if catalog.is_empty() && mode == FormatMode::Human {
        out.push_str("  (no secure PIN entry features)\n");
    }
    for (feature, code) in catalog.iter() {
        match mode {
            FormatMode::Raw => out.push_str(&format!("{:02X} {}\n", feature.tag(), code)),
            FormatMode::Human => out.push_str(&format!(
                "  [{:02X}] {:<32} {}\n",
                feature.tag(),
                feature.name(),
                code
            )),
        }
    }
    out
}

pub fn format_profile(profile: &ReaderProfile) -> String {
    format!(
        "  timeouts: {:02X} {:02X}, PIN digits: {}..={}, insertion offsets: {:02X} {:02X}\n  \
         messages: {:02X}, confirm mask: {:02X}, validation: {:02X}, direct entry: {}\n",
        profile.timeout1,
        profile.timeout2,
        profile.min_extra_pin_digits,
        profile.max_extra_pin_digits,
        profile.old_pin_insert_offset,
        profile.new_pin_insert_offset,
        profile.number_of_messages,
        profile.confirm_pin_mask,
        profile.validation_condition,
        if profile.direct_entry { "allowed" } else { "disabled" },
    )
}
