//! PIN_VERIFY and PIN_MODIFY structures (PC/SC part 10, CCID)
//!
//! These are the parameter blocks handed to VERIFY_PIN_* and MODIFY_PIN_*
//! control commands. The reader collects the PIN on its own keypad, inserts
//! it into the embedded command template and sends the result to the card,
//! so the template never carries PIN digits.
//!
//! Layout of PIN_VERIFY (19 byte header + 9 byte command):
//!
//! ```text
//! bTimeOut bTimeOut2 bmFormatString bmPINBlockString bmPINLengthFormat
//! wPINMaxExtraDigit(max, min) bEntryValidationCondition bNumberMessage
//! wLangId(2) bMsgIndex bTeoPrologue(3) ulDataLength(4 LE) abData
//! ```
//!
//! PIN_MODIFY adds bInsertionOffsetOld/New after bmPINLengthFormat,
//! bConfirmPIN after wPINMaxExtraDigit and three message indices
//! (24 byte header + 13 byte command).

use std::fmt;

use crate::quirks::ReaderProfile;

/// System unit byte, PIN 1 byte into the block, left justified, BCD
pub const FORMAT_STRING: u8 = 0x82;
/// 4 bit length field, 7 byte PIN block
pub const PIN_BLOCK_STRING: u8 = 0x04;
pub const PIN_LENGTH_FORMAT: u8 = 0x00;
pub const LANGUAGE_ID: [u8; 2] = [0x04, 0x09];

/// VERIFY command the reader completes with the entered PIN
pub const VERIFY_PIN_TEMPLATE: [u8; 9] = [0x00, 0x20, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00];
/// CHANGE REFERENCE DATA command the reader completes with both PINs
pub const MODIFY_PIN_TEMPLATE: [u8; 13] = [
    0x00, 0x24, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

pub const VERIFY_STRUCTURE_LEN: usize = 19 + VERIFY_PIN_TEMPLATE.len();
pub const MODIFY_STRUCTURE_LEN: usize = 24 + MODIFY_PIN_TEMPLATE.len();

/// Offset of bConfirmPIN in PIN_MODIFY
pub const MODIFY_CONFIRM_PIN_OFFSET: usize = 9;

const MODIFY_NUMBER_MESSAGE: u8 = 0x03;
const VERIFY_MSG_INDEX: u8 = 0x01;
const MODIFY_MSG_INDICES: [u8; 3] = [0x00, 0x01, 0x02];
const TEO_PROLOGUE: [u8; 3] = [0x00, 0x00, 0x00];

/// The two PIN operations a reader can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinOperation {
    Verify,
    Modify,
}

impl PinOperation {
    pub fn description(self) -> &'static str {
        match self {
            PinOperation::Verify => "verification",
            PinOperation::Modify => "modification",
        }
    }
}

impl fmt::Display for PinOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinOperation::Verify => f.write_str("VERIFY"),
            PinOperation::Modify => f.write_str("MODIFY"),
        }
    }
}

/// Encode the structure for `operation`
pub fn encode(profile: &ReaderProfile, operation: PinOperation) -> Vec<u8> {
    match operation {
        PinOperation::Verify => encode_verify(profile),
        PinOperation::Modify => encode_modify(profile),
    }
}

/// Encode PIN_VERIFY for the given reader profile
pub fn encode_verify(profile: &ReaderProfile) -> Vec<u8> {
    let mut s = Vec::with_capacity(VERIFY_STRUCTURE_LEN);
    s.push(profile.timeout1);
    s.push(profile.timeout2);
    s.push(FORMAT_STRING);
    s.push(PIN_BLOCK_STRING);
    s.push(PIN_LENGTH_FORMAT);
    s.push(profile.max_extra_pin_digits);
    s.push(profile.min_extra_pin_digits);
    s.push(profile.validation_condition);
    s.push(profile.number_of_messages);
    s.extend_from_slice(&LANGUAGE_ID);
    s.push(VERIFY_MSG_INDEX);
    s.extend_from_slice(&TEO_PROLOGUE);
    s.extend_from_slice(&(VERIFY_PIN_TEMPLATE.len() as u32).to_le_bytes());
    s.extend_from_slice(&VERIFY_PIN_TEMPLATE);
    s
}

/// Encode PIN_MODIFY for the given reader profile
pub fn encode_modify(profile: &ReaderProfile) -> Vec<u8> {
    let mut s = Vec::with_capacity(MODIFY_STRUCTURE_LEN);
    s.push(profile.timeout1);
    s.push(profile.timeout2);
    s.push(FORMAT_STRING);
    s.push(PIN_BLOCK_STRING);
    s.push(PIN_LENGTH_FORMAT);
    s.push(profile.old_pin_insert_offset);
    s.push(profile.new_pin_insert_offset);
    s.push(profile.max_extra_pin_digits);
    s.push(profile.min_extra_pin_digits);
    s.push(profile.confirm_pin_mask);
    s.push(profile.validation_condition);
    s.push(MODIFY_NUMBER_MESSAGE);
    s.extend_from_slice(&LANGUAGE_ID);
    s.extend_from_slice(&MODIFY_MSG_INDICES);
    s.extend_from_slice(&TEO_PROLOGUE);
    s.extend_from_slice(&(MODIFY_PIN_TEMPLATE.len() as u32).to_le_bytes());
    s.extend_from_slice(&MODIFY_PIN_TEMPLATE);
    s
}

/// bConfirmPIN of an encoded PIN_MODIFY structure
pub fn confirm_pin_mask(structure: &[u8]) -> Option<u8> {
    structure.get(MODIFY_CONFIRM_PIN_OFFSET).copied()
}
