//! APDU (Application Protocol Data Unit) command handling

use chv_common::StatusWord;
use pcsc::{Card, MAX_BUFFER_SIZE};
use secrecy::zeroize::Zeroize;

use crate::error::{ChvError, Result};

/// APDU response containing data and status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response data (without status word)
    pub data: Vec<u8>,
    /// Status word SW1
    pub sw1: u8,
    /// Status word SW2
    pub sw2: u8,
}

impl ApduResponse {
    /// Split raw response bytes into data and status word.
    ///
    /// Returns `None` when fewer than two bytes are present.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() < 2 {
            return None;
        }

        let sw1 = raw[raw.len() - 2];
        let sw2 = raw[raw.len() - 1];
        let data = raw[..raw.len() - 2].to_vec();

        Some(Self { data, sw1, sw2 })
    }

    pub fn status(&self) -> StatusWord {
        StatusWord::new(self.sw1, self.sw2)
    }
}

/// Send an APDU command to the card and return the response
pub fn send_apdu(card: &Card, apdu: &[u8]) -> Result<ApduResponse> {
    let mut rapdu_buf = [0; MAX_BUFFER_SIZE];
    let rapdu = card.transmit(apdu, &mut rapdu_buf)?;

    ApduResponse::from_bytes(rapdu).ok_or_else(|| ChvError::MalformedResponse(rapdu.to_vec()))
}

/// APDU command builder
pub struct ApduCommand {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Vec<u8>,
}

impl ApduCommand {
    /// Create a new APDU command
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
        }
    }

    /// Set command data
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Build the short APDU command bytes.
    ///
    /// Data longer than a single Lc byte can describe is rejected.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut apdu = vec![self.cla, self.ins, self.p1, self.p2];

        if !self.data.is_empty() {
            let lc = u8::try_from(self.data.len())
                .map_err(|_| ChvError::CommandDataTooLong(self.data.len()))?;
            apdu.push(lc);
            apdu.extend_from_slice(&self.data);
        }

        Ok(apdu)
    }
}

impl Zeroize for ApduCommand {
    fn zeroize(&mut self) {
        self.data.zeroize();
    }
}

/// Card holder verification commands (ISO 7816-4)
pub mod commands {
    use super::ApduCommand;

    pub const INS_VERIFY: u8 = 0x20;
    pub const INS_CHANGE_REFERENCE_DATA: u8 = 0x24;

    /// VERIFY with a host-entered PIN
    pub fn verify(pin: &[u8]) -> ApduCommand {
        ApduCommand::new(0x00, INS_VERIFY, 0x00, 0x00).data(pin.to_vec())
    }

    /// CHANGE REFERENCE DATA with the current PIN followed by the new one
    pub fn change_reference_data(current: &[u8], new: &[u8]) -> ApduCommand {
        let mut data = Vec::with_capacity(current.len() + new.len());
        data.extend_from_slice(current);
        data.extend_from_slice(new);
        ApduCommand::new(0x00, INS_CHANGE_REFERENCE_DATA, 0x00, 0x00).data(data)
    }
}
