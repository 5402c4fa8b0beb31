//! PC/SC card reader management

use std::ffi::{CStr, CString};

use chv_common::ControlCode;
use pcsc::{Card, Context, Disposition, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};
use tracing::{debug, warn};

use crate::apdu::{send_apdu, ApduResponse};
use crate::error::{ChvError, Result};
use crate::transport::Transport;

/// Card reader wrapper for managing PC/SC connections
pub struct CardReader {
    context: Context,
}

impl CardReader {
    /// Create a new CardReader by establishing a PC/SC context
    pub fn new() -> Result<Self> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }

    /// List all available card readers
    pub fn list_readers(&self) -> Result<Vec<String>> {
        let mut readers_buf = [0; 2048];
        let readers = self.context.list_readers(&mut readers_buf)?;

        Ok(readers
            .map(|r| r.to_str().unwrap_or("Unknown").to_string())
            .collect())
    }

    /// Transport for the first available reader (not yet opened)
    pub fn first_transport(&self) -> Result<PcscTransport> {
        let mut readers_buf = [0; 2048];
        let mut readers = self.context.list_readers(&mut readers_buf)?;

        match readers.next() {
            Some(reader) => Ok(PcscTransport::new(self.context.clone(), reader)),
            None => Err(ChvError::Pcsc(pcsc::Error::NoReadersAvailable)),
        }
    }

    /// Transport for a reader selected by its display name (not yet opened)
    pub fn transport(&self, reader_name: &str) -> Result<PcscTransport> {
        let reader = CString::new(reader_name)
            .map_err(|_| ChvError::Transport(format!("Invalid reader name: {reader_name:?}")))?;
        Ok(PcscTransport::new(self.context.clone(), &reader))
    }
}

/// [`Transport`] over a shared PC/SC card connection
pub struct PcscTransport {
    context: Context,
    reader: CString,
    name: String,
    card: Option<Card>,
}

impl PcscTransport {
    pub fn new(context: Context, reader: &CStr) -> Self {
        Self {
            context,
            reader: reader.to_owned(),
            name: reader.to_str().unwrap_or("Unknown").to_string(),
            card: None,
        }
    }

    fn card(&self) -> Result<&Card> {
        self.card.as_ref().ok_or(ChvError::NotOpen)
    }
}

impl Transport for PcscTransport {
    fn open(&mut self) -> Result<()> {
        if self.card.is_none() {
            let card = self
                .context
                .connect(&self.reader, ShareMode::Shared, Protocols::ANY)?;
            debug!(reader = %self.name, "Connected to card");
            self.card = Some(card);
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, err)) = card.disconnect(Disposition::LeaveCard) {
                warn!(reader = %self.name, error = %err, "Failed to disconnect card");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.card.is_some()
    }

    fn transmit(&mut self, command: &[u8]) -> Result<ApduResponse> {
        send_apdu(self.card()?, command)
    }

    fn transmit_control(&mut self, code: ControlCode, data: &[u8]) -> Result<Vec<u8>> {
        let mut response_buf = [0; MAX_BUFFER_SIZE];
        let response = self
            .card()?
            .control(code.value().into(), data, &mut response_buf)?;
        Ok(response.to_vec())
    }

    fn reader_name(&self) -> &str {
        &self.name
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        self.close();
    }
}
