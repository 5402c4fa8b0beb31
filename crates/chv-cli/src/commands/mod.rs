pub mod features;
pub mod pin;
pub mod readers;
pub mod structures;

use chv_card::{CardReader, ChvError, PcscTransport};

/// Transport for the named reader, or the first one available
pub(crate) fn select_transport(reader: &CardReader, name: Option<&str>) -> Result<PcscTransport, ChvError> {
    match name {
        Some(name) => reader.transport(name),
        None => reader.first_transport(),
    }
}

/// Establish a PC/SC context and pick a reader, reporting failures
pub(crate) fn connect(name: Option<&str>) -> Option<PcscTransport> {
    let reader = match CardReader::new() {
        Ok(r) => r,
        Err(err) => {
            eprintln!("Failed to establish PC/SC context: {}", err);
            return None;
        }
    };

    match select_transport(&reader, name) {
        Ok(transport) => Some(transport),
        Err(err) => {
            eprintln!("Failed to select reader: {}", err);
            None
        }
    }
}
