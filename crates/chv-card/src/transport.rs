//! Transport seam between the PIN protocol and the physical reader

use chv_common::ControlCode;

use crate::apdu::ApduResponse;
use crate::error::Result;

/// Capabilities the verification protocol needs from a reader connection.
///
/// The PC/SC implementation lives in [`crate::reader::PcscTransport`]. A
/// transport is owned by exactly one service; callers sharing it between
/// threads must synchronise externally.
pub trait Transport {
    /// Connect to the card. Opening an already open transport is a no-op.
    fn open(&mut self) -> Result<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Send a command APDU to the card
    fn transmit(&mut self, command: &[u8]) -> Result<ApduResponse>;

    /// Send a vendor control command to the reader itself
    fn transmit_control(&mut self, code: ControlCode, data: &[u8]) -> Result<Vec<u8>>;

    /// Display name of the connected reader
    fn reader_name(&self) -> &str;
}
