//! CHV Card - Card holder verification through PC/SC pinpad readers
//!
//! This crate verifies and changes card PINs. When the reader has a secure
//! PIN entry keypad the PIN is collected by the reader itself (PC/SC part 10),
//! otherwise it is requested from registered listeners and sent to the card
//! in a plain VERIFY or CHANGE REFERENCE DATA command.

pub mod apdu;
pub mod error;
pub mod features;
pub mod listener;
pub mod polling;
pub mod quirks;
pub mod reader;
pub mod service;
pub mod structure;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use apdu::ApduResponse;
pub use error::{ChvError, Result};
pub use features::{CapabilityCatalog, CapabilityFlags, EntryPath, EntryPaths};
pub use listener::{ListenerId, PinKind, PinListener, PinRequest, PinpadEvent};
pub use quirks::ReaderProfile;
pub use reader::{CardReader, PcscTransport};
pub use service::{CardHolderVerificationService, ReaderSession};
pub use structure::PinOperation;
pub use transport::Transport;

/// Re-export commonly used types
pub use pcsc::{Context, Error as PcscError};
pub use secrecy::SecretString;
