//! Card holder verification service
//!
//! Ties the pieces together for one reader: on `open` it discovers the
//! reader's SPE features, resolves its quirk profile and picks an entry path
//! for each operation. `verify` and `modify` then collect a PIN over that path
//! and repeat the entry for as long as the card reports remaining tries.

use std::time::Duration;

use chv_common::{FeatureId, HostPlatform, PinFailure, RetryState, StatusOutcome};
use secrecy::zeroize::Zeroize;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::apdu::{commands, ApduResponse};
use crate::error::{ChvError, Result};
use crate::features::{CapabilityCatalog, CapabilityFlags, EntryPath, EntryPaths};
use crate::listener::{ListenerId, ListenerSet, PinListener, PinRequest};
use crate::polling::{KeyPressPoller, PollingCommands, PIN_ENTRY_POLLING_INTERVAL};
use crate::quirks::{apply_quirks, ReaderProfile};
use crate::structure::{self, PinOperation};
use crate::transport::Transport;

/// Everything learned about the reader when the service was opened.
/// Read-only until the service is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderSession {
    pub reader: String,
    pub catalog: CapabilityCatalog,
    pub flags: CapabilityFlags,
    pub profile: ReaderProfile,
    pub paths: EntryPaths,
}

pub struct CardHolderVerificationService<T: Transport> {
    transport: T,
    platform: HostPlatform,
    defaults: ReaderProfile,
    poll_interval: Duration,
    listeners: ListenerSet,
    session: Option<ReaderSession>,
    retry: RetryState,
}

impl<T: Transport> CardHolderVerificationService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            platform: HostPlatform::detect(),
            defaults: ReaderProfile::default(),
            poll_interval: PIN_ENTRY_POLLING_INTERVAL,
            listeners: ListenerSet::new(),
            session: None,
            retry: RetryState::NoPriorFailure,
        }
    }

    /// Override the detected host platform
    pub fn with_platform(mut self, platform: HostPlatform) -> Self {
        self.platform = platform;
        self
    }

    /// Replace the profile that reader quirks are applied to
    pub fn with_defaults(mut self, defaults: ReaderProfile) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn add_listener<L>(&mut self, listener: L) -> ListenerId
    where
        L: PinListener + Send + 'static,
    {
        self.listeners.add(Box::new(listener))
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn platform(&self) -> HostPlatform {
        self.platform
    }

    /// Connect to the card and set up the reader session.
    ///
    /// Calling `open` on an open service does nothing.
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        self.transport.open()?;

        let reader = self.transport.reader_name().to_string();
        let catalog = CapabilityCatalog::query(&mut self.transport, self.platform);
        let flags = catalog.flags();
        // Quirk tables only describe pinpad readers
        let profile = if flags.any() {
            apply_quirks(&self.defaults, &reader, self.platform)
        } else {
            self.defaults.clone()
        };
        let paths = EntryPaths::select(flags, &profile);

        info!(
            reader = %reader,
            verify = paths.verify.description(),
            modify = paths.modify.description(),
            "Reader session established"
        );

        self.session = Some(ReaderSession {
            reader,
            catalog,
            flags,
            profile,
            paths,
        });
        Ok(())
    }

    pub fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("Reader session closed");
        }
        self.transport.close();
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some() && self.transport.is_open()
    }

    pub fn session(&self) -> Option<&ReaderSession> {
        self.session.as_ref()
    }

    /// Attempt state of the last verify or modify call
    pub fn retry_state(&self) -> RetryState {
        self.retry
    }

    /// Send a plain command APDU to the card
    pub fn transmit(&mut self, command: &[u8]) -> Result<ApduResponse> {
        if !self.is_open() {
            return Err(ChvError::NotOpen);
        }
        self.transport.transmit(command)
    }

    /// Verify the card holder PIN
    pub fn verify(&mut self) -> Result<()> {
        self.run(PinOperation::Verify)
    }

    /// Change the card holder PIN
    pub fn modify(&mut self) -> Result<()> {
        self.run(PinOperation::Modify)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn run(&mut self, operation: PinOperation) -> Result<()> {
        let session = match (&self.session, self.transport.is_open()) {
            (Some(session), true) => session,
            _ => return Err(ChvError::NotOpen),
        };
        let path = session.paths.for_operation(operation);
        let profile = session.profile.clone();
        let catalog = session.catalog.clone();

        self.retry = RetryState::NoPriorFailure;
        debug!(operation = %operation, path = path.description(), "Starting PIN entry");

        loop {
            let response = match path {
                EntryPath::HostDialog => self.enter_by_dialog(operation)?,
                EntryPath::DirectVerify | EntryPath::DirectModify => {
                    self.enter_direct(operation, &catalog, &profile)?
                }
                EntryPath::PollingVerify | EntryPath::PollingModify => {
                    self.enter_polling(operation, &catalog, &profile)?
                }
            };

            let status = response.status();
            match status.classify() {
                StatusOutcome::Success => {
                    self.retry = RetryState::NoPriorFailure;
                    info!(operation = %operation, "PIN {} succeeded", operation.description());
                    return Ok(());
                }
                StatusOutcome::TriesRemaining(tries) => {
                    self.retry = RetryState::TriesRemaining(tries);
                    if tries == 0 {
                        warn!(operation = %operation, "Wrong PIN, no tries left");
                        return Err(ChvError::PinEntryFailed {
                            operation,
                            status,
                            failure: PinFailure::NoTriesLeft,
                        });
                    }
                    warn!(operation = %operation, tries, "Wrong PIN, retrying");
                }
                StatusOutcome::Failed(failure) => {
                    warn!(operation = %operation, status = %status, "{}", failure);
                    return Err(ChvError::PinEntryFailed {
                        operation,
                        status,
                        failure,
                    });
                }
            }
        }
    }

    fn enter_by_dialog(&mut self, operation: PinOperation) -> Result<ApduResponse> {
        let current = self.listeners.request_pin(PinRequest::current(self.retry))?;

        let mut command = match operation {
            PinOperation::Verify => commands::verify(current.expose_secret().as_bytes()),
            PinOperation::Modify => {
                let new = self.listeners.request_pin(PinRequest::new_pin())?;
                commands::change_reference_data(
                    current.expose_secret().as_bytes(),
                    new.expose_secret().as_bytes(),
                )
            }
        };

        let built = command.build();
        command.zeroize();
        let mut apdu = built?;
        let result = self.transport.transmit(&apdu);
        apdu.zeroize();
        result
    }

    fn enter_direct(
        &mut self,
        operation: PinOperation,
        catalog: &CapabilityCatalog,
        profile: &ReaderProfile,
    ) -> Result<ApduResponse> {
        let feature = match operation {
            PinOperation::Verify => FeatureId::VerifyPinDirect,
            PinOperation::Modify => FeatureId::ModifyPinDirect,
        };
        let code = catalog.require(feature)?;
        let structure = structure::encode(profile, operation);

        self.listeners.pinpad_entry_required(self.retry);
        let result = self.transport.transmit_control(code, &structure);
        self.listeners.pinpad_entry_completed();

        let raw = result?;
        ApduResponse::from_bytes(&raw).ok_or(ChvError::UnexpectedResponse {
            command: feature,
            response: raw,
        })
    }

    fn enter_polling(
        &mut self,
        operation: PinOperation,
        catalog: &CapabilityCatalog,
        profile: &ReaderProfile,
    ) -> Result<ApduResponse> {
        let polling = PollingCommands::from_catalog(catalog, operation)?;
        let structure = structure::encode(profile, operation);

        self.listeners.pinpad_entry_required(self.retry);
        let result = KeyPressPoller::new(&mut self.transport, polling)
            .with_interval(self.poll_interval)
            .run(&structure, &mut self.listeners);
        self.listeners.pinpad_entry_completed();

        let entry = result?;
        debug!(outcome = ?entry.outcome, status = %entry.response.status(), "Pinpad entry finished");
        Ok(entry.response)
    }
}
