//! Key press polling for *_PIN_START / GET_KEY_PRESSED / *_PIN_FINISH
//!
//! After the start command the reader owns the keypad. The host polls
//! GET_KEY_PRESSED until the user confirms, cancels or the reader times out,
//! then collects the card's status word with the finish command.

use std::thread;
use std::time::Duration;

use chv_common::{ControlCode, FeatureId};
use tracing::{debug, trace};

use crate::apdu::ApduResponse;
use crate::error::{ChvError, Result};
use crate::features::CapabilityCatalog;
use crate::listener::{ListenerSet, PinpadEvent};
use crate::structure::{confirm_pin_mask, PinOperation};
use crate::transport::Transport;

/// Delay between GET_KEY_PRESSED polls while no key is pressed
pub const PIN_ENTRY_POLLING_INTERVAL: Duration = Duration::from_millis(10);

/// Start response byte signalling an invalid parameter in the structure
const INVALID_PARAMETER_MARKER: u8 = 0x57;

/// Key code returned by GET_KEY_PRESSED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    NoKey,
    Confirm,
    ValidKey,
    Cancel,
    Correction,
    Timeout,
    Aborted,
    AllKeysCleared,
    Unknown(u8),
}

impl From<u8> for KeyPress {
    fn from(code: u8) -> Self {
        match code {
            0x00 => KeyPress::NoKey,
            0x0D => KeyPress::Confirm,
            0x2B => KeyPress::ValidKey,
            0x1B => KeyPress::Cancel,
            0x08 => KeyPress::Correction,
            0x0E => KeyPress::Timeout,
            0x40 => KeyPress::Aborted,
            0x0A => KeyPress::AllKeysCleared,
            other => KeyPress::Unknown(other),
        }
    }
}

/// How the keypad interaction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Confirmed,
    /// The finish command reports 6401
    Cancelled,
    /// The finish command reports 6400
    TimedOut,
}

/// Result of a completed polling run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinEntry {
    pub outcome: EntryOutcome,
    /// Response to the finish command
    pub response: ApduResponse,
}

/// Confirmation progress while a reader collects current and new PIN.
///
/// Bit 0 is set once the new PIN is confirmed, bit 1 once the current PIN is.
/// The target comes from bConfirmPIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationMask {
    entered: u8,
    target: u8,
}

impl ConfirmationMask {
    pub const NEW_PIN: u8 = 0x01;
    pub const CURRENT_PIN: u8 = 0x02;

    pub fn new(target: u8) -> Self {
        Self { entered: 0, target }
    }

    pub fn entered(&self) -> u8 {
        self.entered
    }

    /// Record one confirm key press. Returns true when entry is complete,
    /// otherwise the sub-entry that was just confirmed, if it advanced.
    fn confirm(&mut self) -> (bool, Option<PinpadEvent>) {
        if self.entered == self.target {
            return (true, None);
        }

        let needs_current = self.target & Self::CURRENT_PIN != 0;
        if !needs_current || self.entered & Self::CURRENT_PIN != 0 {
            if self.entered & Self::NEW_PIN == 0 {
                self.entered |= Self::NEW_PIN;
                return (false, Some(PinpadEvent::NewPinEntered));
            }
            (false, None)
        } else {
            self.entered |= Self::CURRENT_PIN;
            (false, Some(PinpadEvent::CurrentPinEntered))
        }
    }
}

/// Control codes for one polling operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingCommands {
    pub operation: PinOperation,
    pub start: ControlCode,
    pub get_key_pressed: ControlCode,
    pub finish: ControlCode,
}

impl PollingCommands {
    pub fn start_feature(operation: PinOperation) -> FeatureId {
        match operation {
            PinOperation::Verify => FeatureId::VerifyPinStart,
            PinOperation::Modify => FeatureId::ModifyPinStart,
        }
    }

    pub fn finish_feature(operation: PinOperation) -> FeatureId {
        match operation {
            PinOperation::Verify => FeatureId::VerifyPinFinish,
            PinOperation::Modify => FeatureId::ModifyPinFinish,
        }
    }

    pub fn from_catalog(catalog: &CapabilityCatalog, operation: PinOperation) -> Result<Self> {
        Ok(Self {
            operation,
            start: catalog.require(Self::start_feature(operation))?,
            get_key_pressed: catalog.require(FeatureId::GetKeyPressed)?,
            finish: catalog.require(Self::finish_feature(operation))?,
        })
    }
}

/// Drives one start/poll/finish interaction on a reader
pub struct KeyPressPoller<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    commands: PollingCommands,
    interval: Duration,
}

impl<'a, T: Transport + ?Sized> KeyPressPoller<'a, T> {
    pub fn new(transport: &'a mut T, commands: PollingCommands) -> Self {
        Self {
            transport,
            commands,
            interval: PIN_ENTRY_POLLING_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Send the start command, poll the keypad, and finish.
    ///
    /// Aborted and unknown key codes are returned as errors without sending
    /// the finish command.
    pub fn run(&mut self, structure: &[u8], listeners: &mut ListenerSet) -> Result<PinEntry> {
        self.start(structure)?;

        let mut confirmations = match self.commands.operation {
            PinOperation::Verify => None,
            PinOperation::Modify => confirm_pin_mask(structure).map(ConfirmationMask::new),
        };

        let outcome = loop {
            let key = KeyPress::from(self.get_key_pressed()?);
            trace!(key = ?key, "GET_KEY_PRESSED");

            match key {
                KeyPress::NoKey => thread::sleep(self.interval),
                KeyPress::Confirm => match confirmations.as_mut() {
                    None => break EntryOutcome::Confirmed,
                    Some(mask) => {
                        let (done, event) = mask.confirm();
                        if done {
                            break EntryOutcome::Confirmed;
                        }
                        if let Some(event) = event {
                            debug!(entered = mask.entered(), "PIN sub-entry confirmed");
                            listeners.pinpad_event(event);
                        }
                    }
                },
                KeyPress::ValidKey => listeners.pinpad_event(PinpadEvent::ValidKey),
                KeyPress::Cancel => break EntryOutcome::Cancelled,
                KeyPress::Correction => listeners.pinpad_event(PinpadEvent::Correction),
                KeyPress::Timeout => break EntryOutcome::TimedOut,
                KeyPress::Aborted => return Err(ChvError::OperationAborted),
                KeyPress::AllKeysCleared => listeners.pinpad_event(PinpadEvent::AllKeysCleared),
                KeyPress::Unknown(code) => return Err(ChvError::UnexpectedKeyCode(code)),
            }
        };

        debug!(outcome = ?outcome, "Pinpad entry ended");
        let response = self.finish()?;
        Ok(PinEntry { outcome, response })
    }

    fn start(&mut self, structure: &[u8]) -> Result<()> {
        let operation = self.commands.operation;
        let response = self
            .transport
            .transmit_control(self.commands.start, structure)?;

        match response.first() {
            None => Ok(()),
            Some(&INVALID_PARAMETER_MARKER) => Err(ChvError::InvalidStructureParameter { operation }),
            Some(_) => Err(ChvError::UnexpectedResponse {
                command: PollingCommands::start_feature(operation),
                response,
            }),
        }
    }

    fn get_key_pressed(&mut self) -> Result<u8> {
        let response = self
            .transport
            .transmit_control(self.commands.get_key_pressed, &[])?;

        match response.as_slice() {
            [key] => Ok(*key),
            _ => Err(ChvError::UnexpectedResponse {
                command: FeatureId::GetKeyPressed,
                response,
            }),
        }
    }

    fn finish(&mut self) -> Result<ApduResponse> {
        let response = self.transport.transmit_control(self.commands.finish, &[])?;

        match response.as_slice() {
            [sw1, sw2] => Ok(ApduResponse {
                data: Vec::new(),
                sw1: *sw1,
                sw2: *sw2,
            }),
            _ => Err(ChvError::UnexpectedResponse {
                command: PollingCommands::finish_feature(self.commands.operation),
                response,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, ListenerEvent, RecordingListener, ScriptedTransport};
    use crate::quirks::ReaderProfile;
    use crate::structure::{encode_modify, encode_verify};
    use chv_common::StatusWord;

    const START: ControlCode = ControlCode(0x4233_0001);
    const FINISH: ControlCode = ControlCode(0x4233_0002);
    const GET_KEY: ControlCode = ControlCode(0x4233_0005);

    fn commands(operation: PinOperation) -> PollingCommands {
        PollingCommands {
            operation,
            start: START,
            get_key_pressed: GET_KEY,
            finish: FINISH,
        }
    }

    fn script(keys: &[u8], finish: Option<[u8; 2]>) -> ScriptedTransport {
        let mut transport = ScriptedTransport::new("Test Pinpad 00 00");
        transport.push_control(START, vec![]);
        for key in keys {
            transport.push_control(GET_KEY, vec![*key]);
        }
        if let Some(sw) = finish {
            transport.push_control(FINISH, sw.to_vec());
        }
        transport
    }

    fn run(
        transport: &mut ScriptedTransport,
        operation: PinOperation,
        structure: &[u8],
        listeners: &mut ListenerSet,
    ) -> Result<PinEntry> {
        KeyPressPoller::new(transport, commands(operation))
            .with_interval(Duration::ZERO)
            .run(structure, listeners)
    }

    #[test]
    fn test_key_codes() {
        assert_eq!(KeyPress::from(0x00), KeyPress::NoKey);
        assert_eq!(KeyPress::from(0x0D), KeyPress::Confirm);
        assert_eq!(KeyPress::from(0x2B), KeyPress::ValidKey);
        assert_eq!(KeyPress::from(0x1B), KeyPress::Cancel);
        assert_eq!(KeyPress::from(0x08), KeyPress::Correction);
        assert_eq!(KeyPress::from(0x0E), KeyPress::Timeout);
        assert_eq!(KeyPress::from(0x40), KeyPress::Aborted);
        assert_eq!(KeyPress::from(0x0A), KeyPress::AllKeysCleared);
        assert_eq!(KeyPress::from(0x99), KeyPress::Unknown(0x99));
    }

    #[test]
    fn test_verify_confirmed() {
        let mut transport = script(&[0x00, 0x2B, 0x2B, 0x0D], Some([0x90, 0x00]));
        let mut listeners = ListenerSet::new();
        let (listener, log) = RecordingListener::new(None);
        listeners.add(Box::new(listener));

        let structure = encode_verify(&ReaderProfile::default());
        let entry = run(&mut transport, PinOperation::Verify, &structure, &mut listeners).unwrap();

        assert_eq!(entry.outcome, EntryOutcome::Confirmed);
        assert_eq!(entry.response.status(), StatusWord::SUCCESS);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ListenerEvent::Pinpad(PinpadEvent::ValidKey),
                ListenerEvent::Pinpad(PinpadEvent::ValidKey),
            ]
        );
        assert_eq!(transport.calls()[0], Call::Control(START, structure));
        assert_eq!(transport.control_calls(FINISH), 1);
        assert_eq!(transport.control_calls(GET_KEY), 4);
    }

    #[test]
    fn test_feedback_keys_stay_polling() {
        let mut transport = script(&[0x08, 0x0A, 0x2B, 0x0D], Some([0x90, 0x00]));
        let mut listeners = ListenerSet::new();
        let (listener, log) = RecordingListener::new(None);
        listeners.add(Box::new(listener));

        let entry = run(&mut transport, PinOperation::Verify, &[], &mut listeners).unwrap();
        assert_eq!(entry.outcome, EntryOutcome::Confirmed);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ListenerEvent::Pinpad(PinpadEvent::Correction),
                ListenerEvent::Pinpad(PinpadEvent::AllKeysCleared),
                ListenerEvent::Pinpad(PinpadEvent::ValidKey),
            ]
        );
    }

    #[test]
    fn test_cancel_finishes_once() {
        let mut transport = script(&[0x1B], Some([0x64, 0x01]));
        let entry = run(&mut transport, PinOperation::Verify, &[], &mut ListenerSet::new()).unwrap();
        assert_eq!(entry.outcome, EntryOutcome::Cancelled);
        assert_eq!(entry.response.status(), StatusWord::SPE_CANCELLED);
        assert_eq!(transport.control_calls(FINISH), 1);
        assert_eq!(transport.calls().len(), 3);
    }

    #[test]
    fn test_timeout_finishes() {
        let mut transport = script(&[0x00, 0x00, 0x0E], Some([0x64, 0x00]));
        let entry = run(&mut transport, PinOperation::Verify, &[], &mut ListenerSet::new()).unwrap();
        assert_eq!(entry.outcome, EntryOutcome::TimedOut);
        assert_eq!(entry.response.status(), StatusWord::SPE_TIMEOUT);
    }

    #[test]
    fn test_aborted_never_finishes() {
        let mut transport = script(&[0x2B, 0x40], None);
        let result = run(&mut transport, PinOperation::Verify, &[], &mut ListenerSet::new());
        assert!(matches!(result, Err(ChvError::OperationAborted)));
        assert_eq!(transport.control_calls(FINISH), 0);
    }

    #[test]
    fn test_unknown_key_is_fatal() {
        let mut transport = script(&[0x31], None);
        let result = run(&mut transport, PinOperation::Verify, &[], &mut ListenerSet::new());
        assert!(matches!(result, Err(ChvError::UnexpectedKeyCode(0x31))));
        assert_eq!(transport.control_calls(FINISH), 0);
    }

    #[test]
    fn test_start_invalid_parameter() {
        let mut transport = ScriptedTransport::new("Test Pinpad 00 00");
        transport.push_control(START, vec![0x57]);
        let result = run(&mut transport, PinOperation::Modify, &[], &mut ListenerSet::new());
        assert!(matches!(
            result,
            Err(ChvError::InvalidStructureParameter {
                operation: PinOperation::Modify
            })
        ));
        assert_eq!(transport.control_calls(GET_KEY), 0);
    }

    #[test]
    fn test_start_unexpected_response() {
        let mut transport = ScriptedTransport::new("Test Pinpad 00 00");
        transport.push_control(START, vec![0x6B, 0x80]);
        let result = run(&mut transport, PinOperation::Verify, &[], &mut ListenerSet::new());
        match result {
            Err(ChvError::UnexpectedResponse { command, response }) => {
                assert_eq!(command, FeatureId::VerifyPinStart);
                assert_eq!(response, vec![0x6B, 0x80]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_get_key_pressed_wrong_length() {
        let mut transport = ScriptedTransport::new("Test Pinpad 00 00");
        transport.push_control(START, vec![]);
        transport.push_control(GET_KEY, vec![0x2B, 0x2B]);
        let result = run(&mut transport, PinOperation::Verify, &[], &mut ListenerSet::new());
        assert!(matches!(
            result,
            Err(ChvError::UnexpectedResponse {
                command: FeatureId::GetKeyPressed,
                ..
            })
        ));
    }

    #[test]
    fn test_finish_wrong_length() {
        let mut transport = script(&[0x0D], Some([0x90, 0x00]));
        transport.clear_control(FINISH);
        transport.push_control(FINISH, vec![0x90]);
        let result = run(&mut transport, PinOperation::Verify, &[], &mut ListenerSet::new());
        assert!(matches!(
            result,
            Err(ChvError::UnexpectedResponse {
                command: FeatureId::VerifyPinFinish,
                ..
            })
        ));
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut transport = ScriptedTransport::new("Test Pinpad 00 00");
        transport.push_control(START, vec![]);
        transport.fail_control(GET_KEY);
        let result = run(&mut transport, PinOperation::Verify, &[], &mut ListenerSet::new());
        assert!(matches!(result, Err(ChvError::Transport(_))));
    }

    #[test]
    fn test_modify_collects_current_then_new() {
        // bConfirmPIN 0x03: current PIN, new PIN, then the mask matches
        let mut transport = script(&[0x2B, 0x0D, 0x2B, 0x0D, 0x2B, 0x0D], Some([0x90, 0x00]));
        let mut listeners = ListenerSet::new();
        let (listener, log) = RecordingListener::new(None);
        listeners.add(Box::new(listener));

        let structure = encode_modify(&ReaderProfile::default());
        let entry = run(&mut transport, PinOperation::Modify, &structure, &mut listeners).unwrap();

        assert_eq!(entry.outcome, EntryOutcome::Confirmed);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ListenerEvent::Pinpad(PinpadEvent::ValidKey),
                ListenerEvent::Pinpad(PinpadEvent::CurrentPinEntered),
                ListenerEvent::Pinpad(PinpadEvent::ValidKey),
                ListenerEvent::Pinpad(PinpadEvent::NewPinEntered),
                ListenerEvent::Pinpad(PinpadEvent::ValidKey),
            ]
        );
        assert_eq!(transport.control_calls(FINISH), 1);
    }

    #[test]
    fn test_modify_cancel_mid_entry() {
        let mut transport = script(&[0x0D, 0x1B], Some([0x64, 0x01]));
        let structure = encode_modify(&ReaderProfile::default());
        let entry = run(&mut transport, PinOperation::Modify, &structure, &mut ListenerSet::new()).unwrap();
        assert_eq!(entry.outcome, EntryOutcome::Cancelled);
    }

    #[test]
    fn test_mask_without_current_pin() {
        let mut mask = ConfirmationMask::new(0x01);
        assert_eq!(mask.confirm(), (false, Some(PinpadEvent::NewPinEntered)));
        assert_eq!(mask.entered(), 0x01);
        assert_eq!(mask.confirm(), (true, None));
    }

    #[test]
    fn test_mask_new_pin_is_idempotent() {
        // a target the reader can never reach: the new PIN bit only sets once
        let mut mask = ConfirmationMask::new(0x05);
        assert_eq!(mask.confirm(), (false, Some(PinpadEvent::NewPinEntered)));
        assert_eq!(mask.confirm(), (false, None));
        assert_eq!(mask.confirm(), (false, None));
        assert_eq!(mask.entered(), 0x01);
    }

    #[test]
    fn test_mask_zero_target_confirms_immediately() {
        let mut mask = ConfirmationMask::new(0x00);
        assert_eq!(mask.confirm(), (true, None));
    }

    #[test]
    fn test_mask_current_then_new() {
        let mut mask = ConfirmationMask::new(0x03);
        assert_eq!(mask.confirm(), (false, Some(PinpadEvent::CurrentPinEntered)));
        assert_eq!(mask.entered(), 0x02);
        assert_eq!(mask.confirm(), (false, Some(PinpadEvent::NewPinEntered)));
        assert_eq!(mask.entered(), 0x03);
        assert_eq!(mask.confirm(), (true, None));
    }

    #[test]
    fn test_commands_from_catalog() {
        let catalog = CapabilityCatalog::discover(&crate::mock::feature_list(&[
            (FeatureId::ModifyPinStart, 0x0103),
            (FeatureId::ModifyPinFinish, 0x0104),
            (FeatureId::GetKeyPressed, 0x0105),
        ]));
        let commands = PollingCommands::from_catalog(&catalog, PinOperation::Modify).unwrap();
        assert_eq!(commands.start, ControlCode(0x0103));
        assert_eq!(commands.finish, ControlCode(0x0104));
        assert!(matches!(
            PollingCommands::from_catalog(&catalog, PinOperation::Verify),
            Err(ChvError::FeatureUnavailable(FeatureId::VerifyPinStart))
        ));
    }
}
