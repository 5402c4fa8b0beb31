//! Scripted transport and recording listener for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chv_common::{ControlCode, FeatureId, RetryState};
use secrecy::SecretString;

use crate::apdu::ApduResponse;
use crate::error::{ChvError, Result};
use crate::listener::{PinListener, PinRequest, PinpadEvent};
use crate::transport::Transport;

/// One command seen by a [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Control(ControlCode, Vec<u8>),
    Transmit(Vec<u8>),
}

/// Transport answering from per-command queues.
///
/// Commands with an empty queue fail with a transport error.
pub struct ScriptedTransport {
    name: String,
    open: bool,
    opens: usize,
    control: HashMap<ControlCode, VecDeque<Result<Vec<u8>>>>,
    transmit: VecDeque<Result<ApduResponse>>,
    calls: Vec<Call>,
}

impl ScriptedTransport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            open: false,
            opens: 0,
            control: HashMap::new(),
            transmit: VecDeque::new(),
            calls: Vec::new(),
        }
    }

    pub fn push_control(&mut self, code: ControlCode, response: Vec<u8>) {
        self.control.entry(code).or_default().push_back(Ok(response));
    }

    pub fn fail_control(&mut self, code: ControlCode) {
        self.control
            .entry(code)
            .or_default()
            .push_back(Err(ChvError::Transport(format!("control {code} failed"))));
    }

    pub fn clear_control(&mut self, code: ControlCode) {
        self.control.remove(&code);
    }

    pub fn push_transmit(&mut self, sw1: u8, sw2: u8) {
        self.transmit.push_back(Ok(ApduResponse {
            data: Vec::new(),
            sw1,
            sw2,
        }));
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn control_calls(&self, code: ControlCode) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Control(c, _) if *c == code))
            .count()
    }

    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Transmit(bytes) => Some(bytes.clone()),
                Call::Control(..) => None,
            })
            .collect()
    }

    pub fn opens(&self) -> usize {
        self.opens
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self) -> Result<()> {
        if !self.open {
            self.open = true;
            self.opens += 1;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn transmit(&mut self, command: &[u8]) -> Result<ApduResponse> {
        self.calls.push(Call::Transmit(command.to_vec()));
        self.transmit
            .pop_front()
            .unwrap_or_else(|| Err(ChvError::Transport("no scripted APDU response".into())))
    }

    fn transmit_control(&mut self, code: ControlCode, data: &[u8]) -> Result<Vec<u8>> {
        self.calls.push(Call::Control(code, data.to_vec()));
        self.control
            .get_mut(&code)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(ChvError::Transport(format!("no scripted response for {code}"))))
    }

    fn reader_name(&self) -> &str {
        &self.name
    }
}

/// GET_FEATURE_REQUEST response for the given records
pub fn feature_list(records: &[(FeatureId, u32)]) -> Vec<u8> {
    records
        .iter()
        .flat_map(|(feature, code)| {
            let mut record = vec![feature.tag(), 0x04];
            record.extend_from_slice(&code.to_be_bytes());
            record
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    PinRequested(PinRequest),
    PinpadRequired(RetryState),
    Pinpad(PinpadEvent),
    PinpadCompleted,
}

/// Listener that answers with fixed PINs and records every call
pub struct RecordingListener {
    answers: VecDeque<String>,
    repeat: Option<String>,
    log: Arc<Mutex<Vec<ListenerEvent>>>,
}

impl RecordingListener {
    /// Answers every request with `pin`, or never answers
    pub fn new(pin: Option<&str>) -> (Self, Arc<Mutex<Vec<ListenerEvent>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = Self {
            answers: VecDeque::new(),
            repeat: pin.map(str::to_string),
            log: Arc::clone(&log),
        };
        (listener, log)
    }

    /// Answers requests with `pins` in order, then stops answering
    pub fn with_answers(pins: &[&str]) -> (Self, Arc<Mutex<Vec<ListenerEvent>>>) {
        let (mut listener, log) = Self::new(None);
        listener.answers = pins.iter().map(|pin| pin.to_string()).collect();
        (listener, log)
    }

    fn record(&self, event: ListenerEvent) {
        if let Ok(mut log) = self.log.lock() {
            log.push(event);
        }
    }
}

impl PinListener for RecordingListener {
    fn request_pin(&mut self, request: PinRequest) -> Option<SecretString> {
        self.record(ListenerEvent::PinRequested(request));
        self.answers
            .pop_front()
            .or_else(|| self.repeat.clone())
            .map(SecretString::new)
    }

    fn pinpad_entry_required(&mut self, retry: RetryState) {
        self.record(ListenerEvent::PinpadRequired(retry));
    }

    fn pinpad_entry_completed(&mut self) {
        self.record(ListenerEvent::PinpadCompleted);
    }

    fn pinpad_event(&mut self, event: PinpadEvent) {
        self.record(ListenerEvent::Pinpad(event));
    }
}
