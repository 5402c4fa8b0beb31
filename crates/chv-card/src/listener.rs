//! PIN entry listeners
//!
//! Listeners are the UI side of a PIN operation. They supply PINs when no
//! pinpad is available and receive progress notifications when one is. All
//! registered listeners are called synchronously, in registration order,
//! before the triggering call returns.

use chv_common::RetryState;
use secrecy::SecretString;

use crate::error::{ChvError, Result};

/// Which PIN a host dialog should ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinKind {
    Current,
    New,
}

/// Host dialog PIN request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRequest {
    pub kind: PinKind,
    /// Attempts left after the previous wrong PIN, if there was one
    pub retry: RetryState,
}

impl PinRequest {
    pub fn current(retry: RetryState) -> Self {
        Self {
            kind: PinKind::Current,
            retry,
        }
    }

    pub fn new_pin() -> Self {
        Self {
            kind: PinKind::New,
            retry: RetryState::NoPriorFailure,
        }
    }
}

/// Key press feedback while the reader collects a PIN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinpadEvent {
    /// A digit key was pressed
    ValidKey,
    /// Correction/backspace
    Correction,
    AllKeysCleared,
    /// Modification: current PIN confirmed, new PIN follows
    CurrentPinEntered,
    /// Modification: new PIN confirmed
    NewPinEntered,
}

pub trait PinListener {
    /// Ask the user to type a PIN on the host. `None` means no answer.
    fn request_pin(&mut self, request: PinRequest) -> Option<SecretString>;

    /// The reader's keypad is about to collect the PIN
    fn pinpad_entry_required(&mut self, _retry: RetryState) {}

    /// The reader finished collecting the PIN
    fn pinpad_entry_completed(&mut self) {}

    fn pinpad_event(&mut self, _event: PinpadEvent) {}
}

/// Handle returned by [`ListenerSet::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registered listeners, notified in registration order
#[derive(Default)]
pub struct ListenerSet {
    next_id: u64,
    listeners: Vec<(ListenerId, Box<dyn PinListener + Send>)>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Box<dyn PinListener + Send>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Ask every listener; the last one that answers supplies the PIN
    pub fn request_pin(&mut self, request: PinRequest) -> Result<SecretString> {
        let mut pin = None;
        for (_, listener) in &mut self.listeners {
            if let Some(answer) = listener.request_pin(request) {
                pin = Some(answer);
            }
        }
        pin.ok_or(ChvError::NoPinEntered)
    }

    pub fn pinpad_entry_required(&mut self, retry: RetryState) {
        for (_, listener) in &mut self.listeners {
            listener.pinpad_entry_required(retry);
        }
    }

    pub fn pinpad_entry_completed(&mut self) {
        for (_, listener) in &mut self.listeners {
            listener.pinpad_entry_completed();
        }
    }

    pub fn pinpad_event(&mut self, event: PinpadEvent) {
        for (_, listener) in &mut self.listeners {
            listener.pinpad_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ListenerEvent, RecordingListener};
    use secrecy::ExposeSecret;

    #[test]
    fn test_all_listeners_notified_in_order() {
        let mut set = ListenerSet::new();
        let (first, first_log) = RecordingListener::new(Some("1111"));
        let (second, second_log) = RecordingListener::new(None);
        set.add(Box::new(first));
        set.add(Box::new(second));

        set.pinpad_entry_required(RetryState::TriesRemaining(2));
        set.pinpad_event(PinpadEvent::ValidKey);
        set.pinpad_entry_completed();

        let expected = vec![
            ListenerEvent::PinpadRequired(RetryState::TriesRemaining(2)),
            ListenerEvent::Pinpad(PinpadEvent::ValidKey),
            ListenerEvent::PinpadCompleted,
        ];
        assert_eq!(*first_log.lock().unwrap(), expected);
        assert_eq!(*second_log.lock().unwrap(), expected);
    }

    #[test]
    fn test_last_answer_wins() {
        let mut set = ListenerSet::new();
        let (first, first_log) = RecordingListener::new(Some("1111"));
        let (second, _) = RecordingListener::new(Some("2222"));
        let (third, third_log) = RecordingListener::new(None);
        set.add(Box::new(first));
        set.add(Box::new(second));
        set.add(Box::new(third));

        let pin = set.request_pin(PinRequest::current(RetryState::NoPriorFailure)).unwrap();
        assert_eq!(pin.expose_secret(), "2222");
        // every listener was asked, including the ones that did not answer
        assert_eq!(first_log.lock().unwrap().len(), 1);
        assert_eq!(third_log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_no_answer() {
        let mut set = ListenerSet::new();
        assert!(matches!(
            set.request_pin(PinRequest::new_pin()),
            Err(ChvError::NoPinEntered)
        ));
    }

    #[test]
    fn test_remove_listener() {
        let mut set = ListenerSet::new();
        let (listener, log) = RecordingListener::new(None);
        let id = set.add(Box::new(listener));
        assert_eq!(set.len(), 1);

        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());

        set.pinpad_entry_completed();
        assert!(log.lock().unwrap().is_empty());
    }
}
