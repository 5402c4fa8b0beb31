//! Terminal PIN listener
//!
//! Prompts for PINs on the controlling terminal when the reader has no
//! keypad, and prints progress while a pinpad collects the PIN.

use std::io::{self, Write};

use chv_card::{PinKind, PinListener, PinRequest, PinpadEvent};
use chv_common::RetryState;
use secrecy::SecretString;
use tracing::warn;

pub struct TerminalPinListener {
    max_length: usize,
}

impl TerminalPinListener {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    fn prompt_text(request: &PinRequest) -> String {
        let label = match request.kind {
            PinKind::Current => "PIN",
            PinKind::New => "New PIN",
        };
        match request.retry {
            RetryState::NoPriorFailure => format!("{label}: "),
            RetryState::TriesRemaining(tries) => format!("Wrong PIN, {tries} tries left. {label}: "),
        }
    }
}

/// Check a PIN typed at the prompt
pub fn validate_pin(pin: &str, max_length: usize) -> Result<(), String> {
    if pin.is_empty() {
        return Err("PIN must not be empty".to_string());
    }
    if !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err("PIN must contain digits only".to_string());
    }
    if pin.len() > max_length {
        return Err(format!("PIN must not be longer than {max_length} digits"));
    }
    Ok(())
}

impl PinListener for TerminalPinListener {
    fn request_pin(&mut self, request: PinRequest) -> Option<SecretString> {
        let prompt = Self::prompt_text(&request);
        loop {
            let pin = match rpassword::prompt_password(&prompt) {
                Ok(pin) => pin,
                Err(err) => {
                    warn!(error = %err, "Failed to read PIN from terminal");
                    return None;
                }
            };

            match validate_pin(&pin, self.max_length) {
                Ok(()) => return Some(SecretString::new(pin)),
                Err(reason) => eprintln!("{reason}"),
            }
        }
    }

    fn pinpad_entry_required(&mut self, retry: RetryState) {
        match retry {
            RetryState::NoPriorFailure => eprint!("Enter the PIN on the reader keypad: "),
            RetryState::TriesRemaining(tries) => {
                eprint!("Wrong PIN, {tries} tries left. Enter the PIN on the reader keypad: ")
            }
        }
        let _ = io::stderr().flush();
    }

    fn pinpad_entry_completed(&mut self) {
        eprintln!();
    }

    fn pinpad_event(&mut self, event: PinpadEvent) {
        match event {
            PinpadEvent::ValidKey => eprint!("*"),
            PinpadEvent::Correction => eprint!("\u{8} \u{8}"),
            PinpadEvent::AllKeysCleared => eprint!("\r\x1b[K"),
            PinpadEvent::CurrentPinEntered => eprint!("\nNew PIN: "),
            PinpadEvent::NewPinEntered => eprint!("\nConfirm new PIN: "),
        }
        let _ = io::stderr().flush();
    }
}
