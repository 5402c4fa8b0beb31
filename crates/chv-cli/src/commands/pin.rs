use std::process::ExitCode;

use chv_card::{CardHolderVerificationService, ChvError, PcscTransport, ReaderProfile};
use chv_common::HostPlatform;
use tracing::debug;

use crate::prompt::TerminalPinListener;

/// Built-in profile, with the PIN length bound replaced when given
pub(crate) fn defaults(pin_length: Option<u8>) -> ReaderProfile {
    let mut profile = ReaderProfile::default();
    if let Some(max) = pin_length {
        profile.max_extra_pin_digits = max;
    }
    profile
}

/// Longest PIN accepted at the terminal prompt, the same bound the pinpad gets
fn prompt_limit(pin_length: Option<u8>) -> usize {
    usize::from(defaults(pin_length).max_extra_pin_digits)
}

fn open_service(
    reader: Option<&str>,
    platform: HostPlatform,
    pin_length: Option<u8>,
) -> Option<CardHolderVerificationService<PcscTransport>> {
    let transport = super::connect(reader)?;

    let mut service = CardHolderVerificationService::new(transport)
        .with_platform(platform)
        .with_defaults(defaults(pin_length));
    service.add_listener(TerminalPinListener::new(prompt_limit(pin_length)));

    if let Err(err) = service.open() {
        eprintln!("Failed to connect to card: {}", err);
        eprintln!("Please ensure a card is present on the reader");
        return None;
    }

    if let Some(session) = service.session() {
        println!("Reader: {}", session.reader);
        debug!(profile = ?session.profile, "Reader profile");
    }
    Some(service)
}

fn report(result: Result<(), ChvError>, success: &str) -> ExitCode {
    match result {
        Ok(()) => {
            println!("{}", success);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

pub fn cmd_verify(reader: Option<&str>, platform: HostPlatform, pin_length: Option<u8>) -> ExitCode {
    let Some(mut service) = open_service(reader, platform, pin_length) else {
        return ExitCode::FAILURE;
    };

    let result = service.verify();
    service.close();
    report(result, "PIN verified")
}

pub fn cmd_modify(reader: Option<&str>, platform: HostPlatform, pin_length: Option<u8>) -> ExitCode {
    let Some(mut service) = open_service(reader, platform, pin_length) else {
        return ExitCode::FAILURE;
    };

    let result = service.modify();
    service.close();
    report(result, "PIN changed")
}
