use std::process::ExitCode;

use chv_card::CardHolderVerificationService;
use chv_common::HostPlatform;

use crate::formatters::{format_catalog, format_profile, FormatMode};

pub fn cmd_features(reader: Option<&str>, platform: HostPlatform, format_mode: FormatMode) -> ExitCode {
    let Some(transport) = super::connect(reader) else {
        return ExitCode::FAILURE;
    };

    let mut service = CardHolderVerificationService::new(transport).with_platform(platform);
    if let Err(err) = service.open() {
        eprintln!("Failed to connect to card: {}", err);
        eprintln!("Please ensure a card is present on the reader");
        return ExitCode::FAILURE;
    }

    let Some(session) = service.session() else {
        return ExitCode::FAILURE;
    };

    if format_mode == FormatMode::Raw {
        print!("{}", format_catalog(&session.catalog, format_mode));
        return ExitCode::SUCCESS;
    }

    println!("Reader: {} ({:?} host)\n", session.reader, service.platform());
    println!("=== Features ({}) ===\n", format_mode.description());
    print!("{}", format_catalog(&session.catalog, format_mode));
    println!("\n=== Reader Profile ===\n");
    print!("{}", format_profile(&session.profile));
    println!("\n=== PIN Entry ===\n");
    println!("  verify: {}", session.paths.verify.description());
    println!("  modify: {}", session.paths.modify.description());

    service.close();
    ExitCode::SUCCESS
}
