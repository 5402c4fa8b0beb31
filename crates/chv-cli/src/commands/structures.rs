use std::process::ExitCode;

use chv_card::quirks::{apply_quirks, find_quirk};
use chv_card::structure::encode;
use chv_card::{PinOperation, ReaderProfile};
use chv_common::HostPlatform;

use crate::formatters::{format_profile, format_structure, FormatMode};

pub fn cmd_structures(
    reader: &str,
    platform: HostPlatform,
    pin_length: Option<u8>,
    format_mode: FormatMode,
) -> ExitCode {
    let profile = apply_quirks(&super::pin::defaults(pin_length), reader, platform);

    if format_mode == FormatMode::Human {
        match find_quirk(reader) {
            Some(quirk) => println!("Reader model: {} ({:?} host)", quirk.model, platform),
            None => println!("Reader model: unknown, defaults apply ({:?} host)", platform),
        }
        print!("{}", format_profile(&profile));
        println!();
    }

    for operation in [PinOperation::Verify, PinOperation::Modify] {
        let structure = encode(&profile, operation);
        println!("{}", format_structure(operation, &structure, format_mode));
    }

    if profile == ReaderProfile::default() && format_mode == FormatMode::Human {
        println!("(profile equals the built-in defaults)");
    }

    ExitCode::SUCCESS
}
