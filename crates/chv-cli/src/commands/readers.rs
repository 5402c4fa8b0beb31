use std::process::ExitCode;

use chv_card::quirks::find_quirk;
use chv_card::CardReader;

use crate::formatters::FormatMode;

pub fn cmd_readers(format_mode: FormatMode) -> ExitCode {
    let reader = match CardReader::new() {
        Ok(r) => r,
        Err(err) => {
            eprintln!("Failed to establish PC/SC context: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let names = match reader.list_readers() {
        Ok(names) => names,
        Err(err) => {
            eprintln!("Failed to list readers: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if names.is_empty() && format_mode == FormatMode::Human {
        println!("No readers found");
    }

    for name in &names {
        match (format_mode, find_quirk(name)) {
            (FormatMode::Human, Some(quirk)) => println!("{}  [{}]", name, quirk.model),
            _ => println!("{}", name),
        }
    }

    ExitCode::SUCCESS
}
