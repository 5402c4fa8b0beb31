use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use chv_common::HostPlatform;
use tracing_subscriber::EnvFilter;

mod commands;
mod formatters;
mod prompt;

use formatters::FormatMode;

#[derive(Parser)]
#[command(name = "chv")]
#[command(about = "Card holder verification - verify and change card PINs through pinpad readers")]
#[command(version)]
struct Args {
    /// Output format mode
    #[arg(short, long, global = true, value_enum, default_value_t = FormatMode::Human)]
    format: FormatMode,

    /// Host platform used for control codes and reader quirks
    #[arg(long, global = true, value_enum, default_value_t = PlatformArg::Auto)]
    platform: PlatformArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available PC/SC readers
    Readers,

    /// Show a reader's secure PIN entry features and selected entry paths
    Features {
        /// Reader name (default: first reader)
        #[arg(short, long)]
        reader: Option<String>,
    },

    /// Print the PIN_VERIFY and PIN_MODIFY structures built for a reader name
    Structures {
        /// Reader display name used for the quirk lookup
        reader: String,

        /// Maximum PIN length
        #[arg(long)]
        pin_length: Option<u8>,
    },

    /// Verify the card holder PIN
    Verify {
        /// Reader name (default: first reader)
        #[arg(short, long)]
        reader: Option<String>,

        /// Maximum PIN length
        #[arg(long)]
        pin_length: Option<u8>,
    },

    /// Change the card holder PIN
    Modify {
        /// Reader name (default: first reader)
        #[arg(short, long)]
        reader: Option<String>,

        /// Maximum PIN length
        #[arg(long)]
        pin_length: Option<u8>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PlatformArg {
    /// Detect from the build target
    Auto,
    Windows,
    Unix,
}

impl From<PlatformArg> for HostPlatform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Auto => HostPlatform::detect(),
            PlatformArg::Windows => HostPlatform::Windows,
            PlatformArg::Unix => HostPlatform::Unix,
        }
    }
}

fn main() -> ExitCode {
    // Set RUST_LOG=debug for protocol steps, RUST_LOG=trace for every key press poll
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let platform = HostPlatform::from(args.platform);

    match args.command {
        Command::Readers => commands::readers::cmd_readers(args.format),
        Command::Features { reader } => {
            commands::features::cmd_features(reader.as_deref(), platform, args.format)
        }
        Command::Structures { reader, pin_length } => {
            commands::structures::cmd_structures(&reader, platform, pin_length, args.format)
        }
        Command::Verify { reader, pin_length } => commands::pin::cmd_verify(
            reader.as_deref(),
            platform,
            pin_length,
        ),
        Command::Modify { reader, pin_length } => commands::pin::cmd_modify(
            reader.as_deref(),
            platform,
            pin_length,
        ),
    }
}
