use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use emv_card::ReadConfig;
use tracing_subscriber::EnvFilter;

mod commands;
mod formatters;
mod tui;

use formatters::FormatMode;

#[derive(Parser)]
#[command(name = "emv-paycard")]
#[command(about = "EMV Paycard Reader - Read payment application data from contactless cards")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Output format mode
    #[arg(short, long, value_enum, default_value_t = FormatMode::Human, global = true)]
    format: FormatMode,

    /// PC/SC reader to use (default: first reader)
    #[arg(short, long, global = true)]
    reader: Option<String>,

    #[command(flatten)]
    read: ReadFlags,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Read the card currently on the reader (default)
    Read,
    /// List card readers
    Readers,
    /// Watch the reader and show every card presented in a terminal UI
    Watch,
}

/// Overrides applied on top of the read configuration
#[derive(clap::Args)]
struct ReadFlags {
    /// JSON file with a read configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the contact directory (1PAY.SYS.DDF01) instead of PPSE
    #[arg(long, global = true)]
    contact: bool,

    /// Stop after the first application that reads successfully
    #[arg(long, global = true)]
    first_only: bool,

    /// Skip the transaction log
    #[arg(long, global = true)]
    no_transactions: bool,

    /// Do not capture ATR/ATS bytes
    #[arg(long, global = true)]
    no_at: bool,

    /// Request the CPLC block (not supported by every card)
    #[arg(long, global = true)]
    cplc: bool,
}

impl ReadFlags {
    fn load(&self) -> Result<ReadConfig, String> {
        let mut config = match self.config {
            Some(ref path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|err| format!("Failed to read {}: {}", path.display(), err))?;
                serde_json::from_str::<ReadConfig>(&text)
                    .map_err(|err| format!("Invalid config {}: {}", path.display(), err))?
            }
            None => ReadConfig::default(),
        };

        if self.contact {
            config = config.contactless(false);
        }
        if self.first_only {
            config = config.read_all_aids(false);
        }
        if self.no_transactions {
            config = config.read_transactions(false);
        }
        if self.no_at {
            config = config.read_at(false);
        }
        if self.cplc {
            config = config.read_cplc(true);
        }

        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Read);

    // Set RUST_LOG=debug for detailed logs, RUST_LOG=emv_card::apdu=debug
    // for the APDU trace. The TUI owns the terminal, so it logs nothing
    // unless asked to.
    let default_filter = if command == Command::Watch { "off" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match args.read.load() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Read => commands::read::cmd_read(config, args.reader.as_deref(), args.format),
        Command::Readers => commands::readers::cmd_readers(),
        Command::Watch => match tui::run_tui(config, args.reader) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error running TUI: {}", err);
                ExitCode::FAILURE
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from(["emv-paycard", "read", "--first-only", "--no-at", "--cplc"]);
        let config = args.read.load().unwrap();
        assert!(!config.read_all_aids);
        assert!(!config.read_at);
        assert!(config.read_cplc);
        assert!(config.contactless);
    }

    #[test]
    fn read_is_the_default_command() {
        let args = Args::parse_from(["emv-paycard", "--format", "json"]);
        assert!(args.command.is_none());
        assert!(args.format == FormatMode::Json);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let args = Args::parse_from(["emv-paycard", "--config", "/nonexistent/emv.json"]);
        assert!(args.read.load().unwrap_err().contains("/nonexistent/emv.json"));
    }
}
