use std::process::ExitCode;

use emv_card::{CardState, EmvReader, ReadConfig};
use tracing::info;

use crate::formatters::{format_record, FormatMode};

use super::open_reader;

/// Read the card on the reader once and print its record
pub fn cmd_read(config: ReadConfig, reader_name: Option<&str>, format_mode: FormatMode) -> ExitCode {
    let (reader, name) = match open_reader(reader_name) {
        Ok(opened) => opened,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    match reader.is_card_present(&name) {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("No card on reader {}", name);
            eprintln!("Please ensure a card is present on the reader");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("Failed to query reader {}: {}", name, err);
            return ExitCode::FAILURE;
        }
    }

    let link = match reader.link(&name) {
        Ok(link) => link,
        Err(err) => {
            eprintln!("Invalid reader name {:?}: {}", name, err);
            return ExitCode::FAILURE;
        }
    };

    info!(reader = %name, "Reading card");
    let record = EmvReader::new(config).handle(link);

    if format_mode != FormatMode::Json {
        println!("EMV Paycard Reader - {} Mode\n", format_mode.description());
        println!("Reader: {}\n", name);
    }
    println!("{}", format_record(&record, format_mode));

    match record.state {
        CardState::Read => ExitCode::SUCCESS,
        CardState::UnknownError => {
            eprintln!("Card read was interrupted; the record above is partial");
            ExitCode::FAILURE
        }
        CardState::NoSelectedApplication | CardState::DataNotFound => ExitCode::from(2),
    }
}
