use std::process::ExitCode;

use emv_card::CardReader;

/// List the PC/SC readers and whether a card sits on each
pub fn cmd_readers() -> ExitCode {
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

    if names.is_empty() {
        println!("No card readers found");
        return ExitCode::SUCCESS;
    }

    for name in names {
        let status = match reader.is_card_present(&name) {
            Ok(true) => "card present".to_string(),
            Ok(false) => "no card".to_string(),
            Err(err) => format!("unavailable: {}", err),
        };
        println!("{}  [{}]", name, status);
    }

    ExitCode::SUCCESS
}
