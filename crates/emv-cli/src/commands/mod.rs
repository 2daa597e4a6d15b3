pub mod read;
pub mod readers;

use emv_card::CardReader;

/// Establish the PC/SC context and pick the reader to use
pub(crate) fn open_reader(reader_name: Option<&str>) -> Result<(CardReader, String), String> {
    let reader = CardReader::new()
        .map_err(|err| format!("Failed to establish PC/SC context: {}", err))?;

    let name = match reader_name {
        Some(name) => name.to_string(),
        None => reader
            .first_reader()
            .map_err(|err| format!("No card reader available: {}", err))?,
    };

    Ok((reader, name))
}
