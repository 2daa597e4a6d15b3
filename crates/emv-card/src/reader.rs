//! PC/SC card reader management

use std::ffi::{CStr, CString};

use pcsc::{Attribute, Card, Context, Disposition, Protocols, Scope, ShareMode};
use tracing::debug;

use crate::transport::CardLink;

/// Card reader wrapper for managing PC/SC connections
pub struct CardReader {
    context: Context,
}

impl CardReader {
    /// Create a new CardReader by establishing a PC/SC context
    pub fn new() -> Result<Self, pcsc::Error> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }

    /// List all available card readers
    pub fn list_readers(&self) -> Result<Vec<String>, pcsc::Error> {
        let mut readers_buf = [0; 2048];
        let readers = self.context.list_readers(&mut readers_buf)?;

        Ok(readers
            .map(|r| r.to_string_lossy().into_owned())
            .collect())
    }

    /// Name of the first available reader
    pub fn first_reader(&self) -> Result<String, pcsc::Error> {
        self.list_readers()?
            .into_iter()
            .next()
            .ok_or(pcsc::Error::NoReadersAvailable)
    }

    /// Whether a card currently sits on `reader`
    pub fn is_card_present(&self, reader: &str) -> Result<bool, pcsc::Error> {
        let name = reader_cstring(reader)?;
        match self.context.connect(&name, ShareMode::Shared, Protocols::ANY) {
            Ok(_card) => Ok(true),
            Err(pcsc::Error::NoSmartcard)
            | Err(pcsc::Error::RemovedCard)
            | Err(pcsc::Error::UnresponsiveCard)
            | Err(pcsc::Error::UnpoweredCard) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// A not yet connected link to the card on `reader`
    pub fn link(&self, reader: &str) -> Result<PcscLink, pcsc::Error> {
        Ok(PcscLink {
            context: self.context.clone(),
            reader: reader_cstring(reader)?,
            card: None,
        })
    }
}

fn reader_cstring(reader: &str) -> Result<CString, pcsc::Error> {
    CString::new(reader).map_err(|_| pcsc::Error::UnknownReader)
}

/// [`CardLink`] over a PC/SC card handle
pub struct PcscLink {
    context: Context,
    reader: CString,
    card: Option<Card>,
}

impl PcscLink {
    pub fn reader_name(&self) -> &CStr {
        &self.reader
    }

    fn card(&self) -> Result<&Card, pcsc::Error> {
        self.card.as_ref().ok_or(pcsc::Error::InvalidHandle)
    }
}

impl CardLink for PcscLink {
    type Error = pcsc::Error;

    fn connect(&mut self) -> Result<(), pcsc::Error> {
        let card = self
            .context
            .connect(&self.reader, ShareMode::Shared, Protocols::ANY)?;
        debug!(reader = %self.reader.to_string_lossy(), "Connected to card");
        self.card = Some(card);
        Ok(())
    }

    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, pcsc::Error> {
        let mut buffer = [0u8; pcsc::MAX_BUFFER_SIZE_EXTENDED];
        let response = self.card()?.transmit(command, &mut buffer)?;
        Ok(response.to_vec())
    }

    fn close(&mut self) -> Result<(), pcsc::Error> {
        match self.card.take() {
            Some(card) => card
                .disconnect(Disposition::LeaveCard)
                .map_err(|(_, err)| err),
            None => Ok(()),
        }
    }

    fn answer_to_reset(&mut self) -> Option<Vec<u8>> {
        self.card
            .as_ref()?
            .get_attribute_owned(Attribute::AtrString)
            .ok()
    }
}
