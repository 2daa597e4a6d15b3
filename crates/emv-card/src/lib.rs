//! EMV Card - Smart card reading and EMV protocol implementation
//!
//! This crate turns a freshly detected payment card into a [`CardRecord`]:
//! it discovers the payment applications, reads each one with SELECT, GET
//! PROCESSING OPTIONS and READ RECORD, and extracts the card number, expiry,
//! holder name and track data. Cards are reached through the [`CardLink`]
//! trait; [`PcscLink`] binds it to PC/SC readers.

pub mod apdu;
pub mod application;
pub mod bcd;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod metadata;
pub mod mock;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod terminal;
pub mod transport;

pub use apdu::{ApduCommand, ApduResponse};
pub use config::ReadConfig;
pub use discovery::{aids, ApplicationCandidate};
pub use error::{Error, Result};
pub use mock::{MockLink, MockLog};
pub use pipeline::EmvReader;
pub use reader::{CardReader, PcscLink};
pub use record::{ApplicationSummary, CardRecord, CardState, Track1, Track2, TransactionRecord};
pub use terminal::TerminalDefaults;
pub use transport::{CardLink, Session, SessionState};

/// Re-export commonly used types
pub use pcsc::Error as PcscError;
