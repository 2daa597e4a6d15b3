//! Hardware-dependent integration tests
//!
//! These tests require a physical EMV card in a card reader.
//! They are ignored by default and must be explicitly run with:
//!
//!     cargo test --package emv-card --test hardware_integration -- --ignored
//!
//! Or to run all tests including hardware tests:
//!
//!     cargo test --package emv-card --test hardware_integration -- --include-ignored

use emv_card::apdu::commands;
use emv_card::reader::CardReader;
use emv_card::{aids, CardState, EmvReader, ReadConfig, Session};

/// Test that we can connect to a card reader
///
/// **Requires**: Card reader connected (card not required)
#[test]
#[ignore = "requires hardware: card reader"]
fn test_connect_to_reader() {
    let reader = CardReader::new().expect("Failed to establish PC/SC context");
    let readers = reader.list_readers().expect("Failed to list readers");
    assert!(!readers.is_empty(), "No card reader connected");
}

/// Test that we can detect an inserted card
///
/// **Requires**: Card reader with card inserted
#[test]
#[ignore = "requires hardware: card inserted in reader"]
fn test_card_present() {
    let reader = CardReader::new().expect("Failed to establish PC/SC context");
    let name = reader.first_reader().expect("No reader available");

    println!("Using reader: {}", name);
    assert!(reader.is_card_present(&name).expect("Failed to probe reader"));
}

/// Test selecting the contactless payment directory
///
/// **Requires**: contactless EMV card on the reader
#[test]
#[ignore = "requires hardware: contactless EMV card"]
fn test_select_ppse() {
    let reader = CardReader::new().expect("Failed to establish PC/SC context");
    let name = reader.first_reader().expect("No reader available");
    let mut session = Session::new(reader.link(&name).expect("Invalid reader name"));
    session.connect().expect("Failed to connect to card");

    let response = session
        .send(&commands::select(aids::PPSE).unwrap())
        .expect("SELECT PPSE failed at transport level");
    println!("PPSE: {} ({})", response.status_string(), response.describe());
    assert!(response.is_success());

    session.close().expect("Failed to release card");
}

/// Full pipeline run against a real card
///
/// **Requires**: EMV card (credit/debit card) on the reader
#[test]
#[ignore = "requires hardware: EMV card"]
fn test_read_card() {
    let reader = CardReader::new().expect("Failed to establish PC/SC context");
    let name = reader.first_reader().expect("No reader available");
    let link = reader.link(&name).expect("Invalid reader name");

    let record = EmvReader::new(ReadConfig::default()).handle(link);

    println!("State: {}", record.state);
    println!("Scheme: {:?}", record.scheme);
    println!("AIDs: {:?}", record.aids);
    assert_eq!(record.state, CardState::Read);
    assert!(record.card_number.is_some());
}
