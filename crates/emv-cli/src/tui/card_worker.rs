use emv_card::{CardReader, CardRecord, EmvReader};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Messages sent from the card worker to the UI
#[derive(Debug, Clone)]
pub enum CardEvent {
    /// Card was detected
    CardDetected { reader_name: String },
    /// Card was removed
    CardRemoved,
    /// Card data reading started
    ReadingStarted,
    /// The pipeline finished with this record
    RecordReady { record: Box<CardRecord> },
    /// Error occurred
    Error { message: String },
    /// Reader is unavailable
    ReaderUnavailable { error: String },
    /// Reader became available
    ReaderAvailable,
}

/// Commands sent from the UI to the card worker
#[derive(Debug)]
pub enum CardCommand {
    /// Stop the worker thread
    Stop,
    /// Read the card on the reader again
    Reread,
}

/// Background worker for card operations
pub struct CardWorker {
    emv_reader: EmvReader,
    reader_name: Option<String>,
    event_tx: Sender<CardEvent>,
    command_rx: Receiver<CardCommand>,
}

impl CardWorker {
    /// Spawn a new card worker thread
    pub fn spawn(
        emv_reader: EmvReader,
        reader_name: Option<String>,
    ) -> (Receiver<CardEvent>, Sender<CardCommand>) {
        let (event_tx, event_rx) = mpsc::channel();
        let (command_tx, command_rx) = mpsc::channel();

        thread::spawn(move || {
            let worker = CardWorker {
                emv_reader,
                reader_name,
                event_tx,
                command_rx,
            };
            worker.run();
        });

        (event_rx, command_tx)
    }

    fn send(&self, event: CardEvent) {
        let _ = self.event_tx.send(event);
    }

    fn run(self) {
        info!("Card worker thread started");

        let mut reader: Option<CardReader> = None;
        let mut card_present = false;
        let mut last_reader_check: Option<Instant> = None;

        loop {
            // Check for commands (non-blocking)
            match self.command_rx.try_recv() {
                Ok(CardCommand::Stop) => {
                    info!("Card worker stopping");
                    break;
                }
                Ok(CardCommand::Reread) => {
                    debug!("Re-read requested");
                    card_present = false;
                }
                Err(_) => {}
            }

            // Try to get reader if we don't have one (check every 2 seconds)
            let due = last_reader_check.map_or(true, |at| at.elapsed() > Duration::from_secs(2));
            if reader.is_none() && due {
                match CardReader::new() {
                    Ok(r) => {
                        info!("Card reader initialized");
                        reader = Some(r);
                        self.send(CardEvent::ReaderAvailable);
                    }
                    Err(e) => {
                        debug!("Card reader unavailable: {}", e);
                        self.send(CardEvent::ReaderUnavailable {
                            error: e.to_string(),
                        });
                    }
                }
                last_reader_check = Some(Instant::now());
            }

            if let Some(ref r) = reader {
                match self.poll(r, card_present) {
                    Ok(present) => card_present = present,
                    Err(e) => {
                        warn!(error = %e, "Lost card reader");
                        self.send(CardEvent::ReaderUnavailable {
                            error: e.to_string(),
                        });
                        reader = None;
                        if card_present {
                            card_present = false;
                            self.send(CardEvent::CardRemoved);
                        }
                    }
                }
            }

            // Sleep briefly to avoid busy loop
            thread::sleep(Duration::from_millis(250));
        }

        info!("Card worker thread stopped");
    }

    /// One presence check. A newly arrived card is read right away; a card
    /// that stays on the reader is not read again.
    fn poll(&self, reader: &CardReader, was_present: bool) -> Result<bool, emv_card::PcscError> {
        let reader_name = match self.reader_name {
            Some(ref name) => name.clone(),
            None => reader.first_reader()?,
        };

        let present = reader.is_card_present(&reader_name)?;
        if present && !was_present {
            info!(reader = %reader_name, "Card detected");
            self.send(CardEvent::CardDetected {
                reader_name: reader_name.clone(),
            });
            self.send(CardEvent::ReadingStarted);

            match reader.link(&reader_name) {
                Ok(link) => {
                    let record = self.emv_reader.handle(link);
                    self.send(CardEvent::RecordReady {
                        record: Box::new(record),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Failed to open card link");
                    self.send(CardEvent::Error {
                        message: format!("Failed to read card: {}", e),
                    });
                }
            }
        } else if !present && was_present {
            info!("Card removed");
            self.send(CardEvent::CardRemoved);
        }

        Ok(present)
    }
}
