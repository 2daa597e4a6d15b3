//! Scripted card link for tests and offline replays
//!
//! Responses are keyed by the exact command bytes, or by a command prefix for
//! commands carrying terminal data that changes between runs (unpredictable
//! number, transaction date). Unknown commands answer `6A82` (file not
//! found), which is what most cards return for an unsupported SELECT or READ
//! RECORD.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::transport::CardLink;

/// Failure injected by a [`MockLink`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MockError {
    #[error("connection refused")]
    ConnectRefused,
    #[error("card removed during command {0}")]
    CardRemoved(String),
}

#[derive(Debug, Default)]
struct LogInner {
    sent: Vec<Vec<u8>>,
    connect_calls: usize,
    close_calls: usize,
}

/// Shared view of everything a [`MockLink`] was asked to do
#[derive(Debug, Clone, Default)]
pub struct MockLog {
    inner: Arc<Mutex<LogInner>>,
}

impl MockLog {
    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every command sent, in order
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    /// Whether a command starting with `prefix` was sent
    pub fn was_sent(&self, prefix: &[u8]) -> bool {
        self.lock().sent.iter().any(|cmd| cmd.starts_with(prefix))
    }
}

/// In-memory [`CardLink`] answering from a fixed script
#[derive(Debug, Default)]
pub struct MockLink {
    responses: HashMap<Vec<u8>, Vec<u8>>,
    prefix_responses: Vec<(Vec<u8>, Vec<u8>)>,
    fail_on: Vec<Vec<u8>>,
    fail_after: Option<usize>,
    fail_connect: bool,
    atr: Option<Vec<u8>>,
    log: MockLog,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` with `response` (data followed by SW1 SW2)
    pub fn respond(mut self, command: impl Into<Vec<u8>>, response: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(command.into(), response.into());
        self
    }

    /// Answer any command starting with `prefix` that has no exact entry.
    /// Earlier prefixes win.
    pub fn respond_prefix(mut self, prefix: impl Into<Vec<u8>>, response: impl Into<Vec<u8>>) -> Self {
        self.prefix_responses.push((prefix.into(), response.into()));
        self
    }

    /// Fail with a transport error when `command` is sent
    pub fn fail_on(mut self, command: impl Into<Vec<u8>>) -> Self {
        self.fail_on.push(command.into());
        self
    }

    /// Fail every exchange after the first `count` succeeded
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn with_atr(mut self, atr: impl Into<Vec<u8>>) -> Self {
        self.atr = Some(atr.into());
        self
    }

    /// Handle on the call log, usable after the link has been moved into a
    /// session
    pub fn log(&self) -> MockLog {
        self.log.clone()
    }
}

impl CardLink for MockLink {
    type Error = MockError;

    fn connect(&mut self) -> Result<(), MockError> {
        self.log.lock().connect_calls += 1;
        if self.fail_connect {
            return Err(MockError::ConnectRefused);
        }
        Ok(())
    }

    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, MockError> {
        let exchanged = {
            let mut log = self.log.lock();
            log.sent.push(command.to_vec());
            log.sent.len()
        };

        let removed = self.fail_on.iter().any(|cmd| cmd == command)
            || self.fail_after.map_or(false, |limit| exchanged > limit);
        if removed {
            return Err(MockError::CardRemoved(hex::encode_upper(command)));
        }

        let scripted = self.responses.get(command).or_else(|| {
            self.prefix_responses
                .iter()
                .find(|(prefix, _)| command.starts_with(prefix))
                .map(|(_, response)| response)
        });
        Ok(scripted.cloned().unwrap_or_else(|| vec![0x6A, 0x82]))
    }

    fn close(&mut self) -> Result<(), MockError> {
        self.log.lock().close_calls += 1;
        Ok(())
    }

    fn answer_to_reset(&mut self) -> Option<Vec<u8>> {
        self.atr.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_is_not_found() {
        let mut link = MockLink::new();
        assert_eq!(link.transceive(&[0x00, 0xB2]).unwrap(), vec![0x6A, 0x82]);
    }

    #[test]
    fn exact_entry_wins_over_prefix() {
        let mut link = MockLink::new()
            .respond_prefix([0x80, 0xA8], [0x69, 0x85])
            .respond([0x80, 0xA8, 0x00, 0x00, 0x00], [0x90, 0x00]);
        assert_eq!(link.transceive(&[0x80, 0xA8, 0x00, 0x00, 0x00]).unwrap(), vec![0x90, 0x00]);
        assert_eq!(link.transceive(&[0x80, 0xA8, 0x00, 0x00, 0x02, 0x83, 0x00]).unwrap(), vec![0x69, 0x85]);
        assert_eq!(link.transceive(&[0x00, 0xA8]).unwrap(), vec![0x6A, 0x82]);
    }

    #[test]
    fn fail_after_counts_exchanges() {
        let mut link = MockLink::new().respond([0x01], [0x90, 0x00]).fail_after(1);
        let log = link.log();
        assert!(link.transceive(&[0x01]).is_ok());
        assert!(matches!(
            link.transceive(&[0x01]),
            Err(MockError::CardRemoved(_))
        ));
        assert_eq!(log.sent().len(), 2);
    }
}
