//! Pipeline orchestration: one detected card in, one card record out

use emv_common::tags;
use tracing::{info, warn};

use crate::application::{get_data, ApplicationData, ApplicationReader};
use crate::config::ReadConfig;
use crate::discovery::discover;
use crate::error::Result;
use crate::extract::{extract, CollectedData};
use crate::record::CardRecord;
use crate::transport::{CardLink, Session};

/// Reads payment cards according to a fixed [`ReadConfig`].
///
/// The reader holds no per-card state; one instance can serve any number of
/// cards, from any thread.
#[derive(Debug, Clone, Default)]
pub struct EmvReader {
    config: ReadConfig,
}

impl EmvReader {
    pub fn new(config: ReadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReadConfig {
        &self.config
    }

    /// Read the card behind `link`.
    ///
    /// Never fails: faults are reported through the record's state, and
    /// whatever was read before the fault is kept. The link is closed on
    /// every path.
    pub fn handle<L: CardLink>(&self, link: L) -> CardRecord {
        let mut session = Session::new(link);
        let mut collected = CollectedData::default();

        if let Err(err) = self.run(&mut session, &mut collected) {
            warn!(error = %err, "Card read aborted");
            collected.failure = Some(err);
        }

        if let Err(err) = session.close() {
            warn!(error = %err, "Failed to close card session");
        }

        let record = extract(&collected);
        info!(
            state = %record.state,
            scheme = record.scheme.as_deref().unwrap_or("unknown"),
            "Card read finished"
        );
        record
    }

    fn run<L: CardLink>(&self, session: &mut Session<L>, collected: &mut CollectedData) -> Result<()> {
        session.connect()?;

        if self.config.read_at {
            collected.atr = session.answer_to_reset()?;
        }

        if self.config.read_cplc {
            collected.cplc = match get_data(session, tags::CPLC) {
                Ok(cplc) => cplc,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(error = %err, "CPLC unavailable");
                    None
                }
            };
        }

        let candidates = discover(session, &self.config)?;
        if candidates.is_empty() {
            info!("No payment application on card");
            return Ok(());
        }

        let reader = ApplicationReader::new(&self.config);
        for candidate in candidates {
            let mut data = ApplicationData::new(candidate);
            let result = reader.read(session, &mut data);
            let aid = data.candidate.aid_hex();
            collected.applications.push(data);

            match result {
                Ok(()) => {
                    if !self.config.read_all_aids {
                        break;
                    }
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!(aid = %aid, error = %err, "Skipping application"),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::commands;
    use crate::discovery::aids;
    use crate::mock::MockLink;
    use crate::record::CardState;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn reader_is_shareable() {
        assert_send_sync::<EmvReader>();
    }

    #[test]
    fn connect_failure_is_unknown_error() {
        let link = MockLink::new().fail_connect();
        let log = link.log();
        let record = EmvReader::default().handle(link);
        assert_eq!(record.state, CardState::UnknownError);
        assert_eq!(log.close_calls(), 0);
    }

    #[test]
    fn atr_is_captured_when_enabled() {
        let link = MockLink::new().with_atr([0x3B, 0x88, 0x80, 0x01]);
        let record = EmvReader::default().handle(link);
        assert_eq!(record.at.as_deref(), Some("3B888001"));
        assert_eq!(record.state, CardState::NoSelectedApplication);

        let link = MockLink::new().with_atr([0x3B, 0x88, 0x80, 0x01]);
        let record = EmvReader::new(ReadConfig::default().read_at(false)).handle(link);
        assert_eq!(record.at, None);
    }

    #[test]
    fn cplc_is_requested_only_when_enabled() {
        let link = MockLink::new();
        let log = link.log();
        EmvReader::default().handle(link);
        assert!(!log.was_sent(&commands::get_data([0x9F, 0x7F]).encode()));

        let link = MockLink::new();
        let log = link.log();
        EmvReader::new(ReadConfig::default().read_cplc(true)).handle(link);
        assert_eq!(log.sent()[0], commands::get_data([0x9F, 0x7F]).encode());
        assert!(log.was_sent(&commands::select(aids::PPSE).unwrap().encode()));
    }
}
