//! Reading one payment application: SELECT, GPO, AFL records and the
//! transaction log

use emv_common::{decode, find_value, get_tag_name, parse_dol, tags, Tlv};
use tracing::{debug, info, warn};

use crate::apdu::commands;
use crate::config::ReadConfig;
use crate::discovery::ApplicationCandidate;
use crate::error::{Error, Result};
use crate::record::TransactionRecord;
use crate::transport::{CardLink, Session};

/// One entry of the Application File Locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AflEntry {
    pub sfi: u8,
    pub first_record: u8,
    pub last_record: u8,
    /// Number of records involved in offline data authentication
    pub offline_records: u8,
}

/// Split AFL bytes into four-byte entries, dropping entries that name no
/// readable range
pub fn parse_afl(afl: &[u8]) -> Vec<AflEntry> {
    afl.chunks_exact(4)
        .map(|chunk| AflEntry {
            sfi: chunk[0] >> 3,
            first_record: chunk[1],
            last_record: chunk[2],
            offline_records: chunk[3],
        })
        .filter(|entry| {
            entry.sfi != 0 && entry.first_record != 0 && entry.first_record <= entry.last_record
        })
        .collect()
}

/// AFL from a GPO response in format 1 (`80`: AIP then AFL) or format 2
/// (`77` holding `82` and `94`)
pub fn afl_from_processing_options(nodes: &[Tlv]) -> Vec<AflEntry> {
    if let Some(format1) = find_value(nodes, tags::RESPONSE_MESSAGE_TEMPLATE_FORMAT_1) {
        return format1.get(2..).map(parse_afl).unwrap_or_default();
    }
    find_value(nodes, tags::AFL).map(parse_afl).unwrap_or_default()
}

/// Location and size of the transaction log (tag 9F4D)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub sfi: u8,
    pub count: u8,
}

impl LogEntry {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [sfi, count, ..] if *sfi != 0 && *count != 0 => Some(Self {
                sfi: *sfi,
                count: *count,
            }),
            _ => None,
        }
    }
}

/// Everything read from one application, kept even when reading stopped
/// half way
#[derive(Debug, Clone, Default)]
pub struct ApplicationData {
    pub candidate: ApplicationCandidate,
    /// SELECT by AID answered 9000
    pub selected: bool,
    pub fci: Vec<Tlv>,
    pub processing_options: Vec<Tlv>,
    pub records: Vec<Vec<Tlv>>,
    pub transactions: Vec<TransactionRecord>,
    /// Application Transaction Counter (9F36)
    pub transaction_counter: Option<u16>,
    /// PIN tries left (9F17)
    pub pin_try_counter: Option<u8>,
}

impl ApplicationData {
    pub fn new(candidate: ApplicationCandidate) -> Self {
        Self {
            candidate,
            ..Self::default()
        }
    }

    /// First value for `tag`, searching the FCI, the GPO response and then
    /// the records in read order
    pub fn find_value(&self, tag: impl AsRef<[u8]>) -> Option<&[u8]> {
        let tag = tag.as_ref();
        std::iter::once(&self.fci)
            .chain(std::iter::once(&self.processing_options))
            .chain(self.records.iter())
            .find_map(|nodes| find_value(nodes, tag))
    }
}

/// Runs the per-application command sequence
pub struct ApplicationReader<'a> {
    config: &'a ReadConfig,
}

impl<'a> ApplicationReader<'a> {
    pub fn new(config: &'a ReadConfig) -> Self {
        Self { config }
    }

    /// Read the application named by `data.candidate` into `data`.
    ///
    /// SELECT and GPO failures end this application only. Records that fail
    /// are skipped.
    pub fn read<L: CardLink>(&self, session: &mut Session<L>, data: &mut ApplicationData) -> Result<()> {
        let aid = data.candidate.aid_hex();

        let response = session.send(&commands::select(&data.candidate.aid)?)?;
        if !response.is_success() {
            return Err(Error::ApplicationSelect {
                aid,
                status: response.status_word(),
            });
        }
        data.selected = true;
        data.fci = decode(&response.data)?;
        info!(aid = %aid, "Application selected");

        let pdol = find_value(&data.fci, tags::PDOL).unwrap_or_default();
        let pdol_data = self.config.terminal.build_dol_data(pdol)?;
        let command_data = Tlv::primitive(tags::COMMAND_TEMPLATE.0, pdol_data).to_bytes();

        let response = session.send(&commands::get_processing_options(command_data)?)?;
        if !response.is_success() {
            return Err(Error::ProcessingOptions {
                status: response.status_word(),
            });
        }
        data.processing_options = decode(&response.data)?;

        let afl = afl_from_processing_options(&data.processing_options);
        debug!(aid = %aid, entries = afl.len(), "Processing options received");
        self.read_records(session, &afl, data)?;
        self.read_counters(session, data)?;

        if self.config.read_transactions {
            self.read_transaction_log(session, data)?;
        }

        Ok(())
    }

    fn read_records<L: CardLink>(
        &self,
        session: &mut Session<L>,
        afl: &[AflEntry],
        data: &mut ApplicationData,
    ) -> Result<()> {
        for entry in afl {
            for record in entry.first_record..=entry.last_record {
                let response = session.send(&commands::read_record(record, entry.sfi))?;
                if !response.is_success() {
                    warn!(
                        sfi = entry.sfi,
                        record,
                        status = %response.status_string(),
                        "READ RECORD failed: {}",
                        response.describe()
                    );
                    continue;
                }

                match decode(&response.data) {
                    Ok(nodes) => {
                        for node in nodes.iter().flat_map(|n| n.children()) {
                            debug!(
                                sfi = entry.sfi,
                                record,
                                tag = %hex::encode_upper(node.tag()),
                                "{}",
                                get_tag_name(node.tag())
                            );
                        }
                        data.records.push(nodes);
                    }
                    Err(err) => warn!(sfi = entry.sfi, record, error = %err, "Skipping undecodable record"),
                }
            }
        }
        Ok(())
    }

    /// ATC and PIN try counter, from the data already read or through GET
    /// DATA. A card refusing either leaves it empty.
    fn read_counters<L: CardLink>(&self, session: &mut Session<L>, data: &mut ApplicationData) -> Result<()> {
        let atc = match data.find_value(tags::APPLICATION_TRANSACTION_COUNTER) {
            Some(value) => Some(value.to_vec()),
            None => get_data(session, tags::APPLICATION_TRANSACTION_COUNTER)?,
        };
        data.transaction_counter = match atc.as_deref() {
            Some([high, low]) => Some(u16::from_be_bytes([*high, *low])),
            _ => None,
        };

        let pin_tries = match data.find_value(tags::PIN_TRY_COUNTER) {
            Some(value) => Some(value.to_vec()),
            None => get_data(session, tags::PIN_TRY_COUNTER)?,
        };
        data.pin_try_counter = match pin_tries.as_deref() {
            Some([tries]) => Some(*tries),
            _ => None,
        };

        debug!(
            atc = ?data.transaction_counter,
            pin_tries = ?data.pin_try_counter,
            "Application counters"
        );
        Ok(())
    }

    fn read_transaction_log<L: CardLink>(
        &self,
        session: &mut Session<L>,
        data: &mut ApplicationData,
    ) -> Result<()> {
        let log_entry = match find_value(&data.fci, tags::LOG_ENTRY) {
            Some(value) => Some(value.to_vec()),
            None => get_data(session, tags::LOG_ENTRY)?,
        };
        let Some(log) = log_entry.as_deref().and_then(LogEntry::parse) else {
            debug!("Application has no transaction log");
            return Ok(());
        };

        let Some(format) = get_data(session, tags::LOG_FORMAT)? else {
            debug!("Card did not return a log format");
            return Ok(());
        };
        let format = match parse_dol(&format) {
            Ok(format) => format,
            Err(err) => {
                warn!(error = %err, "Unreadable log format");
                return Ok(());
            }
        };

        for record in 1..=log.count {
            let response = session.send(&commands::read_record(record, log.sfi))?;
            if !response.is_success() {
                debug!(record, status = %response.status_string(), "End of transaction log");
                break;
            }
            data.transactions.push(TransactionRecord::from_log(&format, &response.data));
        }

        info!(count = data.transactions.len(), "Transaction log read");
        Ok(())
    }
}

/// GET DATA for `tag`. The TLV wrapper the card puts around the value is
/// removed when present.
pub fn get_data<L: CardLink>(session: &mut Session<L>, tag: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
    let tag = tag.as_ref();
    let response = session.send(&commands::get_data(tag))?;
    if !response.is_success() {
        debug!(
            tag = %hex::encode_upper(tag),
            status = %response.status_string(),
            "GET DATA refused"
        );
        return Ok(None);
    }

    let unwrapped = match decode(&response.data).as_deref() {
        Ok([node]) if node.tag() == tag => node.bytes().map(<[u8]>::to_vec),
        _ => None,
    };
    Ok(Some(unwrapped.unwrap_or(response.data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::aids;
    use crate::mock::MockLink;
    use crate::terminal::TerminalDefaults;
    use chrono::NaiveDate;
    use emv_common::encode;

    fn ok(nodes: &[Tlv]) -> Vec<u8> {
        let mut bytes = encode(nodes);
        bytes.extend([0x90, 0x00]);
        bytes
    }

    fn config() -> ReadConfig {
        ReadConfig::default().terminal(TerminalDefaults {
            transaction_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            unpredictable_number: Some([1, 2, 3, 4]),
            ..TerminalDefaults::default()
        })
    }

    fn connected(link: MockLink) -> Session<MockLink> {
        let mut session = Session::new(link);
        session.connect().unwrap();
        session
    }

    fn gpo_empty_pdol() -> Vec<u8> {
        commands::get_processing_options(vec![0x83, 0x00]).unwrap().encode()
    }

    #[test]
    fn test_parse_afl_entries() {
        let afl = parse_afl(&[0x08, 0x01, 0x03, 0x01, 0x10, 0x01, 0x02, 0x00]);
        assert_eq!(
            afl,
            vec![
                AflEntry { sfi: 1, first_record: 1, last_record: 3, offline_records: 1 },
                AflEntry { sfi: 2, first_record: 1, last_record: 2, offline_records: 0 },
            ]
        );
    }

    #[test]
    fn test_parse_afl_drops_invalid_ranges() {
        assert!(parse_afl(&[0x08, 0x03, 0x01, 0x00]).is_empty());
        assert!(parse_afl(&[0x08, 0x00, 0x01, 0x00]).is_empty());
        assert!(parse_afl(&[0x08, 0x01]).is_empty());
    }

    #[test]
    fn test_afl_format_1() {
        let nodes = vec![Tlv::primitive([0x80], [0x19, 0x80, 0x08, 0x01, 0x01, 0x00])];
        let afl = afl_from_processing_options(&nodes);
        assert_eq!(afl.len(), 1);
        assert_eq!(afl[0].sfi, 1);
    }

    #[test]
    fn test_afl_format_2() {
        let nodes = vec![Tlv::constructed(
            [0x77],
            vec![
                Tlv::primitive([0x82], [0x20, 0x00]),
                Tlv::primitive([0x94], [0x10, 0x02, 0x03, 0x00]),
            ],
        )];
        let afl = afl_from_processing_options(&nodes);
        assert_eq!(afl[0], AflEntry { sfi: 2, first_record: 2, last_record: 3, offline_records: 0 });
    }

    #[test]
    fn test_log_entry() {
        assert_eq!(LogEntry::parse(&[0x0B, 0x0A]), Some(LogEntry { sfi: 11, count: 10 }));
        assert_eq!(LogEntry::parse(&[0x0B]), None);
        assert_eq!(LogEntry::parse(&[0x00, 0x0A]), None);
    }

    #[test]
    fn test_pdol_is_filled_from_terminal_defaults() {
        let fci = Tlv::constructed(
            [0x6F],
            vec![
                Tlv::primitive([0x84], aids::VISA),
                Tlv::constructed([0xA5], vec![Tlv::primitive([0x9F, 0x38], [0x9F, 0x1A, 0x02, 0x9A, 0x03])]),
            ],
        );
        let gpo = commands::get_processing_options(vec![0x83, 0x05, 0x02, 0x50, 0x24, 0x01, 0x15]).unwrap();
        let link = MockLink::new()
            .respond(commands::select(aids::VISA).unwrap().encode(), ok(&[fci]))
            .respond(gpo.encode(), ok(&[Tlv::primitive([0x80], [0x00, 0x80])]));
        let log = link.log();
        let mut session = connected(link);
        let config = config().read_transactions(false);

        let mut data = ApplicationData::new(ApplicationCandidate::new(aids::VISA));
        ApplicationReader::new(&config).read(&mut session, &mut data).unwrap();

        assert!(data.selected);
        assert!(log.was_sent(&gpo.encode()));
        assert!(data.records.is_empty());
    }

    #[test]
    fn test_select_failure_leaves_candidate_unselected() {
        let mut session = connected(MockLink::new());
        let config = config();
        let mut data = ApplicationData::new(ApplicationCandidate::new(aids::VISA));

        let err = ApplicationReader::new(&config).read(&mut session, &mut data).unwrap_err();
        assert!(matches!(err, Error::ApplicationSelect { status: 0x6A82, .. }));
        assert!(!data.selected);
    }

    #[test]
    fn test_gpo_failure_is_not_fatal() {
        let link = MockLink::new()
            .respond(commands::select(aids::VISA).unwrap().encode(), [0x90, 0x00])
            .respond(gpo_empty_pdol(), [0x69, 0x85]);
        let mut session = connected(link);
        let config = config();
        let mut data = ApplicationData::new(ApplicationCandidate::new(aids::VISA));

        let err = ApplicationReader::new(&config).read(&mut session, &mut data).unwrap_err();
        assert!(matches!(err, Error::ProcessingOptions { status: 0x6985 }));
        assert!(!err.is_fatal());
        assert!(data.selected);
    }

    #[test]
    fn test_records_skip_failures() {
        let record = ok(&[Tlv::constructed([0x70], vec![Tlv::primitive([0x5A], [0x41, 0x11])])]);
        let link = MockLink::new()
            .respond(commands::select(aids::VISA).unwrap().encode(), [0x90, 0x00])
            .respond(gpo_empty_pdol(), ok(&[Tlv::primitive([0x94], [0x08, 0x01, 0x03, 0x00])]))
            .respond(commands::read_record(1, 1).encode(), [0x6A, 0x83])
            .respond(commands::read_record(2, 1).encode(), [0x70, 0x05, 0x5A, 0x90, 0x00])
            .respond(commands::read_record(3, 1).encode(), record);
        let mut session = connected(link);
        let config = config().read_transactions(false);
        let mut data = ApplicationData::new(ApplicationCandidate::new(aids::VISA));

        ApplicationReader::new(&config).read(&mut session, &mut data).unwrap();
        assert_eq!(data.records.len(), 1);
        assert_eq!(data.find_value([0x5A]), Some(&[0x41, 0x11][..]));
    }

    #[test]
    fn test_transaction_log_is_read() {
        let fci = Tlv::constructed(
            [0x6F],
            vec![Tlv::constructed(
                [0xA5],
                vec![Tlv::constructed([0xBF, 0x0C], vec![Tlv::primitive([0x9F, 0x4D], [0x0B, 0x02])])],
            )],
        );
        let link = MockLink::new()
            .respond(commands::select(aids::VISA).unwrap().encode(), ok(&[fci]))
            .respond(gpo_empty_pdol(), ok(&[Tlv::primitive([0x80], [0x00, 0x80])]))
            .respond(
                commands::get_data([0x9F, 0x4F]).encode(),
                ok(&[Tlv::primitive([0x9F, 0x4F], [0x9F, 0x02, 0x06, 0x9A, 0x03])]),
            )
            .respond(
                commands::read_record(1, 11).encode(),
                [0x00, 0x00, 0x00, 0x00, 0x12, 0x50, 0x24, 0x01, 0x10, 0x90, 0x00],
            );
        let mut session = connected(link);
        let config = config();
        let mut data = ApplicationData::new(ApplicationCandidate::new(aids::VISA));

        ApplicationReader::new(&config).read(&mut session, &mut data).unwrap();
        assert_eq!(data.transactions.len(), 1);
        assert_eq!(data.transactions[0].amount, Some(1250));
        assert_eq!(data.transactions[0].date, NaiveDate::from_ymd_opt(2024, 1, 10));
    }

    #[test]
    fn test_counters_from_get_data() {
        let link = MockLink::new()
            .respond(commands::select(aids::VISA).unwrap().encode(), [0x90, 0x00])
            .respond(gpo_empty_pdol(), ok(&[Tlv::primitive([0x80], [0x00, 0x80])]))
            .respond(
                commands::get_data([0x9F, 0x36]).encode(),
                [0x9F, 0x36, 0x02, 0x01, 0x2C, 0x90, 0x00],
            )
            .respond(commands::get_data([0x9F, 0x17]).encode(), [0x9F, 0x17, 0x01, 0x03, 0x90, 0x00]);
        let mut session = connected(link);
        let config = config().read_transactions(false);
        let mut data = ApplicationData::new(ApplicationCandidate::new(aids::VISA));

        ApplicationReader::new(&config).read(&mut session, &mut data).unwrap();
        assert_eq!(data.transaction_counter, Some(300));
        assert_eq!(data.pin_try_counter, Some(3));
    }

    #[test]
    fn test_counter_in_gpo_response_skips_get_data() {
        let gpo_response = ok(&[Tlv::constructed(
            [0x77],
            vec![
                Tlv::primitive([0x82], [0x00, 0x80]),
                Tlv::primitive([0x9F, 0x36], [0x00, 0x07]),
            ],
        )]);
        let link = MockLink::new()
            .respond(commands::select(aids::VISA).unwrap().encode(), [0x90, 0x00])
            .respond(gpo_empty_pdol(), gpo_response);
        let log = link.log();
        let mut session = connected(link);
        let config = config().read_transactions(false);
        let mut data = ApplicationData::new(ApplicationCandidate::new(aids::VISA));

        ApplicationReader::new(&config).read(&mut session, &mut data).unwrap();
        assert_eq!(data.transaction_counter, Some(7));
        assert_eq!(data.pin_try_counter, None);
        assert!(!log.was_sent(&commands::get_data([0x9F, 0x36]).encode()));
    }

    #[test]
    fn test_get_data_unwraps_tag() {
        let link = MockLink::new()
            .respond(commands::get_data([0x9F, 0x36]).encode(), [0x9F, 0x36, 0x02, 0x00, 0x2A, 0x90, 0x00])
            .respond(commands::get_data([0x9F, 0x7F]).encode(), [0x01, 0x02, 0x90, 0x00]);
        let mut session = connected(link);

        assert_eq!(get_data(&mut session, [0x9F, 0x36]).unwrap(), Some(vec![0x00, 0x2A]));
        assert_eq!(get_data(&mut session, [0x9F, 0x7F]).unwrap(), Some(vec![0x01, 0x02]));
        assert_eq!(get_data(&mut session, [0x9F, 0x4F]).unwrap(), None);
    }
}
