//! Application discovery: payment directory selection and AID fallback

use emv_common::{decode, find_all, find_value, tags, Tlv};
use tracing::{debug, info, warn};

use crate::apdu::commands;
use crate::config::ReadConfig;
use crate::error::{Error, Result};
use crate::transport::{CardLink, Session};

/// Known EMV Application Identifiers (AIDs)
pub mod aids {
    /// PSE (Payment System Environment), contact directory
    pub const PSE: &[u8] = b"1PAY.SYS.DDF01";

    /// PPSE (Proximity Payment System Environment), contactless directory
    pub const PPSE: &[u8] = b"2PAY.SYS.DDF01";

    /// Visa credit/debit
    pub const VISA: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10];

    /// Visa Electron
    pub const VISA_ELECTRON: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x20, 0x10];

    /// V Pay
    pub const VPAY: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x20, 0x20];

    /// Mastercard
    pub const MASTERCARD: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x04, 0x10, 0x10];

    /// Maestro
    pub const MAESTRO: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x04, 0x30, 0x60];

    /// American Express
    pub const AMEX: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x25, 0x01];

    /// Discover
    pub const DISCOVER: &[u8] = &[0xA0, 0x00, 0x00, 0x01, 0x52, 0x30, 0x10];

    /// JCB
    pub const JCB: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x65, 0x10, 0x10];

    /// UnionPay debit
    pub const UNIONPAY: &[u8] = &[0xA0, 0x00, 0x00, 0x03, 0x33, 0x01, 0x01, 0x01];

    /// Interac
    pub const INTERAC: &[u8] = &[0xA0, 0x00, 0x00, 0x02, 0x77, 0x10, 0x10];

    /// Cartes Bancaires
    pub const CB: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x42, 0x10, 0x10];

    /// girocard
    pub const GIROCARD: &[u8] = &[0xA0, 0x00, 0x00, 0x03, 0x59, 0x10, 0x10, 0x02, 0x80, 0x01];

    /// Mir
    pub const MIR: &[u8] = &[0xA0, 0x00, 0x00, 0x06, 0x58, 0x10, 0x10];

    /// RuPay
    pub const RUPAY: &[u8] = &[0xA0, 0x00, 0x00, 0x05, 0x24, 0x10, 0x10];

    /// Probed in this order when no directory is available
    pub const DEFAULT_FALLBACK: &[&[u8]] = &[
        VISA,
        VISA_ELECTRON,
        VPAY,
        MASTERCARD,
        MAESTRO,
        AMEX,
        DISCOVER,
        JCB,
        UNIONPAY,
        INTERAC,
        CB,
        GIROCARD,
        MIR,
        RUPAY,
    ];
}

/// An application the card offers, as announced by the directory or found
/// by probing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationCandidate {
    pub aid: Vec<u8>,
    /// Low nibble of tag 87; 1 is the highest priority
    pub priority: Option<u8>,
    pub label: Option<String>,
    pub preferred_name: Option<String>,
}

impl ApplicationCandidate {
    pub fn new(aid: impl Into<Vec<u8>>) -> Self {
        Self {
            aid: aid.into(),
            ..Self::default()
        }
    }

    pub fn aid_hex(&self) -> String {
        hex::encode_upper(&self.aid)
    }

    /// Label and priority from an FCI or directory entry
    fn describe_from(mut self, nodes: &[Tlv]) -> Self {
        self.priority = find_value(nodes, tags::APPLICATION_PRIORITY_INDICATOR)
            .and_then(|value| value.first())
            .map(|api| api & 0x0F)
            .filter(|priority| *priority != 0);
        self.label = find_value(nodes, tags::APPLICATION_LABEL).and_then(text);
        self.preferred_name = find_value(nodes, tags::APPLICATION_PREFERRED_NAME).and_then(text);
        self
    }
}

pub(crate) fn text(bytes: &[u8]) -> Option<String> {
    let value = String::from_utf8_lossy(bytes).trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// Enumerate the payment applications on the card.
///
/// An empty directory is a valid answer and yields no candidates. The
/// fallback list is probed only when the directory itself is unavailable.
pub fn discover<L: CardLink>(
    session: &mut Session<L>,
    config: &ReadConfig,
) -> Result<Vec<ApplicationCandidate>> {
    let directory = if config.contactless {
        select_ppse(session)
    } else {
        select_pse(session)
    };

    match directory {
        Ok(mut candidates) => {
            sort_by_priority(&mut candidates);
            info!(count = candidates.len(), "Payment directory read");
            Ok(candidates)
        }
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!(error = %err, "Payment directory unavailable, probing known AIDs");
            probe_fallback(session, config)
        }
    }
}

fn select_directory<L: CardLink>(session: &mut Session<L>, name: &[u8]) -> Result<Vec<Tlv>> {
    let response = session.send(&commands::select(name)?)?;
    if !response.is_success() {
        return Err(Error::ApplicationSelect {
            aid: String::from_utf8_lossy(name).into_owned(),
            status: response.status_word(),
        });
    }
    Ok(decode(&response.data)?)
}

/// Contactless directory: entries sit in the FCI itself
pub fn select_ppse<L: CardLink>(session: &mut Session<L>) -> Result<Vec<ApplicationCandidate>> {
    let fci = select_directory(session, aids::PPSE)?;
    Ok(parse_directory_entries(&fci))
}

/// Contact directory: the FCI names an SFI whose records hold the entries
pub fn select_pse<L: CardLink>(session: &mut Session<L>) -> Result<Vec<ApplicationCandidate>> {
    let fci = select_directory(session, aids::PSE)?;
    let sfi = find_value(&fci, tags::SFI_OF_DIRECTORY_EF)
        .and_then(|value| value.first().copied())
        .ok_or_else(|| Error::MalformedResponse("PSE FCI carries no directory SFI".to_string()))?;

    let mut candidates = Vec::new();
    for record in 1..=u8::MAX {
        let response = session.send(&commands::read_record(record, sfi))?;
        if !response.is_success() {
            debug!(sfi, record, status = %response.status_string(), "End of PSE directory");
            break;
        }
        match decode(&response.data) {
            Ok(nodes) => candidates.extend(parse_directory_entries(&nodes)),
            Err(err) => warn!(sfi, record, error = %err, "Skipping undecodable directory record"),
        }
    }

    Ok(candidates)
}

/// Application templates (tag 61) carrying an AID
pub fn parse_directory_entries(nodes: &[Tlv]) -> Vec<ApplicationCandidate> {
    find_all(nodes, tags::APPLICATION_TEMPLATE)
        .into_iter()
        .filter_map(|entry| {
            let aid = find_value(entry.children(), tags::APPLICATION_IDENTIFIER)?;
            Some(ApplicationCandidate::new(aid).describe_from(entry.children()))
        })
        .collect()
}

/// Prioritised entries first, by ascending indicator; stable otherwise
pub fn sort_by_priority(candidates: &mut [ApplicationCandidate]) {
    candidates.sort_by_key(|candidate| (candidate.priority.is_none(), candidate.priority));
}

/// SELECT each configured AID in turn
pub fn probe_fallback<L: CardLink>(
    session: &mut Session<L>,
    config: &ReadConfig,
) -> Result<Vec<ApplicationCandidate>> {
    let mut found = Vec::new();

    for aid in &config.fallback_aids {
        let response = session.send(&commands::select(aid)?)?;
        if !response.is_success() {
            debug!(aid = %hex::encode_upper(aid), status = %response.status_string(), "AID not present");
            continue;
        }

        let fci = decode(&response.data).unwrap_or_default();
        let candidate = ApplicationCandidate::new(aid.clone()).describe_from(&fci);
        info!(aid = %candidate.aid_hex(), "Application found by probing");
        found.push(candidate);

        if !config.read_all_aids {
            break;
        }
    }

    Ok(found)
}
