//! The card record handed to the presentation layer, and the structured
//! values it is made of

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use emv_common::{tags, DolEntry};
use serde::Serialize;

use crate::bcd;
use crate::application::ApplicationData;
use crate::metadata::Cplc;

/// Outcome of one read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CardState {
    /// No application could be selected
    #[default]
    NoSelectedApplication,
    /// An application was selected but no card number was found
    DataNotFound,
    Read,
    /// The read was cut short by a transport or session fault
    UnknownError,
}

impl fmt::Display for CardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CardState::NoSelectedApplication => "no selected application",
            CardState::DataNotFound => "data not found",
            CardState::Read => "read",
            CardState::UnknownError => "unknown error",
        };
        f.write_str(text)
    }
}

/// Final artifact of the pipeline. Every field but `state` is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CardRecord {
    pub scheme: Option<String>,
    /// AID prefixes registered for the scheme
    pub scheme_aids: Vec<String>,
    pub aids: Vec<String>,
    pub applications: Vec<ApplicationSummary>,
    pub card_number: Option<String>,
    pub expire_date: Option<NaiveDate>,
    pub holder_firstname: Option<String>,
    pub holder_lastname: Option<String>,
    pub track1: Option<Track1>,
    pub track2: Option<Track2>,
    pub bic: Option<String>,
    pub iban: Option<String>,
    /// ATR (contact) or ATS (contactless) bytes, hex encoded
    pub at: Option<String>,
    pub atr_description: Option<String>,
    pub cplc: Option<Cplc>,
    pub transactions: Vec<TransactionRecord>,
    pub state: CardState,
}

/// Directory information of an application that was read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationSummary {
    pub aid: String,
    pub label: Option<String>,
    pub preferred_name: Option<String>,
    pub priority: Option<u8>,
    pub transaction_counter: Option<u16>,
    pub pin_try_counter: Option<u8>,
}

impl From<&ApplicationData> for ApplicationSummary {
    fn from(data: &ApplicationData) -> Self {
        let candidate = &data.candidate;
        Self {
            aid: candidate.aid_hex(),
            label: candidate.label.clone(),
            preferred_name: candidate.preferred_name.clone(),
            priority: candidate.priority,
            transaction_counter: data.transaction_counter,
            pin_try_counter: data.pin_try_counter,
        }
    }
}

/// Magnetic stripe track 2 equivalent data (`<PAN>D<YYMM><SVC><DD>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track2 {
    pub raw: String,
    pub card_number: String,
    pub expire_date: Option<NaiveDate>,
    pub service_code: Option<String>,
    pub discretionary_data: String,
}

impl Track2 {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let raw = bcd::digits(bytes);
        let (pan, rest) = raw.split_once('D')?;
        if pan.is_empty() || !pan.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            card_number: pan.to_string(),
            expire_date: rest.get(..4).and_then(bcd::expiry_yymm),
            service_code: rest.get(4..7).map(str::to_string),
            discretionary_data: rest.get(7..).unwrap_or_default().to_string(),
            raw,
        })
    }
}

/// Track 1 data (`B<PAN>^<NAME>^<YYMM><SVC><DD>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track1 {
    pub raw: String,
    pub card_number: String,
    pub holder_name: Option<String>,
    pub expire_date: Option<NaiveDate>,
    pub service_code: Option<String>,
    pub discretionary_data: String,
}

impl Track1 {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let raw = String::from_utf8_lossy(bytes).into_owned();
        let body = raw.strip_prefix('%').unwrap_or(&raw);
        let body = body.strip_prefix('B')?;

        let mut fields = body.splitn(3, '^');
        let pan = fields.next()?.trim();
        let name = fields.next()?.trim();
        let rest = fields.next()?;
        if pan.is_empty() || !pan.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            card_number: pan.to_string(),
            holder_name: (!name.is_empty()).then(|| name.to_string()),
            expire_date: rest.get(..4).and_then(bcd::expiry_yymm),
            service_code: rest.get(4..7).map(str::to_string),
            discretionary_data: rest.get(7..).unwrap_or_default().trim_end_matches('?').to_string(),
            raw,
        })
    }
}

/// One entry of the card's transaction log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    /// Amount in minor units
    pub amount: Option<u64>,
    pub other_amount: Option<u64>,
    pub currency_code: Option<u16>,
    pub country_code: Option<u16>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub transaction_type: Option<u8>,
    pub cryptogram_information: Option<u8>,
    pub counter: Option<u16>,
}

impl TransactionRecord {
    /// Slice a log record according to the log format DOL. Fields the
    /// format does not name stay empty.
    pub fn from_log(format: &[DolEntry], record: &[u8]) -> Self {
        let mut transaction = Self::default();
        let mut pos = 0;

        for entry in format {
            let Some(value) = record.get(pos..pos + entry.length) else {
                break;
            };
            pos += entry.length;

            let tag = entry.tag.as_slice();
            if tag == tags::AMOUNT_AUTHORISED.0 {
                transaction.amount = bcd::to_u64(value);
            } else if tag == tags::AMOUNT_OTHER.0 {
                transaction.other_amount = bcd::to_u64(value);
            } else if tag == tags::TRANSACTION_CURRENCY_CODE.0 {
                transaction.currency_code = bcd::to_u64(value).and_then(|v| u16::try_from(v).ok());
            } else if tag == tags::TERMINAL_COUNTRY_CODE.0 {
                transaction.country_code = bcd::to_u64(value).and_then(|v| u16::try_from(v).ok());
            } else if tag == tags::TRANSACTION_DATE.0 {
                transaction.date = bcd::date_yymmdd(value);
            } else if tag == tags::TRANSACTION_TIME.0 {
                transaction.time = time_hhmmss(value);
            } else if tag == tags::TRANSACTION_TYPE.0 {
                transaction.transaction_type = value.first().copied();
            } else if tag == tags::CRYPTOGRAM_INFORMATION_DATA.0 {
                transaction.cryptogram_information = value.first().copied();
            } else if tag == tags::APPLICATION_TRANSACTION_COUNTER.0 {
                transaction.counter = match value {
                    [high, low] => Some(u16::from_be_bytes([*high, *low])),
                    _ => None,
                };
            }
        }

        transaction
    }
}

fn time_hhmmss(value: &[u8]) -> Option<NaiveTime> {
    let [hh, mm, ss] = value else {
        return None;
    };
    NaiveTime::from_hms_opt(
        bcd::to_u64(&[*hh])? as u32,
        bcd::to_u64(&[*mm])? as u32,
        bcd::to_u64(&[*ss])? as u32,
    )
}
