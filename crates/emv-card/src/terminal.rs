//! Terminal-side values supplied to the card through Data Object Lists

use chrono::{Datelike, Local, NaiveDate};
use emv_common::{parse_dol, tags, TlvError};
use serde::{Deserialize, Serialize};

use crate::bcd;

/// Static terminal defaults used to answer PDOL and other DOL requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalDefaults {
    /// ISO 3166 numeric country code (9F1A)
    pub country_code: u16,
    /// ISO 4217 numeric currency code (5F2A)
    pub currency_code: u16,
    /// Terminal Transaction Qualifiers (9F66)
    pub transaction_qualifiers: [u8; 4],
    /// Terminal type (9F35)
    pub terminal_type: u8,
    /// Fixed transaction date; today's date when unset
    pub transaction_date: Option<NaiveDate>,
    /// Fixed unpredictable number; random when unset
    pub unpredictable_number: Option<[u8; 4]>,
}

impl Default for TerminalDefaults {
    fn default() -> Self {
        Self {
            country_code: 250,
            currency_code: 978,
            transaction_qualifiers: [0xB6, 0x20, 0xC0, 0x00],
            terminal_type: 0x22,
            transaction_date: None,
            unpredictable_number: None,
        }
    }
}

impl TerminalDefaults {
    /// Value for `tag`, fitted to the `length` the card asked for.
    ///
    /// Unknown tags are answered with zeros.
    pub fn dol_value(&self, tag: &[u8], length: usize) -> Vec<u8> {
        let value = if tag == tags::TERMINAL_TRANSACTION_QUALIFIERS.0 {
            self.transaction_qualifiers.to_vec()
        } else if tag == tags::TERMINAL_COUNTRY_CODE.0 {
            bcd::encode(self.country_code as u64, 2)
        } else if tag == tags::TRANSACTION_CURRENCY_CODE.0 {
            bcd::encode(self.currency_code as u64, 2)
        } else if tag == tags::TRANSACTION_DATE.0 {
            self.date_bytes()
        } else if tag == tags::TERMINAL_TYPE.0 {
            vec![self.terminal_type]
        } else if tag == tags::UNPREDICTABLE_NUMBER.0 {
            self.unpredictable_number
                .unwrap_or_else(rand::random::<[u8; 4]>)
                .to_vec()
        } else {
            // amounts, transaction type 00, TVR and anything unknown
            Vec::new()
        };

        fit(value, length)
    }

    /// Concatenated values for every entry of a DOL
    pub fn build_dol_data(&self, dol: &[u8]) -> Result<Vec<u8>, TlvError> {
        Ok(parse_dol(dol)?
            .iter()
            .flat_map(|entry| self.dol_value(&entry.tag, entry.length))
            .collect())
    }

    fn date_bytes(&self) -> Vec<u8> {
        let date = self
            .transaction_date
            .unwrap_or_else(|| Local::now().date_naive());
        let yy = (date.year().rem_euclid(100)) as u64;
        bcd::encode(yy * 10_000 + date.month() as u64 * 100 + date.day() as u64, 3)
    }
}

/// Left-pad with zeros or keep the rightmost bytes so the value is exactly
/// `length` long
fn fit(value: Vec<u8>, length: usize) -> Vec<u8> {
    if value.len() >= length {
        value[value.len() - length..].to_vec()
    } else {
        let mut out = vec![0u8; length - value.len()];
        out.extend(value);
        out
    }
}
