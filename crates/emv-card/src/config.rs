//! Read policy for the pipeline

use serde::{Deserialize, Serialize};

use crate::discovery::aids;
use crate::terminal::TerminalDefaults;

/// What the pipeline reads from each card.
///
/// Every field has a default, so a JSON config only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    /// Select the PPSE (`2PAY.SYS.DDF01`) instead of the contact PSE
    pub contactless: bool,
    /// Read every discovered application instead of stopping at the first
    pub read_all_aids: bool,
    /// Read the transaction log when the card has one
    pub read_transactions: bool,
    /// Capture ATR/ATS bytes
    pub read_at: bool,
    /// GET DATA for the CPLC block. Many cards refuse it.
    pub read_cplc: bool,
    /// AIDs probed when the payment directory cannot be selected
    #[serde(with = "hex_list")]
    pub fallback_aids: Vec<Vec<u8>>,
    pub terminal: TerminalDefaults,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            contactless: true,
            read_all_aids: true,
            read_transactions: true,
            read_at: true,
            read_cplc: false,
            fallback_aids: aids::DEFAULT_FALLBACK.iter().map(|aid| aid.to_vec()).collect(),
            terminal: TerminalDefaults::default(),
        }
    }
}

impl ReadConfig {
    pub fn contactless(mut self, contactless: bool) -> Self {
        self.contactless = contactless;
        self
    }

    pub fn read_all_aids(mut self, read_all_aids: bool) -> Self {
        self.read_all_aids = read_all_aids;
        self
    }

    pub fn read_transactions(mut self, read_transactions: bool) -> Self {
        self.read_transactions = read_transactions;
        self
    }

    pub fn read_at(mut self, read_at: bool) -> Self {
        self.read_at = read_at;
        self
    }

    pub fn read_cplc(mut self, read_cplc: bool) -> Self {
        self.read_cplc = read_cplc;
        self
    }

    pub fn fallback_aids(mut self, fallback_aids: Vec<Vec<u8>>) -> Self {
        self.fallback_aids = fallback_aids;
        self
    }

    pub fn terminal(mut self, terminal: TerminalDefaults) -> Self {
        self.terminal = terminal;
        self
    }
}

/// AIDs as a list of hex strings in JSON
mod hex_list {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(aids: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(aids.iter().map(hex::encode_upper))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|aid| hex::decode(aid).map_err(D::Error::custom))
            .collect()
    }
}
