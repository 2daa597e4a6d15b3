//! Card metadata outside the payment application: ATR/ATS description and
//! the Card Production Life Cycle block

use emv_common::{decode, tags};
use serde::Serialize;

/// Known ATR patterns. Hex nibbles, `.` matches any nibble, a trailing `*`
/// matches any remainder.
const ATR_PATTERNS: &[(&str, &str)] = &[
    (
        "3B8F8001804F0CA000000306030001000000006A",
        "MIFARE Classic 1K (PC/SC contactless storage card)",
    ),
    (
        "3B8F8001804F0CA0000003060300020000000069",
        "MIFARE Classic 4K (PC/SC contactless storage card)",
    ),
    (
        "3B8F8001804F0CA0000003060300030000000068",
        "MIFARE Ultralight (PC/SC contactless storage card)",
    ),
    ("3B8.8001*", "ISO/IEC 14443-4 contactless smart card (PC/SC pseudo-ATR)"),
    ("3B6.0000*", "ISO/IEC 7816 contact card, T=0"),
    ("3B..8031*", "ISO/IEC 7816 contact card, T=1"),
];

/// Describe an ATR or ATS from the pattern table
pub fn describe_atr(atr: &[u8]) -> Option<&'static str> {
    let atr = hex::encode_upper(atr);
    ATR_PATTERNS
        .iter()
        .find(|(pattern, _)| atr_matches(pattern, &atr))
        .map(|(_, description)| *description)
}

fn atr_matches(pattern: &str, atr: &str) -> bool {
    let (pattern, open_ended) = match pattern.strip_suffix('*') {
        Some(prefix) => (prefix, true),
        None => (pattern, false),
    };

    if atr.len() < pattern.len() || (!open_ended && atr.len() != pattern.len()) {
        return false;
    }

    pattern
        .bytes()
        .zip(atr.bytes())
        .all(|(p, a)| p == b'.' || p == a)
}

/// Card Production Life Cycle data (GET DATA 9F7F)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cplc {
    pub ic_fabricator: String,
    pub ic_type: String,
    pub os_id: String,
    pub os_release_date: String,
    pub os_release_level: String,
    pub ic_fabrication_date: String,
    pub ic_serial_number: String,
    pub ic_batch_identifier: String,
    pub ic_module_fabricator: String,
    pub ic_module_packaging_date: String,
    pub icc_manufacturer: String,
    pub ic_embedding_date: String,
    pub ic_pre_personalizer: String,
    pub ic_pre_personalization_date: String,
    pub ic_pre_personalization_equipment: String,
    pub ic_personalizer: String,
    pub ic_personalization_date: String,
    pub ic_personalization_equipment: String,
}

impl Cplc {
    pub const LENGTH: usize = 42;

    /// Decode the fixed-layout block. Accepts the bare 42 bytes or the
    /// block still wrapped in its 9F7F tag. Dates stay in their raw
    /// `YDDD` form.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let wrapped = decode(data).ok().and_then(|nodes| match nodes.as_slice() {
            [node] if node.has_tag(tags::CPLC) => node.bytes().map(<[u8]>::to_vec),
            _ => None,
        });
        let block = wrapped.as_deref().unwrap_or(data);
        if block.len() < Self::LENGTH {
            return None;
        }

        let mut fields = Fields { data: block, pos: 0 };
        Some(Self {
            ic_fabricator: fields.take(2),
            ic_type: fields.take(2),
            os_id: fields.take(2),
            os_release_date: fields.take(2),
            os_release_level: fields.take(2),
            ic_fabrication_date: fields.take(2),
            ic_serial_number: fields.take(4),
            ic_batch_identifier: fields.take(2),
            ic_module_fabricator: fields.take(2),
            ic_module_packaging_date: fields.take(2),
            icc_manufacturer: fields.take(2),
            ic_embedding_date: fields.take(2),
            ic_pre_personalizer: fields.take(2),
            ic_pre_personalization_date: fields.take(2),
            ic_pre_personalization_equipment: fields.take(4),
            ic_personalizer: fields.take(2),
            ic_personalization_date: fields.take(2),
            ic_personalization_equipment: fields.take(4),
        })
    }
}

struct Fields<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Fields<'_> {
    fn take(&mut self, len: usize) -> String {
        let field = &self.data[self.pos..self.pos + len];
        self.pos += len;
        hex::encode_upper(field)
    }
}
