//! BER-TLV decoding and encoding
//!
//! Decodes the data objects returned by EMV cards into a tree of [`Tlv`]
//! nodes. Every call works on its own slice, so decoding one record never
//! depends on another.

use thiserror::Error;

/// Maximum number of tag bytes accepted (EMV uses at most 3, BER allows more)
const MAX_TAG_LEN: usize = 4;

/// Maximum number of subsequent length bytes in the long form
const MAX_LENGTH_BYTES: usize = 4;

/// Errors that can occur while decoding BER-TLV data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TlvError {
    #[error("truncated TLV: {needed} bytes needed, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("unsupported TLV encoding: {0}")]
    UnsupportedEncoding(&'static str),
}

/// Value of a TLV node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlvValue {
    /// Raw value bytes of a primitive data object
    Primitive(Vec<u8>),
    /// Nested data objects of a constructed data object
    Constructed(Vec<Tlv>),
}

/// A decoded BER-TLV data object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    tag: Vec<u8>,
    value: TlvValue,
}

impl Tlv {
    /// Create a primitive data object
    pub fn primitive(tag: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            tag: tag.into(),
            value: TlvValue::Primitive(value.into()),
        }
    }

    /// Create a constructed data object holding `children`
    pub fn constructed(tag: impl Into<Vec<u8>>, children: Vec<Tlv>) -> Self {
        Self {
            tag: tag.into(),
            value: TlvValue::Constructed(children),
        }
    }

    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    pub fn value(&self) -> &TlvValue {
        &self.value
    }

    /// Whether the tag's constructed bit (b6 of the first byte) is set
    pub fn is_constructed(&self) -> bool {
        is_constructed_tag(&self.tag)
    }

    /// Check the tag against an EMV tag constant or raw tag bytes
    pub fn has_tag(&self, tag: impl AsRef<[u8]>) -> bool {
        self.tag == tag.as_ref()
    }

    /// Value bytes of a primitive object, `None` for constructed ones
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.value {
            TlvValue::Primitive(bytes) => Some(bytes),
            TlvValue::Constructed(_) => None,
        }
    }

    /// Child objects of a constructed object, empty for primitive ones
    pub fn children(&self) -> &[Tlv] {
        match &self.value {
            TlvValue::Primitive(_) => &[],
            TlvValue::Constructed(children) => children,
        }
    }

    /// Depth-first search starting at this node
    pub fn find(&self, tag: impl AsRef<[u8]>) -> Option<&Tlv> {
        let tag = tag.as_ref();
        if self.tag == tag {
            return Some(self);
        }
        find(self.children(), tag)
    }

    /// Encode this node back to BER-TLV bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        let value = match &self.value {
            TlvValue::Primitive(bytes) => bytes.clone(),
            TlvValue::Constructed(children) => encode(children),
        };
        out.extend_from_slice(&self.tag);
        out.extend(encode_length(value.len()));
        out.extend(value);
    }
}

/// Decode a complete buffer into a sequence of TLV nodes.
///
/// The whole input must be consumed. `00` and `FF` filler bytes between
/// objects are skipped, as EMV allows them before, between and after data
/// objects.
pub fn decode(data: &[u8]) -> Result<Vec<Tlv>, TlvError> {
    let mut nodes = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        if data[pos] == 0x00 || data[pos] == 0xFF {
            pos += 1;
            continue;
        }
        let (node, used) = decode_one(&data[pos..])?;
        nodes.push(node);
        pos += used;
    }

    Ok(nodes)
}

/// Decode a single node from the front of `data`, returning it and the
/// number of bytes it occupied.
fn decode_one(data: &[u8]) -> Result<(Tlv, usize), TlvError> {
    let (tag, tag_len) = read_tag(data)?;
    let (length, length_len) = read_length(&data[tag_len..])?;

    let start = tag_len + length_len;
    let remaining = data.len() - start;
    if length > remaining {
        return Err(TlvError::Truncated {
            needed: length,
            remaining,
        });
    }

    let raw = &data[start..start + length];
    let value = if is_constructed_tag(&tag) {
        TlvValue::Constructed(decode(raw)?)
    } else {
        TlvValue::Primitive(raw.to_vec())
    };

    Ok((Tlv { tag, value }, start + length))
}

fn is_constructed_tag(tag: &[u8]) -> bool {
    tag.first().map_or(false, |b| b & 0x20 != 0)
}

fn read_tag(data: &[u8]) -> Result<(Vec<u8>, usize), TlvError> {
    let first = *data.first().ok_or(TlvError::Truncated {
        needed: 1,
        remaining: 0,
    })?;
    let mut tag = vec![first];

    // Low five bits all set: subsequent bytes follow while b8 is set
    if first & 0x1F == 0x1F {
        loop {
            let next = *data.get(tag.len()).ok_or(TlvError::Truncated {
                needed: tag.len() + 1,
                remaining: data.len(),
            })?;
            tag.push(next);
            if tag.len() > MAX_TAG_LEN {
                return Err(TlvError::UnsupportedEncoding("tag longer than 4 bytes"));
            }
            if next & 0x80 == 0 {
                break;
            }
        }
    }

    let len = tag.len();
    Ok((tag, len))
}

fn read_length(data: &[u8]) -> Result<(usize, usize), TlvError> {
    let first = *data.first().ok_or(TlvError::Truncated {
        needed: 1,
        remaining: 0,
    })?;

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let count = (first & 0x7F) as usize;
    if count == 0 {
        return Err(TlvError::UnsupportedEncoding("indefinite length"));
    }
    if count > MAX_LENGTH_BYTES {
        return Err(TlvError::UnsupportedEncoding("length field wider than 4 bytes"));
    }
    if data.len() < 1 + count {
        return Err(TlvError::Truncated {
            needed: count,
            remaining: data.len() - 1,
        });
    }

    let length = data[1..=count]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok((length, 1 + count))
}

/// Encode a length in the minimal BER form
fn encode_length(length: usize) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }
    let bytes: Vec<u8> = length
        .to_be_bytes()
        .iter()
        .copied()
        .skip_while(|&b| b == 0)
        .collect();
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(0x80 | bytes.len() as u8);
    out.extend(bytes);
    out
}

/// Encode a sequence of nodes to BER-TLV bytes
pub fn encode(nodes: &[Tlv]) -> Vec<u8> {
    let mut out = Vec::new();
    for node in nodes {
        node.write_to(&mut out);
    }
    out
}

/// Depth-first search for the first node carrying `tag`
pub fn find(nodes: &[Tlv], tag: impl AsRef<[u8]>) -> Option<&Tlv> {
    let tag = tag.as_ref();
    nodes.iter().find_map(|node| node.find(tag))
}

/// Value bytes of the first primitive node carrying `tag`
pub fn find_value(nodes: &[Tlv], tag: impl AsRef<[u8]>) -> Option<&[u8]> {
    find(nodes, tag).and_then(Tlv::bytes)
}

/// Every node carrying `tag`, in depth-first order
pub fn find_all<'a>(nodes: &'a [Tlv], tag: impl AsRef<[u8]>) -> Vec<&'a Tlv> {
    fn walk<'a>(nodes: &'a [Tlv], tag: &[u8], out: &mut Vec<&'a Tlv>) {
        for node in nodes {
            if node.tag == tag {
                out.push(node);
            }
            walk(node.children(), tag, out);
        }
    }

    let mut out = Vec::new();
    walk(nodes, tag.as_ref(), &mut out);
    out
}

/// One entry of a Data Object List: a tag and the length the card expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DolEntry {
    pub tag: Vec<u8>,
    pub length: usize,
}

/// Parse a Data Object List (PDOL, log format, ...): tag/length pairs
/// without values.
pub fn parse_dol(data: &[u8]) -> Result<Vec<DolEntry>, TlvError> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let (tag, tag_len) = read_tag(&data[pos..])?;
        pos += tag_len;
        let (length, length_len) = read_length(&data[pos..])?;
        pos += length_len;
        entries.push(DolEntry { tag, length });
    }

    Ok(entries)
}
