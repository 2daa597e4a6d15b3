//! Known payment schemes keyed by AID prefix
//!
//! A plain lookup table, kept apart from the protocol code so it can be
//! extended without touching the reader.

/// A payment scheme and the AID prefixes registered for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardScheme {
    pub name: &'static str,
    pub aid_prefixes: &'static [&'static [u8]],
}

impl CardScheme {
    /// AID prefixes as upper-case hex strings
    pub fn aids_hex(&self) -> Vec<String> {
        self.aid_prefixes.iter().map(hex::encode_upper).collect()
    }
}

pub const SCHEMES: &[CardScheme] = &[
    CardScheme {
        name: "Visa",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x00, 0x03], &[0xA0, 0x00, 0x00, 0x00, 0x98, 0x08, 0x48]],
    },
    CardScheme {
        name: "Mastercard",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x00, 0x04], &[0xA0, 0x00, 0x00, 0x00, 0x05]],
    },
    CardScheme {
        name: "Maestro",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x00, 0x04, 0x30, 0x60]],
    },
    CardScheme {
        name: "American Express",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x00, 0x25], &[0xA0, 0x00, 0x00, 0x29, 0x10, 0x10]],
    },
    CardScheme {
        name: "CB",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x00, 0x42]],
    },
    CardScheme {
        name: "LINK",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x00, 0x29]],
    },
    CardScheme {
        name: "JCB",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x00, 0x65]],
    },
    CardScheme {
        name: "Dankort",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x01, 0x21, 0x10, 0x10]],
    },
    CardScheme {
        name: "CoGeBan",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x01, 0x41, 0x00, 0x01]],
    },
    CardScheme {
        name: "Discover",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x01, 0x52]],
    },
    CardScheme {
        name: "Interac",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x02, 0x77]],
    },
    CardScheme {
        name: "UnionPay",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x03, 0x33]],
    },
    CardScheme {
        name: "girocard",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x03, 0x59]],
    },
    CardScheme {
        name: "Verve",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x03, 0x71]],
    },
    CardScheme {
        name: "RuPay",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x05, 0x24]],
    },
    CardScheme {
        name: "Mir",
        aid_prefixes: &[&[0xA0, 0x00, 0x00, 0x06, 0x58]],
    },
    CardScheme {
        name: "BankAxept",
        aid_prefixes: &[&[0xD5, 0x78, 0x00, 0x00, 0x02]],
    },
];

/// Find the scheme for an AID, preferring the longest matching prefix
/// (Maestro shares its RID with Mastercard).
pub fn lookup_scheme(aid: &[u8]) -> Option<&'static CardScheme> {
    SCHEMES
        .iter()
        .flat_map(|scheme| scheme.aid_prefixes.iter().map(move |prefix| (scheme, prefix)))
        .filter(|(_, prefix)| aid.starts_with(prefix))
        .max_by_key(|(_, prefix)| prefix.len())
        .map(|(scheme, _)| scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_visa() {
        let scheme = lookup_scheme(&[0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10]).unwrap();
        assert_eq!(scheme.name, "Visa");
    }

    #[test]
    fn test_lookup_prefers_longest_prefix() {
        let maestro = lookup_scheme(&[0xA0, 0x00, 0x00, 0x00, 0x04, 0x30, 0x60]).unwrap();
        assert_eq!(maestro.name, "Maestro");
        let mastercard = lookup_scheme(&[0xA0, 0x00, 0x00, 0x00, 0x04, 0x10, 0x10]).unwrap();
        assert_eq!(mastercard.name, "Mastercard");
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup_scheme(&[0xF0, 0x01, 0x02, 0x03, 0x04]).is_none());
        assert!(lookup_scheme(&[]).is_none());
    }

    #[test]
    fn test_aids_hex() {
        let visa = lookup_scheme(&[0xA0, 0x00, 0x00, 0x00, 0x03]).unwrap();
        assert_eq!(visa.aids_hex()[0], "A000000003");
    }
}
