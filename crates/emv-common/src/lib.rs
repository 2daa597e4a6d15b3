//! EMV Common - Shared data structures and utilities for EMV processing
//!
//! Pure services with no I/O: the BER-TLV decoder, the EMV tag dictionary and
//! the AID to payment scheme table.

pub mod schemes;
pub mod tlv;

pub use schemes::{lookup_scheme, CardScheme};
pub use tlv::{decode, encode, find, find_all, find_value, parse_dol, DolEntry, Tlv, TlvError, TlvValue};

/// EMV Tag identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmvTag(pub &'static [u8]);

impl AsRef<[u8]> for EmvTag {
    fn as_ref(&self) -> &[u8] {
        self.0
    }
}

/// Common EMV tags used in payment card processing
pub mod tags {
    use super::EmvTag;

    // Directory and selection
    pub const DF_NAME: EmvTag = EmvTag(&[0x84]);
    pub const SFI_OF_DIRECTORY_EF: EmvTag = EmvTag(&[0x88]);
    pub const APPLICATION_TEMPLATE: EmvTag = EmvTag(&[0x61]);
    pub const APPLICATION_PRIORITY_INDICATOR: EmvTag = EmvTag(&[0x87]);
    pub const APPLICATION_PREFERRED_NAME: EmvTag = EmvTag(&[0x9F, 0x12]);
    pub const FCI_PROPRIETARY_TEMPLATE: EmvTag = EmvTag(&[0xA5]);
    pub const FCI_ISSUER_DISCRETIONARY_DATA: EmvTag = EmvTag(&[0xBF, 0x0C]);

    // Application metadata
    pub const APPLICATION_IDENTIFIER: EmvTag = EmvTag(&[0x4F]);
    pub const APPLICATION_LABEL: EmvTag = EmvTag(&[0x50]);
    pub const APPLICATION_PAN: EmvTag = EmvTag(&[0x5A]);
    pub const APPLICATION_EXPIRATION_DATE: EmvTag = EmvTag(&[0x5F, 0x24]);
    pub const APPLICATION_EFFECTIVE_DATE: EmvTag = EmvTag(&[0x5F, 0x25]);
    pub const APPLICATION_PAN_SEQUENCE_NUMBER: EmvTag = EmvTag(&[0x5F, 0x34]);
    pub const APPLICATION_TRANSACTION_COUNTER: EmvTag = EmvTag(&[0x9F, 0x36]);
    pub const PIN_TRY_COUNTER: EmvTag = EmvTag(&[0x9F, 0x17]);

    // Cardholder data
    pub const CARDHOLDER_NAME: EmvTag = EmvTag(&[0x5F, 0x20]);
    pub const TRACK_1_DATA: EmvTag = EmvTag(&[0x56]);
    pub const TRACK_2_EQUIVALENT_DATA: EmvTag = EmvTag(&[0x57]);
    pub const TRACK_2_DATA: EmvTag = EmvTag(&[0x9F, 0x6B]);

    // Issuer data
    pub const ISSUER_COUNTRY_CODE: EmvTag = EmvTag(&[0x5F, 0x28]);
    pub const LANGUAGE_PREFERENCE: EmvTag = EmvTag(&[0x5F, 0x2D]);
    pub const IBAN: EmvTag = EmvTag(&[0x5F, 0x53]);
    pub const BIC: EmvTag = EmvTag(&[0x5F, 0x54]);

    // Terminal data requested through DOLs
    pub const AMOUNT_AUTHORISED: EmvTag = EmvTag(&[0x9F, 0x02]);
    pub const AMOUNT_OTHER: EmvTag = EmvTag(&[0x9F, 0x03]);
    pub const TERMINAL_COUNTRY_CODE: EmvTag = EmvTag(&[0x9F, 0x1A]);
    pub const TRANSACTION_CURRENCY_CODE: EmvTag = EmvTag(&[0x5F, 0x2A]);
    pub const TRANSACTION_DATE: EmvTag = EmvTag(&[0x9A]);
    pub const TRANSACTION_TIME: EmvTag = EmvTag(&[0x9F, 0x21]);
    pub const TRANSACTION_TYPE: EmvTag = EmvTag(&[0x9C]);
    pub const TERMINAL_VERIFICATION_RESULTS: EmvTag = EmvTag(&[0x95]);
    pub const UNPREDICTABLE_NUMBER: EmvTag = EmvTag(&[0x9F, 0x37]);
    pub const TERMINAL_TRANSACTION_QUALIFIERS: EmvTag = EmvTag(&[0x9F, 0x66]);
    pub const TERMINAL_TYPE: EmvTag = EmvTag(&[0x9F, 0x35]);
    pub const TERMINAL_CAPABILITIES: EmvTag = EmvTag(&[0x9F, 0x33]);
    pub const CRYPTOGRAM_INFORMATION_DATA: EmvTag = EmvTag(&[0x9F, 0x27]);

    // Processing
    pub const PDOL: EmvTag = EmvTag(&[0x9F, 0x38]);
    pub const AFL: EmvTag = EmvTag(&[0x94]);
    pub const AIP: EmvTag = EmvTag(&[0x82]);
    pub const LOG_ENTRY: EmvTag = EmvTag(&[0x9F, 0x4D]);
    pub const LOG_FORMAT: EmvTag = EmvTag(&[0x9F, 0x4F]);
    pub const CPLC: EmvTag = EmvTag(&[0x9F, 0x7F]);

    // Response templates
    pub const FCI_TEMPLATE: EmvTag = EmvTag(&[0x6F]);
    pub const RESPONSE_MESSAGE_TEMPLATE_FORMAT_1: EmvTag = EmvTag(&[0x80]);
    pub const RESPONSE_MESSAGE_TEMPLATE_FORMAT_2: EmvTag = EmvTag(&[0x77]);
    pub const RECORD_TEMPLATE: EmvTag = EmvTag(&[0x70]);
    pub const COMMAND_TEMPLATE: EmvTag = EmvTag(&[0x83]);
}

/// Get a human-readable name for an EMV tag
pub fn get_tag_name(tag: &[u8]) -> &'static str {
    match tag {
        [0x4F] => "Application Identifier (AID)",
        [0x50] => "Application Label",
        [0x56] => "Track 1 Data",
        [0x57] => "Track 2 Equivalent Data",
        [0x5A] => "Application PAN",
        [0x5F, 0x20] => "Cardholder Name",
        [0x5F, 0x24] => "Application Expiration Date",
        [0x5F, 0x25] => "Application Effective Date",
        [0x5F, 0x28] => "Issuer Country Code",
        [0x5F, 0x2A] => "Transaction Currency Code",
        [0x5F, 0x2D] => "Language Preference",
        [0x5F, 0x34] => "Application PAN Sequence Number",
        [0x5F, 0x53] => "International Bank Account Number (IBAN)",
        [0x5F, 0x54] => "Bank Identifier Code (BIC)",
        [0x61] => "Application Template",
        [0x6F] => "File Control Information (FCI) Template",
        [0x70] => "READ RECORD Response Message Template",
        [0x77] => "Response Message Template Format 2",
        [0x80] => "Response Message Template Format 1",
        [0x82] => "Application Interchange Profile",
        [0x83] => "Command Template",
        [0x84] => "Dedicated File (DF) Name",
        [0x87] => "Application Priority Indicator",
        [0x88] => "Short File Identifier (SFI)",
        [0x8C] => "CDOL1",
        [0x8D] => "CDOL2",
        [0x8E] => "CVM List",
        [0x8F] => "CA Public Key Index",
        [0x90] => "Issuer Public Key Certificate",
        [0x92] => "Issuer Public Key Remainder",
        [0x93] => "Signed Static Application Data",
        [0x94] => "Application File Locator",
        [0x95] => "Terminal Verification Results",
        [0x9A] => "Transaction Date",
        [0x9C] => "Transaction Type",
        [0x9F, 0x02] => "Amount, Authorised",
        [0x9F, 0x03] => "Amount, Other",
        [0x9F, 0x07] => "Application Usage Control",
        [0x9F, 0x08] => "Application Version Number (Card)",
        [0x9F, 0x10] => "Issuer Application Data",
        [0x9F, 0x11] => "Issuer Code Table Index",
        [0x9F, 0x12] => "Application Preferred Name",
        [0x9F, 0x17] => "PIN Try Counter",
        [0x9F, 0x1A] => "Terminal Country Code",
        [0x9F, 0x21] => "Transaction Time",
        [0x9F, 0x26] => "Application Cryptogram",
        [0x9F, 0x27] => "Cryptogram Information Data",
        [0x9F, 0x32] => "Issuer Public Key Exponent",
        [0x9F, 0x33] => "Terminal Capabilities",
        [0x9F, 0x35] => "Terminal Type",
        [0x9F, 0x36] => "Application Transaction Counter",
        [0x9F, 0x37] => "Unpredictable Number",
        [0x9F, 0x38] => "Processing Options Data Object List (PDOL)",
        [0x9F, 0x42] => "Application Currency Code",
        [0x9F, 0x44] => "Application Currency Exponent",
        [0x9F, 0x46] => "ICC Public Key Certificate",
        [0x9F, 0x47] => "ICC Public Key Exponent",
        [0x9F, 0x48] => "ICC Public Key Remainder",
        [0x9F, 0x4A] => "Static Data Authentication Tag List",
        [0x9F, 0x4D] => "Log Entry",
        [0x9F, 0x4F] => "Log Format",
        [0x9F, 0x66] => "Terminal Transaction Qualifiers",
        [0x9F, 0x6B] => "Track 2 Data",
        [0x9F, 0x7F] => "Card Production Life Cycle (CPLC)",
        [0xA5] => "FCI Proprietary Template",
        [0xBF, 0x0C] => "FCI Issuer Discretionary Data",
        _ => "Unknown Tag",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_names() {
        assert_eq!(get_tag_name(tags::APPLICATION_PAN.0), "Application PAN");
        assert_eq!(get_tag_name(&[0xBF, 0x0C]), "FCI Issuer Discretionary Data");
        assert_eq!(get_tag_name(&[0xDF, 0x01]), "Unknown Tag");
    }

    #[test]
    fn test_emv_tag_as_ref() {
        assert_eq!(tags::PDOL.as_ref(), &[0x9F, 0x38]);
    }
}
