//! APDU (Application Protocol Data Unit) encoding and decoding

use crate::error::{Error, Result};

/// APDU response containing data and status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response data (without status word)
    pub data: Vec<u8>,
    /// Status word SW1
    pub sw1: u8,
    /// Status word SW2
    pub sw2: u8,
}

impl ApduResponse {
    /// Split raw response bytes into data and the trailing status word
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < 2 {
            return Err(Error::MalformedResponse(format!(
                "expected at least 2 bytes, got {}",
                raw.len()
            )));
        }

        let (data, sw) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: data.to_vec(),
            sw1: sw[0],
            sw2: sw[1],
        })
    }

    /// Check if the response indicates success (9000)
    pub fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Get the full status word as a 16-bit value
    pub fn status_word(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Get status word as hex string (e.g., "9000")
    pub fn status_string(&self) -> String {
        format!("{:02X}{:02X}", self.sw1, self.sw2)
    }

    /// Human-readable meaning of the status word
    pub fn describe(&self) -> String {
        describe_status_word(self.sw1, self.sw2)
    }
}

/// Most command data an extended-length APDU can carry
pub const MAX_COMMAND_DATA: usize = 65535;

/// APDU command builder
///
/// Fields are fixed once built; the builder methods consume and return the
/// command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Vec<u8>,
    le: Option<u16>,
}

impl ApduCommand {
    /// Create a new APDU command
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Set command data. Fails when `data` is longer than
    /// [`MAX_COMMAND_DATA`].
    pub fn data(mut self, data: Vec<u8>) -> Result<Self> {
        if data.len() > MAX_COMMAND_DATA {
            return Err(Error::CommandTooLong { len: data.len() });
        }
        self.data = data;
        Ok(self)
    }

    /// Set expected response length. `0` asks for as many bytes as are
    /// available; 1..=256 fits the short form, larger values force the
    /// extended form.
    pub fn le(mut self, le: u16) -> Self {
        self.le = Some(le);
        self
    }

    pub fn cla(&self) -> u8 {
        self.cla
    }

    pub fn ins(&self) -> u8 {
        self.ins
    }

    pub fn p1(&self) -> u8 {
        self.p1
    }

    pub fn p2(&self) -> u8 {
        self.p2
    }

    pub fn command_data(&self) -> &[u8] {
        &self.data
    }

    pub fn expected_length(&self) -> Option<u16> {
        self.le
    }

    fn is_extended(&self) -> bool {
        self.data.len() > 255 || self.le.map_or(false, |le| le > 256)
    }

    /// Serialize to bytes using the shortest valid length encoding
    pub fn encode(&self) -> Vec<u8> {
        let mut apdu = vec![self.cla, self.ins, self.p1, self.p2];

        if self.is_extended() {
            apdu.push(0x00);
            if !self.data.is_empty() {
                // data() keeps the length within u16
                apdu.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
                apdu.extend_from_slice(&self.data);
            }
            if let Some(le) = self.le {
                apdu.extend_from_slice(&le.to_be_bytes());
            }
        } else {
            if !self.data.is_empty() {
                apdu.push(self.data.len() as u8);
                apdu.extend_from_slice(&self.data);
            }
            if let Some(le) = self.le {
                // 256 is written as 00 in the short form
                apdu.push(if le == 256 { 0x00 } else { le as u8 });
            }
        }

        apdu
    }
}

/// Common EMV APDU commands
pub mod commands {
    use super::ApduCommand;
    use crate::error::Result;

    /// SELECT command (by name/AID, first or only occurrence)
    pub fn select(aid: &[u8]) -> Result<ApduCommand> {
        Ok(ApduCommand::new(0x00, 0xA4, 0x04, 0x00)
            .data(aid.to_vec())?
            .le(0x00))
    }

    /// GET PROCESSING OPTIONS command
    pub fn get_processing_options(pdol_data: Vec<u8>) -> Result<ApduCommand> {
        Ok(ApduCommand::new(0x80, 0xA8, 0x00, 0x00)
            .data(pdol_data)?
            .le(0x00))
    }

    /// READ RECORD command
    pub fn read_record(record_number: u8, sfi: u8) -> ApduCommand {
        let p2 = (sfi << 3) | 0x04;
        ApduCommand::new(0x00, 0xB2, record_number, p2).le(0x00)
    }

    /// GET DATA command - request a one- or two-byte tagged object
    pub fn get_data(tag: impl AsRef<[u8]>) -> ApduCommand {
        match tag.as_ref() {
            [single] => ApduCommand::new(0x80, 0xCA, 0x00, *single).le(0x00),
            [.., p1, p2] => ApduCommand::new(0x80, 0xCA, *p1, *p2).le(0x00),
            [] => ApduCommand::new(0x80, 0xCA, 0x00, 0x00).le(0x00),
        }
    }

    /// GET RESPONSE command, fetching bytes announced by a 61XX status
    pub fn get_response(available: u8) -> ApduCommand {
        let le = if available == 0 { 256 } else { available as u16 };
        ApduCommand::new(0x00, 0xC0, 0x00, 0x00).le(le)
    }
}

/// Get a human-readable description of SW1/SW2 status words
pub fn describe_status_word(sw1: u8, sw2: u8) -> String {
    match (sw1, sw2) {
        (0x90, 0x00) => "Success".to_string(),
        (0x61, n) => format!("Success, {n} bytes available"),
        (0x62, 0x83) => "Warning: Selected file invalidated".to_string(),
        (0x63, n) if n & 0xF0 == 0xC0 => format!("Warning: Counter = {}", n & 0x0F),
        (0x67, 0x00) => "Error: Wrong length".to_string(),
        (0x69, 0x82) => "Error: Security status not satisfied".to_string(),
        (0x69, 0x84) => "Error: Referenced data invalidated".to_string(),
        (0x69, 0x85) => "Error: Conditions of use not satisfied".to_string(),
        (0x6A, 0x81) => "Error: Function not supported".to_string(),
        (0x6A, 0x82) => "Error: File or application not found".to_string(),
        (0x6A, 0x83) => "Error: Record not found".to_string(),
        (0x6A, 0x86) => "Error: Incorrect parameters P1-P2".to_string(),
        (0x6A, 0x88) => "Error: Referenced data not found".to_string(),
        (0x6C, n) => format!("Error: Wrong Le field, exact length: {n}"),
        (0x6D, 0x00) => "Error: Instruction code not supported or invalid".to_string(),
        (0x6E, 0x00) => "Error: Class not supported".to_string(),
        (0x6F, 0x00) => "Error: No precise diagnosis".to_string(),
        _ => format!("Unknown status: {sw1:02X} {sw2:02X}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_1_header_only() {
        let apdu = ApduCommand::new(0x00, 0xA4, 0x04, 0x00).encode();
        assert_eq!(apdu, vec![0x00, 0xA4, 0x04, 0x00]);
    }

    #[test]
    fn test_select_short_form() {
        let apdu = commands::select(b"2PAY.SYS.DDF01").unwrap().encode();
        assert_eq!(&apdu[..5], &[0x00, 0xA4, 0x04, 0x00, 0x0E]);
        assert_eq!(&apdu[5..19], b"2PAY.SYS.DDF01");
        assert_eq!(apdu[19], 0x00);
        assert_eq!(apdu.len(), 20);
    }

    #[test]
    fn test_read_record_p2() {
        let apdu = commands::read_record(1, 1).encode();
        assert_eq!(apdu, vec![0x00, 0xB2, 0x01, 0x0C, 0x00]);
    }

    #[test]
    fn test_get_data_two_byte_tag() {
        let apdu = commands::get_data([0x9F, 0x7F]).encode();
        assert_eq!(apdu, vec![0x80, 0xCA, 0x9F, 0x7F, 0x00]);
    }

    #[test]
    fn test_le_256_short_form() {
        let apdu = ApduCommand::new(0x00, 0xB0, 0x00, 0x00).le(256).encode();
        assert_eq!(apdu, vec![0x00, 0xB0, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_extended_length_for_large_data() {
        let data = vec![0xAB; 300];
        let apdu = ApduCommand::new(0x00, 0xDA, 0x01, 0x02)
            .data(data.clone())
            .unwrap()
            .le(0x00)
            .encode();
        assert_eq!(&apdu[..7], &[0x00, 0xDA, 0x01, 0x02, 0x00, 0x01, 0x2C]);
        assert_eq!(&apdu[7..307], &data[..]);
        assert_eq!(&apdu[307..], &[0x00, 0x00]);
    }

    #[test]
    fn test_extended_length_for_large_le() {
        let apdu = ApduCommand::new(0x00, 0xB0, 0x00, 0x00).le(1024).encode();
        assert_eq!(apdu, vec![0x00, 0xB0, 0x00, 0x00, 0x00, 0x04, 0x00]);
    }

    #[test]
    fn test_boundary_255_stays_short() {
        let apdu = ApduCommand::new(0x00, 0xDA, 0x00, 0x00)
            .data(vec![0x01; 255])
            .unwrap()
            .encode();
        assert_eq!(apdu[4], 0xFF);
        assert_eq!(apdu.len(), 5 + 255);
    }

    #[test]
    fn test_oversized_data_is_rejected() {
        let result = ApduCommand::new(0x00, 0xDA, 0x00, 0x00).data(vec![0x00; MAX_COMMAND_DATA + 1]);
        assert!(matches!(result, Err(Error::CommandTooLong { len: 65536 })));

        let apdu = ApduCommand::new(0x00, 0xDA, 0x00, 0x00)
            .data(vec![0x00; MAX_COMMAND_DATA])
            .unwrap()
            .encode();
        assert_eq!(&apdu[4..7], &[0x00, 0xFF, 0xFF]);
        assert_eq!(apdu.len(), 7 + MAX_COMMAND_DATA);
    }

    #[test]
    fn test_decode_response() {
        let response = ApduResponse::decode(&[0x6F, 0x00, 0x90, 0x00]).unwrap();
        assert_eq!(response.data, vec![0x6F, 0x00]);
        assert!(response.is_success());
        assert_eq!(response.status_string(), "9000");
    }

    #[test]
    fn test_decode_status_only() {
        let response = ApduResponse::decode(&[0x6A, 0x82]).unwrap();
        assert!(response.data.is_empty());
        assert_eq!(response.status_word(), 0x6A82);
        assert!(!response.is_success());
        assert_eq!(response.describe(), "Error: File or application not found");
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            ApduResponse::decode(&[0x90]),
            Err(Error::MalformedResponse(_))
        ));
        assert!(ApduResponse::decode(&[]).is_err());
    }
}
