//! Binary-coded decimal helpers for EMV numeric fields

use chrono::{Months, NaiveDate};

/// Encode `value` as right-aligned BCD in exactly `len` bytes.
/// Digits that do not fit are dropped from the left.
pub fn encode(value: u64, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let mut rest = value;
    for byte in out.iter_mut().rev() {
        let low = (rest % 10) as u8;
        rest /= 10;
        let high = (rest % 10) as u8;
        rest /= 10;
        *byte = (high << 4) | low;
    }
    out
}

/// Digits of a compressed-numeric field with the trailing `F` padding removed
pub fn digits(bytes: &[u8]) -> String {
    hex::encode_upper(bytes).trim_end_matches('F').to_string()
}

/// Numeric value of a BCD field; `None` if any nibble is not a decimal digit
pub fn to_u64(bytes: &[u8]) -> Option<u64> {
    bytes.iter().try_fold(0u64, |acc, byte| {
        let (high, low) = (byte >> 4, byte & 0x0F);
        if high > 9 || low > 9 {
            return None;
        }
        acc.checked_mul(100)?.checked_add((high * 10 + low) as u64)
    })
}

/// Decode a three-byte `YYMMDD` date, years counted from 2000
pub fn date_yymmdd(bytes: &[u8]) -> Option<NaiveDate> {
    let [yy, mm, dd] = bytes else {
        return None;
    };
    let year = to_u64(&[*yy])? as i32;
    let month = to_u64(&[*mm])? as u32;
    let day = to_u64(&[*dd])? as u32;
    NaiveDate::from_ymd_opt(2000 + year, month, day)
}

/// Last calendar day of the given month
pub fn end_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

/// Expiry written as four ASCII digits `YYMM` on magnetic-stripe tracks
pub fn expiry_yymm(text: &str) -> Option<NaiveDate> {
    if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = text[..2].parse().ok()?;
    let month: u32 = text[2..].parse().ok()?;
    end_of_month(2000 + year, month)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pads_left() {
        assert_eq!(encode(250, 2), vec![0x02, 0x50]);
        assert_eq!(encode(978, 2), vec![0x09, 0x78]);
        assert_eq!(encode(0, 6), vec![0; 6]);
    }

    #[test]
    fn test_encode_truncates_high_digits() {
        assert_eq!(encode(123456, 2), vec![0x34, 0x56]);
    }

    #[test]
    fn test_digits_strips_padding() {
        assert_eq!(digits(&[0x41, 0x11, 0x11, 0x1F]), "4111111");
        assert_eq!(digits(&[0x54, 0x13]), "5413");
    }

    #[test]
    fn test_to_u64_rejects_hex_nibbles() {
        assert_eq!(to_u64(&[0x00, 0x01, 0x50]), Some(150));
        assert_eq!(to_u64(&[0x1A]), None);
    }

    #[test]
    fn test_date_yymmdd() {
        assert_eq!(
            date_yymmdd(&[0x25, 0x12, 0x31]),
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
        assert_eq!(date_yymmdd(&[0x25, 0x13, 0x01]), None);
        assert_eq!(date_yymmdd(&[0x25, 0x12]), None);
    }

    #[test]
    fn test_end_of_month() {
        assert_eq!(end_of_month(2024, 2), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(expiry_yymm("2512"), NaiveDate::from_ymd_opt(2025, 12, 31));
        assert_eq!(expiry_yymm("2500"), None);
        assert_eq!(expiry_yymm("25x2"), None);
    }
}
