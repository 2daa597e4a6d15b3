//! Field formatters for human-readable output

use chrono::NaiveDate;
use clap::ValueEnum;
use emv_card::{CardRecord, TransactionRecord};

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatMode {
    /// Raw field values, one `key: value` per line
    Raw,
    /// Human-readable formatted output
    Human,
    /// The card record as JSON
    Json,
}

impl FormatMode {
    pub fn description(&self) -> &'static str {
        match self {
            FormatMode::Raw => "Raw",
            FormatMode::Human => "Human-Readable",
            FormatMode::Json => "JSON",
        }
    }
}

/// Render a card record in the requested mode
pub fn format_record(record: &CardRecord, mode: FormatMode) -> String {
    match mode {
        FormatMode::Json => serde_json::to_string_pretty(record)
            .unwrap_or_else(|err| format!("{{\"error\": \"{}\"}}", err)),
        FormatMode::Raw => format_raw(record),
        FormatMode::Human => format_human(record),
    }
}

fn format_raw(record: &CardRecord) -> String {
    let mut lines = vec![format!("state: {:?}", record.state)];
    let mut push = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            lines.push(format!("{}: {}", key, value));
        }
    };

    push("scheme", record.scheme.clone());
    push(
        "scheme_aids",
        (!record.scheme_aids.is_empty()).then(|| record.scheme_aids.join(",")),
    );
    push("aids", (!record.aids.is_empty()).then(|| record.aids.join(",")));
    push("card_number", record.card_number.clone());
    push("expire_date", record.expire_date.map(|date| date.to_string()));
    push("holder_lastname", record.holder_lastname.clone());
    push("holder_firstname", record.holder_firstname.clone());
    push("track1", record.track1.as_ref().map(|track| track.raw.clone()));
    push("track2", record.track2.as_ref().map(|track| track.raw.clone()));
    push("bic", record.bic.clone());
    push("iban", record.iban.clone());
    push("at", record.at.clone());
    push("atr_description", record.atr_description.clone());
    push("transactions", Some(record.transactions.len().to_string()));

    lines.join("\n")
}

fn format_human(record: &CardRecord) -> String {
    let mut out = String::new();
    let mut field = |label: &str, value: &str| {
        out.push_str(&format!("  {:<18} {}\n", format!("{}:", label), value));
    };

    field("State", &record.state.to_string());
    if let Some(ref scheme) = record.scheme {
        field("Scheme", scheme);
    }
    if !record.scheme_aids.is_empty() {
        field("Scheme AIDs", &record.scheme_aids.join(", "));
    }
    if let Some(ref number) = record.card_number {
        field("Card number", &pretty_card_number(number));
    }
    if let Some(date) = record.expire_date {
        field("Expires", &format_expiry(date));
    }
    let holder = [record.holder_firstname.as_deref(), record.holder_lastname.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !holder.is_empty() {
        field("Holder", &holder);
    }
    if let Some(ref bic) = record.bic {
        field("BIC", bic);
    }
    if let Some(ref iban) = record.iban {
        field("IBAN", iban);
    }
    if let Some(ref at) = record.at {
        field("ATR/ATS", at);
    }
    if let Some(ref description) = record.atr_description {
        field("Card type", description);
    }
    if let Some(ref track2) = record.track2 {
        field("Track 2", &track2.raw.replace('D', " | "));
    }
    if let Some(ref cplc) = record.cplc {
        field("IC serial", &cplc.ic_serial_number);
    }

    if !record.applications.is_empty() {
        out.push_str("\n  Applications:\n");
        for app in &record.applications {
            let name = app
                .preferred_name
                .as_deref()
                .or(app.label.as_deref())
                .unwrap_or("-");
            let priority = app
                .priority
                .map(|p| format!(" (priority {})", p))
                .unwrap_or_default();
            out.push_str(&format!("    {}  {}{}\n", app.aid, name, priority));
            if let Some(atc) = app.transaction_counter {
                out.push_str(&format!("      transaction counter: {}\n", atc));
            }
            if let Some(tries) = app.pin_try_counter {
                out.push_str(&format!("      PIN tries left: {}\n", tries));
            }
        }
    }

    if !record.transactions.is_empty() {
        out.push_str(&format!("\n  Transactions ({}):\n", record.transactions.len()));
        for transaction in &record.transactions {
            out.push_str(&format!("    {}\n", format_transaction(transaction)));
        }
    }

    out
}

/// Card number in groups of four digits
pub fn pretty_card_number(number: &str) -> String {
    number
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_expiry(date: NaiveDate) -> String {
    date.format("%m/%Y").to_string()
}

/// Amount with two decimals, currency and date on one line
pub fn format_transaction(transaction: &TransactionRecord) -> String {
    let date = transaction
        .date
        .map(|date| date.to_string())
        .unwrap_or_else(|| "----------".to_string());
    let time = transaction
        .time
        .map(|time| format!(" {}", time.format("%H:%M:%S")))
        .unwrap_or_default();
    let amount = transaction
        .amount
        .map(|amount| format!("{}.{:02}", amount / 100, amount % 100))
        .unwrap_or_else(|| "?".to_string());
    let currency = transaction
        .currency_code
        .map(|code| {
            get_currency_name(code)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Currency Code {}", code))
        })
        .unwrap_or_default();
    let country = transaction
        .country_code
        .and_then(get_country_name)
        .map(|name| format!(" [{}]", name))
        .unwrap_or_default();

    format!("{}{}  {:>10} {}{}", date, time, amount, currency, country)
}

/// ISO 3166-1 numeric country codes (subset)
pub fn get_country_name(code: u16) -> Option<&'static str> {
    match code {
        124 => Some("Canada"),
        840 => Some("United States"),
        826 => Some("United Kingdom"),
        276 => Some("Germany"),
        250 => Some("France"),
        380 => Some("Italy"),
        724 => Some("Spain"),
        528 => Some("Netherlands"),
        156 => Some("China"),
        392 => Some("Japan"),
        _ => None,
    }
}

/// ISO 4217 numeric currency codes (subset)
pub fn get_currency_name(code: u16) -> Option<&'static str> {
    match code {
        124 => Some("CAD"),
        840 => Some("USD"),
        978 => Some("EUR"),
        826 => Some("GBP"),
        392 => Some("JPY"),
        156 => Some("CNY"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emv_card::{ApplicationSummary, CardState};

    fn record() -> CardRecord {
        CardRecord {
            scheme: Some("Visa".to_string()),
            scheme_aids: vec!["A000000003".to_string(), "A0000000980848".to_string()],
            aids: vec!["A0000000031010".to_string()],
            card_number: Some("4111111111111111".to_string()),
            expire_date: NaiveDate::from_ymd_opt(2025, 12, 31),
            holder_lastname: Some("DOE".to_string()),
            holder_firstname: Some("JANE".to_string()),
            state: CardState::Read,
            ..CardRecord::default()
        }
    }

    #[test]
    fn test_pretty_card_number() {
        assert_eq!(pretty_card_number("4111111111111111"), "4111 1111 1111 1111");
        assert_eq!(pretty_card_number("374245455400126"), "3742 4545 5400 126");
        assert_eq!(pretty_card_number(""), "");
    }

    #[test]
    fn test_human_output() {
        let text = format_record(&record(), FormatMode::Human);
        assert!(text.contains("4111 1111 1111 1111"));
        assert!(text.contains("12/2025"));
        assert!(text.contains("JANE DOE"));
        assert!(text.contains("A000000003, A0000000980848"));
    }

    #[test]
    fn test_human_output_lists_application_counters() {
        let mut record = record();
        record.applications = vec![ApplicationSummary {
            aid: "A0000000031010".to_string(),
            label: Some("VISA".to_string()),
            preferred_name: None,
            priority: Some(1),
            transaction_counter: Some(300),
            pin_try_counter: Some(3),
        }];
        let text = format_record(&record, FormatMode::Human);
        assert!(text.contains("A0000000031010  VISA (priority 1)"));
        assert!(text.contains("transaction counter: 300"));
        assert!(text.contains("PIN tries left: 3"));
    }

    #[test]
    fn test_raw_output() {
        let text = format_record(&record(), FormatMode::Raw);
        assert!(text.starts_with("state: Read"));
        assert!(text.contains("card_number: 4111111111111111"));
        assert!(text.contains("expire_date: 2025-12-31"));
    }

    #[test]
    fn test_transaction_line() {
        let transaction = TransactionRecord {
            amount: Some(4599),
            currency_code: Some(978),
            country_code: Some(250),
            date: NaiveDate::from_ymd_opt(2024, 3, 15),
            ..TransactionRecord::default()
        };
        let line = format_transaction(&transaction);
        assert!(line.starts_with("2024-03-15"));
        assert!(line.contains("45.99 EUR"));
        assert!(line.ends_with("[France]"));
    }
}
