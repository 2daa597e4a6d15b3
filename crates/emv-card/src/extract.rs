//! Field extraction: turns the raw data read from a card into a
//! [`CardRecord`]

use emv_common::{lookup_scheme, tags};

use crate::application::ApplicationData;
use crate::bcd;
use crate::discovery::text;
use crate::error::Error;
use crate::metadata::{describe_atr, Cplc};
use crate::record::{ApplicationSummary, CardRecord, CardState, Track1, Track2};

/// Raw material gathered during one read
#[derive(Debug, Default)]
pub struct CollectedData {
    /// Every candidate that was attempted, in order
    pub applications: Vec<ApplicationData>,
    pub atr: Option<Vec<u8>>,
    pub cplc: Option<Vec<u8>>,
    /// Fatal error that cut the read short
    pub failure: Option<Error>,
}

impl CollectedData {
    fn selected(&self) -> impl Iterator<Item = &ApplicationData> {
        self.applications.iter().filter(|app| app.selected)
    }

    fn first_value(&self, tag: impl AsRef<[u8]>) -> Option<&[u8]> {
        let tag = tag.as_ref();
        self.selected().find_map(|app| app.find_value(tag))
    }
}

/// Build the card record. Values come from the first selected application
/// that carries them.
pub fn extract(collected: &CollectedData) -> CardRecord {
    let track2 = collected
        .first_value(tags::TRACK_2_EQUIVALENT_DATA)
        .or_else(|| collected.first_value(tags::TRACK_2_DATA))
        .and_then(Track2::parse);
    let track1 = collected.first_value(tags::TRACK_1_DATA).and_then(Track1::parse);

    let card_number = collected
        .first_value(tags::APPLICATION_PAN)
        .map(bcd::digits)
        .filter(|pan| !pan.is_empty())
        .or_else(|| track2.as_ref().map(|track| track.card_number.clone()))
        .or_else(|| track1.as_ref().map(|track| track.card_number.clone()));

    // Only 5F24 gives a full date; the track expiry stays on the track.
    let expire_date = collected
        .first_value(tags::APPLICATION_EXPIRATION_DATE)
        .and_then(bcd::date_yymmdd);

    let holder_name = collected
        .first_value(tags::CARDHOLDER_NAME)
        .and_then(text)
        .or_else(|| track1.as_ref().and_then(|track| track.holder_name.clone()));
    let (holder_lastname, holder_firstname) = holder_name
        .as_deref()
        .map(split_holder_name)
        .unwrap_or_default();

    let first_selected = collected.selected().next();
    let known_scheme = first_selected.and_then(|app| lookup_scheme(&app.candidate.aid));
    let scheme = first_selected.and_then(|app| {
        known_scheme
            .map(|scheme| scheme.name.to_string())
            .or_else(|| app.find_value(tags::APPLICATION_LABEL).and_then(text))
            .or_else(|| app.candidate.label.clone())
            .or_else(|| app.find_value(tags::APPLICATION_PREFERRED_NAME).and_then(text))
    });

    let state = if collected.failure.is_some() {
        CardState::UnknownError
    } else if card_number.is_some() {
        CardState::Read
    } else if first_selected.is_some() {
        CardState::DataNotFound
    } else {
        CardState::NoSelectedApplication
    };

    CardRecord {
        scheme,
        scheme_aids: known_scheme.map(|scheme| scheme.aids_hex()).unwrap_or_default(),
        aids: collected.selected().map(|app| app.candidate.aid_hex()).collect(),
        applications: collected
            .selected()
            .map(ApplicationSummary::from)
            .collect(),
        card_number,
        expire_date,
        holder_firstname,
        holder_lastname,
        track1,
        track2,
        bic: collected.first_value(tags::BIC).and_then(text),
        iban: collected.first_value(tags::IBAN).and_then(text),
        at: collected.atr.as_deref().map(hex::encode_upper),
        atr_description: collected
            .atr
            .as_deref()
            .and_then(describe_atr)
            .map(str::to_string),
        cplc: collected.cplc.as_deref().and_then(Cplc::parse),
        transactions: collected
            .selected()
            .flat_map(|app| app.transactions.iter().cloned())
            .collect(),
        state,
    }
}

/// Split an EMV holder name `LAST/FIRST` into (last, first). A name without
/// a separator is taken as the last name.
pub fn split_holder_name(name: &str) -> (Option<String>, Option<String>) {
    let non_empty = |part: &str| {
        let part = part.trim();
        (!part.is_empty()).then(|| part.to_string())
    };

    match name.split_once('/') {
        Some((last, first)) => (non_empty(last), non_empty(first)),
        None => (non_empty(name), None),
    }
}
