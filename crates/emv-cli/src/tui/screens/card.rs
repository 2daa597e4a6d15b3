use super::{scroll, Screen};
use crate::formatters::{format_expiry, pretty_card_number};
use crossterm::event::KeyEvent;
use emv_card::{CardRecord, CardState};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

/// State of the card screen
#[derive(Debug, Clone, PartialEq)]
enum CardScreenState {
    Waiting,
    Loading,
    Loaded,
    Error(String),
}

/// Card screen showing the fields extracted from the last card
pub struct CardScreen {
    record: Option<CardRecord>,
    state: CardScreenState,
    scroll_offset: u16,
}

impl CardScreen {
    pub fn new() -> Self {
        Self {
            record: None,
            state: CardScreenState::Waiting,
            scroll_offset: 0,
        }
    }

    /// Set the screen to loading state
    pub fn set_loading(&mut self) {
        self.state = CardScreenState::Loading;
    }

    /// Set error state
    pub fn set_error(&mut self, error: String) {
        self.state = CardScreenState::Error(error);
        self.record = None;
    }

    fn lines(record: &CardRecord) -> Vec<ListItem<'static>> {
        let state_color = match record.state {
            CardState::Read => Color::Green,
            CardState::DataNotFound => Color::Yellow,
            CardState::NoSelectedApplication | CardState::UnknownError => Color::Red,
        };

        let mut items = vec![ListItem::new(Line::from(vec![
            Span::styled("State:        ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                record.state.to_string(),
                Style::default().fg(state_color).add_modifier(Modifier::BOLD),
            ),
        ]))];

        let mut field = |label: &'static str, value: Option<String>| {
            if let Some(value) = value {
                items.push(ListItem::new(Line::from(vec![
                    Span::styled(format!("{:<14}", label), Style::default()),
                    Span::raw(value),
                ])));
            }
        };

        let holder = [record.holder_firstname.clone(), record.holder_lastname.clone()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        field("Scheme:", record.scheme.clone());
        field(
            "Scheme AIDs:",
            (!record.scheme_aids.is_empty()).then(|| record.scheme_aids.join(", ")),
        );
        field("Card number:", record.card_number.as_deref().map(pretty_card_number));
        field("Expires:", record.expire_date.map(format_expiry));
        field("Holder:", (!holder.is_empty()).then_some(holder));
        field("AIDs:", (!record.aids.is_empty()).then(|| record.aids.join(", ")));
        field("BIC:", record.bic.clone());
        field("IBAN:", record.iban.clone());
        field("ATR/ATS:", record.at.clone());
        field("Card type:", record.atr_description.clone());
        field("Track 1:", record.track1.as_ref().map(|t| t.raw.clone()));
        field("Track 2:", record.track2.as_ref().map(|t| t.raw.clone()));
        field(
            "CPLC:",
            record
                .cplc
                .as_ref()
                .map(|c| format!("fabricator {} serial {}", c.ic_fabricator, c.ic_serial_number)),
        );

        if !record.applications.is_empty() {
            items.push(ListItem::new(""));
            items.push(ListItem::new(Span::styled(
                "Applications:",
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for app in &record.applications {
                let name = app
                    .preferred_name
                    .clone()
                    .or_else(|| app.label.clone())
                    .unwrap_or_default();
                let counters = match (app.transaction_counter, app.pin_try_counter) {
                    (Some(atc), Some(tries)) => format!("  ATC {}, {} PIN tries", atc, tries),
                    (Some(atc), None) => format!("  ATC {}", atc),
                    (None, Some(tries)) => format!("  {} PIN tries", tries),
                    (None, None) => String::new(),
                };
                items.push(ListItem::new(format!("  {}  {}{}", app.aid, name, counters)));
            }
        }

        items
    }
}

impl Screen for CardScreen {
    fn handle_key(&mut self, key: KeyEvent) {
        self.scroll_offset = scroll(self.scroll_offset, &key);
    }

    fn set_record(&mut self, record: Option<&CardRecord>) {
        self.scroll_offset = 0;
        match record {
            Some(record) => {
                self.record = Some(record.clone());
                self.state = CardScreenState::Loaded;
            }
            None => {
                self.record = None;
                self.state = CardScreenState::Waiting;
            }
        }
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(ratatui::layout::Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let help = Paragraph::new("↑/↓ or j/k: Scroll | r: Read again | Tab: Switch screen | q: Quit")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("Controls"));
        frame.render_widget(help, chunks[0]);

        let status = |text: &str, color: Color, title: &'static str| {
            Paragraph::new(text.to_string())
                .style(Style::default().fg(color))
                .block(Block::default().borders(Borders::ALL).title(title))
        };

        match (&self.state, &self.record) {
            (CardScreenState::Waiting, _) => {
                frame.render_widget(status("Waiting for card...", Color::Yellow, "Status"), chunks[1]);
            }
            (CardScreenState::Loading, _) => {
                frame.render_widget(status("Reading card data...", Color::Cyan, "Status"), chunks[1]);
            }
            (CardScreenState::Error(error), _) => {
                frame.render_widget(status(error, Color::Red, "Error"), chunks[1]);
            }
            (CardScreenState::Loaded, Some(record)) => {
                let items: Vec<_> = Self::lines(record)
                    .into_iter()
                    .skip(self.scroll_offset as usize)
                    .collect();
                let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Card"));
                frame.render_widget(list, chunks[1]);
            }
            (CardScreenState::Loaded, None) => {
                frame.render_widget(status("No data", Color::DarkGray, "Card"), chunks[1]);
            }
        }
    }

    fn title(&self) -> &str {
        "Card"
    }
}
