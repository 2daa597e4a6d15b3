use super::{scroll, Screen};
use crate::formatters::format_transaction;
use crossterm::event::KeyEvent;
use emv_card::{CardRecord, TransactionRecord};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

/// Transaction log of the last card
pub struct TransactionsScreen {
    transactions: Option<Vec<TransactionRecord>>,
    scroll_offset: u16,
}

impl TransactionsScreen {
    pub fn new() -> Self {
        Self {
            transactions: None,
            scroll_offset: 0,
        }
    }
}

impl Screen for TransactionsScreen {
    fn handle_key(&mut self, key: KeyEvent) {
        self.scroll_offset = scroll(self.scroll_offset, &key);
    }

    fn set_record(&mut self, record: Option<&CardRecord>) {
        self.transactions = record.map(|record| record.transactions.clone());
        self.scroll_offset = 0;
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Transaction log");

        match self.transactions {
            None => {
                let waiting = Paragraph::new("Waiting for card...")
                    .style(Style::default().fg(Color::Yellow))
                    .block(block);
                frame.render_widget(waiting, area);
            }
            Some(ref transactions) if transactions.is_empty() => {
                let empty = Paragraph::new("No transaction log on this card")
                    .style(Style::default().fg(Color::DarkGray))
                    .block(block);
                frame.render_widget(empty, area);
            }
            Some(ref transactions) => {
                let items: Vec<ListItem> = transactions
                    .iter()
                    .skip(self.scroll_offset as usize)
                    .map(|transaction| ListItem::new(format_transaction(transaction)))
                    .collect();
                frame.render_widget(List::new(items).block(block), area);
            }
        }
    }

    fn title(&self) -> &str {
        "Transactions"
    }
}
