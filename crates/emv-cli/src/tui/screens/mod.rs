mod card;
mod transactions;

pub use card::CardScreen;
pub use transactions::TransactionsScreen;

use crossterm::event::{KeyCode, KeyEvent};
use emv_card::CardRecord;
use ratatui::{layout::Rect, Frame};

/// Trait for all TUI screens
pub trait Screen {
    /// Handle a key event
    fn handle_key(&mut self, key: KeyEvent);

    /// A new card record arrived; `None` clears the screen
    fn set_record(&mut self, record: Option<&CardRecord>);

    /// Render the screen
    fn render(&self, frame: &mut Frame, area: Rect);

    /// Get the screen title
    fn title(&self) -> &str;
}

/// Shared scroll handling for list screens
pub(crate) fn scroll(offset: u16, key: &KeyEvent) -> u16 {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => offset.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') => offset.saturating_add(1),
        KeyCode::PageUp => offset.saturating_sub(10),
        KeyCode::PageDown => offset.saturating_add(10),
        KeyCode::Home => 0,
        _ => offset,
    }
}
