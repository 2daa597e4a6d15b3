use std::io::{self, Stdout};
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use emv_card::{EmvReader, ReadConfig};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, info, warn};

use super::{
    card_worker::{CardCommand, CardEvent, CardWorker},
    events::{action_for, Action, EventHandler, TuiEvent},
    screens::{CardScreen, Screen, TransactionsScreen},
    ui,
};

const SCREEN_COUNT: usize = 2;

/// Main TUI application
pub struct App {
    /// Current screen index
    selected_screen: usize,
    card_screen: CardScreen,
    transactions_screen: TransactionsScreen,
    /// Whether a card is present
    card_present: bool,
    /// Error message if reader unavailable
    reader_error: Option<String>,
    /// Receiver for card events from background thread
    card_event_rx: Receiver<CardEvent>,
    /// Sender for commands to background thread
    card_command_tx: Sender<CardCommand>,
}

impl App {
    pub fn new(config: ReadConfig, reader_name: Option<String>) -> Self {
        // Spawn background worker for card operations
        let (card_event_rx, card_command_tx) = CardWorker::spawn(EmvReader::new(config), reader_name);

        Self {
            selected_screen: 0,
            card_screen: CardScreen::new(),
            transactions_screen: TransactionsScreen::new(),
            card_present: false,
            reader_error: None,
            card_event_rx,
            card_command_tx,
        }
    }

    /// Process card events from the background worker
    fn process_card_events(&mut self) {
        // Process all available events (non-blocking)
        while let Ok(event) = self.card_event_rx.try_recv() {
            debug!("Card event: {:?}", event);

            match event {
                CardEvent::CardDetected { reader_name } => {
                    info!(reader = %reader_name, "Card detected");
                    self.card_present = true;
                    self.reader_error = None;
                }
                CardEvent::CardRemoved => {
                    info!("Card removed");
                    self.card_present = false;
                    self.card_screen.set_record(None);
                    self.transactions_screen.set_record(None);
                }
                CardEvent::ReadingStarted => {
                    debug!("Card reading started");
                    self.card_screen.set_loading();
                }
                CardEvent::RecordReady { record } => {
                    debug!(state = %record.state, "Card record ready");
                    self.card_screen.set_record(Some(&*record));
                    self.transactions_screen.set_record(Some(&*record));
                }
                CardEvent::Error { message } => {
                    warn!(error = %message, "Card error");
                    self.card_screen.set_error(message);
                }
                CardEvent::ReaderUnavailable { error } => {
                    warn!(error = %error, "Reader unavailable");
                    self.reader_error = Some(format!("Card reader unavailable: {}", error));
                }
                CardEvent::ReaderAvailable => {
                    info!("Reader available");
                    self.reader_error = None;
                }
            }
        }
    }

    fn current_screen(&mut self) -> &mut dyn Screen {
        match self.selected_screen {
            1 => &mut self.transactions_screen,
            _ => &mut self.card_screen,
        }
    }

    /// Handle a key event. Returns `false` when the user asked to quit.
    fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> bool {
        match action_for(&key) {
            Some(Action::Quit) => return false,
            Some(Action::Reread) => {
                let _ = self.card_command_tx.send(CardCommand::Reread);
            }
            Some(Action::NextScreen) => {
                self.selected_screen = (self.selected_screen + 1) % SCREEN_COUNT;
            }
            Some(Action::PrevScreen) => {
                self.selected_screen = (self.selected_screen + SCREEN_COUNT - 1) % SCREEN_COUNT;
            }
            Some(Action::Screen(index)) if index < SCREEN_COUNT => self.selected_screen = index,
            Some(Action::Screen(_)) => {}
            None => self.current_screen().handle_key(key),
        }
        true
    }

    /// Render the application
    fn render(&self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
        terminal.draw(|frame| {
            let screens: [&dyn Screen; SCREEN_COUNT] = [&self.card_screen, &self.transactions_screen];
            ui::render(
                frame,
                &screens,
                self.selected_screen,
                self.card_present,
                self.reader_error.as_deref(),
            );
        })?;
        Ok(())
    }

    /// Run the main event loop
    pub fn run(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
        let event_handler = EventHandler::new(Duration::from_millis(100));

        loop {
            match event_handler.next()? {
                TuiEvent::Key(key) => {
                    if !self.handle_key(key) {
                        info!("Quit requested");
                        // Stop the card worker thread
                        let _ = self.card_command_tx.send(CardCommand::Stop);
                        return Ok(());
                    }
                }
                TuiEvent::Tick => self.process_card_events(),
            }

            // Always render after processing events
            self.render(terminal)?;
        }
    }
}

/// Initialize the terminal for TUI mode
fn init_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore the terminal to normal mode
fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Main entry point for the TUI
pub fn run_tui(config: ReadConfig, reader_name: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting TUI");

    // Set up panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut terminal = init_terminal()?;
    let mut app = App::new(config, reader_name);

    let result = app.run(&mut terminal);

    // Always restore terminal, even on error
    let restore_result = restore_terminal(terminal);

    // Restore original panic hook
    let _ = std::panic::take_hook();

    restore_result?;

    if let Err(e) = result {
        warn!(error = %e, "TUI error");
        return Err(Box::new(e));
    }

    info!("TUI stopped");
    Ok(())
}
