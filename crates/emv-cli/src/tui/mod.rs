//! Terminal UI for `watch`: a background worker reads each presented card
//! and the UI thread renders the resulting record.

mod app;
mod card_worker;
mod events;
mod screens;
mod ui;

pub use app::run_tui;
