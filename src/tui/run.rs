//! TUI entry point and terminal setup.

use std::io;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen}
};
use ratatui::{prelude::CrosstermBackend, Terminal};

use crate::config::Settings;
use crate::db::Database;
use crate::fields::Scope;
use crate::tui::app::CatalogApp;

/// Initialise and run the catalogue browser, restoring the terminal on exit.
pub fn run_tui(db: Database, settings: Settings, search: Option<String>, scope: Scope, org: Option<String>) -> io::Result<()> {
    let mut app = CatalogApp::new(db, settings, scope, org);
    if let Some(q) = search {
        app.set_filter(&q);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}
