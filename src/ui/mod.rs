//! Terminal setup and input plumbing for the chat screen

pub mod conversation;

use crate::events::TuiEvent;
use anyhow::Result;
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;

pub type Tui = Terminal<CrosstermBackend<io::Stdout>>;

/// Initialize terminal
pub fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal
pub fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Read terminal events on a blocking thread and forward them to the async loop.
/// The thread exits once the receiver is dropped.
pub fn spawn_input_reader() -> mpsc::UnboundedReceiver<TuiEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || loop {
        match event::poll(Duration::from_millis(100)) {
            Ok(true) => {}
            Ok(false) => {
                if tx.is_closed() {
                    break;
                }
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "terminal poll failed");
                break;
            }
        }

        let forwarded = match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => tx.send(TuiEvent::Key(key)),
            Ok(Event::Paste(text)) => tx.send(TuiEvent::Paste(text)),
            Ok(Event::Resize(width, height)) => tx.send(TuiEvent::Resize(width, height)),
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "terminal read failed");
                break;
            }
        };
        if forwarded.is_err() {
            break;
        }
    });

    rx
}
