use crate::controller::ControllerState;
use crate::events::AppEvent;
use crate::models::ModelRegistry;
use crate::transcript::{Transcript, TranscriptEvent};
use crate::ui::conversation::{
    get_help_text, Composer, ComposerResult, ParsedCommand, SlashCommand, StatusMessage,
    StreamingIndicator, TranscriptView,
};
use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

/// Everything the conversation screen needs to draw one frame
pub struct ViewContext<'a> {
    pub transcript: &'a Transcript,
    pub state: ControllerState,
    pub registry: &'a ModelRegistry,
}

/// Owns the conversation screen state and turns input into [`AppEvent`]s
pub struct ConversationManager {
    composer: Composer,
    status: Option<StatusMessage>,
    timestamps: Vec<DateTime<Local>>,
    show_timestamps: bool,
    show_help: bool,
    tick: u64,
}

impl ConversationManager {
    pub fn new(show_timestamps: bool) -> Self {
        Self {
            composer: Composer::new("Type your message..."),
            status: None,
            timestamps: Vec::new(),
            show_timestamps,
            show_help: false,
            tick: 0,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent, registry: &ModelRegistry, busy: bool) -> Option<AppEvent> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if self.show_help {
            self.show_help = false;
            if key.code == KeyCode::Esc {
                return None;
            }
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(text) => Some(AppEvent::Submit { text }),
            ComposerResult::Command(command) => self.handle_slash_command(command, registry, busy),
            ComposerResult::None => None,
        }
    }

    pub fn handle_paste(&mut self, text: &str) {
        self.composer.paste(text);
    }

    fn handle_slash_command(
        &mut self,
        command: ParsedCommand,
        registry: &ModelRegistry,
        busy: bool,
    ) -> Option<AppEvent> {
        if busy && !command.command.available_during_streaming() {
            return Some(AppEvent::ShowError {
                message: format!("/{} is unavailable while a reply streams", command.command.command()),
            });
        }

        match command.command {
            SlashCommand::Model => match command.argument() {
                Some(id) => Some(AppEvent::SelectModel { id: id.to_string() }),
                None if registry.models().is_empty() => Some(AppEvent::ShowError {
                    message: "No models found".to_string(),
                }),
                None => Some(AppEvent::ShowInfo {
                    message: format!("Models: {}", registry.models().join(", ")),
                }),
            },
            SlashCommand::Models => Some(AppEvent::RefreshModels),
            SlashCommand::Export => Some(AppEvent::Export),
            SlashCommand::Bye => Some(AppEvent::ExitRequest),
            SlashCommand::Help => {
                self.show_help = true;
                None
            }
        }
    }

    /// Record arrival time of appended turns
    pub fn on_transcript_event(&mut self, event: &TranscriptEvent) {
        if let TranscriptEvent::Appended { index, .. } = event {
            if *index >= self.timestamps.len() {
                self.timestamps.resize(*index + 1, Local::now());
            }
        }
    }

    /// Input is enabled only when idle and a model is selected
    pub fn sync(&mut self, state: ControllerState, registry: &ModelRegistry) {
        let enabled = state == ControllerState::Idle && registry.submission_enabled();
        self.composer.set_enabled(enabled);
        self.composer.set_placeholder(if registry.models().is_empty() {
            "No models available"
        } else if state != ControllerState::Idle {
            "Waiting for the reply..."
        } else {
            "Type your message..."
        });
        self.composer.set_title(match registry.selection() {
            Some(model) => format!("Message ({model})"),
            None => "Message".to_string(),
        });
    }

    pub fn set_status(&mut self, status: StatusMessage) {
        self.status = Some(status);
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    /// Advance the thinking animation
    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn render(&self, frame: &mut Frame<'_>, ctx: &ViewContext<'_>) {
        let area = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),    // Transcript
                Constraint::Length(3), // Composer
                Constraint::Length(1), // Status
            ])
            .split(area);

        let mut view = TranscriptView::new(ctx.transcript);
        if ctx.registry.models().is_empty() {
            view = view.empty_hint("No models available. Try /models to fetch the list again.");
        }
        if self.show_timestamps {
            view = view.timestamps(&self.timestamps);
        }
        frame.render_widget(view, chunks[0]);

        frame.render_widget(&self.composer, chunks[1]);

        let indicator = StreamingIndicator::new(ctx.state, ctx.registry.selection(), self.status.as_ref())
            .tick(self.tick);
        frame.render_widget(indicator, chunks[2]);

        if self.show_help {
            let help_area = centered(chunks[0], 60, 12);
            frame.render_widget(Clear, help_area);
            frame.render_widget(
                Paragraph::new(get_help_text())
                    .wrap(Wrap { trim: false })
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .title("Help (Esc to close)")
                            .style(Style::default().fg(Color::Cyan)),
                    ),
                help_area,
            );
        }
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
