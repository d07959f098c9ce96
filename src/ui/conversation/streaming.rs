use crate::controller::ControllerState;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};

/// Severity of the status line message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusType {
    Info,
    Success,
    Error,
}

/// One-line status shown under the composer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusType,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self { kind: StatusType::Info, text: text.into() }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self { kind: StatusType::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: StatusType::Error, text: text.into() }
    }
}

/// "Thinking..." line while a reply is in flight, otherwise the last status
pub struct StreamingIndicator<'a> {
    state: ControllerState,
    model: Option<&'a str>,
    status: Option<&'a StatusMessage>,
    tick: u64,
}

impl<'a> StreamingIndicator<'a> {
    pub fn new(state: ControllerState, model: Option<&'a str>, status: Option<&'a StatusMessage>) -> Self {
        Self {
            state,
            model,
            status,
            tick: 0,
        }
    }

    /// Animation frame counter
    pub fn tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    pub fn line(&self) -> Line<'static> {
        let model = self.model.unwrap_or("no model").to_string();
        let model_span = Span::styled(format!("[{model}] "), Style::default().fg(Color::DarkGray));

        match self.state {
            ControllerState::Sending | ControllerState::Streaming | ControllerState::Closing => {
                let dots = match self.tick % 4 {
                    0 => ".",
                    1 => "..",
                    2 => "...",
                    _ => "",
                };
                Line::from(vec![
                    model_span,
                    Span::styled(
                        format!("Thinking{dots}"),
                        Style::default().fg(Color::Yellow),
                    ),
                    Span::styled(
                        format!(" ({})", self.state.display_name()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ])
            }
            ControllerState::Idle | ControllerState::Failed => match self.status {
                Some(status) => {
                    let (prefix, color) = match status.kind {
                        StatusType::Info => ("", Color::Gray),
                        StatusType::Success => ("✓ ", Color::Green),
                        StatusType::Error => ("✗ ", Color::Red),
                    };
                    Line::from(vec![
                        model_span,
                        Span::styled(format!("{prefix}{}", status.text), Style::default().fg(color)),
                    ])
                }
                None => Line::from(vec![model_span]),
            },
        }
    }
}

impl Widget for StreamingIndicator<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let line = self.line();
        buf.set_line(area.x, area.y, &line, area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn busy_states_show_thinking() {
        let line = StreamingIndicator::new(ControllerState::Streaming, Some("m1"), None)
            .tick(2)
            .line();
        assert_eq!(text(&line), "[m1] Thinking... (streaming)");
    }

    #[test]
    fn idle_shows_status() {
        let status = StatusMessage::error("Failed to export chat history");
        let line = StreamingIndicator::new(ControllerState::Idle, None, Some(&status)).line();
        assert_eq!(text(&line), "[no model] ✗ Failed to export chat history");
    }
}
