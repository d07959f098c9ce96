//! Transcript display component

use crate::events::Role;
use crate::transcript::{Transcript, Turn};
use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Renders the transcript bottom-aligned, with the open turn showing a cursor
pub struct TranscriptView<'a> {
    transcript: &'a Transcript,
    timestamps: &'a [DateTime<Local>],
    show_timestamps: bool,
    empty_hint: &'a str,
}

impl<'a> TranscriptView<'a> {
    pub fn new(transcript: &'a Transcript) -> Self {
        Self {
            transcript,
            timestamps: &[],
            show_timestamps: false,
            empty_hint: "Start a conversation...",
        }
    }

    /// Per-turn arrival times, indexed like the transcript
    pub fn timestamps(mut self, timestamps: &'a [DateTime<Local>]) -> Self {
        self.timestamps = timestamps;
        self.show_timestamps = true;
        self
    }

    pub fn empty_hint(mut self, hint: &'a str) -> Self {
        self.empty_hint = hint;
        self
    }

    /// Render every turn into lines, wrapped to `width`
    pub fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let mut all_lines = Vec::new();
        for (index, turn) in self.transcript.turns().iter().enumerate() {
            all_lines.extend(self.render_turn(index, turn, width));
            all_lines.push(Line::from(""));
        }
        all_lines
    }

    fn render_turn(&self, index: usize, turn: &Turn, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let mut header = String::from(turn.role().display_name());
        if self.show_timestamps {
            if let Some(at) = self.timestamps.get(index) {
                header.push(' ');
                header.push_str(&at.format("%H:%M:%S").to_string());
            }
        }
        header.push(' ');
        header.push_str(&"─".repeat(20));
        lines.push(Line::from(vec![Span::styled(
            header,
            Style::default().fg(Color::DarkGray),
        )]));

        let style = content_style(turn.role());
        let content_lines = wrap_text(turn.content(), width.saturating_sub(2) as usize);
        let last = content_lines.len().saturating_sub(1);
        for (i, content_line) in content_lines.into_iter().enumerate() {
            let mut spans = vec![Span::raw("  "), Span::styled(content_line, style)];
            if turn.is_open() && i == last {
                spans.push(Span::styled("▋", Style::default().fg(Color::Yellow)));
            }
            lines.push(Line::from(spans));
        }

        lines
    }
}

impl Widget for TranscriptView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title("Conversation");

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.transcript.is_empty() {
            let hint = Line::from(vec![Span::styled(
                self.empty_hint,
                Style::default().fg(Color::Gray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &hint, inner_area.width);
            return;
        }

        // Show the newest lines; the open turn is always at the bottom
        let all_lines = self.lines(inner_area.width);
        let height = inner_area.height as usize;
        let start = all_lines.len().saturating_sub(height);

        for (i, line) in all_lines[start..].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

fn content_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Blue),
        Role::Assistant => Style::default().fg(Color::Green),
    }
}

/// Wrap text to fit within the given width, keeping explicit line breaks and
/// indentation. Words wider than a line are split across lines.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        let mut current_width = 0;

        for segment in segments(paragraph) {
            let segment_width = segment.chars().count();
            let is_space = segment.starts_with(char::is_whitespace);

            if current_width + segment_width > width {
                if is_space {
                    // the line breaks here, so the gap is dropped
                    if current_width > 0 {
                        lines.push(std::mem::take(&mut current_line));
                        current_width = 0;
                    }
                    continue;
                }
                if !current_line.trim().is_empty() {
                    lines.push(std::mem::take(&mut current_line).trim_end().to_string());
                    current_width = 0;
                }
            }

            for c in segment.chars() {
                if current_width == width {
                    lines.push(std::mem::take(&mut current_line));
                    current_width = 0;
                }
                current_line.push(c);
                current_width += 1;
            }
        }

        lines.push(current_line);
    }

    lines
}

/// Alternating runs of whitespace and non-whitespace
fn segments(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let space = rest.chars().next()?.is_whitespace();
        let end = rest
            .find(|c: char| c.is_whitespace() != space)
            .unwrap_or(rest.len());
        let (segment, tail) = rest.split_at(end);
        rest = tail;
        Some(segment)
    })
}
