use crate::decoder::StreamDecoder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the chat response body is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    /// Body is plain text, every decoded chunk is a fragment
    #[default]
    Raw,
    /// Body is newline-delimited JSON with `content` and `usage` records
    Ndjson,
}

/// Token counts reported at the end of an NDJSON stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_eval_count: u64,
    #[serde(default)]
    pub eval_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireFrame {
    Content { content: String },
    Usage(Usage),
}

/// A decoded unit of an NDJSON body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Content(String),
    Usage(Usage),
    /// Line that is not a recognised record, passed through as text
    Raw(String),
}

/// Splits decoded text into lines and parses each complete line
#[derive(Debug, Default, Clone)]
pub struct NdjsonFramer {
    current_line: String,
}

impl NdjsonFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process decoded text, returning frames for every completed line
    pub fn push(&mut self, text: &str) -> Vec<Frame> {
        self.current_line.push_str(text);

        let mut frames = Vec::new();
        while let Some(newline_pos) = self.current_line.find('\n') {
            let line: String = self.current_line.drain(..=newline_pos).collect();
            if let Some(frame) = Self::parse_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Parse whatever partial line remains at end of stream
    pub fn finish(&mut self) -> Vec<Frame> {
        let line = std::mem::take(&mut self.current_line);
        Self::parse_line(&line).into_iter().collect()
    }

    fn parse_line(line: &str) -> Option<Frame> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        match serde_json::from_str::<WireFrame>(trimmed) {
            Ok(WireFrame::Content { content }) => Some(Frame::Content(content)),
            Ok(WireFrame::Usage(usage)) => Some(Frame::Usage(usage)),
            Err(_) => Some(Frame::Raw(line.to_string())),
        }
    }
}

/// Transient state for one in-flight chat request
#[derive(Debug)]
pub struct StreamSession {
    id: Uuid,
    turn_index: usize,
    decoder: StreamDecoder,
    framer: Option<NdjsonFramer>,
    closed: bool,
    usage: Option<Usage>,
}

impl StreamSession {
    pub fn new(turn_index: usize, format: StreamFormat) -> Self {
        let framer = match format {
            StreamFormat::Raw => None,
            StreamFormat::Ndjson => Some(NdjsonFramer::new()),
        };

        Self {
            id: Uuid::new_v4(),
            turn_index,
            decoder: StreamDecoder::new(),
            framer,
            closed: false,
            usage: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Transcript index of the turn being filled
    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// Turn a raw chunk into the fragment text to append. May be empty.
    pub fn ingest(&mut self, bytes: &[u8]) -> String {
        if self.closed {
            return String::new();
        }
        let text = self.decoder.decode_chunk(bytes);
        self.frame(text, false)
    }

    /// Flush decoder and framer state and close the session
    pub fn finish(&mut self) -> String {
        if self.closed {
            return String::new();
        }
        let text = self.decoder.finish();
        let fragment = self.frame(text, true);
        self.closed = true;
        fragment
    }

    fn frame(&mut self, text: String, last: bool) -> String {
        let Some(framer) = self.framer.as_mut() else {
            return text;
        };

        let mut frames = framer.push(&text);
        if last {
            frames.extend(framer.finish());
        }

        let mut fragment = String::new();
        for frame in frames {
            match frame {
                Frame::Content(content) => fragment.push_str(&content),
                Frame::Raw(line) => fragment.push_str(&line),
                Frame::Usage(usage) => {
                    tracing::debug!(
                        session = %self.id,
                        prompt_tokens = usage.prompt_eval_count,
                        completion_tokens = usage.eval_count,
                        "stream reported usage"
                    );
                    self.usage = Some(usage);
                }
            }
        }
        fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_session_passes_decoded_text() {
        let mut session = StreamSession::new(1, StreamFormat::Raw);
        let crab = "🦀!".as_bytes();
        assert_eq!(session.ingest(&crab[..1]), "");
        assert_eq!(session.ingest(&crab[1..]), "🦀!");
        assert_eq!(session.finish(), "");
        assert!(session.is_closed());
        assert_eq!(session.turn_index(), 1);
    }

    #[test]
    fn closed_session_ignores_input() {
        let mut session = StreamSession::new(0, StreamFormat::Raw);
        session.finish();
        assert_eq!(session.ingest(b"late"), "");
        assert_eq!(session.finish(), "");
    }

    #[test]
    fn framer_waits_for_complete_lines() {
        let mut framer = NdjsonFramer::new();
        assert!(framer.push("{\"type\":\"content\",").is_empty());
        assert_eq!(
            framer.push("\"content\":\"Hi\"}\n{\"type\":\"content\",\"content\":\" there\"}\n"),
            vec![
                Frame::Content("Hi".to_string()),
                Frame::Content(" there".to_string())
            ]
        );
    }

    #[test]
    fn framer_passes_unknown_lines_through() {
        let mut framer = NdjsonFramer::new();
        assert_eq!(
            framer.push("plain text\n\n"),
            vec![Frame::Raw("plain text\n".to_string())]
        );
        assert!(framer.push("tail").is_empty());
        assert_eq!(framer.finish(), vec![Frame::Raw("tail".to_string())]);
    }

    #[test]
    fn ndjson_session_extracts_content_and_usage() {
        let mut session = StreamSession::new(3, StreamFormat::Ndjson);
        let body = concat!(
            "{\"type\":\"content\",\"content\":\"Hel\"}\n",
            "{\"type\":\"content\",\"content\":\"lo\"}\n",
            "{\"type\":\"usage\",\"prompt_eval_count\":5,\"eval_count\":2}"
        );
        let (first, second) = body.split_at(20);

        let mut text = session.ingest(first.as_bytes());
        text.push_str(&session.ingest(second.as_bytes()));
        text.push_str(&session.finish());

        assert_eq!(text, "Hello");
        assert_eq!(
            session.usage(),
            Some(Usage {
                prompt_eval_count: 5,
                eval_count: 2
            })
        );
    }
}
