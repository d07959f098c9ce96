//! Ordered conversation transcript with change notifications.

use crate::events::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// One utterance in the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    content: String,
    open: bool,
}

impl Turn {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the turn still accepts fragments
    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// Role/content pair as sent to the export endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: Role,
    pub content: String,
}

/// Change notification emitted after every mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    Appended { index: usize, role: Role },
    FragmentAppended { index: usize, len: usize },
    Closed { index: usize },
    Replaced { index: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("turn {index} is still open")]
    OpenTurnExists { index: usize },
}

/// Append-only list of turns. At most one turn is open and it is always the last one.
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    subscribers: Vec<mpsc::UnboundedSender<TranscriptEvent>>,
    revision: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for transcript changes
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TranscriptEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn append_user_turn(&mut self, text: impl Into<String>) -> Result<usize, TranscriptError> {
        self.ensure_no_open_turn()?;
        Ok(self.push(Turn {
            role: Role::User,
            content: text.into(),
            open: false,
        }))
    }

    /// Append an empty assistant turn that accepts fragments
    pub fn append_open_assistant_turn(&mut self) -> Result<usize, TranscriptError> {
        self.ensure_no_open_turn()?;
        Ok(self.push(Turn {
            role: Role::Assistant,
            content: String::new(),
            open: true,
        }))
    }

    /// Concatenate `text` onto an open turn. Ignored for closed or unknown turns.
    pub fn append_fragment(&mut self, index: usize, text: &str) {
        let Some(turn) = self.turns.get_mut(index) else {
            return;
        };
        if !turn.open {
            return;
        }
        turn.content.push_str(text);
        self.notify(TranscriptEvent::FragmentAppended {
            index,
            len: text.len(),
        });
    }

    pub fn close_turn(&mut self, index: usize) {
        let Some(turn) = self.turns.get_mut(index) else {
            return;
        };
        if !turn.open {
            return;
        }
        turn.open = false;
        self.notify(TranscriptEvent::Closed { index });
    }

    /// Overwrite a turn's content and close it
    pub fn replace_turn_content(&mut self, index: usize, text: impl Into<String>) {
        let Some(turn) = self.turns.get_mut(index) else {
            return;
        };
        turn.content = text.into();
        turn.open = false;
        self.notify(TranscriptEvent::Replaced { index });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Index of the open turn, if any
    pub fn open_turn(&self) -> Option<usize> {
        self.turns
            .last()
            .filter(|turn| turn.open)
            .map(|_| self.turns.len() - 1)
    }

    /// Monotonic counter bumped by every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn to_messages(&self) -> Vec<TurnMessage> {
        self.turns
            .iter()
            .map(|turn| TurnMessage {
                role: turn.role,
                content: turn.content.clone(),
            })
            .collect()
    }

    fn ensure_no_open_turn(&self) -> Result<(), TranscriptError> {
        match self.open_turn() {
            Some(index) => Err(TranscriptError::OpenTurnExists { index }),
            None => Ok(()),
        }
    }

    fn push(&mut self, turn: Turn) -> usize {
        let index = self.turns.len();
        let role = turn.role;
        self.turns.push(turn);
        self.notify(TranscriptEvent::Appended { index, role });
        index
    }

    fn notify(&mut self, event: TranscriptEvent) {
        self.revision += 1;
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_count(transcript: &Transcript) -> usize {
        transcript.turns().iter().filter(|t| t.is_open()).count()
    }

    #[test]
    fn fragments_concatenate_in_order() {
        let mut transcript = Transcript::new();
        transcript.append_user_turn("Hello").unwrap();
        let index = transcript.append_open_assistant_turn().unwrap();
        for fragment in ["Hi", " there", "!"] {
            transcript.append_fragment(index, fragment);
        }
        transcript.close_turn(index);

        assert_eq!(transcript.get(index).unwrap().content(), "Hi there!");
        assert_eq!(open_count(&transcript), 0);
    }

    #[test]
    fn only_one_open_turn_at_a_time() {
        let mut transcript = Transcript::new();
        let index = transcript.append_open_assistant_turn().unwrap();

        assert_eq!(
            transcript.append_open_assistant_turn(),
            Err(TranscriptError::OpenTurnExists { index })
        );
        assert_eq!(
            transcript.append_user_turn("again"),
            Err(TranscriptError::OpenTurnExists { index })
        );
        assert_eq!(open_count(&transcript), 1);
        assert_eq!(transcript.open_turn(), Some(index));
    }

    #[test]
    fn close_is_idempotent() {
        let mut transcript = Transcript::new();
        let index = transcript.append_open_assistant_turn().unwrap();
        transcript.append_fragment(index, "done");
        transcript.close_turn(index);
        let revision = transcript.revision();

        transcript.close_turn(index);

        assert_eq!(transcript.get(index).unwrap().content(), "done");
        assert_eq!(transcript.revision(), revision);
    }

    #[test]
    fn closed_and_missing_turns_ignore_fragments() {
        let mut transcript = Transcript::new();
        let user = transcript.append_user_turn("hey").unwrap();
        transcript.append_fragment(user, " ignored");
        transcript.append_fragment(42, "nowhere");

        assert_eq!(transcript.get(user).unwrap().content(), "hey");
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn replace_overwrites_and_closes() {
        let mut transcript = Transcript::new();
        let index = transcript.append_open_assistant_turn().unwrap();
        transcript.append_fragment(index, "partial");
        transcript.replace_turn_content(index, "Sorry");

        let turn = transcript.get(index).unwrap();
        assert_eq!(turn.content(), "Sorry");
        assert!(!turn.is_open());
        transcript.append_fragment(index, "late");
        assert_eq!(transcript.get(index).unwrap().content(), "Sorry");
    }

    #[test]
    fn subscribers_see_every_mutation() {
        let mut transcript = Transcript::new();
        let mut rx = transcript.subscribe();

        transcript.append_user_turn("q").unwrap();
        let index = transcript.append_open_assistant_turn().unwrap();
        transcript.append_fragment(index, "abc");
        transcript.close_turn(index);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                TranscriptEvent::Appended { index: 0, role: Role::User },
                TranscriptEvent::Appended { index: 1, role: Role::Assistant },
                TranscriptEvent::FragmentAppended { index: 1, len: 3 },
                TranscriptEvent::Closed { index: 1 },
            ]
        );
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut transcript = Transcript::new();
        drop(transcript.subscribe());
        transcript.append_user_turn("q").unwrap();
        assert!(transcript.subscribers.is_empty());
    }

    #[test]
    fn messages_keep_order_and_roles() {
        let mut transcript = Transcript::new();
        transcript.append_user_turn("a").unwrap();
        let index = transcript.append_open_assistant_turn().unwrap();
        transcript.append_fragment(index, "b");

        let messages = transcript.to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].content, "b");
    }
}
