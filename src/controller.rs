//! Request/response cycle for one chat submission.
//!
//! The controller walks `Idle -> Sending -> Streaming -> (Closing | Failed) -> Idle`.
//! `submit` performs the synchronous first transition; every later transition
//! is one call to [`IngestionController::advance`], so the caller decides when
//! to suspend and can keep its UI responsive between chunks.

use crate::streaming::{StreamFormat, StreamSession, Usage};
use crate::transcript::{Transcript, TranscriptEvent};
use crate::transport::{ByteStream, ChatBody, ChatTransport, TransportError};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shown in place of the reply when a request fails
pub const FAILURE_MESSAGE: &str = "Sorry, something went wrong.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Sending,
    Streaming,
    Closing,
    Failed,
}

impl ControllerState {
    pub fn display_name(&self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::Sending => "sending",
            ControllerState::Streaming => "streaming",
            ControllerState::Closing => "closing",
            ControllerState::Failed => "failed",
        }
    }
}

/// Why a submission was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyMessage,
    NoModel,
    Busy,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::EmptyMessage => write!(f, "message is empty"),
            RejectReason::NoModel => write!(f, "no model selected"),
            RejectReason::Busy => write!(f, "a reply is still streaming"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { turn_index: usize },
    Rejected(RejectReason),
}

/// How the last finished cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Stream ran to its end
    Completed,
    /// Response had no body; the reply turn stays empty
    Empty,
    /// Transport error or non-success status; the reply shows the apology
    Failed,
}

type PendingResponse = BoxFuture<'static, Result<ChatBody, TransportError>>;

pub struct IngestionController<T> {
    transport: Arc<T>,
    transcript: Transcript,
    format: StreamFormat,
    state: ControllerState,
    // Kept across `advance` calls so a dropped `advance` future does not lose the request
    request: Option<PendingResponse>,
    session: Option<StreamSession>,
    body: Option<ByteStream>,
    last_outcome: Option<CycleOutcome>,
    last_usage: Option<Usage>,
}

impl<T: ChatTransport + 'static> IngestionController<T> {
    pub fn new(transport: T, format: StreamFormat) -> Self {
        Self {
            transport: Arc::new(transport),
            transcript: Transcript::new(),
            format,
            state: ControllerState::Idle,
            request: None,
            session: None,
            body: None,
            last_outcome: None,
            last_usage: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Owned handle for requests issued outside a cycle
    pub fn shared_transport(&self) -> Arc<T> {
        Arc::clone(&self.transport)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TranscriptEvent> {
        self.transcript.subscribe()
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// True from submission until the cycle is back to `Idle`
    pub fn is_busy(&self) -> bool {
        self.state != ControllerState::Idle
    }

    pub fn last_outcome(&self) -> Option<CycleOutcome> {
        self.last_outcome
    }

    /// Token counts from the last NDJSON stream that reported them
    pub fn last_usage(&self) -> Option<Usage> {
        self.last_usage
    }

    /// Start a cycle: append the user turn and an open reply turn.
    pub fn submit(&mut self, text: &str, model: Option<&str>) -> SubmitOutcome {
        if self.is_busy() {
            return SubmitOutcome::Rejected(RejectReason::Busy);
        }
        if text.trim().is_empty() {
            return SubmitOutcome::Rejected(RejectReason::EmptyMessage);
        }
        let Some(model) = model.filter(|m| !m.is_empty()) else {
            return SubmitOutcome::Rejected(RejectReason::NoModel);
        };

        let turn_index = match self
            .transcript
            .append_user_turn(text)
            .and_then(|_| self.transcript.append_open_assistant_turn())
        {
            Ok(index) => index,
            Err(e) => {
                tracing::error!(error = %e, "transcript rejected new submission");
                return SubmitOutcome::Rejected(RejectReason::Busy);
            }
        };

        let session = StreamSession::new(turn_index, self.format);
        tracing::info!(session = %session.id(), model, turn = turn_index, "submitting message");

        let transport = Arc::clone(&self.transport);
        let message = text.to_string();
        let model = model.to_string();
        self.request = Some(async move { transport.open_chat(&message, &model).await }.boxed());
        self.session = Some(session);
        self.last_outcome = None;
        self.state = ControllerState::Sending;

        SubmitOutcome::Accepted { turn_index }
    }

    /// Perform one transition out of the current state and return the new state.
    pub async fn advance(&mut self) -> ControllerState {
        match self.state {
            ControllerState::Idle => {}
            ControllerState::Sending => self.send_request().await,
            ControllerState::Streaming => self.pull_chunk().await,
            ControllerState::Closing => self.close(),
            ControllerState::Failed => self.finish_cycle(),
        }
        self.state
    }

    /// Drive the current cycle until the controller is idle again
    pub async fn run_to_idle(&mut self) -> Option<CycleOutcome> {
        while self.is_busy() {
            self.advance().await;
        }
        self.last_outcome
    }

    /// Submit and run the whole cycle
    pub async fn send(&mut self, text: &str, model: Option<&str>) -> Result<CycleOutcome, RejectReason> {
        match self.submit(text, model) {
            SubmitOutcome::Accepted { .. } => Ok(self
                .run_to_idle()
                .await
                .unwrap_or(CycleOutcome::Failed)),
            SubmitOutcome::Rejected(reason) => Err(reason),
        }
    }

    async fn send_request(&mut self) {
        let Some(request) = self.request.as_mut() else {
            self.fail("no pending request");
            return;
        };
        let response = request.await;
        self.request = None;

        match response {
            Ok(ChatBody::Stream(body)) => {
                self.body = Some(body);
                self.state = ControllerState::Streaming;
            }
            Ok(ChatBody::Empty) => {
                tracing::debug!(session = %self.session_id(), "response has no body");
                self.last_outcome = Some(CycleOutcome::Empty);
                self.state = ControllerState::Closing;
            }
            Err(e) => self.fail(e),
        }
    }

    async fn pull_chunk(&mut self) {
        let next = match self.body.as_mut() {
            Some(body) => body.next().await,
            None => None,
        };

        match next {
            Some(Ok(bytes)) => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                let fragment = session.ingest(&bytes);
                if !fragment.is_empty() {
                    self.transcript.append_fragment(session.turn_index(), &fragment);
                }
            }
            Some(Err(e)) => self.fail(e),
            None => {
                self.body = None;
                self.state = ControllerState::Closing;
            }
        }
    }

    fn close(&mut self) {
        if let Some(session) = self.session.as_mut() {
            let tail = session.finish();
            let index = session.turn_index();
            if !tail.is_empty() {
                self.transcript.append_fragment(index, &tail);
            }
            self.transcript.close_turn(index);
            if let Some(usage) = session.usage() {
                self.last_usage = Some(usage);
            }
            tracing::info!(
                session = %session.id(),
                chars = self.transcript.get(index).map(|t| t.content().chars().count()).unwrap_or(0),
                "reply complete"
            );
        }
        self.last_outcome.get_or_insert(CycleOutcome::Completed);
        self.finish_cycle();
    }

    fn fail(&mut self, error: impl fmt::Display) {
        tracing::error!(session = %self.session_id(), error = %error, "chat request failed");
        self.body = None;
        self.request = None;
        if let Some(session) = self.session.as_ref() {
            self.transcript
                .replace_turn_content(session.turn_index(), FAILURE_MESSAGE);
        }
        self.last_outcome = Some(CycleOutcome::Failed);
        self.state = ControllerState::Failed;
    }

    fn finish_cycle(&mut self) {
        self.session = None;
        self.body = None;
        self.request = None;
        self.state = ControllerState::Idle;
    }

    fn session_id(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.id().to_string())
            .unwrap_or_default()
    }
}
