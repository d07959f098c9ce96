//! In-memory transport for unit tests.

use crate::transcript::TurnMessage;
use crate::transport::{ChatBody, ChatTransport, ExportResponse, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted reply for one `open_chat` call
#[derive(Debug, Clone)]
pub enum ChatScript {
    Chunks(Vec<Result<Vec<u8>, String>>),
    Status(u16),
    NetworkError,
    NoBody,
    /// Answer with the inner script after a short delay
    Slow(Box<ChatScript>),
}

impl ChatScript {
    pub fn chunks<'a>(chunks: impl IntoIterator<Item = &'a str>) -> Self {
        ChatScript::Chunks(chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec())).collect())
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    models: Option<Vec<String>>,
    chats: Mutex<VecDeque<ChatScript>>,
    chat_requests: Mutex<Vec<(String, String)>>,
    export_reply: Option<ExportResponse>,
    exports: Mutex<Vec<Vec<TurnMessage>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models<S: Into<String>>(mut self, models: Vec<S>) -> Self {
        self.models = Some(models.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_models_error(mut self) -> Self {
        self.models = None;
        self
    }

    pub fn with_chat(self, script: ChatScript) -> Self {
        self.chats.lock().unwrap().push_back(script);
        self
    }

    pub fn with_export(mut self, bytes: &'static [u8], filename: Option<&str>) -> Self {
        self.export_reply = Some(ExportResponse {
            bytes: Bytes::from_static(bytes),
            filename: filename.map(str::to_string),
        });
        self
    }

    pub fn chat_requests(&self) -> Vec<(String, String)> {
        self.chat_requests.lock().unwrap().clone()
    }

    pub fn exports(&self) -> Vec<Vec<TurnMessage>> {
        self.exports.lock().unwrap().clone()
    }

    fn status_error(code: u16) -> TransportError {
        TransportError::Status {
            status: StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: String::new(),
        }
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn fetch_models(&self) -> Result<Vec<String>, TransportError> {
        self.models.clone().ok_or_else(|| Self::status_error(503))
    }

    async fn open_chat(&self, message: &str, model: &str) -> Result<ChatBody, TransportError> {
        self.chat_requests
            .lock()
            .unwrap()
            .push((message.to_string(), model.to_string()));

        let mut script = self
            .chats
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ChatScript::NoBody);
        if let ChatScript::Slow(inner) = script {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            script = *inner;
        }

        match script {
            ChatScript::Chunks(chunks) => {
                let items = chunks
                    .into_iter()
                    .map(|chunk| chunk.map(Bytes::from).map_err(TransportError::Stream));
                Ok(ChatBody::Stream(futures::stream::iter(items).boxed()))
            }
            ChatScript::Status(code) => Err(Self::status_error(code)),
            ChatScript::NetworkError => Err(TransportError::Stream("connection refused".to_string())),
            ChatScript::NoBody | ChatScript::Slow(_) => Ok(ChatBody::Empty),
        }
    }

    async fn export(&self, messages: &[TurnMessage]) -> Result<ExportResponse, TransportError> {
        self.exports.lock().unwrap().push(messages.to_vec());
        self.export_reply.clone().ok_or_else(|| Self::status_error(500))
    }
}
