use crate::transport::{ChatTransport, TransportError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown model: {0}")]
    UnknownModel(String),
}

/// Available model identifiers and the current selection
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<String>,
    selected: Option<String>,
}

impl ModelRegistry {
    /// Empty registry, populated later by `fetch_models`
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a single hardcoded model; no fetch is needed
    pub fn fixed(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            models: vec![model.clone()],
            selected: Some(model),
        }
    }

    /// Fetch the model list. On failure the set is left empty and the error is
    /// returned for display; submission stays disabled.
    pub async fn fetch_models<T>(&mut self, transport: &T) -> Result<&[String], TransportError>
    where
        T: ChatTransport + ?Sized,
    {
        let fetched = transport.fetch_models().await;
        self.apply_fetch(fetched)
    }

    /// Store the outcome of a `GET /models` issued elsewhere
    pub fn apply_fetch(
        &mut self,
        fetched: Result<Vec<String>, TransportError>,
    ) -> Result<&[String], TransportError> {
        match fetched {
            Ok(models) => {
                tracing::info!(count = models.len(), "fetched model list");
                self.replace_models(models);
                Ok(&self.models)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch models");
                self.models.clear();
                self.selected = None;
                Err(e)
            }
        }
    }

    pub fn set_selection(&mut self, id: &str) -> Result<(), ModelError> {
        if !self.models.iter().any(|m| m == id) {
            return Err(ModelError::UnknownModel(id.to_string()));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    /// Prefer `id` when it is offered, otherwise keep the current selection
    pub fn prefer(&mut self, id: &str) {
        if self.set_selection(id).is_err() {
            tracing::debug!(model = id, "preferred model not offered");
        }
    }

    pub fn selection(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn submission_enabled(&self) -> bool {
        self.selected.is_some()
    }

    fn replace_models(&mut self, models: Vec<String>) {
        self.models = models;
        let still_offered = self
            .selected
            .as_ref()
            .is_some_and(|current| self.models.contains(current));
        if !still_offered {
            self.selected = self.models.first().cloned();
        }
    }
}
