use crate::config::{Config, ModelSource};
use crate::controller::{CycleOutcome, IngestionController, SubmitOutcome};
use crate::events::{AppEvent, TuiEvent};
use crate::export::{ExportAdapter, ExportError};
use crate::models::ModelRegistry;
use crate::transcript::TranscriptEvent;
use crate::transport::{ChatTransport, HttpTransport, TransportError};
use crate::ui::conversation::{ConversationManager, StatusMessage, ViewContext};
use crate::ui::{self, Tui};
use anyhow::{Context, Result};
use futures::future::{BoxFuture, OptionFuture};
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::Duration;

type PendingModels = BoxFuture<'static, Result<Vec<String>, TransportError>>;

/// Interactive chat application: one controller, one model registry, one screen
pub struct App<T = HttpTransport> {
    controller: IngestionController<T>,
    registry: ModelRegistry,
    exporter: ExportAdapter,
    manager: ConversationManager,
    transcript_rx: mpsc::UnboundedReceiver<TranscriptEvent>,
    model_source: ModelSource,
    preferred_model: Option<String>,
    pending_models: Option<PendingModels>,
    drawn_revision: Option<u64>,
    dirty: bool,
    should_quit: bool,
}

impl App<HttpTransport> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(config.base_url.clone())
            .context("Failed to create HTTP client")?;
        Ok(Self::new(config, transport))
    }
}

impl<T: ChatTransport + 'static> App<T> {
    pub fn new(config: &Config, transport: T) -> Self {
        let mut controller = IngestionController::new(transport, config.stream_format);
        let transcript_rx = controller.subscribe();

        let registry = match (config.models.source, config.models.default_model.as_deref()) {
            (ModelSource::Fixed, Some(model)) => ModelRegistry::fixed(model),
            _ => ModelRegistry::new(),
        };

        Self {
            controller,
            registry,
            exporter: ExportAdapter::new(config.export.enabled, config.export_dir()),
            manager: ConversationManager::new(config.ui.show_timestamps),
            transcript_rx,
            model_source: config.models.source,
            preferred_model: config.models.default_model.clone(),
            pending_models: None,
            drawn_revision: None,
            dirty: true,
            should_quit: false,
        }
    }

    /// One-shot model fetch at startup, awaited in place
    pub async fn initialize(&mut self) {
        if self.model_source == ModelSource::Remote {
            self.request_models();
            self.finish_model_fetch().await;
        }
    }

    pub async fn run(mut self, terminal: &mut Tui) -> Result<()> {
        let mut input = ui::spawn_input_reader();
        let mut ticker = tokio::time::interval(Duration::from_millis(300));

        if self.model_source == ModelSource::Remote {
            self.request_models();
        }

        while !self.should_quit {
            self.drain_transcript_events();
            self.manager.sync(self.controller.state(), &self.registry);
            self.draw(terminal)?;

            let state = self.controller.state();
            let busy = self.controller.is_busy();
            let mut models_fetch = self.pending_models.take();
            tokio::select! {
                Some(event) = input.recv() => {
                    self.handle_tui_event(event).await;
                    self.dirty = true;
                }
                Some(fetched) = OptionFuture::from(models_fetch.as_mut()), if models_fetch.is_some() => {
                    models_fetch = None;
                    self.apply_models(fetched);
                    self.dirty = true;
                }
                next = self.controller.advance(), if busy => {
                    self.dirty |= next != state;
                    self.after_advance();
                }
                _ = ticker.tick() => {
                    self.manager.tick();
                    self.dirty = true;
                }
            }
            // A refresh requested during this iteration replaces the one in flight
            if self.pending_models.is_none() {
                self.pending_models = models_fetch;
            }
        }

        Ok(())
    }

    /// Redraw when the transcript revision moved or anything else changed
    fn draw(&mut self, terminal: &mut Tui) -> Result<()> {
        let revision = self.controller.transcript().revision();
        if !self.dirty && self.drawn_revision == Some(revision) {
            return Ok(());
        }

        terminal.draw(|frame| {
            let ctx = ViewContext {
                transcript: self.controller.transcript(),
                state: self.controller.state(),
                registry: &self.registry,
            };
            self.manager.render(frame, &ctx);
        })?;

        self.drawn_revision = Some(revision);
        self.dirty = false;
        Ok(())
    }

    async fn handle_tui_event(&mut self, event: TuiEvent) {
        match event {
            TuiEvent::Key(key) => {
                let busy = self.controller.is_busy();
                if let Some(app_event) = self.manager.handle_key(key, &self.registry, busy) {
                    self.handle_app_event(app_event).await;
                }
            }
            TuiEvent::Paste(text) => self.manager.handle_paste(&text),
            TuiEvent::Resize(..) => {}
        }
    }

    pub async fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Submit { text } => {
                match self.controller.submit(&text, self.registry.selection()) {
                    SubmitOutcome::Accepted { .. } => {}
                    SubmitOutcome::Rejected(reason) => {
                        tracing::debug!(%reason, "submission rejected");
                        self.manager.set_status(StatusMessage::error(format!("Not sent: {reason}")));
                    }
                }
            }
            AppEvent::RefreshModels => match self.model_source {
                ModelSource::Remote => self.request_models(),
                ModelSource::Fixed => self
                    .manager
                    .set_status(StatusMessage::info("Model list is fixed by config")),
            },
            AppEvent::SelectModel { id } => match self.registry.set_selection(&id) {
                Ok(()) => self.manager.set_status(StatusMessage::success(format!("Model set to {id}"))),
                Err(e) => self.manager.set_status(StatusMessage::error(e.to_string())),
            },
            AppEvent::Export => self.export().await,
            AppEvent::ExitRequest => self.should_quit = true,
            AppEvent::ShowError { message } => self.manager.set_status(StatusMessage::error(message)),
            AppEvent::ShowInfo { message } => self.manager.set_status(StatusMessage::info(message)),
        }
    }

    /// Start `GET /models` without waiting for it; `run` polls it alongside input
    fn request_models(&mut self) {
        let transport = self.controller.shared_transport();
        self.pending_models = Some(async move { transport.fetch_models().await }.boxed());
        self.manager.set_status(StatusMessage::info("Fetching models..."));
    }

    /// Await a model fetch started by `request_models`, if any
    pub async fn finish_model_fetch(&mut self) {
        if let Some(pending) = self.pending_models.take() {
            let fetched = pending.await;
            self.apply_models(fetched);
        }
    }

    fn apply_models(&mut self, fetched: Result<Vec<String>, TransportError>) {
        let fetched = self.registry.apply_fetch(fetched).map(|models| models.len());

        match fetched {
            Ok(0) => self.manager.set_status(StatusMessage::error("No models found")),
            Ok(count) => {
                if let Some(preferred) = self.preferred_model.as_deref() {
                    self.registry.prefer(preferred);
                }
                self.manager.set_status(StatusMessage::info(format!("{count} models available")));
            }
            Err(e) => {
                self.manager.set_status(StatusMessage::error(format!("Failed to fetch models: {e}")));
            }
        }
    }

    async fn export(&mut self) {
        let result = self
            .exporter
            .export_to_file(self.controller.transport(), self.controller.transcript())
            .await;

        match result {
            Ok(path) => self
                .manager
                .set_status(StatusMessage::success(format!("Exported to {}", path.display()))),
            Err(ExportError::Disabled) => self
                .manager
                .set_status(StatusMessage::error("Export is disabled in config")),
            Err(e) => {
                tracing::error!(error = %e, "export failed");
                self.manager
                    .set_status(StatusMessage::error("Failed to export chat history"));
            }
        }
    }

    fn after_advance(&mut self) {
        if self.controller.is_busy() {
            return;
        }
        match self.controller.last_outcome() {
            Some(CycleOutcome::Failed) => self
                .manager
                .set_status(StatusMessage::error("Request failed, see log for details")),
            Some(CycleOutcome::Empty) => self.manager.set_status(StatusMessage::info("Empty reply")),
            Some(CycleOutcome::Completed) => {
                if let Some(usage) = self.controller.last_usage() {
                    self.manager.set_status(StatusMessage::info(format!(
                        "{} prompt / {} reply tokens",
                        usage.prompt_eval_count, usage.eval_count
                    )));
                }
            }
            None => {}
        }
    }

    fn drain_transcript_events(&mut self) {
        while let Ok(event) = self.transcript_rx.try_recv() {
            self.manager.on_transcript_event(&event);
        }
    }

    pub fn controller(&self) -> &IngestionController<T> {
        &self.controller
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn manager(&self) -> &ConversationManager {
        &self.manager
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Drive an accepted submission to completion without a terminal
    pub async fn finish_cycle(&mut self) {
        while self.controller.is_busy() {
            self.controller.advance().await;
            self.after_advance();
        }
        self.drain_transcript_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FAILURE_MESSAGE;
    use crate::testing::{ChatScript, ScriptedTransport};
    use crate::ui::conversation::StatusType;

    fn remote_config() -> Config {
        let mut config = Config::default();
        config.home = std::env::temp_dir().join("streamchat-app-tests");
        config
    }

    #[tokio::test]
    async fn startup_fetch_selects_first_model() {
        let transport = ScriptedTransport::new().with_models(vec!["m1", "m2"]);
        let mut app = App::new(&remote_config(), transport);

        app.initialize().await;

        assert_eq!(app.registry().selection(), Some("m1"));
    }

    #[tokio::test]
    async fn configured_default_wins_when_offered() {
        let transport = ScriptedTransport::new().with_models(vec!["m1", "m2"]);
        let mut config = remote_config();
        config.models.default_model = Some("m2".to_string());
        let mut app = App::new(&config, transport);

        app.initialize().await;

        assert_eq!(app.registry().selection(), Some("m2"));
    }

    #[tokio::test]
    async fn fixed_source_skips_fetch() {
        let transport = ScriptedTransport::new().with_models_error();
        let mut config = remote_config();
        config.models.source = ModelSource::Fixed;
        config.models.default_model = Some("qwen2.5:32b".to_string());
        let mut app = App::new(&config, transport);

        app.initialize().await;

        assert_eq!(app.registry().selection(), Some("qwen2.5:32b"));
        assert_eq!(app.manager().status(), None);
    }

    #[tokio::test]
    async fn models_command_keeps_fixed_model() {
        let transport = ScriptedTransport::new().with_models_error();
        let mut config = remote_config();
        config.models.source = ModelSource::Fixed;
        config.models.default_model = Some("qwen".to_string());
        let mut app = App::new(&config, transport);
        app.initialize().await;

        app.handle_app_event(AppEvent::RefreshModels).await;
        app.finish_model_fetch().await;

        assert_eq!(app.registry().selection(), Some("qwen"));
        assert!(app.registry().submission_enabled());
        assert_eq!(
            app.manager().status(),
            Some(&StatusMessage::info("Model list is fixed by config"))
        );
    }

    #[tokio::test]
    async fn models_command_does_not_wait_for_the_server() {
        let transport = ScriptedTransport::new().with_models(vec!["m1", "m2"]);
        let mut app = App::new(&remote_config(), transport);

        app.handle_app_event(AppEvent::RefreshModels).await;

        assert_eq!(app.registry().selection(), None);
        assert_eq!(
            app.manager().status(),
            Some(&StatusMessage::info("Fetching models..."))
        );

        app.finish_model_fetch().await;

        assert_eq!(app.registry().selection(), Some("m1"));
        assert_eq!(
            app.manager().status(),
            Some(&StatusMessage::info("2 models available"))
        );
    }

    #[tokio::test]
    async fn submit_without_model_is_reported() {
        let transport = ScriptedTransport::new().with_models(Vec::<&str>::new());
        let mut app = App::new(&remote_config(), transport);
        app.initialize().await;

        app.handle_app_event(AppEvent::Submit { text: "Hi".to_string() }).await;

        assert!(app.controller().transcript().is_empty());
        assert_eq!(app.manager().status().map(|s| s.kind), Some(StatusType::Error));
    }

    #[tokio::test]
    async fn failed_cycle_sets_error_status() {
        let transport = ScriptedTransport::new()
            .with_models(vec!["m1"])
            .with_chat(ChatScript::Status(502));
        let mut app = App::new(&remote_config(), transport);
        app.initialize().await;

        app.handle_app_event(AppEvent::Submit { text: "Hello".to_string() }).await;
        app.finish_cycle().await;

        let transcript = app.controller().transcript();
        assert_eq!(transcript.get(1).unwrap().content(), FAILURE_MESSAGE);
        assert_eq!(app.manager().status().map(|s| s.kind), Some(StatusType::Error));
    }

    #[tokio::test]
    async fn export_failure_is_an_alert_not_a_crash() {
        let transport = ScriptedTransport::new()
            .with_models(vec!["m1"])
            .with_chat(ChatScript::chunks(["ok"]));
        let mut app = App::new(&remote_config(), transport);
        app.initialize().await;
        app.handle_app_event(AppEvent::Submit { text: "Hello".to_string() }).await;
        app.finish_cycle().await;

        app.handle_app_event(AppEvent::Export).await;

        assert_eq!(
            app.manager().status(),
            Some(&StatusMessage::error("Failed to export chat history"))
        );
        assert_eq!(app.controller().transcript().len(), 2);
    }

    #[tokio::test]
    async fn exit_request_stops_loop() {
        let mut app = App::new(&remote_config(), ScriptedTransport::new());
        app.handle_app_event(AppEvent::ExitRequest).await;
        assert!(app.should_quit());
    }
}
