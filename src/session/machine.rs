//! The interactive design session.
//!
//! A [`Session`] owns everything the user sees: the prompt buffer, the
//! active image, the history, the latest advice and the busy/error flags.
//! Remote calls run on spawned Tokio tasks and report back as
//! [`SessionEvent`]s; only [`Session::handle_event`] applies their results,
//! so state changes happen one event at a time in arrival order.
//!
//! Transitions that start remote work must be called from within a Tokio
//! runtime.

use crate::advice::{AdviceProvider, ADVICE_FAILED};
use crate::config::ServiceConfig;
use crate::error::{FailureKind, Result, ServiceError};
use crate::image::{GeneratedImage, GenerationRequest, ImageData, ImageProvider};
use crate::session::record::{ImageId, ImageRecord};
use crate::{advice::GeminiAdviceProvider, image::GeminiImageProvider};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Advice shown right after an upload, in place of a remote fetch.
pub const UPLOAD_HINT: &str = "Image uploaded. You can now prompt to edit this environment \
     (e.g., 'Add bioluminescent jellyfish' or 'Increase light shafts').";

/// Completion of a remote call, delivered back to the session.
#[derive(Debug)]
pub enum SessionEvent {
    /// The image service answered (or failed).
    GenerationFinished {
        /// Prompt exactly as submitted.
        prompt: String,
        /// Image, empty answer, or classified failure.
        outcome: Result<Option<GeneratedImage>>,
    },
    /// The advice service answered. Advice is never an error.
    AdviceFinished {
        /// Sequence number of the fetch; stale answers are dropped.
        ticket: u64,
        /// Advice text or a placeholder.
        advice: String,
    },
}

/// State of one design session.
pub struct Session {
    image_provider: Arc<dyn ImageProvider>,
    advice_provider: Arc<dyn AdviceProvider>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,

    current_prompt: String,
    active_image: Option<ImageId>,
    /// Newest first.
    history: VecDeque<ImageRecord>,
    advice_text: String,
    is_generating: bool,
    is_fetching_advice: bool,
    has_credential_error: bool,
    last_error: Option<String>,

    advice_ticket: u64,
    queued_advice: Option<String>,
}

impl Session {
    /// Creates an empty session over the given providers.
    pub fn new(
        image_provider: Arc<dyn ImageProvider>,
        advice_provider: Arc<dyn AdviceProvider>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            image_provider,
            advice_provider,
            events_tx,
            events_rx,
            current_prompt: String::new(),
            active_image: None,
            history: VecDeque::new(),
            advice_text: String::new(),
            is_generating: false,
            is_fetching_advice: false,
            has_credential_error: false,
            last_error: None,
            advice_ticket: 0,
            queued_advice: None,
        }
    }

    /// Creates a session talking to Gemini with the given configuration.
    pub fn from_config(config: ServiceConfig) -> Self {
        let client = reqwest::Client::new();
        let image = GeminiImageProvider::new(config.clone()).with_client(client.clone());
        let advice = GeminiAdviceProvider::new(config).with_client(client);
        Self::new(Arc::new(image), Arc::new(advice))
    }

    // --- accessors ---

    /// Text currently in the prompt buffer.
    pub fn current_prompt(&self) -> &str {
        &self.current_prompt
    }

    /// The record currently displayed and used as the edit base.
    pub fn active_image(&self) -> Option<&ImageRecord> {
        let id = self.active_image?;
        self.history.iter().find(|r| r.id == id)
    }

    /// All records, newest first.
    pub fn history(&self) -> &VecDeque<ImageRecord> {
        &self.history
    }

    /// Latest advice text; empty until the first advice arrives.
    pub fn advice_text(&self) -> &str {
        &self.advice_text
    }

    /// True while an image request is in flight.
    pub fn is_generating(&self) -> bool {
        self.is_generating
    }

    /// True while an advice request is in flight.
    pub fn is_fetching_advice(&self) -> bool {
        self.is_fetching_advice
    }

    /// True if the last image request was refused for credential reasons.
    pub fn has_credential_error(&self) -> bool {
        self.has_credential_error
    }

    /// Description of the last non-credential generation failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True while any remote call is outstanding.
    pub fn is_busy(&self) -> bool {
        self.is_generating || self.is_fetching_advice
    }

    /// Whether a submission of `text` would currently be accepted.
    pub fn can_submit(&self, text: &str) -> bool {
        !self.is_generating && (!text.trim().is_empty() || self.active_image.is_some())
    }

    // --- transitions ---

    /// Replaces the prompt buffer.
    pub fn set_prompt(&mut self, text: impl Into<String>) {
        self.current_prompt = text.into();
    }

    /// Submits the prompt buffer. See [`Session::submit_prompt`].
    pub fn submit_current_prompt(&mut self) -> bool {
        let text = self.current_prompt.clone();
        self.submit_prompt(text)
    }

    /// Starts creating (no active image) or editing (active image) a scene.
    ///
    /// Returns `false` without touching state when the prompt is blank and
    /// there is nothing to edit, or when a generation is already running.
    pub fn submit_prompt(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if !self.can_submit(&text) {
            tracing::debug!(generating = self.is_generating, "submission refused");
            return false;
        }

        let mut request = GenerationRequest::new(text);
        if let Some(active) = self.active_image() {
            request = request.with_base_image(active.image.clone());
        }

        self.is_generating = true;
        self.has_credential_error = false;
        self.last_error = None;

        tracing::debug!(edit = request.is_edit(), "generation started");
        let provider = Arc::clone(&self.image_provider);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let prompt = request.prompt.clone();
            let call = tokio::spawn(async move { provider.generate(&request).await });
            let outcome = match call.await {
                Ok(outcome) => outcome,
                Err(e) => Err(ServiceError::TaskFailed(e.to_string())),
            };
            // The receiver only goes away with the session itself.
            let _ = tx.send(SessionEvent::GenerationFinished { prompt, outcome });
        });
        true
    }

    /// Adds a user-supplied image and makes it the edit base.
    ///
    /// Bytes that are not a PNG, JPEG or WebP image are rejected and the
    /// session is left unchanged.
    pub fn upload_base_image(&mut self, bytes: impl Into<Arc<[u8]>>) -> Result<ImageId> {
        let image = ImageData::from_bytes(bytes)?;
        Ok(self.apply_upload(image))
    }

    /// Like [`Session::upload_base_image`], from a `data:` URI.
    pub fn upload_data_url(&mut self, url: &str) -> Result<ImageId> {
        let image = ImageData::from_data_url(url)?;
        Ok(self.apply_upload(image))
    }

    /// Makes the record with `id` active. Unknown ids are ignored.
    pub fn select_history_item(&mut self, id: ImageId) -> bool {
        if self.history.iter().any(|r| r.id == id) {
            self.active_image = Some(id);
            true
        } else {
            tracing::debug!(%id, "ignoring selection of unknown image");
            false
        }
    }

    // --- event loop ---

    /// Waits for the next completion. Pending forever if nothing is in flight.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Applies every completion that has already arrived. Returns how many.
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Processes completions until no remote call is outstanding.
    pub async fn settle(&mut self) {
        while self.is_busy() {
            match self.events_rx.recv().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    /// Applies a completion to the session.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::GenerationFinished { prompt, outcome } => {
                self.finish_generation(prompt, outcome)
            }
            SessionEvent::AdviceFinished { ticket, advice } => self.finish_advice(ticket, advice),
        }
    }

    fn finish_generation(&mut self, prompt: String, outcome: Result<Option<GeneratedImage>>) {
        self.is_generating = false;

        match outcome {
            Ok(Some(generated)) => {
                let record = ImageRecord::new(generated.image, prompt.clone());
                tracing::info!(
                    id = %record.id,
                    model = %generated.model,
                    duration_ms = generated.duration_ms,
                    "scene generated"
                );
                self.push_active(record);
                self.current_prompt.clear();
                self.request_advice(prompt);
            }
            Ok(None) => {
                tracing::info!("image service returned no image");
            }
            Err(e) => match e.kind() {
                FailureKind::Credential => {
                    tracing::warn!(error = %e, "image service rejected the credential");
                    self.has_credential_error = true;
                }
                FailureKind::Transient | FailureKind::Unknown => {
                    tracing::warn!(error = %e, "image generation failed");
                    self.last_error = Some(e.to_string());
                }
            },
        }
    }

    fn request_advice(&mut self, context: String) {
        if self.is_fetching_advice {
            self.queued_advice = Some(context);
            return;
        }

        self.advice_ticket += 1;
        let ticket = self.advice_ticket;
        self.is_fetching_advice = true;

        let provider = Arc::clone(&self.advice_provider);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let call = tokio::spawn(async move { provider.fetch_advice(&context).await });
            let advice = match call.await {
                Ok(advice) => advice,
                Err(e) => {
                    tracing::warn!(error = %e, "advice task failed");
                    ADVICE_FAILED.to_string()
                }
            };
            let _ = tx.send(SessionEvent::AdviceFinished { ticket, advice });
        });
    }

    fn finish_advice(&mut self, ticket: u64, advice: String) {
        self.is_fetching_advice = false;

        if ticket == self.advice_ticket {
            self.advice_text = advice;
        } else {
            tracing::debug!(ticket, current = self.advice_ticket, "dropping stale advice");
        }

        if let Some(next) = self.queued_advice.take() {
            self.request_advice(next);
        }
    }

    fn apply_upload(&mut self, image: ImageData) -> ImageId {
        let record = ImageRecord::uploaded(image);
        let id = record.id;
        tracing::info!(%id, size = record.image.size(), "base image uploaded");
        self.push_active(record);

        // Any advice still on its way predates the upload.
        self.advice_ticket += 1;
        self.queued_advice = None;
        self.advice_text = UPLOAD_HINT.to_string();
        id
    }

    fn push_active(&mut self, record: ImageRecord) {
        self.active_image = Some(record.id);
        self.history.push_front(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{AdviceProvider, NO_ADVICE};
    use crate::image::ImageFormat;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    const PNG_A: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0xA];
    const PNG_B: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0xB];
    const JPEG_F: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0xF];

    fn generated(bytes: &[u8]) -> GeneratedImage {
        GeneratedImage {
            image: ImageData::new(bytes.to_vec(), ImageFormat::Png),
            model: "fake-image".into(),
            duration_ms: 1,
        }
    }

    /// Image provider that replays scripted outcomes and records requests.
    #[derive(Default)]
    struct FakeImages {
        outcomes: Mutex<VecDeque<Result<Option<GeneratedImage>>>>,
        requests: Mutex<Vec<GenerationRequest>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeImages {
        fn with(outcomes: Vec<Result<Option<GeneratedImage>>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                ..Self::default()
            })
        }

        fn gated(outcomes: Vec<Result<Option<GeneratedImage>>>, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                gate: Some(gate),
                ..Self::default()
            })
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageProvider for FakeImages {
        async fn generate(&self, request: &GenerationRequest) -> Result<Option<GeneratedImage>> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }

        fn name(&self) -> &str {
            "fake"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Advice provider that echoes the context and records it.
    #[derive(Default)]
    struct FakeAdvice {
        contexts: Mutex<Vec<String>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeAdvice {
        fn contexts(&self) -> Vec<String> {
            self.contexts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AdviceProvider for FakeAdvice {
        async fn fetch_advice(&self, context: &str) -> String {
            self.contexts.lock().unwrap().push(context.to_string());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            format!("advice for {context}")
        }
    }

    fn session(images: &Arc<FakeImages>, advice: &Arc<FakeAdvice>) -> Session {
        Session::new(images.clone(), advice.clone())
    }

    fn history_ids(session: &Session) -> Vec<ImageId> {
        session.history().iter().map(|r| r.id).collect()
    }

    fn assert_active_in_history(session: &Session) {
        if let Some(id) = session.active_image {
            assert!(session.history().iter().any(|r| r.id == id));
        }
    }

    #[tokio::test]
    async fn blank_prompt_without_image_is_refused() {
        let images = FakeImages::with(vec![Ok(Some(generated(&PNG_A)))]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        assert!(!session.submit_prompt("   "));
        assert!(!session.submit_prompt(""));

        assert!(!session.is_generating());
        assert!(session.history().is_empty());
        tokio::task::yield_now().await;
        assert!(images.requests().is_empty());
    }

    #[tokio::test]
    async fn create_scene_end_to_end() {
        let images = FakeImages::with(vec![Ok(Some(generated(&PNG_A)))]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);
        session.set_prompt("coral reef at dawn");

        assert!(session.submit_current_prompt());
        session.settle().await;

        assert_eq!(session.history().len(), 1);
        let active = session.active_image().unwrap();
        assert_eq!(active.prompt, "coral reef at dawn");
        assert_eq!(active.image.bytes(), &PNG_A);
        assert_eq!(history_ids(&session), vec![active.id]);
        assert_eq!(session.current_prompt(), "");

        let requests = images.requests();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].is_edit());
        assert!(requests[0]
            .model_prompt()
            .starts_with("Underwater 3D environment: coral reef at dawn."));

        assert_eq!(advice.contexts(), vec!["coral reef at dawn".to_string()]);
        assert_eq!(session.advice_text(), "advice for coral reef at dawn");
        assert!(!session.is_fetching_advice());
    }

    #[tokio::test]
    async fn edit_uses_active_image_as_base() {
        let images = FakeImages::with(vec![Ok(Some(generated(&PNG_A))), Ok(Some(generated(&PNG_B)))]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        session.submit_prompt("coral reef at dawn");
        session.settle().await;
        let a = session.active_image().unwrap().clone();

        assert!(session.submit_prompt("add jellyfish"));
        session.settle().await;
        let b = session.active_image().unwrap().clone();

        let requests = images.requests();
        assert_eq!(requests[1].prompt, "add jellyfish");
        assert_eq!(requests[1].base_image.as_ref(), Some(&a.image));
        assert_eq!(requests[1].model_prompt(), "add jellyfish");

        assert_eq!(b.image.bytes(), &PNG_B);
        assert_eq!(history_ids(&session), vec![b.id, a.id]);
        assert_active_in_history(&session);
    }

    #[tokio::test]
    async fn blank_prompt_with_active_image_is_sent() {
        let images = FakeImages::with(vec![Ok(Some(generated(&PNG_B)))]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);
        session.upload_base_image(PNG_A.to_vec()).unwrap();

        assert!(session.submit_prompt("  "));
        session.settle().await;

        let requests = images.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].is_edit());
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn generating_flag_covers_only_the_call() {
        let outcomes = vec![
            Ok(Some(generated(&PNG_A))),
            Ok(None),
            Err(ServiceError::Api {
                status: 500,
                message: "boom".into(),
            }),
        ];
        let gate = Arc::new(Notify::new());
        let images = FakeImages::gated(outcomes, gate.clone());
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        for prompt in ["reef", "kelp", "trench"] {
            assert!(!session.is_generating());
            assert!(session.submit_prompt(prompt));
            assert!(session.is_generating());

            // Still in flight: the gate holds the call open.
            tokio::task::yield_now().await;
            assert_eq!(session.poll_events(), 0);
            assert!(session.is_generating());

            gate.notify_one();
            loop {
                let event = session.next_event().await.unwrap();
                let done = matches!(event, SessionEvent::GenerationFinished { .. });
                session.handle_event(event);
                if done {
                    break;
                }
            }
            assert!(!session.is_generating());
            session.settle().await;
        }

        assert_eq!(session.history().len(), 1);
        assert_eq!(session.last_error(), Some("API error: 500 - boom"));
    }

    #[tokio::test]
    async fn second_submission_while_generating_is_refused() {
        let gate = Arc::new(Notify::new());
        let images = FakeImages::gated(vec![Ok(Some(generated(&PNG_A)))], gate.clone());
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        assert!(session.submit_prompt("reef"));
        assert!(!session.submit_prompt("another reef"));

        gate.notify_one();
        session.settle().await;
        assert_eq!(images.requests().len(), 1);
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn empty_result_keeps_state_and_skips_advice() {
        let images = FakeImages::with(vec![Ok(Some(generated(&PNG_A))), Ok(None)]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        session.submit_prompt("reef");
        session.settle().await;
        let before = history_ids(&session);
        let active = session.active_image().map(|r| r.id);

        session.set_prompt("add whales");
        assert!(session.submit_current_prompt());
        session.settle().await;

        assert_eq!(history_ids(&session), before);
        assert_eq!(session.active_image().map(|r| r.id), active);
        assert_eq!(session.current_prompt(), "add whales");
        assert_eq!(advice.contexts(), vec!["reef".to_string()]);
        assert_eq!(session.last_error(), None);
        assert!(!session.has_credential_error());
    }

    #[tokio::test]
    async fn credential_failure_sets_flag_until_next_submission() {
        let images = FakeImages::with(vec![
            Err(ServiceError::Credential(
                "Requested entity was not found.".into(),
            )),
            Ok(Some(generated(&PNG_A))),
        ]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        session.submit_prompt("reef");
        session.settle().await;

        assert!(session.has_credential_error());
        assert!(session.history().is_empty());
        assert!(!session.is_generating());
        assert_eq!(session.last_error(), None);
        assert!(advice.contexts().is_empty());

        assert!(session.submit_prompt("reef"));
        assert!(!session.has_credential_error());
        session.settle().await;
        assert!(!session.has_credential_error());
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_reported_without_record() {
        let images = FakeImages::with(vec![Err(ServiceError::RateLimited { retry_after: None })]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        session.submit_prompt("reef");
        session.settle().await;

        assert!(session.history().is_empty());
        assert!(session.active_image().is_none());
        assert!(!session.has_credential_error());
        assert!(session.last_error().unwrap().starts_with("rate limited"));
    }

    #[tokio::test]
    async fn upload_creates_record_without_network() {
        let images = FakeImages::with(vec![]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        let id = session.upload_base_image(JPEG_F.to_vec()).unwrap();

        let active = session.active_image().unwrap();
        assert_eq!(active.id, id);
        assert_eq!(active.prompt, "Uploaded Base Image");
        assert!(active.is_upload());
        assert_eq!(active.image.format(), ImageFormat::Jpeg);
        assert_eq!(history_ids(&session), vec![id]);
        assert_eq!(session.advice_text(), UPLOAD_HINT);
        assert!(!session.is_busy());

        tokio::task::yield_now().await;
        assert!(images.requests().is_empty());
        assert!(advice.contexts().is_empty());
    }

    #[tokio::test]
    async fn upload_of_non_image_is_rejected() {
        let images = FakeImages::with(vec![]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        let err = session
            .upload_base_image(b"just some text, not pixels".to_vec())
            .unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));
        assert!(session.history().is_empty());
        assert!(session.active_image().is_none());
        assert_eq!(session.advice_text(), "");
    }

    #[tokio::test]
    async fn upload_from_data_url() {
        let images = FakeImages::with(vec![]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        let url = ImageData::new(PNG_A.to_vec(), ImageFormat::Png).to_data_url();
        let id = session.upload_data_url(&url).unwrap();
        assert_eq!(session.active_image().unwrap().id, id);
    }

    #[tokio::test]
    async fn select_history_item() {
        let images = FakeImages::with(vec![]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        let first = session.upload_base_image(PNG_A.to_vec()).unwrap();
        let second = session.upload_base_image(PNG_B.to_vec()).unwrap();
        assert_eq!(session.active_image().unwrap().id, second);

        assert!(session.select_history_item(first));
        assert_eq!(session.active_image().unwrap().id, first);

        assert!(!session.select_history_item(ImageId::new()));
        assert_eq!(session.active_image().unwrap().id, first);

        // Selection never reorders history.
        assert_eq!(history_ids(&session), vec![second, first]);
        assert_active_in_history(&session);
    }

    #[tokio::test]
    async fn history_grows_by_one_per_new_image() {
        let images = FakeImages::with(vec![
            Ok(Some(generated(&PNG_A))),
            Ok(None),
            Ok(Some(generated(&PNG_B))),
        ]);
        let advice = Arc::new(FakeAdvice::default());
        let mut session = session(&images, &advice);

        session.submit_prompt("one");
        session.settle().await;
        assert_eq!(session.history().len(), 1);

        session.upload_base_image(JPEG_F.to_vec()).unwrap();
        assert_eq!(session.history().len(), 2);

        session.submit_prompt("empty");
        session.settle().await;
        assert_eq!(session.history().len(), 2);

        session.submit_prompt("three");
        session.settle().await;
        assert_eq!(session.history().len(), 3);
        assert_active_in_history(&session);
    }

    #[tokio::test]
    async fn advice_runs_one_at_a_time_and_latest_wins() {
        let advice_gate = Arc::new(Notify::new());
        let images = FakeImages::with(vec![Ok(Some(generated(&PNG_A))), Ok(Some(generated(&PNG_B)))]);
        let advice = Arc::new(FakeAdvice {
            gate: Some(advice_gate.clone()),
            ..FakeAdvice::default()
        });
        let mut session = session(&images, &advice);

        // First generation completes; its advice fetch is held open.
        session.submit_prompt("reef");
        let event = session.next_event().await.unwrap();
        session.handle_event(event);
        assert!(session.is_fetching_advice());
        assert!(!session.is_generating());

        // The user can keep working while advice is pending.
        session.submit_prompt("add kelp");
        let event = session.next_event().await.unwrap();
        session.handle_event(event);
        assert_eq!(session.history().len(), 2);
        assert!(session.is_fetching_advice());

        advice_gate.notify_one();
        let event = session.next_event().await.unwrap();
        session.handle_event(event);
        assert_eq!(session.advice_text(), "advice for reef");
        // The queued fetch started immediately after.
        assert!(session.is_fetching_advice());

        advice_gate.notify_one();
        session.settle().await;
        assert_eq!(session.advice_text(), "advice for add kelp");
        assert_eq!(
            advice.contexts(),
            vec!["reef".to_string(), "add kelp".to_string()]
        );
    }

    #[tokio::test]
    async fn upload_discards_advice_in_flight() {
        let advice_gate = Arc::new(Notify::new());
        let images = FakeImages::with(vec![Ok(Some(generated(&PNG_A)))]);
        let advice = Arc::new(FakeAdvice {
            gate: Some(advice_gate.clone()),
            ..FakeAdvice::default()
        });
        let mut session = session(&images, &advice);

        session.submit_prompt("reef");
        let event = session.next_event().await.unwrap();
        session.handle_event(event);
        assert!(session.is_fetching_advice());

        session.upload_base_image(JPEG_F.to_vec()).unwrap();
        assert_eq!(session.advice_text(), UPLOAD_HINT);

        advice_gate.notify_one();
        session.settle().await;
        assert!(!session.is_fetching_advice());
        assert_eq!(session.advice_text(), UPLOAD_HINT);
    }

    #[tokio::test]
    async fn panicking_provider_still_clears_flags() {
        struct Exploding;

        #[async_trait]
        impl ImageProvider for Exploding {
            async fn generate(&self, _: &GenerationRequest) -> Result<Option<GeneratedImage>> {
                panic!("provider bug");
            }

            fn name(&self) -> &str {
                "exploding"
            }

            async fn health_check(&self) -> Result<()> {
                Ok(())
            }
        }

        let mut session = Session::new(Arc::new(Exploding), Arc::new(FakeAdvice::default()));
        assert!(session.submit_prompt("reef"));
        session.settle().await;

        assert!(!session.is_generating());
        assert!(session.history().is_empty());
        assert!(session
            .last_error()
            .unwrap()
            .starts_with("background task failed"));
    }

    #[tokio::test]
    async fn advice_placeholder_passes_through() {
        struct Silent;

        #[async_trait]
        impl AdviceProvider for Silent {
            async fn fetch_advice(&self, _: &str) -> String {
                NO_ADVICE.to_string()
            }
        }

        let images = FakeImages::with(vec![Ok(Some(generated(&PNG_A)))]);
        let mut session = Session::new(images, Arc::new(Silent));
        session.submit_prompt("reef");
        session.settle().await;
        assert_eq!(session.advice_text(), NO_ADVICE);
    }
}
