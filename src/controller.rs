//! The chat controller.
//!
//! Reads its two input sources, appends to the transcript and drives the
//! text-question flow and the identification + enrichment flow. It is handed
//! everything it touches at construction time.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use crate::client::{CallError, ChatBackend, UploadRequest};
use crate::config::{Config, Endpoints};
use crate::message::{Message, Transcript};
use crate::preview::PreviewStore;

const CRITICAL_PREFIX: &str = "A critical error occurred: ";
const LLM_ERROR_PREFIX: &str = "LLM error: ";
const NO_FILE_SELECTED: &str = "Please select an image file before submitting.";
const CHAT_SERVER_UNREACHABLE: &str =
    "Communication error with the chat server. Check that it is running and see the log for details.";

/// Names used in the bot's canned messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub assistant_name: String,
    pub model_label: String,
    pub classifier_label: String,
    pub classifier_port: Option<u16>,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            assistant_name: "BirdBot".to_string(),
            model_label: "Llama 3.2 (1B)".to_string(),
            classifier_label: "ResNet-50".to_string(),
            classifier_port: Some(8001),
        }
    }
}

impl Persona {
    pub fn from_config(config: &Config, endpoints: &Endpoints) -> Self {
        Self {
            assistant_name: config.assistant_name().to_string(),
            model_label: config.model_label().to_string(),
            classifier_label: config.classifier_label().to_string(),
            classifier_port: endpoints.classifier_port(),
        }
    }

    fn says(&self, text: &str) -> String {
        format!("**{}** : {}", self.assistant_name, text)
    }

    fn thinking(&self) -> String {
        self.says(&format!(
            "I'm asking my brain ({}) for an answer...",
            self.model_label
        ))
    }

    fn identifying(&self) -> String {
        self.says(&format!(
            "Identification request received. Running the specialist model ({}) through the **MCP protocol**...",
            self.classifier_label
        ))
    }

    fn enriching(&self) -> String {
        self.says(&format!(
            "Identification succeeded! I'm now using {} to tell you more...",
            self.model_label
        ))
    }

    fn classifier_unreachable(&self) -> String {
        let base = "Communication error. The MCP server could not be contacted.";
        match self.classifier_port {
            Some(port) => format!(
                "{base} **Check that the MCP server is running on port {port}.**"
            ),
            None => format!("{base} **Check that the MCP server is running.**"),
        }
    }
}

/// Free-text input box
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    value: Arc<Mutex<String>>,
}

impl TextInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> String {
        self.lock().clone()
    }

    pub fn set(&self, text: impl Into<String>) {
        *self.lock() = text.into();
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Edit the buffer in place
    pub fn edit<R>(&self, f: impl FnOnce(&mut String) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The currently selected image file, if any
#[derive(Debug, Clone, Default)]
pub struct FileSelection {
    path: Arc<Mutex<Option<PathBuf>>>,
}

impl FileSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, path: impl Into<PathBuf>) {
        *self.lock() = Some(path.into());
    }

    pub fn selected(&self) -> Option<PathBuf> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<PathBuf>> {
        self.path.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct ChatController<B> {
    backend: Arc<B>,
    transcript: Transcript,
    text_input: TextInput,
    file_input: FileSelection,
    previews: PreviewStore,
    persona: Arc<Persona>,
}

impl<B> Clone for ChatController<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            transcript: self.transcript.clone(),
            text_input: self.text_input.clone(),
            file_input: self.file_input.clone(),
            previews: self.previews.clone(),
            persona: Arc::clone(&self.persona),
        }
    }
}

impl<B: ChatBackend> ChatController<B> {
    pub fn new(
        backend: Arc<B>,
        transcript: Transcript,
        text_input: TextInput,
        file_input: FileSelection,
        persona: Persona,
    ) -> Self {
        Self {
            backend,
            transcript,
            text_input,
            file_input,
            previews: PreviewStore::new(),
            persona: Arc::new(persona),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Send the text input to the general-question route.
    ///
    /// Returns `None` without touching anything when the input is blank.
    /// Otherwise the user message and the placeholder are already in the
    /// transcript when this returns; the handle resolves once the reply is.
    pub fn submit_text(&self) -> Option<JoinHandle<()>> {
        let text = self.text_input.value().trim().to_string();
        if text.is_empty() {
            return None;
        }

        tracing::info!(chars = text.chars().count(), "submitting question");
        self.transcript.append(Message::user(text.clone()));
        self.text_input.clear();
        self.transcript.append(Message::bot(self.persona.thinking()));

        let this = self.clone();
        Some(tokio::spawn(async move { this.answer_question(&text).await }))
    }

    /// Send the selected image through identification and enrichment.
    ///
    /// With no file selected a single bot message asks for one and `None` is
    /// returned.
    pub fn submit_image(&self) -> Option<JoinHandle<()>> {
        let Some(path) = self.file_input.selected() else {
            self.transcript.append(Message::bot(NO_FILE_SELECTED));
            return None;
        };

        let filename = display_name(&path);
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let preview = self.previews.create(&filename, size);

        tracing::info!(path = %path.display(), size, "submitting image");
        self.transcript.append(
            Message::user(format!("Image submitted: *{filename}*")).with_image(preview.url()),
        );

        let this = self.clone();
        Some(tokio::spawn(async move {
            this.identify(&path, filename).await;
            drop(preview);
        }))
    }

    async fn answer_question(&self, text: &str) {
        let reply = match self.backend.ask(text).await {
            Ok(response) => self.persona.says(&response),
            Err(e) => {
                tracing::warn!(error = %e, "general question failed");
                format!("{CRITICAL_PREFIX}{}", chat_error_reason(&e))
            }
        };
        self.transcript.append(Message::bot(reply));
    }

    async fn identify(&self, path: &Path, filename: String) {
        self.transcript.append(Message::bot(self.persona.identifying()));

        let reply = self.classify_and_enrich(path, filename).await;
        self.transcript.append(Message::bot(reply));

        self.file_input.clear();
    }

    async fn classify_and_enrich(&self, path: &Path, filename: String) -> String {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read image");
                return format!("{CRITICAL_PREFIX}could not read {}: {e}", path.display());
            }
        };

        let classification = match self.backend.classify(UploadRequest { filename, bytes }).await {
            Ok(classification) => classification,
            Err(e) => {
                tracing::warn!(error = %e, "identification failed");
                let reason = if e.is_transport() {
                    self.persona.classifier_unreachable()
                } else {
                    e.reason()
                };
                return format!("{CRITICAL_PREFIX}{reason}");
            }
        };

        let Some(bird) = classification.species().map(str::to_string) else {
            tracing::info!("no species identified, skipping enrichment");
            return classification.message;
        };

        tracing::info!(%bird, "species identified, enriching");
        self.transcript.append(Message::bot(self.persona.enriching()));

        match self.backend.enrich(&bird, &classification.message).await {
            Ok(response) => response,
            Err(e @ CallError::Application { .. }) => {
                tracing::warn!(error = %e, "enrichment failed");
                format!("{LLM_ERROR_PREFIX}{}", e.reason())
            }
            Err(e) => {
                tracing::warn!(error = %e, "enrichment failed");
                format!("{CRITICAL_PREFIX}{}", chat_error_reason(&e))
            }
        }
    }
}

fn chat_error_reason(error: &CallError) -> String {
    if error.is_transport() {
        CHAT_SERVER_UNREACHABLE.to_string()
    } else {
        error.reason()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
