//! Completion backend
//!
//! Dispatches the ordered turn history plus execution settings to a chat
//! completion API and normalizes the reply into a tagged content-item
//! sequence the orchestrator can match on structurally.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::chat::history::{ContentPart, Turn};
use crate::{Error, Result};

/// Audio-output directive: the voice and encoding the backend should use
/// when synthesizing speech
#[derive(Debug, Clone)]
pub struct AudioSpec {
    /// Voice identifier, e.g. "alloy"
    pub voice: String,
    /// Output encoding, e.g. "mp3"
    pub format: String,
}

/// Execution settings for one completion call
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    /// Sampling temperature (0–2)
    pub temperature: f32,
    /// Nucleus-sampling parameter (0–1)
    pub top_p: f32,
    /// Bound on response length
    pub max_tokens: u32,
    /// System instruction prepended to every request
    pub system_prompt: String,
    /// Present only when a spoken reply was requested
    pub audio: Option<AudioSpec>,
}

/// One item of backend response content
#[derive(Debug, Clone)]
pub enum ResponseItem {
    /// Textual content
    Text(String),
    /// Synthesized audio
    Audio {
        /// Decoded audio bytes
        data: Vec<u8>,
        /// Encoding, e.g. "mp3"
        format: String,
    },
    /// Content the client does not interpret
    Other,
}

/// Normalized reply from the completion backend
#[derive(Debug, Clone, Default)]
pub struct CompletionMessage {
    /// Primary textual content, if the backend produced any
    pub text: Option<String>,
    /// Content items in backend order
    pub items: Vec<ResponseItem>,
}

/// A chat completion service consumed as a black box
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Complete one turn given the full ordered history and settings
    ///
    /// The history snapshot is read-only; implementations must not rely on
    /// mutating it.
    ///
    /// # Errors
    ///
    /// Returns error if the backend call fails
    async fn complete(
        &self,
        turns: &[Turn],
        settings: &CompletionSettings,
    ) -> Result<CompletionMessage>;
}

/// `OpenAI` chat completions client with optional audio output
pub struct OpenAiCompletion {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiCompletion {
    /// Create a new completion client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for chat completions".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletion {
    async fn complete(
        &self,
        turns: &[Turn],
        settings: &CompletionSettings,
    ) -> Result<CompletionMessage> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: WireContent::Text(settings.system_prompt.clone()),
        });
        messages.extend(turns.iter().map(to_wire_message));

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
            modalities: settings.audio.as_ref().map(|_| vec!["text", "audio"]),
            audio: settings.audio.as_ref().map(|spec| WireAudioSpec {
                voice: &spec.voice,
                format: &spec.format,
            }),
        };

        tracing::debug!(
            model = %self.model,
            turns = turns.len(),
            audio = settings.audio.is_some(),
            "sending completion request"
        );

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "completion request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(Error::Completion(format!(
                "completion API error {status}: {body}"
            )));
        }

        let result: ChatCompletionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse completion response");
            e
        })?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Completion("no choices in completion response".to_string()))?;

        normalize_choice(choice.message, settings)
    }
}

/// Map a history turn onto the wire message shape
///
/// Text-only turns serialize as a plain content string; multimodal turns as
/// a content-part array with base64 `input_audio` items.
fn to_wire_message(turn: &Turn) -> WireMessage {
    if turn.has_audio() {
        let parts = turn
            .content()
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => WirePart::Text { text: text.clone() },
                ContentPart::Audio { data, mime } => WirePart::InputAudio {
                    input_audio: WireInputAudio {
                        data: base64::engine::general_purpose::STANDARD.encode(data),
                        format: mime_subtype(mime).to_string(),
                    },
                },
            })
            .collect();

        WireMessage {
            role: turn.role().as_str(),
            content: WireContent::Parts(parts),
        }
    } else {
        WireMessage {
            role: turn.role().as_str(),
            content: WireContent::Text(turn.text().unwrap_or_default().to_string()),
        }
    }
}

/// Normalize the wire choice into text plus tagged content items
fn normalize_choice(
    message: ChoiceMessage,
    settings: &CompletionSettings,
) -> Result<CompletionMessage> {
    let mut items = Vec::new();

    // Audio-modality replies put the text in the audio transcript rather
    // than the content field
    let text = message
        .content
        .filter(|t| !t.is_empty())
        .or_else(|| message.audio.as_ref().and_then(|a| a.transcript.clone()));

    if let Some(ref t) = text {
        items.push(ResponseItem::Text(t.clone()));
    }

    if let Some(audio) = message.audio {
        let data = base64::engine::general_purpose::STANDARD
            .decode(audio.data)
            .map_err(|e| Error::Completion(format!("invalid audio payload: {e}")))?;
        let format = settings
            .audio
            .as_ref()
            .map_or_else(|| "mp3".to_string(), |spec| spec.format.clone());

        items.push(ResponseItem::Audio { data, format });
    }

    Ok(CompletionMessage { text, items })
}

/// Extract the encoding name from a MIME tag ("audio/wav" → "wav")
fn mime_subtype(mime: &str) -> &str {
    mime.rsplit('/').next().unwrap_or(mime)
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    modalities: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<WireAudioSpec<'a>>,
}

#[derive(Serialize)]
struct WireAudioSpec<'a> {
    voice: &'a str,
    format: &'a str,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    InputAudio { input_audio: WireInputAudio },
}

#[derive(Serialize)]
struct WireInputAudio {
    data: String,
    format: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    audio: Option<WireOutputAudio>,
}

#[derive(Deserialize)]
struct WireOutputAudio {
    data: String,
    #[serde(default)]
    transcript: Option<String>,
}
