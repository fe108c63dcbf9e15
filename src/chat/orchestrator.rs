//! Turn orchestration
//!
//! Produces one completed assistant turn from typed text or captured audio:
//! transcribe if needed, append the user turn, compose the (possibly
//! multimodal) request, invoke the completion backend, and extract the
//! normalized response. Every boundary fault is recovered here and surfaced
//! as user-visible text: a backend fault degrades the turn to an error
//! message, never the session.

use std::sync::Arc;

use crate::chat::completion::{
    AudioSpec, CompletionBackend, CompletionSettings, ResponseItem,
};
use crate::chat::history::{ConversationHistory, Turn};
use crate::chat::transcription::TranscriptionBackend;
use crate::voice::AudioBuffer;

/// Placeholder when the backend returns no textual content
const NO_TEXT_RESPONSE: &str = "No text response received.";

/// Returned for an empty input message (callers filter these, but the
/// session must survive one anyway)
const EMPTY_MESSAGE: &str = "Please provide a message.";

/// Returned for a zero-length recording
const NO_AUDIO_DATA: &str = "No audio data provided.";

/// Returned when a spoken reply is requested but the turn carries no audio
const MISSING_AUDIO_INPUT: &str = "No audio provided.";

/// Returned when transcription fails or recognizes nothing
const TRANSCRIPTION_FAILED: &str =
    "Could not transcribe the audio. Please try again or type your message.";

/// MIME tag attached to captured audio forwarded to the backend
const CAPTURED_AUDIO_MIME: &str = "audio/wav";

/// Synthesized audio extracted from a completed turn
#[derive(Debug, Clone)]
pub struct ResponseAudio {
    /// Raw audio bytes
    pub data: Vec<u8>,
    /// Encoding, e.g. "mp3"
    pub format: String,
}

/// The normalized output of one completed turn
///
/// Created fresh per turn; the UI layer owns its lifetime (it may persist
/// the audio to a scratch file for playback, then discard it).
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Reply text, or an explanatory placeholder
    pub text: String,
    /// Synthesized speech, when the backend produced any
    pub audio: Option<ResponseAudio>,
}

impl ChatResponse {
    fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: None,
        }
    }
}

/// Per-session execution settings, fixed at construction
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Sampling temperature (0–2)
    pub temperature: f32,
    /// Nucleus-sampling parameter (0–1)
    pub top_p: f32,
    /// Bound on response length
    pub max_tokens: u32,
    /// System instruction for every request
    pub system_prompt: String,
    /// Voice for synthesized replies
    pub voice: String,
    /// Encoding for synthesized replies
    pub audio_format: String,
    /// Language hint passed to the transcription backend
    pub language: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 800,
            system_prompt: "You are a helpful, friendly, and knowledgeable assistant. \
                            Be concise and clear in your responses."
                .to_string(),
            voice: "alloy".to_string(),
            audio_format: "mp3".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Orchestrates one dialogue session
///
/// Holds the session's conversation history and backend handles, constructed
/// once per session by the UI layer. Not designed for concurrent turns: one
/// turn completes fully before the next begins.
pub struct ChatSession {
    history: ConversationHistory,
    completion: Arc<dyn CompletionBackend>,
    transcription: Arc<dyn TranscriptionBackend>,
    settings: SessionSettings,
}

impl ChatSession {
    /// Create a new session with empty history
    #[must_use]
    pub fn new(
        completion: Arc<dyn CompletionBackend>,
        transcription: Arc<dyn TranscriptionBackend>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            history: ConversationHistory::new(),
            completion,
            transcription,
            settings,
        }
    }

    /// The session's conversation history
    #[must_use]
    pub const fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Reset the conversation history
    pub fn clear_history(&mut self) {
        self.history.clear();
        tracing::debug!("conversation history cleared");
    }

    /// Complete one turn from typed text
    ///
    /// Never returns an error: backend faults are converted into an
    /// explanatory response and the session continues.
    pub async fn handle_text(&mut self, message: &str, want_audio: bool) -> ChatResponse {
        if message.trim().is_empty() {
            return ChatResponse::from_text(EMPTY_MESSAGE);
        }

        self.complete_turn(message, None, want_audio, false).await
    }

    /// Complete one turn from captured audio
    ///
    /// Transcribes the buffer, then follows the text path with the original
    /// audio attached as a multimodal content item so the backend can use
    /// either signal. Empty buffers and failed transcriptions return an
    /// explanatory response without touching history.
    pub async fn handle_audio(&mut self, buffer: &AudioBuffer, want_audio: bool) -> ChatResponse {
        if buffer.is_empty() {
            // A spoken reply cannot be requested off a turn with no audio
            return if want_audio {
                ChatResponse::from_text(MISSING_AUDIO_INPUT)
            } else {
                ChatResponse::from_text(NO_AUDIO_DATA)
            };
        }

        let wav = match buffer.to_wav() {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode capture for transcription");
                return ChatResponse::from_text(format!("Error processing audio: {e}"));
            }
        };

        let transcript = match self
            .transcription
            .transcribe(&wav, &self.settings.language)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                return ChatResponse::from_text(TRANSCRIPTION_FAILED);
            }
        };

        let transcript = transcript.trim();
        if transcript.is_empty() {
            return ChatResponse::from_text(TRANSCRIPTION_FAILED);
        }

        tracing::info!(transcript, "audio transcribed");
        self.complete_turn(transcript, Some(wav), want_audio, true)
            .await
    }

    /// Shared turn path for text and transcribed-audio input
    ///
    /// Appends the user turn, invokes the backend with a read-only history
    /// snapshot, appends the assistant turn only on textual success, and
    /// surfaces at most one audio artifact (the first item found).
    async fn complete_turn(
        &mut self,
        message: &str,
        audio: Option<Vec<u8>>,
        want_audio: bool,
        audio_turn: bool,
    ) -> ChatResponse {
        if want_audio && audio_turn && audio.is_none() {
            return ChatResponse::from_text(MISSING_AUDIO_INPUT);
        }

        let user_turn = match audio {
            Some(wav) => Turn::user_with_audio(message, wav, CAPTURED_AUDIO_MIME),
            None => Turn::user(message),
        };
        self.history.push(user_turn);

        let settings = CompletionSettings {
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
            max_tokens: self.settings.max_tokens,
            system_prompt: self.settings.system_prompt.clone(),
            audio: want_audio.then(|| AudioSpec {
                voice: self.settings.voice.clone(),
                format: self.settings.audio_format.clone(),
            }),
        };

        let reply = match self.completion.complete(self.history.turns(), &settings).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "completion backend failed");
                // The user turn stays; failed turns never gain an assistant
                // message, so history only reflects delivered responses
                return ChatResponse::from_text(format!("Error: {e}"));
            }
        };

        let text = reply.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
        if let Some(text) = text {
            self.history.push(Turn::assistant(text));
        }

        // First audio item wins; the scan stops there
        let audio_out = reply.items.iter().find_map(|item| match item {
            ResponseItem::Audio { data, format } => Some(ResponseAudio {
                data: data.clone(),
                format: format.clone(),
            }),
            ResponseItem::Text(_) | ResponseItem::Other => None,
        });

        ChatResponse {
            text: text.map_or_else(|| NO_TEXT_RESPONSE.to_string(), ToString::to_string),
            audio: audio_out,
        }
    }
}
