//! Conversation turn pipeline
//!
//! History, backend seams, and the orchestrator that composes one completed
//! assistant turn per user input.

mod completion;
mod history;
mod orchestrator;
mod transcription;

pub use completion::{
    AudioSpec, CompletionBackend, CompletionMessage, CompletionSettings, OpenAiCompletion,
    ResponseItem,
};
pub use history::{ContentPart, ConversationHistory, Role, Turn};
pub use orchestrator::{ChatResponse, ChatSession, ResponseAudio, SessionSettings};
pub use transcription::{TranscriptionBackend, WhisperTranscriber};
