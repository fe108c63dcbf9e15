//! Turn pipeline integration tests
//!
//! Exercises the orchestrator against stub backends; no network or audio
//! hardware required.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parley::chat::{
    CompletionBackend, CompletionMessage, CompletionSettings, ResponseItem, Role,
    TranscriptionBackend, Turn,
};
use parley::voice::AudioBuffer;
use parley::{ChatSession, Error, Result, SessionSettings};

/// Completion stub replaying queued replies and recording what it saw
struct StubCompletion {
    replies: Mutex<VecDeque<Result<CompletionMessage>>>,
    calls: AtomicUsize,
    last_turn_count: AtomicUsize,
    last_settings: Mutex<Option<CompletionSettings>>,
}

impl StubCompletion {
    fn new(replies: Vec<Result<CompletionMessage>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: AtomicUsize::new(0),
            last_turn_count: AtomicUsize::new(0),
            last_settings: Mutex::new(None),
        })
    }

    fn with_text(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(CompletionMessage {
            text: Some(text.to_string()),
            items: vec![ResponseItem::Text(text.to_string())],
        })])
    }

    fn failing(message: &str) -> Arc<Self> {
        Self::new(vec![Err(Error::Completion(message.to_string()))])
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_turn_count(&self) -> usize {
        self.last_turn_count.load(Ordering::SeqCst)
    }

    fn last_settings(&self) -> Option<CompletionSettings> {
        self.last_settings.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for StubCompletion {
    async fn complete(
        &self,
        turns: &[Turn],
        settings: &CompletionSettings,
    ) -> Result<CompletionMessage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_turn_count.store(turns.len(), Ordering::SeqCst);
        *self.last_settings.lock().unwrap() = Some(settings.clone());

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CompletionMessage::default()))
    }
}

/// Transcription stub returning a fixed transcript
struct StubTranscription {
    transcript: Result<String>,
    calls: AtomicUsize,
    last_audio: Mutex<Vec<u8>>,
}

impl StubTranscription {
    fn with_text(text: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            last_audio: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: Err(Error::Transcription(message.to_string())),
            calls: AtomicUsize::new(0),
            last_audio: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionBackend for StubTranscription {
    async fn transcribe(&self, audio: &[u8], _language: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_audio.lock().unwrap() = audio.to_vec();

        match &self.transcript {
            Ok(text) => Ok(text.clone()),
            Err(e) => Err(Error::Transcription(e.to_string())),
        }
    }
}

fn session(
    completion: Arc<StubCompletion>,
    transcription: Arc<StubTranscription>,
) -> ChatSession {
    ChatSession::new(completion, transcription, SessionSettings::default())
}

fn speech_buffer() -> AudioBuffer {
    AudioBuffer::new(vec![0.1; 1600], 16000, 1)
}

#[tokio::test]
async fn test_text_turn_appends_user_then_assistant() {
    let completion = StubCompletion::with_text("Hi there!");
    let transcription = StubTranscription::with_text("");
    let mut session = session(Arc::clone(&completion), transcription);

    let response = session.handle_text("Hello", false).await;

    assert_eq!(response.text, "Hi there!");
    assert!(response.audio.is_none());

    let turns = session.history().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role(), Role::User);
    assert_eq!(turns[0].text(), Some("Hello"));
    assert_eq!(turns[1].role(), Role::Assistant);
    assert_eq!(turns[1].text(), Some("Hi there!"));

    // The snapshot sent to the backend held only the user turn
    assert_eq!(completion.last_turn_count(), 1);
    assert!(completion.last_settings().unwrap().audio.is_none());
}

#[tokio::test]
async fn test_backend_failure_keeps_only_user_turn() {
    let completion = StubCompletion::failing("connection reset");
    let transcription = StubTranscription::with_text("");
    let mut session = session(completion, transcription);

    let response = session.handle_text("Tell me something", false).await;

    assert!(response.text.contains("connection reset"));
    assert!(response.audio.is_none());

    let turns = session.history().turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role(), Role::User);
}

#[tokio::test]
async fn test_clear_empties_history() {
    let completion = StubCompletion::with_text("Hi");
    let transcription = StubTranscription::with_text("");
    let mut session = session(completion, transcription);

    session.handle_text("Hello", false).await;
    assert_eq!(session.history().len(), 2);

    session.clear_history();
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_history_accumulates_across_turns() {
    let completion = StubCompletion::new(vec![
        Ok(CompletionMessage {
            text: Some("First".to_string()),
            items: vec![],
        }),
        Ok(CompletionMessage {
            text: Some("Second".to_string()),
            items: vec![],
        }),
    ]);
    let transcription = StubTranscription::with_text("");
    let mut session = session(Arc::clone(&completion), transcription);

    session.handle_text("one", false).await;
    session.handle_text("two", false).await;

    let roles: Vec<Role> = session.history().turns().iter().map(Turn::role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );

    // The second call saw the full prior context plus its own user turn
    assert_eq!(completion.last_turn_count(), 3);
}

#[tokio::test]
async fn test_empty_audio_buffer_is_not_an_error() {
    let completion = StubCompletion::with_text("unused");
    let transcription = StubTranscription::with_text("unused");
    let mut session = session(Arc::clone(&completion), Arc::clone(&transcription));

    let response = session.handle_audio(&AudioBuffer::empty(), false).await;

    assert_eq!(response.text, "No audio data provided.");
    assert!(session.history().is_empty());
    assert_eq!(transcription.calls(), 0);
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_audio_request_without_audio_content_fails_fast() {
    let completion = StubCompletion::with_text("unused");
    let transcription = StubTranscription::with_text("unused");
    let mut session = session(Arc::clone(&completion), transcription);

    let response = session.handle_audio(&AudioBuffer::empty(), true).await;

    assert_eq!(response.text, "No audio provided.");
    assert!(session.history().is_empty());
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_first_audio_item_wins() {
    let completion = StubCompletion::new(vec![Ok(CompletionMessage {
        text: Some("Here's a joke".to_string()),
        items: vec![
            ResponseItem::Text("Here's a joke".to_string()),
            ResponseItem::Audio {
                data: vec![1, 2, 3],
                format: "mp3".to_string(),
            },
            ResponseItem::Audio {
                data: vec![9, 9, 9],
                format: "mp3".to_string(),
            },
        ],
    })]);
    let transcription = StubTranscription::with_text("");
    let mut session = session(Arc::clone(&completion), transcription);

    let response = session.handle_text("Tell me a joke", true).await;

    let audio = response.audio.expect("audio artifact");
    assert_eq!(audio.data, vec![1, 2, 3]);
    assert_eq!(audio.format, "mp3");
    assert_eq!(session.history().len(), 2);

    // Requesting a spoken reply set the audio directive
    let settings = completion.last_settings().unwrap();
    let spec = settings.audio.expect("audio directive");
    assert_eq!(spec.voice, "alloy");
    assert_eq!(spec.format, "mp3");
}

#[tokio::test]
async fn test_audio_turn_attaches_original_audio() {
    let completion = StubCompletion::with_text("Sunny, around 20 degrees");
    let transcription = StubTranscription::with_text("what's the weather like");
    let mut session = session(Arc::clone(&completion), Arc::clone(&transcription));

    let response = session.handle_audio(&speech_buffer(), false).await;

    assert_eq!(response.text, "Sunny, around 20 degrees");
    assert_eq!(transcription.calls(), 1);

    // The transcription backend received a WAV container
    let wav = transcription.last_audio.lock().unwrap().clone();
    assert_eq!(&wav[0..4], b"RIFF");

    // The user turn carries both the transcript and the audio part
    let turns = session.history().turns();
    assert_eq!(turns.len(), 2);
    assert!(turns[0].has_audio());
    assert_eq!(turns[0].text(), Some("what's the weather like"));
}

#[tokio::test]
async fn test_transcription_failure_leaves_history_untouched() {
    let completion = StubCompletion::with_text("unused");
    let transcription = StubTranscription::failing("service down");
    let mut session = session(Arc::clone(&completion), transcription);

    let response = session.handle_audio(&speech_buffer(), false).await;

    assert!(response.text.contains("Could not transcribe"));
    assert!(session.history().is_empty());
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_empty_transcription_leaves_history_untouched() {
    let completion = StubCompletion::with_text("unused");
    let transcription = StubTranscription::with_text("   ");
    let mut session = session(Arc::clone(&completion), transcription);

    let response = session.handle_audio(&speech_buffer(), false).await;

    assert!(response.text.contains("Could not transcribe"));
    assert!(session.history().is_empty());
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_empty_reply_is_not_appended() {
    let completion = StubCompletion::new(vec![Ok(CompletionMessage::default())]);
    let transcription = StubTranscription::with_text("");
    let mut session = session(completion, transcription);

    let response = session.handle_text("Hello", false).await;

    assert_eq!(response.text, "No text response received.");
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history().turns()[0].role(), Role::User);
}

#[tokio::test]
async fn test_blank_message_short_circuits() {
    let completion = StubCompletion::with_text("unused");
    let transcription = StubTranscription::with_text("");
    let mut session = session(Arc::clone(&completion), transcription);

    let response = session.handle_text("   ", false).await;

    assert_eq!(response.text, "Please provide a message.");
    assert!(session.history().is_empty());
    assert_eq!(completion.calls(), 0);
}
