//! Conversation history and turn content

/// Role of a turn in the dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Message from the human
    User,
    /// Message from the model
    Assistant,
}

impl Role {
    /// Wire-level role name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One piece of turn content
///
/// Tagged variants so audio extraction is a structural match rather than a
/// runtime type probe.
#[derive(Debug, Clone)]
pub enum ContentPart {
    /// Plain text
    Text(String),
    /// Embedded audio blob with a MIME tag
    Audio {
        /// Encoded audio bytes (WAV container for captured input)
        data: Vec<u8>,
        /// MIME type, e.g. `audio/wav`
        mime: String,
    },
}

/// One role-tagged message in the conversation history
///
/// Immutable once appended.
#[derive(Debug, Clone)]
pub struct Turn {
    role: Role,
    content: Vec<ContentPart>,
}

impl Turn {
    /// A plain-text user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::Text(text.into())],
        }
    }

    /// A user turn carrying both the transcribed text and the original audio
    pub fn user_with_audio(text: impl Into<String>, data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![
                ContentPart::Text(text.into()),
                ContentPart::Audio {
                    data,
                    mime: mime.into(),
                },
            ],
        }
    }

    /// A plain-text assistant turn
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentPart::Text(text.into())],
        }
    }

    /// The turn's role
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// The turn's content parts in order
    #[must_use]
    pub fn content(&self) -> &[ContentPart] {
        &self.content
    }

    /// First text part, if any
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|part| match part {
            ContentPart::Text(t) => Some(t.as_str()),
            ContentPart::Audio { .. } => None,
        })
    }

    /// Whether the turn carries an audio part
    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.content
            .iter()
            .any(|part| matches!(part, ContentPart::Audio { .. }))
    }
}

/// Ordered, mutable log of dialogue turns
///
/// Insertion order is semantically significant: the sequence is the literal
/// context window sent to the completion backend. Callers should alternate
/// user and assistant turns; alternation is not hard-enforced, but two
/// consecutive user turns degrade context quality. Single-writer: mutated
/// only by the orchestrator on its own execution flow, never shared across
/// simultaneously-running turns.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    /// Create an empty history
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a turn
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Remove all turns
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Read-only snapshot supplied to the backend call
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
