//! Configuration management for parley
//!
//! Resolution order: built-in defaults, then the TOML config file overlay,
//! then environment variables.

pub mod file;

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::Result;
use self::file::ParleyConfigFile;

/// Default chat completion model (audio-capable)
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-audio-preview";

/// Default transcription model
const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Default system instruction
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, friendly, and knowledgeable assistant. \
                                     Be concise and clear in your responses.";

/// Resolved parley configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI API key (from `OPENAI_API_KEY` or the config file)
    pub api_key: String,

    /// Chat completion settings
    pub chat: ChatConfig,

    /// Voice settings
    pub voice: VoiceConfig,
}

/// Chat completion settings
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model identifier
    pub model: String,

    /// Sampling temperature (0–2)
    pub temperature: f32,

    /// Nucleus-sampling parameter (0–1)
    pub top_p: f32,

    /// Bound on response length
    pub max_tokens: u32,

    /// System instruction sent with every request
    pub system_prompt: String,
}

/// Voice settings
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Transcription model
    pub stt_model: String,

    /// Voice identifier for synthesized replies
    pub voice: String,

    /// Encoding for synthesized replies
    pub format: String,

    /// Language hint for transcription
    pub language: String,

    /// Maximum recording duration in seconds
    pub max_record_secs: u64,
}

impl Config {
    /// Load configuration from the config file and environment
    ///
    /// A missing config file is not an error; every field has a default.
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be read or parsed
    pub fn load() -> Result<Self> {
        let overlay = match Self::config_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading config file");
                toml::from_str(&std::fs::read_to_string(&path)?)?
            }
            _ => ParleyConfigFile::default(),
        };

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or(overlay.api_keys.openai)
            .unwrap_or_default();

        let chat = ChatConfig {
            model: std::env::var("PARLEY_CHAT_MODEL")
                .ok()
                .or(overlay.chat.model)
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            temperature: overlay.chat.temperature.unwrap_or(0.7),
            top_p: overlay.chat.top_p.unwrap_or(0.95),
            max_tokens: overlay.chat.max_tokens.unwrap_or(800),
            system_prompt: overlay
                .chat
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        };

        let voice = VoiceConfig {
            stt_model: overlay
                .voice
                .stt_model
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            voice: std::env::var("PARLEY_VOICE")
                .ok()
                .or(overlay.voice.voice)
                .unwrap_or_else(|| "alloy".to_string()),
            format: overlay.voice.format.unwrap_or_else(|| "mp3".to_string()),
            language: overlay.voice.language.unwrap_or_else(|| "en".to_string()),
            max_record_secs: overlay.voice.max_record_secs.unwrap_or(10),
        };

        Ok(Self {
            api_key,
            chat,
            voice,
        })
    }

    /// Location of the TOML config file
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "omni", "parley")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_parses_partial_file() {
        let overlay: ParleyConfigFile = toml::from_str(
            r#"
            [chat]
            model = "gpt-4o"
            temperature = 0.2

            [voice]
            max_record_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(overlay.chat.model.as_deref(), Some("gpt-4o"));
        assert_eq!(overlay.chat.temperature, Some(0.2));
        assert_eq!(overlay.voice.max_record_secs, Some(30));
        assert!(overlay.voice.voice.is_none());
        assert!(overlay.api_keys.openai.is_none());
    }

    #[test]
    fn test_overlay_accepts_empty_file() {
        let overlay: ParleyConfigFile = toml::from_str("").unwrap();
        assert!(overlay.chat.model.is_none());
    }
}
