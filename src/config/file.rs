//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of
//! defaults.

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfigFile {
    /// Chat completion configuration
    #[serde(default)]
    pub chat: ChatFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Chat-completion configuration
#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    /// Model identifier (e.g. "gpt-4o-audio-preview")
    pub model: Option<String>,

    /// Sampling temperature (0–2)
    pub temperature: Option<f32>,

    /// Nucleus-sampling parameter (0–1)
    pub top_p: Option<f32>,

    /// Bound on response length
    pub max_tokens: Option<u32>,

    /// System instruction sent with every request
    pub system_prompt: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Transcription model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Voice identifier for synthesized replies (e.g. "alloy")
    pub voice: Option<String>,

    /// Encoding for synthesized replies (e.g. "mp3")
    pub format: Option<String>,

    /// Language hint for transcription (e.g. "en")
    pub language: Option<String>,

    /// Maximum recording duration in seconds
    pub max_record_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}
