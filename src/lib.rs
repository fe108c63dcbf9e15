//! Parley - voice and text conversational client
//!
//! This library provides the turn pipeline for a conversational session:
//! - Time-bounded audio capture with dual cancellation triggers
//! - The orchestrator that keeps ordered dialogue history, composes
//!   single- or multi-modal turns, and normalizes backend replies
//! - Audio playback with a degrade-to-fallback policy
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Console / UI                       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  ChatSession                         │
//! │   Capture  │  History  │  Orchestrator  │  Playback │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              External backends                       │
//! │   Chat completion  │  Transcription                  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod voice;

pub use chat::{ChatResponse, ChatSession, SessionSettings};
pub use config::Config;
pub use error::{Error, Result};
