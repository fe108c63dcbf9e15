//! Voice processing module
//!
//! Handles time-bounded audio capture with dual cancellation triggers and
//! playback with a degrade-to-fallback policy.

mod capture;
mod playback;

pub use capture::{AudioBuffer, AudioCapture, SAMPLE_RATE, StopToken, samples_to_wav};
pub use playback::{AudioPlayback, FallbackLauncher};
