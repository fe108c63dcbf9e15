//! Audio playback to speakers
//!
//! Primary path decodes and plays through the default output device. Codec
//! support is environment-dependent, so any primary failure degrades to the
//! host's default player for the file type; only the fallback's own failure
//! is surfaced, and the conversational loop never crashes on playback.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::{Error, Result};

/// Sample rate for playback (matches common synthesized-speech output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Handler invoked when the primary device/codec path fails
pub type FallbackLauncher = Box<dyn Fn(&Path) -> Result<()> + Send + Sync>;

/// Plays audio to the default output device
pub struct AudioPlayback {
    fallback: FallbackLauncher,
}

impl AudioPlayback {
    /// Create a playback instance with the host's default player as fallback
    #[must_use]
    pub fn new() -> Self {
        Self {
            fallback: Box::new(launch_system_player),
        }
    }

    /// Create a playback instance with a custom fallback launcher
    #[must_use]
    pub fn with_fallback(fallback: FallbackLauncher) -> Self {
        Self { fallback }
    }

    /// Play an audio file, degrading to the fallback player on any
    /// decode/device error
    ///
    /// Blocks the calling flow until playback completes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Playback`] only if the fallback launcher itself fails
    #[allow(clippy::unused_async)]
    pub async fn play_file(&self, path: &Path) -> Result<()> {
        match decode_file(path).and_then(|samples| self.play_samples_blocking(&samples)) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "primary playback failed, launching fallback player"
                );
                (self.fallback)(path)
                    .map_err(|fe| Error::Playback(format!("fallback player failed: {fe}")))
            }
        }
    }

    /// Play audio from MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    #[allow(clippy::unused_async)]
    pub async fn play_mp3(&self, mp3_data: &[u8]) -> Result<()> {
        let samples = decode_mp3(mp3_data)?;
        self.play_samples_blocking(&samples)
    }

    /// Play audio samples (f32 format)
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    #[allow(clippy::unused_async)]
    pub async fn play(&self, samples: &[f32]) -> Result<()> {
        self.play_samples_blocking(samples)
    }

    /// Play samples in a blocking manner
    ///
    /// The output device is acquired for this call only and released before
    /// return on every path.
    fn play_samples_blocking(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::DeviceUnavailable("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| {
                Error::DeviceUnavailable("no suitable output config found".to_string())
            })?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();
        let channels = config.channels as usize;

        let samples: Arc<Vec<f32>> = Arc::new(samples.to_vec());
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let samples_cb = Arc::clone(&samples);
        let position_cb = Arc::clone(&position);
        let finished_cb = Arc::clone(&finished);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let pos = position_cb.load(Ordering::Relaxed);
                        let sample = if pos < samples_cb.len() {
                            position_cb.store(pos + 1, Ordering::Relaxed);
                            samples_cb[pos]
                        } else {
                            finished_cb.store(true, Ordering::Relaxed);
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Poll for completion, bounded by the buffer's own duration plus
        // device latency headroom
        let duration_ms = (samples.len() as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(duration_ms + 500);

        while !finished.load(Ordering::Relaxed) {
            if start.elapsed() > timeout {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        // Let the device drain its last buffer
        std::thread::sleep(std::time::Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = samples.len(), "playback complete");

        Ok(())
    }
}

impl Default for AudioPlayback {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an audio file into f32 samples based on its extension
fn decode_file(path: &Path) -> Result<Vec<f32>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" => decode_mp3(&std::fs::read(path)?),
        "wav" => decode_wav(path),
        other => Err(Error::Audio(format!("unsupported audio format: {other:?}"))),
    }
}

/// Decode MP3 bytes to f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                // Convert i16 samples to f32 and handle stereo to mono
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    // Stereo: average channels
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    // Mono
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() {
        return Err(Error::Audio("MP3 stream contained no frames".to_string()));
    }

    Ok(samples)
}

/// Decode a WAV file to mono f32 samples
fn decode_wav(path: &Path) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();

    let raw: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / 32768.0))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
    };

    if spec.channels == 2 {
        Ok(raw
            .chunks(2)
            .map(|c| f32::midpoint(c[0], c.get(1).copied().unwrap_or(c[0])))
            .collect())
    } else {
        Ok(raw)
    }
}

/// Launch the host's registered player for the file type
fn launch_system_player(path: &Path) -> Result<()> {
    tracing::info!(path = %path.display(), "launching system default player");

    let status = system_player_command(path)?
        .status()
        .map_err(|e| Error::Playback(e.to_string()))?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Playback(format!(
            "system player exited with {status}"
        )))
    }
}

/// Build the platform opener invocation for a file
fn system_player_command(path: &Path) -> Result<std::process::Command> {
    #[cfg(target_os = "macos")]
    {
        let mut cmd = std::process::Command::new("open");
        cmd.arg(path);
        Ok(cmd)
    }

    #[cfg(target_os = "windows")]
    {
        let mut cmd = std::process::Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(path);
        Ok(cmd)
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let opener = which::which("xdg-open")
            .map_err(|e| Error::Playback(format!("no system player found: {e}")))?;
        let mut cmd = std::process::Command::new(opener);
        cmd.arg(path);
        Ok(cmd)
    }
}
