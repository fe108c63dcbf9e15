//! Audio capture from microphone
//!
//! One recording is a race between three concurrent activities: the device
//! callback filling the buffer, a manual stop trigger, and a deadline timer.
//! The two cancellation sources share a fire-once [`StopToken`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};
use tokio::sync::Notify;

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Fire-once cancellation commit shared by the manual trigger and the
/// deadline timer.
///
/// Whichever source fires first wins; later firings are no-ops, so the
/// device stop is never requested twice.
#[derive(Clone, Default)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    fired: AtomicBool,
    notify: Notify,
}

impl StopToken {
    /// Create an unfired token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit the stop request
    ///
    /// Returns `true` if this call won the race, `false` if the token had
    /// already fired.
    pub fn fire(&self) -> bool {
        let first = !self.inner.fired.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Check whether the stop has been committed
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Wait until the token fires; returns immediately if it already has
    pub async fn wait(&self) {
        while !self.is_fired() {
            let notified = self.inner.notify.notified();
            if self.is_fired() {
                break;
            }
            notified.await;
        }
    }
}

/// Raw PCM audio plus its format descriptor
///
/// Produced by [`AudioCapture::record`]; exclusively owned by the caller
/// until handed to the transcription backend or discarded.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Wrap captured samples with their format
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// An empty buffer ("no audio provided", not an error)
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(Vec::new(), SAMPLE_RATE, 1)
    }

    /// Whether the recording produced zero frames
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Captured samples
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count
    #[must_use]
    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Recorded duration
    #[must_use]
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() as u64 / u64::from(self.channels.max(1));
        Duration::from_millis(frames * 1000 / u64::from(self.sample_rate.max(1)))
    }

    /// Encode to a 16-bit PCM WAV container for the transcription backend
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        samples_to_wav(&self.samples, self.sample_rate)
    }
}

/// Captures audio from the default input device
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// Probes the default input device for a mono speech-rate config. Call
    /// once at startup: a [`Error::DeviceUnavailable`] result means the whole
    /// session should run text-only rather than retrying every turn.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if no input device exists or none
    /// supports mono capture at [`SAMPLE_RATE`]
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| {
                Error::DeviceUnavailable("no suitable capture config found".to_string())
            })?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Record until the token fires or the deadline elapses, whichever is
    /// first
    ///
    /// Frames accumulate from the moment the stream starts. Returns only
    /// after the device stream is torn down, so the buffer holds every frame
    /// the device delivered. A zero-length result is an empty buffer, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns error if the capture stream cannot be built or started
    #[allow(clippy::future_not_send)] // cpal streams aren't Send; run on the main task
    pub async fn record(
        &mut self,
        max_duration: Duration,
        stop: &StopToken,
    ) -> Result<AudioBuffer> {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }

        let buffer = Arc::clone(&self.buffer);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        tracing::debug!(max_secs = max_duration.as_secs_f64(), "recording started");

        tokio::select! {
            () = stop.wait() => {
                tracing::debug!("manual stop won the capture race");
            }
            () = tokio::time::sleep(max_duration) => {
                tracing::debug!("capture deadline reached");
            }
        }
        // The timer path commits here; if the manual trigger already fired,
        // this is a no-op.
        stop.fire();

        // Dropping the stream stops the device and tears down the callback;
        // no frames arrive past this point.
        drop(stream);

        let samples = self
            .buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();

        tracing::debug!(samples = samples.len(), "recording stopped");
        Ok(AudioBuffer::new(samples, SAMPLE_RATE, 1))
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
