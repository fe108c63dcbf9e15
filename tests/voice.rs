//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parley::voice::{AudioBuffer, AudioPlayback, SAMPLE_RATE, StopToken, samples_to_wav};

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // WAV should have reasonable size
    assert!(wav_data.len() > 44); // WAV header is 44 bytes
}

#[test]
fn test_wav_roundtrip() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    // Read WAV back
    let cursor = Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
}

#[test]
fn test_audio_buffer_format() {
    let samples = generate_sine_samples(440.0, 0.5, 0.3);
    let buffer = AudioBuffer::new(samples, SAMPLE_RATE, 1);

    assert!(!buffer.is_empty());
    assert_eq!(buffer.sample_rate(), SAMPLE_RATE);
    assert_eq!(buffer.channels(), 1);
    assert_eq!(buffer.duration(), Duration::from_millis(500));

    let wav = buffer.to_wav().unwrap();
    assert_eq!(&wav[0..4], b"RIFF");
}

#[test]
fn test_empty_buffer_is_no_audio() {
    let buffer = AudioBuffer::empty();

    assert!(buffer.is_empty());
    assert_eq!(buffer.duration(), Duration::ZERO);
}

#[test]
fn test_stop_token_fires_once() {
    let token = StopToken::new();

    assert!(!token.is_fired());
    assert!(token.fire());
    assert!(token.is_fired());

    // The second source's firing is a no-op
    assert!(!token.fire());
    assert!(token.is_fired());
}

#[tokio::test]
async fn test_stop_token_race_has_one_winner() {
    // Simulate the manual trigger and the deadline timer firing in quick
    // succession; exactly one may win, and nothing may panic
    for _ in 0..100 {
        let token = StopToken::new();

        let manual = {
            let token = token.clone();
            tokio::spawn(async move { usize::from(token.fire()) })
        };
        let timer = {
            let token = token.clone();
            tokio::spawn(async move { usize::from(token.fire()) })
        };

        let wins = manual.await.unwrap() + timer.await.unwrap();
        assert_eq!(wins, 1);
        assert!(token.is_fired());
    }
}

#[tokio::test]
async fn test_stop_token_wait_observes_fire() {
    let token = StopToken::new();

    let waiter = {
        let token = token.clone();
        tokio::spawn(async move {
            token.wait().await;
            token.is_fired()
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    token.fire();

    let observed = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("wait did not observe fire")
        .unwrap();
    assert!(observed);
}

#[tokio::test]
async fn test_stop_token_wait_returns_immediately_when_fired() {
    let token = StopToken::new();
    token.fire();

    tokio::time::timeout(Duration::from_millis(100), token.wait())
        .await
        .expect("pre-fired wait should not block");
}

/// Playback with a counting fallback launcher
fn counting_playback() -> (AudioPlayback, Arc<Mutex<Vec<PathBuf>>>) {
    let invocations = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&invocations);

    let playback = AudioPlayback::with_fallback(Box::new(move |path| {
        recorder.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }));

    (playback, invocations)
}

#[tokio::test]
async fn test_playback_failure_invokes_fallback_once() {
    // An unsupported container fails the primary decode path the same way a
    // device/codec failure does
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reply.ogg");
    std::fs::write(&path, b"not really audio").unwrap();

    let (playback, invocations) = counting_playback();
    playback.play_file(&path).await.unwrap();

    let invocations = invocations.lock().unwrap();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0], path);
}

#[tokio::test]
async fn test_corrupt_mp3_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reply.mp3");
    std::fs::write(&path, vec![0u8; 512]).unwrap();

    let (playback, invocations) = counting_playback();
    playback.play_file(&path).await.unwrap();

    assert_eq!(invocations.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_fallback_failure_is_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reply.ogg");
    std::fs::write(&path, b"junk").unwrap();

    let playback = AudioPlayback::with_fallback(Box::new(|_| {
        Err(parley::Error::Playback("no player installed".to_string()))
    }));

    let err = playback.play_file(&path).await.unwrap_err();
    assert!(err.to_string().contains("fallback player failed"));
}
