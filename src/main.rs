use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use parley::chat::{ChatResponse, OpenAiCompletion, WhisperTranscriber};
use parley::voice::{AudioCapture, AudioPlayback, StopToken};
use parley::{ChatSession, Config, SessionSettings};

/// Parley - voice and text conversational client
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run text-only (skip the audio hardware probe)
    #[arg(long, env = "PARLEY_TEXT_ONLY")]
    text_only: bool,

    /// Override the maximum recording duration in seconds
    #[arg(long)]
    record_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
        };
    }

    let config = Config::load()?;
    if config.api_key.is_empty() {
        anyhow::bail!("no API key configured; set OPENAI_API_KEY or add it to the config file");
    }

    let max_record_secs = cli.record_secs.unwrap_or(config.voice.max_record_secs);

    let completion = Arc::new(OpenAiCompletion::new(
        config.api_key.clone(),
        config.chat.model.clone(),
    )?);
    let transcription = Arc::new(WhisperTranscriber::new(
        config.api_key.clone(),
        config.voice.stt_model.clone(),
    )?);

    let settings = SessionSettings {
        temperature: config.chat.temperature,
        top_p: config.chat.top_p,
        max_tokens: config.chat.max_tokens,
        system_prompt: config.chat.system_prompt.clone(),
        voice: config.voice.voice.clone(),
        audio_format: config.voice.format.clone(),
        language: config.voice.language.clone(),
    };
    let mut session = ChatSession::new(completion, transcription, settings);

    // Probe capture hardware once at startup; a failed probe switches the
    // whole session to text-only mode rather than retrying every turn
    let mut mic = if cli.text_only {
        None
    } else {
        match AudioCapture::new() {
            Ok(capture) => Some(capture),
            Err(e) => {
                tracing::warn!(error = %e, "audio capture unavailable");
                println!("Audio recording is not available on this system.");
                None
            }
        }
    };

    if mic.is_some() {
        let use_audio = dialoguer::Confirm::new()
            .with_prompt("Would you like to use audio input/output?")
            .default(false)
            .interact()
            .unwrap_or(false);
        if !use_audio {
            mic = None;
        }
    }

    let playback = AudioPlayback::new();

    println!("\n===== Parley Chat =====");
    println!("Type 'exit' or 'quit' to end the conversation.");
    println!("Type 'clear' to clear the conversation history.");
    println!("=======================\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let message = if let Some(capture) = mic.as_mut() {
            match audio_turn(capture, &mut lines, &mut session, &playback, max_record_secs).await? {
                TurnInput::Completed => continue,
                TurnInput::Eof => break,
                TurnInput::Typed(message) => message,
            }
        } else {
            print!("User > ");
            std::io::stdout().flush()?;
            match lines.next_line().await? {
                Some(line) => line,
                None => break,
            }
        };

        let message = message.trim();
        if message.is_empty() {
            continue;
        }

        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.eq_ignore_ascii_case("clear") {
            session.clear_history();
            println!("Conversation history cleared.");
            continue;
        }

        let want_audio = mic.is_some();
        let response = session.handle_text(message, want_audio).await;
        present(&response, want_audio, &playback).await;
    }

    println!("Thank you for using Parley. Goodbye!");
    Ok(())
}

/// Outcome of one audio-mode interaction
enum TurnInput {
    /// The audio turn ran to completion (or was skipped); start the next one
    Completed,
    /// Stdin closed
    Eof,
    /// Recording produced nothing; the user typed this instead
    Typed(String),
}

/// Run one audio-mode turn: record, transcribe, complete, speak
#[allow(clippy::future_not_send)]
async fn audio_turn(
    capture: &mut AudioCapture,
    lines: &mut Lines<BufReader<Stdin>>,
    session: &mut ChatSession,
    playback: &AudioPlayback,
    max_record_secs: u64,
) -> anyhow::Result<TurnInput> {
    println!(
        "Press Enter to start recording (speak for up to {max_record_secs} seconds, or press Enter again to stop)..."
    );
    if lines.next_line().await?.is_none() {
        return Ok(TurnInput::Eof);
    }

    println!("Recording... (press Enter to stop)");

    // The deadline timer lives inside record(); the manual trigger is the
    // next Enter keypress. Both race to fire the same token once.
    let stop = StopToken::new();
    let record = capture.record(Duration::from_secs(max_record_secs), &stop);
    tokio::pin!(record);

    let result = loop {
        tokio::select! {
            result = &mut record => break result,
            line = lines.next_line(), if !stop.is_fired() => {
                if line?.is_none() {
                    return Ok(TurnInput::Eof);
                }
                stop.fire();
            }
        }
    };

    let buffer = match result {
        Ok(buffer) => buffer,
        Err(e) => {
            println!("Error recording audio: {e}");
            println!("Please type your question instead:");
            return Ok(match lines.next_line().await? {
                Some(line) => TurnInput::Typed(line),
                None => TurnInput::Eof,
            });
        }
    };

    if buffer.is_empty() {
        println!("No audio recorded. Please type your question:");
        return Ok(match lines.next_line().await? {
            Some(line) => TurnInput::Typed(line),
            None => TurnInput::Eof,
        });
    }

    println!("Recording complete. Processing...");
    let response = session.handle_audio(&buffer, true).await;
    present(&response, true, playback).await;
    Ok(TurnInput::Completed)
}

/// Print the assistant reply and play any synthesized audio
async fn present(response: &ChatResponse, want_audio: bool, playback: &AudioPlayback) {
    println!();
    println!("Assistant > {}", response.text);

    if want_audio {
        if let Some(audio) = &response.audio {
            // Per-turn scratch file in the OS temp dir; overwritten every
            // turn and intentionally left behind so the last reply can be
            // replayed
            let scratch = std::env::temp_dir().join(format!("parley-reply.{}", audio.format));
            match std::fs::write(&scratch, &audio.data) {
                Ok(()) => {
                    println!("Playing audio response...");
                    if let Err(e) = playback.play_file(&scratch).await {
                        println!("Audio playback failed: {e}");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %scratch.display(), "failed to write scratch audio");
                }
            }
        }
    }

    println!("-----------------------");
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    println!("Sample rate: {} Hz", capture.sample_rate());

    let stop = StopToken::new();
    let buffer = capture.record(Duration::from_secs(duration), &stop).await?;

    let energy = calculate_rms(buffer.samples());
    let peak = buffer
        .samples()
        .iter()
        .map(|s| s.abs())
        .fold(0.0f32, f32::max);

    println!("\n---");
    println!(
        "Captured {:.1}s | RMS: {energy:.4} | Peak: {peak:.4}",
        buffer.duration().as_secs_f64()
    );
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new();

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    playback.play(&samples).await?;

    println!("If you heard the tone, your speakers are working!");
    Ok(())
}
