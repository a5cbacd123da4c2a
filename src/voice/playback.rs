//! Speech playback to the default output device

use async_trait::async_trait;
use base64::Engine;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::io::Cursor;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

use super::encode::resample;

/// Something that can speak a base64 audio payload
#[async_trait]
pub trait Player: Send + Sync {
    /// Resolves once playback has ended
    async fn play(&self, audio_base64: &str) -> Result<()>;
}

/// Plays MP3 replies on the default speakers
#[derive(Debug, Default)]
pub struct SpeakerPlayer;

impl SpeakerPlayer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Player for SpeakerPlayer {
    async fn play(&self, audio_base64: &str) -> Result<()> {
        let bytes = decode_base64_audio(audio_base64)?;
        tokio::task::spawn_blocking(move || play_mp3_blocking(&bytes))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {}", e)))?
    }
}

/// Decode a base64 payload into raw audio bytes
pub fn decode_base64_audio(audio_base64: &str) -> Result<Vec<u8>> {
    let cleaned: String = audio_base64.split_whitespace().collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::Decode(format!("invalid base64 audio: {}", e)))
}

/// Decoded PCM, mono
#[derive(Debug)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode MP3 bytes to mono f32 samples
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                let channels = frame.channels.max(1);
                samples.extend(frame.data.chunks(channels).map(|chunk| {
                    chunk.iter().map(|&s| f32::from(s) / 32768.0).sum::<f32>() / chunk.len() as f32
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Decode(format!("MP3 decode error: {}", e))),
        }
    }

    if samples.is_empty() {
        return Err(Error::Decode("no audio frames in payload".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Decode and play; the output stream is dropped on every return path
fn play_mp3_blocking(mp3_data: &[u8]) -> Result<()> {
    let decoded = decode_mp3(mp3_data)?;

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| Error::Audio(e.to_string()))?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(Error::Audio(format!(
            "unsupported output format {:?}",
            supported.sample_format()
        )));
    }

    let config: cpal::StreamConfig = supported.into();
    let channels = config.channels as usize;
    let device_rate = config.sample_rate.0;
    let samples = Arc::new(resample(&decoded.samples, decoded.sample_rate, device_rate));
    let total = samples.len();

    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));
    let failed = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        let failed = Arc::clone(&failed);
        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let pos = position.fetch_add(1, Ordering::Relaxed);
                        let sample = match samples.get(pos) {
                            Some(&s) => s,
                            None => {
                                finished.store(true, Ordering::SeqCst);
                                0.0
                            }
                        };
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio playback error");
                    failed.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (total as u64 * 1000) / u64::from(device_rate.max(1));
    let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::SeqCst) && !failed.load(Ordering::SeqCst) {
        if Instant::now() > deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    drop(stream);

    if failed.load(Ordering::SeqCst) {
        return Err(Error::Audio("output stream failed".to_string()));
    }

    tracing::debug!(samples = total, "playback complete");
    Ok(())
}
