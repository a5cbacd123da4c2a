//! Audio recording using cpal

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc, Mutex,
};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

use super::encode::{downmix, encode_capture, UPLOAD_SAMPLE_RATE};

/// Push-to-talk audio source
#[async_trait]
pub trait Microphone: Send {
    /// Acquire the input device and begin capturing
    async fn start(&mut self) -> Result<()>;
    /// Stop capturing, release the device and return the encoded blob
    async fn finish(&mut self) -> Result<Vec<u8>>;
    /// Stop capturing and discard whatever was recorded
    fn cancel(&mut self);
}

/// State shared with one capture thread
///
/// Each capture gets its own flag and buffers, so a cancelled thread that is
/// still winding down can neither be revived nor write into the next capture.
#[derive(Clone)]
struct Capture {
    recording: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: Arc<AtomicU32>,
}

impl Capture {
    fn new() -> Self {
        Self {
            recording: Arc::new(AtomicBool::new(true)),
            samples: Arc::new(Mutex::new(Vec::new())),
            sample_rate: Arc::new(AtomicU32::new(UPLOAD_SAMPLE_RATE)),
        }
    }

    fn stop(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }

    fn take_samples(&self) -> Result<Vec<f32>> {
        self.samples
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .map_err(|_| Error::Audio("sample buffer poisoned".to_string()))
    }
}

/// Captures microphone audio into a WAV blob
pub struct VoiceRecorder {
    capture: Option<Capture>,
    worker: Option<JoinHandle<()>>,
}

impl VoiceRecorder {
    pub fn new() -> Self {
        Self {
            capture: None,
            worker: None,
        }
    }

    /// Retire any previous capture and hand out fresh state for the next one
    fn arm(&mut self) -> Capture {
        if let Some(old) = self.capture.take() {
            old.stop();
        }
        let capture = Capture::new();
        self.capture = Some(capture.clone());
        capture
    }

    fn disarm(&mut self) -> Option<Capture> {
        let capture = self.capture.take()?;
        capture.stop();
        Some(capture)
    }
}

impl Default for VoiceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Microphone for VoiceRecorder {
    async fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::Microphone("already recording".to_string()));
        }

        let capture = self.arm();
        let (ready_tx, ready_rx) = oneshot::channel();

        // Run recording in a dedicated thread (cpal Stream isn't Send)
        let worker = std::thread::spawn(move || {
            run_recording(capture, ready_tx);
        });

        let ready = ready_rx
            .await
            .unwrap_or_else(|_| Err(Error::Microphone("recording thread exited".to_string())));

        match ready {
            Ok(()) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                self.disarm();
                let _ = worker.join();
                Err(e)
            }
        }
    }

    async fn finish(&mut self) -> Result<Vec<u8>> {
        let capture = self
            .disarm()
            .ok_or_else(|| Error::Microphone("not recording".to_string()))?;

        // Wait for the thread to drop the stream
        if let Some(worker) = self.worker.take() {
            let _ = tokio::task::spawn_blocking(move || worker.join()).await;
        }

        let samples = capture.take_samples()?;
        if samples.is_empty() {
            return Err(Error::Microphone("no audio recorded".to_string()));
        }

        let sample_rate = capture.sample_rate.load(Ordering::SeqCst);
        tracing::debug!(samples = samples.len(), sample_rate, "capture finished");
        encode_capture(&samples, sample_rate)
    }

    fn cancel(&mut self) {
        // The thread notices its own flag within one poll and drops the stream;
        // its buffer goes with it
        self.disarm();
        self.worker.take();
    }
}

impl Drop for VoiceRecorder {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Run the recording loop in a dedicated thread
fn run_recording(capture: Capture, ready: oneshot::Sender<Result<()>>) {
    let recording = capture.recording.clone();
    let stream = match open_input_stream(capture.samples, capture.sample_rate, capture.recording) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "could not open microphone");
            let _ = ready.send(Err(e));
            return;
        }
    };

    let _ = ready.send(Ok(()));

    // Keep stream alive while recording
    while recording.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    drop(stream);
    tracing::debug!("input device released");
}

fn open_input_stream(
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: Arc<AtomicU32>,
    recording: Arc<AtomicBool>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Microphone("no input device available".to_string()))?;

    let config = device
        .default_input_config()
        .map_err(|e| Error::Microphone(e.to_string()))?;
    let rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    sample_rate.store(rate, Ordering::SeqCst);

    tracing::debug!(sample_rate = rate, channels, "recording");

    let format = config.sample_format();
    let config: cpal::StreamConfig = config.into();
    let stream = match format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, samples, recording),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, samples, recording),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, samples, recording),
        other => Err(Error::Microphone(format!("unsupported sample format {:?}", other))),
    }?;

    stream
        .play()
        .map_err(|e| Error::Microphone(e.to_string()))?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    samples: Arc<Mutex<Vec<f32>>>,
    recording: Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !recording.load(Ordering::SeqCst) {
                    return;
                }
                let floats: Vec<f32> = data.iter().map(|&s| f32::from_sample(s)).collect();
                if let Ok(mut buf) = samples.lock() {
                    buf.extend(downmix(&floats, channels));
                }
            },
            |err| {
                tracing::error!(error = %err, "audio input error");
            },
            None,
        )
        .map_err(|e| Error::Microphone(e.to_string()))
}
