//! Live microphone capture using cpal
//! The stream lives on its own thread; start/stop toggles it like a record button

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::audio::ingest::encode_wav;

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("No input device available")]
    NoInputDevice,
    #[error("Failed to get default input config: {0}")]
    ConfigError(String),
    #[error("Failed to build input stream: {0}")]
    StreamError(String),
    #[error("Recording not started")]
    NotStarted,
    #[error("Recording already in progress")]
    AlreadyRecording,
    #[error("Failed to encode recording: {0}")]
    EncodeError(#[from] hound::Error),
}

const POLL_ATTEMPTS: u32 = 50;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy)]
struct CaptureFormat {
    sample_rate: u32,
    channels: u16,
}

/// Shared capture state; the cpal stream itself never leaves the capture thread
pub struct Recorder {
    samples: Arc<Mutex<Vec<f32>>>,
    format: Arc<Mutex<CaptureFormat>>,
    is_recording: Arc<AtomicBool>,
    stop_signal: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<RecordingError>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            samples: Arc::new(Mutex::new(Vec::new())),
            format: Arc::new(Mutex::new(CaptureFormat {
                sample_rate: 44100,
                channels: 1,
            })),
            is_recording: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Start recording from the default input device
    pub fn start(&self) -> Result<(), RecordingError> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(RecordingError::AlreadyRecording);
        }

        lock(&self.samples).clear();
        *lock(&self.failure) = None;
        self.stop_signal.store(false, Ordering::SeqCst);

        let samples = Arc::clone(&self.samples);
        let format = Arc::clone(&self.format);
        let is_recording = Arc::clone(&self.is_recording);
        let stop_signal = Arc::clone(&self.stop_signal);
        let failure = Arc::clone(&self.failure);

        thread::spawn(move || {
            if let Err(e) = run_capture(samples, format, Arc::clone(&is_recording), stop_signal) {
                log::error!("Recording error: {}", e);
                *lock(&failure) = Some(e);
                is_recording.store(false, Ordering::SeqCst);
            }
        });

        self.await_start(POLL_ATTEMPTS, POLL_INTERVAL)
    }

    // Wait for the stream to come up or fail
    fn await_start(&self, attempts: u32, interval: Duration) -> Result<(), RecordingError> {
        for _ in 0..attempts {
            if self.is_recording.load(Ordering::SeqCst) {
                return Ok(());
            }
            if let Some(e) = lock(&self.failure).take() {
                return Err(e);
            }
            thread::sleep(interval);
        }

        // The capture thread exits as soon as it sees the stop signal
        self.stop_signal.store(true, Ordering::SeqCst);
        Err(RecordingError::StreamError(
            "input stream did not start".to_string(),
        ))
    }

    /// Stop recording and return the captured audio
    pub fn stop(&self) -> Result<RecordingData, RecordingError> {
        if !self.is_recording.load(Ordering::SeqCst) {
            return Err(RecordingError::NotStarted);
        }

        self.stop_signal.store(true, Ordering::SeqCst);

        for _ in 0..POLL_ATTEMPTS {
            if !self.is_recording.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        let samples = std::mem::take(&mut *lock(&self.samples));
        let format = *lock(&self.format);

        Ok(RecordingData {
            samples,
            sample_rate: format.sample_rate,
            channels: format.channels,
        })
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

fn run_capture(
    samples: Arc<Mutex<Vec<f32>>>,
    format_out: Arc<Mutex<CaptureFormat>>,
    is_recording: Arc<AtomicBool>,
    stop_signal: Arc<AtomicBool>,
) -> Result<(), RecordingError> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or(RecordingError::NoInputDevice)?;

    let config = device
        .default_input_config()
        .map_err(|e| RecordingError::ConfigError(e.to_string()))?;

    *lock(&format_out) = CaptureFormat {
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
    };

    let err_fn = |err| log::error!("Input stream error: {}", err);

    let stream = match config.sample_format() {
        SampleFormat::F32 => {
            let sink = Arc::clone(&samples);
            device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &_| lock(&sink).extend_from_slice(data),
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let sink = Arc::clone(&samples);
            device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &_| {
                    lock(&sink).extend(data.iter().map(|&s| s.to_float_sample()))
                },
                err_fn,
                None,
            )
        }
        SampleFormat::U16 => {
            let sink = Arc::clone(&samples);
            device.build_input_stream(
                &config.into(),
                move |data: &[u16], _: &_| {
                    lock(&sink).extend(data.iter().map(|&s| s.to_float_sample()))
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(RecordingError::ConfigError(format!(
                "Unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| RecordingError::StreamError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| RecordingError::StreamError(e.to_string()))?;
    is_recording.store(true, Ordering::SeqCst);

    while !stop_signal.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
    is_recording.store(false, Ordering::SeqCst);

    Ok(())
}

/// Captured interleaved audio
#[derive(Debug, Clone)]
pub struct RecordingData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl RecordingData {
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
            .collect()
    }

    /// Mono 16-bit WAV, the same shape a browser recorder widget hands over
    pub fn to_wav(&self) -> Result<Vec<u8>, RecordingError> {
        Ok(encode_wav(&self.to_mono(), self.sample_rate)?)
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }
}
