// Audio ingestion module
// Decodes uploaded or recorded audio bytes into a mono f32 signal

use hound::{SampleFormat, WavReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// File extensions accepted for uploads
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// Highest sample rate a header may declare
pub const MAX_SAMPLE_RATE_HZ: u32 = 384_000;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to read WAV data: {0}")]
    WavReadError(#[from] hound::Error),

    #[error("Unrecognized audio format: {0}")]
    UnrecognizedFormat(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported file extension {extension:?}, expected .wav or .mp3")]
    UnsupportedExtension { extension: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Audio contains no samples")]
    NoSamples,

    #[error("Audio contains a non-finite sample at index {0}")]
    NonFiniteSample(usize),

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Unsupported sample rate {0} Hz, expected 1..={max} Hz", max = MAX_SAMPLE_RATE_HZ)]
    UnsupportedSampleRate(u32),
}

fn check_sample_rate(sample_rate: u32) -> Result<(), DecodeError> {
    if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE_HZ {
        return Err(DecodeError::UnsupportedSampleRate(sample_rate));
    }
    Ok(())
}

/// Container hint supplied alongside the raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioHint {
    Wav,
    Mp3,
    #[default]
    Unknown,
}

impl AudioHint {
    /// Map a file extension (without the dot) to a hint
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(AudioHint::Wav),
            "mp3" => Some(AudioHint::Mp3),
            _ => None,
        }
    }

    /// Map a MIME-ish type (e.g. "audio/wav", "audio/mpeg") to a hint
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_ascii_lowercase().as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => AudioHint::Wav,
            "audio/mpeg" | "audio/mp3" => AudioHint::Mp3,
            _ => AudioHint::Unknown,
        }
    }

    fn extension(&self) -> Option<&'static str> {
        match self {
            AudioHint::Wav => Some("wav"),
            AudioHint::Mp3 => Some("mp3"),
            AudioHint::Unknown => None,
        }
    }
}

/// Raw encoded audio for a single request
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub hint: AudioHint,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, hint: AudioHint) -> Self {
        AudioClip { bytes, hint }
    }

    /// Read an uploaded file, accepting only .wav and .mp3 extensions
    pub fn from_path(path: &Path) -> Result<Self, DecodeError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();

        let hint = if ACCEPTED_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()) {
            AudioHint::from_extension(&extension)
        } else {
            None
        }
        .ok_or(DecodeError::UnsupportedExtension { extension })?;

        let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(AudioClip { bytes, hint })
    }

    fn looks_like_riff(&self) -> bool {
        self.bytes.len() >= 12 && &self.bytes[0..4] == b"RIFF" && &self.bytes[8..12] == b"WAVE"
    }
}

/// Mono audio samples with their sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub samples: Vec<f32>,

    /// Sample rate in Hz (e.g., 16000, 44100)
    pub sample_rate: u32,
}

impl Signal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Signal {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

/// Interleaved decoder output before downmixing
#[derive(Debug, Clone)]
struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

impl DecodedAudio {
    /// Convert to mono by averaging channels
    fn into_mono(self) -> Signal {
        if self.channels <= 1 {
            return Signal::new(self.samples, self.sample_rate);
        }

        let mono = self
            .samples
            .chunks(self.channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Signal::new(mono, self.sample_rate)
    }
}

/// Decode a clip into a mono signal
/// WAV goes through hound first; everything else (and WAV codecs hound rejects) through symphonia
pub fn decode(clip: &AudioClip) -> Result<Signal, DecodeError> {
    let wants_wav = clip.hint == AudioHint::Wav || clip.looks_like_riff();

    let decoded = if wants_wav {
        match read_wav(&clip.bytes) {
            Ok(decoded) => decoded,
            Err(e @ DecodeError::UnsupportedSampleRate(_)) => return Err(e),
            Err(e) => {
                log::debug!("hound could not read clip ({}), falling back to symphonia", e);
                read_with_symphonia(&clip.bytes, clip.hint).map_err(|fallback| match fallback {
                    DecodeError::UnrecognizedFormat(_) => e,
                    other => other,
                })?
            }
        }
    } else {
        read_with_symphonia(&clip.bytes, clip.hint)?
    };

    check_sample_rate(decoded.sample_rate)?;

    if decoded.samples.is_empty() {
        return Err(DecodeError::NoSamples);
    }

    if let Some(idx) = decoded.samples.iter().position(|s| !s.is_finite()) {
        return Err(DecodeError::NonFiniteSample(idx));
    }

    let signal = decoded.into_mono();
    log::debug!(
        "Decoded {} mono samples at {} Hz ({:.3} s)",
        signal.len(),
        signal.sample_rate,
        signal.duration_secs()
    );

    Ok(signal)
}

/// Read WAV samples normalized to f32 in range [-1.0, 1.0]
fn read_wav(data: &[u8]) -> Result<DecodedAudio, DecodeError> {
    let mut reader = WavReader::new(Cursor::new(data))?;

    let spec = reader.spec();
    check_sample_rate(spec.sample_rate)?;
    let bit_depth = spec.bits_per_sample;

    let samples: Vec<f32> = match (spec.sample_format, bit_depth) {
        (SampleFormat::Int, 8) => {
            // hound yields 8-bit PCM already centered on zero
            reader
                .samples::<i8>()
                .map(|s| s.map(|s| s as f32 / 128.0))
                .collect::<Result<Vec<_>, _>>()?
        }
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 8388608.0))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 2147483648.0))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(DecodeError::UnsupportedFormat(format!(
                "{:?} {}-bit audio",
                spec.sample_format, bit_depth
            )));
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels as usize,
    })
}

/// Probe and decode with symphonia, returning interleaved samples
fn read_with_symphonia(data: &[u8], hint: AudioHint) -> Result<DecodedAudio, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());

    let mut probe_hint = Hint::new();
    if let Some(ext) = hint.extension() {
        probe_hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &probe_hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnrecognizedFormat(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| DecodeError::UnrecognizedFormat("no audio tracks found".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::UnsupportedFormat("unknown sample rate".to_string()))?;
    check_sample_rate(sample_rate)?;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let track_id = track.id;
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::UnrecognizedFormat(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Corrupt frames are skipped, matching how MP3 players recover
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::UnsupportedFormat(e.to_string())),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Encode mono f32 samples as a 16-bit PCM WAV buffer
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let int_sample = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(int_sample)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
