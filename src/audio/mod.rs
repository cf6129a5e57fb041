// Audio processing module
// Decoding, peak normalization, resampling and length alignment

pub mod align;
pub mod ingest;
pub mod normalize;
#[cfg(feature = "mic")]
pub mod recording;
pub mod resample;

pub use align::{align_length, target_len, LengthAdjustment};
pub use ingest::{decode, encode_wav, AudioClip, AudioHint, DecodeError, Signal};
pub use normalize::{normalize_peak, SilentSignalError};
pub use resample::resample_to;
