// Sample rate conversion to the rate the artifacts were produced at

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::audio::{DecodeError, Signal};

const CHUNK_FRAMES: usize = 1024;
const MAX_FLUSHES: usize = 64;

/// Resample a mono signal in place; no-op when the rate already matches
pub fn resample_to(signal: &mut Signal, to_hz: u32) -> Result<(), DecodeError> {
    let from_hz = signal.sample_rate;

    if from_hz == 0 || to_hz == 0 {
        return Err(DecodeError::Resample(format!(
            "invalid sample rates: from {} Hz to {} Hz",
            from_hz, to_hz
        )));
    }
    if from_hz == to_hz {
        return Ok(());
    }
    if signal.samples.is_empty() {
        signal.sample_rate = to_hz;
        return Ok(());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_hz as f64 / from_hz as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_FRAMES, 1)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let input = std::mem::take(&mut signal.samples);
    let expected = (input.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay);

    let mut chunks = input.chunks_exact(CHUNK_FRAMES);
    for chunk in chunks.by_ref() {
        let mut waves_out = resampler
            .process(&[chunk], None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        output.append(&mut waves_out[0]);
    }
    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let mut waves_out = resampler
            .process_partial(Some(&[remainder]), None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        output.append(&mut waves_out[0]);
    }

    // Flush the filter tail until the delayed samples are out
    for _ in 0..MAX_FLUSHES {
        if output.len() >= expected + delay {
            break;
        }
        let mut waves_out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        if waves_out[0].is_empty() {
            break;
        }
        output.append(&mut waves_out[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    signal.samples = output;
    signal.sample_rate = to_hz;

    log::debug!(
        "Resampled {} Hz -> {} Hz ({} samples)",
        from_hz,
        to_hz,
        signal.samples.len()
    );

    Ok(())
}
