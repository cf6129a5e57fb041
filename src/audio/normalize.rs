// Peak amplitude normalization

use thiserror::Error;

use crate::audio::Signal;

/// The signal has no energy to normalize against
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Signal is silent ({samples} samples, peak amplitude 0)")]
pub struct SilentSignalError {
    pub samples: usize,
}

/// Rescale samples so the maximum absolute value is exactly 1.0
/// Returns the peak the signal was divided by
pub fn normalize_peak(signal: &mut Signal) -> Result<f32, SilentSignalError> {
    let peak = signal.peak();

    if peak == 0.0 {
        return Err(SilentSignalError {
            samples: signal.samples.len(),
        });
    }

    for sample in signal.samples.iter_mut() {
        *sample /= peak;
    }

    Ok(peak)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_reaches_unit_peak() {
        let mut signal = Signal::new(vec![0.1, -0.25, 0.2, 0.05], 16000);
        let peak = normalize_peak(&mut signal).unwrap();

        assert_eq!(peak, 0.25);
        assert_eq!(signal.peak(), 1.0);
        assert_eq!(signal.samples[1], -1.0);
        assert!((signal.samples[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_keeps_sign_and_ratios() {
        let mut signal = Signal::new(vec![3.0, -6.0, 1.5], 8000);
        normalize_peak(&mut signal).unwrap();
        assert_eq!(signal.samples, vec![0.5, -1.0, 0.25]);
    }

    #[test]
    fn test_silent_signal_rejected() {
        let mut signal = Signal::new(vec![0.0; 16000], 16000);
        let err = normalize_peak(&mut signal).unwrap_err();
        assert_eq!(err.samples, 16000);
    }

    #[test]
    fn test_empty_signal_rejected() {
        let mut signal = Signal::new(vec![], 16000);
        assert!(normalize_peak(&mut signal).is_err());
    }
}
