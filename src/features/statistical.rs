// Statistical waveform features
// Moments, order statistics, ECDF and histogram summaries of a sample sequence
// Degenerate inputs (empty, zero variance) yield 0.0 instead of NaN

/// Sum of squared samples
pub fn abs_energy(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

/// Energy divided by the time span of the signal, (n - 1) / fs
pub fn average_power(x: &[f64], sample_rate: u32) -> f64 {
    if x.len() < 2 || sample_rate == 0 {
        return 0.0;
    }
    let span_secs = (x.len() - 1) as f64 / sample_rate as f64;
    abs_energy(x) / span_secs
}

pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Population variance (ddof = 0)
pub fn variance(x: &[f64]) -> f64 {
    central_moment(x, 2)
}

pub fn standard_deviation(x: &[f64]) -> f64 {
    variance(x).sqrt()
}

pub fn root_mean_square(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    (abs_energy(x) / x.len() as f64).sqrt()
}

pub fn max(x: &[f64]) -> f64 {
    x.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

pub fn min(x: &[f64]) -> f64 {
    x.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

pub fn peak_to_peak(x: &[f64]) -> f64 {
    (max(x) - min(x)).abs()
}

fn central_moment(x: &[f64], order: i32) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m).powi(order)).sum::<f64>() / x.len() as f64
}

/// Biased sample skewness, m3 / m2^1.5
pub fn skewness(x: &[f64]) -> f64 {
    let m2 = central_moment(x, 2);
    if m2 <= f64::EPSILON * f64::EPSILON {
        return 0.0;
    }
    central_moment(x, 3) / m2.powf(1.5)
}

/// Biased Fisher kurtosis, m4 / m2^2 - 3
pub fn kurtosis(x: &[f64]) -> f64 {
    let m2 = central_moment(x, 2);
    if m2 <= f64::EPSILON * f64::EPSILON {
        return 0.0;
    }
    central_moment(x, 4) / (m2 * m2) - 3.0
}

pub fn mean_abs_deviation(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m).abs()).sum::<f64>() / x.len() as f64
}

/// Ascending copy, NaN-safe ordering
pub fn sorted(x: &[f64]) -> Vec<f64> {
    let mut s = x.to_vec();
    s.sort_by(|a, b| a.total_cmp(b));
    s
}

/// Linear-interpolated percentile of a sorted slice, q in [0, 1]
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn median_sorted(sorted: &[f64]) -> f64 {
    percentile_sorted(sorted, 0.5)
}

pub fn interquartile_range_sorted(sorted: &[f64]) -> f64 {
    percentile_sorted(sorted, 0.75) - percentile_sorted(sorted, 0.25)
}

/// Median of |x - median(x)|, unscaled
pub fn median_abs_deviation(x: &[f64], median: f64) -> f64 {
    let deviations: Vec<f64> = x.iter().map(|v| (v - median).abs()).collect();
    median_sorted(&sorted(&deviations))
}

/// First `d` ECDF ordinates i / n; ordinates past n saturate at 1.0
pub fn ecdf(n: usize, d: usize) -> Vec<f64> {
    if n == 0 {
        return vec![0.0; d];
    }
    (1..=d).map(|i| (i as f64 / n as f64).min(1.0)).collect()
}

/// Number of sorted samples whose ECDF ordinate (i / n) is at most p
fn ecdf_count(n: usize, p: f64) -> usize {
    if n == 0 {
        return 0;
    }
    let mut count = ((p * n as f64).floor() as usize).min(n);
    while count < n && (count + 1) as f64 / n as f64 <= p {
        count += 1;
    }
    while count > 0 && count as f64 / n as f64 > p {
        count -= 1;
    }
    count
}

/// Largest sample whose ECDF ordinate is at most p; smallest sample if none
pub fn ecdf_percentile(sorted: &[f64], percentiles: &[f64]) -> Vec<f64> {
    percentiles
        .iter()
        .map(|&p| {
            if sorted.is_empty() {
                return 0.0;
            }
            match ecdf_count(sorted.len(), p) {
                0 => sorted[0],
                count => sorted[count - 1],
            }
        })
        .collect()
}

/// Sample counts whose ECDF ordinate is at most p
pub fn ecdf_percentile_count(n: usize, percentiles: &[f64]) -> Vec<f64> {
    percentiles
        .iter()
        .map(|&p| ecdf_count(n, p) as f64)
        .collect()
}

/// Normalized Shannon entropy of the distinct-value frequencies
pub fn entropy(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n < 2 {
        return 0.0;
    }

    let norm = (n as f64).log2();
    if norm == 1.0 {
        return 0.0;
    }

    let mut sum = 0.0;
    let mut run = 1usize;
    for i in 1..=n {
        if i < n && sorted[i] == sorted[i - 1] {
            run += 1;
            continue;
        }
        let p = run as f64 / n as f64;
        sum += p * p.log2();
        run = 1;
    }

    let value = -sum / norm;
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// Equal-width bin counts over [-r, r]; the last bin is closed on the right
/// Samples outside the range are not counted
pub fn histogram(x: &[f64], nbins: usize, r: f64) -> Vec<f64> {
    let mut counts = vec![0.0; nbins];
    if nbins == 0 || r <= 0.0 {
        return counts;
    }

    let lo = -r;
    let hi = r;
    let width = (hi - lo) / nbins as f64;

    for &v in x {
        if !(lo..=hi).contains(&v) {
            continue;
        }
        let idx = if v == hi {
            nbins - 1
        } else {
            (((v - lo) / width).floor() as usize).min(nbins - 1)
        };
        counts[idx] += 1.0;
    }

    counts
}
