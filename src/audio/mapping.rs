//! Frequency-axis mapping tables for the frame builder.
//!
//! The normalized (and log10) mapping positions bar edges on a log-frequency
//! axis warped by [`tri_ease`], so roughly the lower 40% of log-frequency
//! space receives half of the bars. The mel mapping builds a conventional
//! triangular filter bank with edges evenly spaced on the mel scale.

const LOW_MID: f64 = 0.40;
const HIGH_MID: f64 = 0.95;
const BLEND_HALF_WIDTH: f64 = 0.02;

/// Piecewise frequency easing: a square-root rise over the low section, a
/// linear middle, and a compressed power-law top, with cubic Hermite blends
/// of half-width [`BLEND_HALF_WIDTH`] across both seams.
pub fn tri_ease(t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }

    if t < LOW_MID - BLEND_HALF_WIDTH {
        low_section(t)
    } else if t < LOW_MID + BLEND_HALF_WIDTH {
        let t1 = LOW_MID - BLEND_HALF_WIDTH;
        let t2 = LOW_MID + BLEND_HALF_WIDTH;
        hermite(
            t,
            t1,
            t2,
            low_section(t1),
            low_section_slope(t1),
            mid_section(t2),
            mid_section_slope(),
        )
    } else if t < HIGH_MID - BLEND_HALF_WIDTH {
        mid_section(t)
    } else if t < HIGH_MID + BLEND_HALF_WIDTH {
        let t1 = HIGH_MID - BLEND_HALF_WIDTH;
        let t2 = HIGH_MID + BLEND_HALF_WIDTH;
        hermite(
            t,
            t1,
            t2,
            mid_section(t1),
            mid_section_slope(),
            high_section(t2),
            high_section_slope(t2),
        )
    } else {
        high_section(t)
    }
}

fn low_section(t: f64) -> f64 {
    0.5 * (t / LOW_MID).sqrt()
}

fn low_section_slope(t: f64) -> f64 {
    0.25 / ((t / LOW_MID).sqrt() * LOW_MID)
}

fn mid_section(t: f64) -> f64 {
    0.5 + 0.4 * (t - LOW_MID) / (HIGH_MID - LOW_MID)
}

fn mid_section_slope() -> f64 {
    0.4 / (HIGH_MID - LOW_MID)
}

fn high_section(t: f64) -> f64 {
    0.9 + 0.1 * ((t - HIGH_MID) / (1.0 - HIGH_MID)).powf(0.9)
}

fn high_section_slope(t: f64) -> f64 {
    0.09 * ((t - HIGH_MID) / (1.0 - HIGH_MID)).powf(-0.1) / (1.0 - HIGH_MID)
}

/// Cubic Hermite interpolation between `(t1, v1)` with slope `d1` and
/// `(t2, v2)` with slope `d2`, evaluated at `t`.
fn hermite(t: f64, t1: f64, t2: f64, v1: f64, d1: f64, v2: f64, d2: f64) -> f64 {
    let span = t2 - t1;
    let s = (t - t1) / span;
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    h00 * v1 + h10 * span * d1 + h01 * v2 + h11 * span * d2
}

/// Bar edges for the normalized/log10 mappings: `bar_count + 1` frequencies,
/// eased along the log axis between `freq_min` and `freq_max`.
pub fn bar_edges(bar_count: usize, freq_min: f64, freq_max: f64) -> Vec<f64> {
    let log_min = freq_min.log10();
    let log_max = freq_max.log10();
    (0..=bar_count)
        .map(|r| {
            let t = r as f64 / bar_count as f64;
            10f64.powf(log_min + tri_ease(t) * (log_max - log_min))
        })
        .collect()
}

pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Filter-bank edges for the mel mapping: `bar_count + 2` frequencies evenly
/// spaced on the mel scale between `freq_min` and `freq_max`. The triangle
/// for bar `r` spans `edges[r]..edges[r + 2]` and peaks at `edges[r + 1]`.
pub fn mel_edges(bar_count: usize, freq_min: f64, freq_max: f64) -> Vec<f64> {
    let mel_min = hz_to_mel(freq_min);
    let mel_max = hz_to_mel(freq_max);
    let step = (mel_max - mel_min) / (bar_count + 1) as f64;
    (0..bar_count + 2)
        .map(|i| mel_to_hz(mel_min + step * i as f64))
        .collect()
}
