use std::sync::Arc;

use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::mapping;
use crate::config::{BinMapping, EncoderConfig};

/// Converts one FFT window of samples into a frame of `bar_count` amplitudes
/// in [0, 1]. Stateless per call; a single builder is shared across workers.
pub struct FrameBuilder {
    bar_count: usize,
    db_floor: f64,
    db_range: f64,
    smoothness: usize,
    mapping: BinMapping,
    fft_resolution: usize,
    bin_hz: f64,
    freq_min: f64,
    freq_max: f64,
    /// `bar_count + 1` entries for normalized/log10, `bar_count + 2` for mel.
    edges: Vec<f64>,
    hann: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl FrameBuilder {
    pub fn new(config: &EncoderConfig, sample_rate: u32) -> Self {
        let fft_resolution = config.fft_resolution as usize;
        let bar_count = config.bar_count as usize;
        let nyquist = sample_rate as f64 / 2.0;
        let freq_min = config.freq_min;
        let freq_max = if config.freq_max < 0.0 { nyquist } else { config.freq_max };

        let edges = match config.mapping {
            BinMapping::Normalized | BinMapping::Log10 => {
                mapping::bar_edges(bar_count, freq_min, freq_max)
            }
            BinMapping::Mel => mapping::mel_edges(bar_count, freq_min, freq_max),
        };

        let mut planner = FftPlanner::<f64>::new();
        Self {
            bar_count,
            db_floor: config.db_floor,
            db_range: config.db_range,
            smoothness: config.smoothness as usize,
            mapping: config.mapping,
            fft_resolution,
            bin_hz: sample_rate as f64 / fft_resolution as f64,
            freq_min,
            freq_max,
            edges,
            hann: hann_window(fft_resolution),
            fft: planner.plan_fft_forward(fft_resolution),
        }
    }

    /// Runs the full per-frame pipeline: sanitize, window, FFT, bin mapping,
    /// dB normalization, soft-knee gate, box smoothing.
    pub fn build_frame(&self, samples: &mut [f64]) -> Vec<f64> {
        debug_assert_eq!(samples.len(), self.fft_resolution);

        // Sanitize: drop non-finite samples, then remove the DC offset.
        for s in samples.iter_mut() {
            if !s.is_finite() {
                *s = 0.0;
            }
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        if mean.is_finite() {
            for s in samples.iter_mut() {
                *s -= mean;
            }
        }

        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .zip(self.hann.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        // Half spectrum including Nyquist; frequencies above freq_max are
        // excluded by the mapping itself.
        let magnitudes: Vec<f64> = buffer[..self.fft_resolution / 2 + 1]
            .iter()
            .map(|c| {
                let m = c.norm();
                if m.is_finite() { m } else { 0.0 }
            })
            .collect();

        let (power, weight) = match self.mapping {
            BinMapping::Normalized | BinMapping::Log10 => self.accumulate_eased(&magnitudes),
            BinMapping::Mel => self.accumulate_mel(&magnitudes),
        };

        let mut frame = vec![0.0f64; self.bar_count];
        for r in 0..self.bar_count {
            if weight[r] > 0.0 {
                let rms = power[r].sqrt();
                let db = 20.0 * (rms + 1e-20).log10();
                frame[r] = ((db - self.db_floor) / self.db_range).clamp(0.0, 1.0);
            }
        }

        // Soft knee suppresses near-silent bars; the mel bank already shapes
        // its output and is left ungated.
        if self.mapping != BinMapping::Mel {
            for v in frame.iter_mut() {
                *v = (1.0 / (1.0 + (-15.0 * (*v - 0.4)).exp())).clamp(0.0, 1.0);
            }
        }

        self.smooth(&frame)
    }

    /// Energy accumulation for the eased log-frequency mappings. Each FFT bin
    /// splits its energy linearly between the two bars whose shared edge it
    /// straddles.
    fn accumulate_eased(&self, magnitudes: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut power = vec![0.0f64; self.bar_count];
        let mut weight = vec![0.0f64; self.bar_count];

        for (b, &magnitude) in magnitudes.iter().enumerate().skip(1) {
            let f = b as f64 * self.bin_hz;
            if f < self.edges[0] || f >= self.edges[self.bar_count] {
                continue;
            }
            let k = self.edges.partition_point(|&e| e <= f) - 1;
            let alpha = (f - self.edges[k]) / (self.edges[k + 1] - self.edges[k]);
            let energy = magnitude * magnitude;
            power[k] += (1.0 - alpha) * energy;
            weight[k] += 1.0 - alpha;
            if k + 1 < self.bar_count {
                power[k + 1] += alpha * energy;
                weight[k + 1] += alpha;
            }
        }

        (power, weight)
    }

    /// Triangular mel filter bank. The weight vector counts contributing bins
    /// rather than accumulating filter gains.
    fn accumulate_mel(&self, magnitudes: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut power = vec![0.0f64; self.bar_count];
        let mut weight = vec![0.0f64; self.bar_count];

        for (b, &magnitude) in magnitudes.iter().enumerate().skip(1) {
            let f = b as f64 * self.bin_hz;
            if f < self.freq_min || f >= self.freq_max {
                continue;
            }
            // Largest k with edges[k] <= f; the triangle peaking at edges[k]
            // covers bar k - 1.
            let k = self.edges.partition_point(|&e| e <= f) - 1;
            if k < 1 || k > self.bar_count {
                continue;
            }
            let w = if f < self.edges[k] {
                (f - self.edges[k - 1]) / (self.edges[k] - self.edges[k - 1])
            } else {
                (self.edges[k + 1] - f) / (self.edges[k + 1] - self.edges[k])
            };
            power[k - 1] += magnitude * magnitude * w;
            weight[k - 1] += 1.0;
        }

        (power, weight)
    }

    /// Box average over `r ± smoothness`, ignoring out-of-range neighbors.
    fn smooth(&self, frame: &[f64]) -> Vec<f64> {
        if self.smoothness == 0 {
            return frame.to_vec();
        }
        let mut out = vec![0.0f64; self.bar_count];
        for (r, slot) in out.iter_mut().enumerate() {
            let lo = r.saturating_sub(self.smoothness);
            let hi = (r + self.smoothness).min(self.bar_count - 1);
            *slot = frame[lo..=hi].iter().sum::<f64>() / (hi - lo + 1) as f64;
        }
        out
    }
}

/// Number of frames an encode session produces for the given signal length.
pub fn total_frame_count(num_samples: usize, sample_rate: u32, config: &EncoderConfig) -> usize {
    let hop = sample_rate as f64 / config.frame_rate as f64;
    let raw = (num_samples as f64 - config.fft_resolution as f64) / hop + 1.0;
    raw.max(0.0).ceil() as usize
}

/// Generates all frames for the signal in parallel and returns them with the
/// maximum smoothed amplitude observed, which the header records.
///
/// Each worker writes only its own output slot; the shared maximum is taken
/// by reduction after the join rather than through a racy shared scalar. The
/// progress sink may be invoked concurrently from worker threads.
pub fn generate_frames(
    samples: &[f32],
    sample_rate: u32,
    config: &EncoderConfig,
    progress: Option<&(dyn Fn(usize, usize) + Sync)>,
) -> (Vec<Vec<f64>>, f32) {
    if config.mapping == BinMapping::Log10 {
        log::warn!(
            "log10 mapping uses the same eased band table as normalized; output is identical"
        );
    }

    let fft_resolution = config.fft_resolution as usize;
    let hop = sample_rate as f64 / config.frame_rate as f64;
    let total = total_frame_count(samples.len(), sample_rate, config);
    let builder = FrameBuilder::new(config, sample_rate);

    let frames: Vec<Vec<f64>> = (0..total)
        .into_par_iter()
        .map(|i| {
            let start = (i as f64 * hop).round() as usize;
            let mut window = vec![0.0f64; fft_resolution];
            if start < samples.len() {
                let end = (start + fft_resolution).min(samples.len());
                for (w, &s) in window.iter_mut().zip(&samples[start..end]) {
                    *w = s as f64;
                }
            }
            let frame = builder.build_frame(&mut window);
            if let Some(report) = progress {
                report(i, total);
            }
            frame
        })
        .collect();

    let max_amplitude = frames
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .fold(0.0f64, f64::max) as f32;

    (frames, max_amplitude)
}

fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn test_config(mapping: BinMapping) -> EncoderConfig {
        EncoderConfig {
            bar_count: 32,
            fft_resolution: 2048,
            frame_rate: 30,
            smoothness: 0,
            mapping,
            ..Default::default()
        }
    }

    fn sine(freq: f64, sample_rate: u32, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    #[test]
    fn silence_yields_gated_floor() {
        let config = test_config(BinMapping::Normalized);
        let builder = FrameBuilder::new(&config, 44100);
        let mut window = vec![0.0f64; 2048];
        let frame = builder.build_frame(&mut window);

        assert_eq!(frame.len(), 32);
        // The sigmoid gate maps a zero dB-norm to ~0.0025, not exactly zero.
        for &v in &frame {
            assert!(v < 0.01, "silent bar unexpectedly loud: {v}");
        }
    }

    #[test]
    fn mel_silence_is_exactly_zero() {
        let config = test_config(BinMapping::Mel);
        let builder = FrameBuilder::new(&config, 44100);
        let mut window = vec![0.0f64; 2048];
        let frame = builder.build_frame(&mut window);

        // Mel skips the sigmoid gate, so silence clamps to exactly zero.
        assert!(frame.iter().all(|&v| v == 0.0), "mel silence not zero: {frame:?}");
    }

    #[test]
    fn non_finite_samples_are_dropped() {
        let config = test_config(BinMapping::Normalized);
        let builder = FrameBuilder::new(&config, 44100);
        let mut clean = vec![0.0f64; 2048];
        let mut dirty = vec![0.0f64; 2048];
        dirty[0] = f64::NAN;
        dirty[1] = f64::INFINITY;
        dirty[2] = f64::NEG_INFINITY;

        let a = builder.build_frame(&mut clean);
        let b = builder.build_frame(&mut dirty);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!(x.is_finite() && y.is_finite());
        }
    }

    #[test]
    fn dc_offset_is_removed() {
        let config = test_config(BinMapping::Normalized);
        let builder = FrameBuilder::new(&config, 44100);
        let mut centered = sine(440.0, 44100, 2048);
        let mut offset: Vec<f64> = centered.iter().map(|s| s + 0.75).collect();

        let a = builder.build_frame(&mut centered);
        let b = builder.build_frame(&mut offset);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "DC offset leaked: {x} vs {y}");
        }
    }

    #[test]
    fn pure_tone_peaks_in_matching_bar() {
        let sample_rate = 44100;
        let config = test_config(BinMapping::Normalized);
        let builder = FrameBuilder::new(&config, sample_rate);
        // Quiet enough that the peak bar stays below the 0..1 clamp, so the
        // argmax is unambiguous.
        let mut window: Vec<f64> =
            sine(1000.0, sample_rate, 2048).iter().map(|s| s * 1e-3).collect();
        let frame = builder.build_frame(&mut window);

        let peak_bar = frame
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(i, _)| i)
            .unwrap();

        // 1 kHz must land in the bar whose edge interval contains it.
        let edges = mapping::bar_edges(32, 20.0, sample_rate as f64 / 2.0);
        let expected = edges.partition_point(|&e| e <= 1000.0) - 1;
        assert!(
            (peak_bar as i64 - expected as i64).abs() <= 1,
            "1 kHz peaked in bar {peak_bar}, expected near {expected}"
        );
    }

    #[test]
    fn all_outputs_clamped_to_unit_range() {
        let sample_rate = 44100;
        for mapping in [BinMapping::Normalized, BinMapping::Log10, BinMapping::Mel] {
            let config = test_config(mapping);
            let builder = FrameBuilder::new(&config, sample_rate);
            // Loud broadband content.
            let tone = sine(220.0, sample_rate, 2048);
            let mut window: Vec<f64> = tone
                .iter()
                .enumerate()
                .map(|(i, s)| s * 10.0 + (i % 7) as f64)
                .collect();
            let frame = builder.build_frame(&mut window);
            for &v in &frame {
                assert!((0.0..=1.0).contains(&v), "bar out of range: {v}");
            }
        }
    }

    #[test]
    fn smoothing_averages_neighbors() {
        let config = EncoderConfig { smoothness: 1, ..test_config(BinMapping::Normalized) };
        let builder = FrameBuilder::new(&config, 44100);
        let spiky = {
            let mut f = vec![0.0f64; 32];
            f[10] = 0.9;
            f
        };
        let out = builder.smooth(&spiky);
        assert!((out[9] - 0.3).abs() < 1e-12);
        assert!((out[10] - 0.3).abs() < 1e-12);
        assert!((out[11] - 0.3).abs() < 1e-12);
        // Edge bars average over a shorter window.
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn frame_count_matches_hop_arithmetic() {
        let config = EncoderConfig {
            fft_resolution: 1024,
            frame_rate: 50,
            ..Default::default()
        };
        // hop = 44100 / 50 = 882; (44100 - 1024) / 882 + 1 = 49.84...
        assert_eq!(total_frame_count(44100, 44100, &config), 50);
        assert_eq!(total_frame_count(0, 44100, &config), 0);
        assert_eq!(total_frame_count(1024, 44100, &config), 1);
    }

    #[test]
    fn generate_frames_reports_progress_and_max() {
        let config = EncoderConfig {
            bar_count: 16,
            fft_resolution: 1024,
            frame_rate: 20,
            ..Default::default()
        };
        let samples: Vec<f32> = (0..22050)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 22050.0).sin())
            .collect();

        let counter = std::sync::atomic::AtomicUsize::new(0);
        let progress = |_i: usize, _total: usize| {
            counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        };
        let (frames, max_amplitude) =
            generate_frames(&samples, 22050, &config, Some(&progress));

        let expected = total_frame_count(samples.len(), 22050, &config);
        assert_eq!(frames.len(), expected);
        assert_eq!(counter.load(std::sync::atomic::Ordering::Relaxed), expected);
        assert!(frames.iter().all(|f| f.len() == 16));

        let observed = frames
            .iter()
            .flat_map(|f| f.iter().copied())
            .fold(0.0f64, f64::max) as f32;
        assert_eq!(max_amplitude, observed);
        assert!(max_amplitude > 0.0);
    }
}
