use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::codec::header::{CompressionFlags, QuantizeLevel};
use crate::error::{FvzError, Result};

/// Frequency-to-bar mapping variant.
///
/// `Normalized` and `Log10` share the same eased log-frequency band table;
/// `Mel` uses a triangular mel-scale filter bank and skips the soft-knee gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinMapping {
    Normalized,
    Log10,
    Mel,
}

impl FromStr for BinMapping {
    type Err = FvzError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normalized" => Ok(BinMapping::Normalized),
            "log10" => Ok(BinMapping::Log10),
            "mel" => Ok(BinMapping::Mel),
            other => Err(FvzError::InvalidConfig(format!(
                "unknown bin mapping '{other}' (expected normalized, log10 or mel)"
            ))),
        }
    }
}

/// Settings fixed for one encode session.
#[derive(Debug, Clone, Deserialize)]
pub struct EncoderConfig {
    /// Bars per output frame.
    #[serde(default = "default_bar_count")]
    pub bar_count: u16,
    /// Silence floor in dB (negative).
    #[serde(default = "default_db_floor")]
    pub db_floor: f64,
    /// Dynamic range above the floor in dB (positive).
    #[serde(default = "default_db_range")]
    pub db_range: f64,
    /// Lowest mapped frequency in Hz.
    #[serde(default = "default_freq_min")]
    pub freq_min: f64,
    /// Highest mapped frequency in Hz; -1 selects the Nyquist frequency.
    #[serde(default = "default_freq_max")]
    pub freq_max: f64,
    /// Half-width of the per-frame box smoothing window, in bars.
    #[serde(default = "default_smoothness")]
    pub smoothness: u32,
    #[serde(default = "default_mapping")]
    pub mapping: BinMapping,
    /// FFT window size in samples; power of two in [1024, 32768].
    #[serde(default = "default_fft_resolution")]
    pub fft_resolution: u32,
    /// Output frames per second.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u16,
    #[serde(default = "default_compression")]
    pub compression: CompressionFlags,
    #[serde(default = "default_quantize_level")]
    pub quantize_level: QuantizeLevel,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            bar_count: default_bar_count(),
            db_floor: default_db_floor(),
            db_range: default_db_range(),
            freq_min: default_freq_min(),
            freq_max: default_freq_max(),
            smoothness: default_smoothness(),
            mapping: default_mapping(),
            fft_resolution: default_fft_resolution(),
            frame_rate: default_frame_rate(),
            compression: default_compression(),
            quantize_level: default_quantize_level(),
        }
    }
}

fn default_bar_count() -> u16 { 64 }
fn default_db_floor() -> f64 { -80.0 }
fn default_db_range() -> f64 { 90.0 }
fn default_freq_min() -> f64 { 20.0 }
fn default_freq_max() -> f64 { -1.0 }
fn default_smoothness() -> u32 { 1 }
fn default_mapping() -> BinMapping { BinMapping::Normalized }
fn default_fft_resolution() -> u32 { 4096 }
fn default_frame_rate() -> u16 { 60 }
fn default_compression() -> CompressionFlags {
    CompressionFlags { zstd: true, quantize: true, delta: true }
}
fn default_quantize_level() -> QuantizeLevel { QuantizeLevel::Bit16 }

impl EncoderConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.fft_resolution.is_power_of_two()
            || !(1024..=32768).contains(&self.fft_resolution)
        {
            return Err(FvzError::InvalidConfig(format!(
                "fft_resolution must be a power of two in [1024, 32768], got {}",
                self.fft_resolution
            )));
        }
        if self.bar_count == 0 {
            return Err(FvzError::InvalidConfig("bar_count must be at least 1".into()));
        }
        if self.frame_rate == 0 {
            return Err(FvzError::InvalidConfig("frame_rate must be at least 1".into()));
        }
        if self.db_range <= 0.0 {
            return Err(FvzError::InvalidConfig(format!(
                "db_range must be positive, got {}",
                self.db_range
            )));
        }
        if self.freq_min <= 0.0 {
            return Err(FvzError::InvalidConfig(format!(
                "freq_min must be positive, got {}",
                self.freq_min
            )));
        }
        if self.freq_max >= 0.0 && self.freq_max <= self.freq_min {
            return Err(FvzError::InvalidConfig(format!(
                "freq_max ({}) must exceed freq_min ({}) or be -1 for Nyquist",
                self.freq_max, self.freq_min
            )));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<EncoderConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: EncoderConfig = toml::from_str(&content)
        .map_err(|e| FvzError::InvalidConfig(format!("{}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}
