//! Codec for `.fvz` pre-rendered audio spectrogram visualizations.
//!
//! An encode session turns mono PCM into per-frame binned spectra (FFT
//! window, dB normalization, eased log / mel bin mapping, soft-knee gate,
//! smoothing), then serializes the frames through a cascade of optional
//! transforms: quantization, inter-frame deltas, and Zstd compression. The
//! decoder validates the 36-byte header, inverts the cascade in reverse
//! order, and hands back frames addressable by playback time.

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;

pub use codec::{
    read_file, read_path, CompressionFlags, Decompress, Encoder, Header, QuantizeLevel,
    Visualization, ZstdCodec,
};
pub use config::{load_config, BinMapping, EncoderConfig};
pub use error::{FvzError, Result};
