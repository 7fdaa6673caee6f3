//! The `.fvz` container: header, transform cascade, compression seam, and
//! the encode/decode pipelines around them.

pub mod compress;
pub mod decode;
pub mod encode;
pub mod header;
pub mod transform;

pub use compress::{Decompress, ZstdCodec};
pub use decode::{read_file, read_path};
pub use encode::{write_container, Encoder};
pub use header::{CompressionFlags, Header, QuantizeLevel};

/// A decoded file: immutable header plus the full materialized frame set.
#[derive(Debug, Clone, PartialEq)]
pub struct Visualization {
    pub header: Header,
    pub frames: Vec<Vec<f64>>,
}

impl Visualization {
    /// Nearest frame to the given playback position, by rounding; the index
    /// clamps into range, so any finite timestamp resolves to a frame.
    /// Returns an owned copy, or `None` when the file holds no frames.
    pub fn frame_at_ms(&self, ms: f64) -> Option<Vec<f64>> {
        if self.frames.is_empty() {
            return None;
        }
        let frame_duration_ms = 1000.0 / self.header.frame_rate as f64;
        let idx = (ms / frame_duration_ms).round() as i64;
        let idx = idx.clamp(0, self.frames.len() as i64 - 1) as usize;
        Some(self.frames[idx].clone())
    }

    /// Playback duration implied by the frame count and rate.
    pub fn duration_ms(&self) -> f64 {
        self.frames.len() as f64 * 1000.0 / self.header.frame_rate as f64
    }
}
