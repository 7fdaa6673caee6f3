//! Audio front half of the encoder: PCM intake and the frame pipeline.

pub mod analysis;
pub mod decode;
pub mod mapping;

pub use analysis::{generate_frames, total_frame_count, FrameBuilder};
pub use decode::{decode_audio, AudioData};
