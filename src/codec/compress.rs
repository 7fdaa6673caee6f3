//! Compression seam of the container.
//!
//! The decoder never binds to a specific compressor library: callers inject a
//! [`Decompress`] capability, so the real Zstd implementation, a WASM build,
//! or a test mock all plug in the same way. The encoder writes with
//! [`ZstdCodec`] directly, which is also the capability the CLI injects.

use std::io;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Decompressor capability required when the header's Zstd bit is set.
pub trait Decompress {
    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, BoxedError>;
}

/// Plain closures work as capabilities.
impl<F> Decompress for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, BoxedError>,
{
    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, BoxedError> {
        self(compressed)
    }
}

/// Zstd-backed implementation of both directions.
pub struct ZstdCodec;

impl ZstdCodec {
    /// Compresses at the library's default level.
    pub fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
        zstd::stream::encode_all(data, 0)
    }
}

impl Decompress for ZstdCodec {
    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, BoxedError> {
        zstd::stream::decode_all(compressed).map_err(Into::into)
    }
}
