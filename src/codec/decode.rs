use std::path::Path;

use crate::codec::compress::Decompress;
use crate::codec::header::{Header, HEADER_SIZE};
use crate::codec::transform;
use crate::codec::Visualization;
use crate::error::{FvzError, Result};

/// Reads a `.fvz` byte stream and materializes every frame.
///
/// The decompressor capability is required exactly when the header's Zstd bit
/// is set. Decoding is a single sequential pass per transform; it either
/// returns the complete frame set or an error, never a partial one.
pub fn read_file(data: &[u8], decompressor: Option<&dyn Decompress>) -> Result<Visualization> {
    let header = Header::from_bytes(data)?;
    let body = &data[HEADER_SIZE..];
    let expected = transform::expected_payload_len(&header);

    let payload: Vec<u8> = if header.flags.zstd {
        let compressed = read_length_prefixed(body)?;
        let decompressor = decompressor.ok_or(FvzError::MissingDecompressor)?;
        decompressor
            .decompress(compressed)
            .map_err(FvzError::DecompressionFailed)?
    } else {
        if body.len() < expected {
            return Err(FvzError::TruncatedPayload { expected, actual: body.len() });
        }
        body[..expected].to_vec()
    };

    let frames = transform::decode_payload(&payload, &header)?;

    log::debug!(
        "Decoded {} frames of {} bands (flags {:#05b})",
        frames.len(),
        header.num_bands,
        header.flags.bits()
    );

    Ok(Visualization { header, frames })
}

/// Convenience wrapper over [`read_file`] for on-disk containers.
pub fn read_path(path: &Path, decompressor: Option<&dyn Decompress>) -> Result<Visualization> {
    let data = std::fs::read(path)?;
    read_file(&data, decompressor)
}

/// The Zstd framing: a 4-byte little-endian signed count, then that many
/// compressed bytes.
fn read_length_prefixed(body: &[u8]) -> Result<&[u8]> {
    if body.len() < 4 {
        return Err(FvzError::TruncatedPayload { expected: 4, actual: body.len() });
    }
    let declared = i32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    if declared < 0 {
        return Err(FvzError::UnsupportedFormat(format!(
            "negative compressed length {declared}"
        )));
    }
    let declared = declared as usize;
    let available = body.len() - 4;
    if available < declared {
        return Err(FvzError::TruncatedPayload { expected: declared, actual: available });
    }
    Ok(&body[4..4 + declared])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::compress::ZstdCodec;
    use crate::codec::encode::write_container;
    use crate::codec::header::{CompressionFlags, QuantizeLevel};

    fn header(flags: CompressionFlags, total_frames: u32, num_bands: u16) -> Header {
        Header {
            fft_resolution: 1024,
            num_bands,
            frame_rate: 30,
            total_frames,
            max_amplitude: 1.0,
            flags,
            quantize_level: QuantizeLevel::Bit16,
        }
    }

    #[test]
    fn zstd_requires_capability() {
        let flags = CompressionFlags { zstd: true, quantize: false, delta: false };
        let frames = vec![vec![0.5, 0.5]; 3];
        let bytes = write_container(&header(flags, 3, 2), &frames).unwrap();

        assert!(matches!(read_file(&bytes, None), Err(FvzError::MissingDecompressor)));
        assert!(read_file(&bytes, Some(&ZstdCodec)).is_ok());
    }

    #[test]
    fn capability_absent_is_fine_without_zstd() {
        let frames = vec![vec![0.25, 0.75]; 2];
        let bytes = write_container(&header(CompressionFlags::default(), 2, 2), &frames).unwrap();
        let decoded = read_file(&bytes, None).unwrap();
        assert_eq!(decoded.frames, frames);
    }

    #[test]
    fn decompressor_failure_is_wrapped() {
        let flags = CompressionFlags { zstd: true, quantize: false, delta: false };
        let frames = vec![vec![0.5]; 1];
        let bytes = write_container(&header(flags, 1, 1), &frames).unwrap();

        let failing = |_: &[u8]| -> std::result::Result<
            Vec<u8>,
            Box<dyn std::error::Error + Send + Sync>,
        > {
            Err("backend unavailable".into())
        };
        assert!(matches!(
            read_file(&bytes, Some(&failing)),
            Err(FvzError::DecompressionFailed(_))
        ));
    }

    #[test]
    fn truncated_compressed_stream_is_rejected() {
        let flags = CompressionFlags { zstd: true, quantize: false, delta: false };
        let frames = vec![vec![0.5, 0.5]; 4];
        let bytes = write_container(&header(flags, 4, 2), &frames).unwrap();

        let err = read_file(&bytes[..bytes.len() - 3], Some(&ZstdCodec)).unwrap_err();
        assert!(matches!(err, FvzError::TruncatedPayload { .. }));
    }

    #[test]
    fn truncated_raw_payload_is_rejected() {
        let frames = vec![vec![0.5, 0.5]; 4];
        let bytes = write_container(&header(CompressionFlags::default(), 4, 2), &frames).unwrap();
        let err = read_file(&bytes[..bytes.len() - 1], None).unwrap_err();
        assert!(matches!(err, FvzError::TruncatedPayload { .. }));
    }

    #[test]
    fn wrong_decompressed_length_is_rejected() {
        let flags = CompressionFlags { zstd: true, quantize: false, delta: false };
        let frames = vec![vec![0.5, 0.5]; 4];
        let bytes = write_container(&header(flags, 4, 2), &frames).unwrap();

        // A "decompressor" that returns half the real payload.
        let short = |c: &[u8]| -> std::result::Result<
            Vec<u8>,
            Box<dyn std::error::Error + Send + Sync>,
        > {
            let full = ZstdCodec.decompress(c)?;
            Ok(full[..full.len() / 2].to_vec())
        };
        let err = read_file(&bytes, Some(&short)).unwrap_err();
        assert!(matches!(err, FvzError::TruncatedPayload { .. }));
    }

    #[test]
    fn negative_compressed_length_is_rejected() {
        let flags = CompressionFlags { zstd: true, quantize: false, delta: false };
        let mut bytes = header(flags, 1, 1).to_bytes().to_vec();
        bytes.extend_from_slice(&(-5i32).to_le_bytes());
        assert!(matches!(
            read_file(&bytes, Some(&ZstdCodec)),
            Err(FvzError::UnsupportedFormat(_))
        ));
    }
}
