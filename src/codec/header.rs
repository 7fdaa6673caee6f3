use serde::Deserialize;

use crate::error::{FvzError, Result};

/// First 8 bytes of every `.fvz` file; only the first 6 are significant.
pub const MAGIC: &[u8; 8] = b"FFTVIS\0\0";
pub const FORMAT_VERSION: i32 = 2;
/// Fixed header length; the payload starts immediately after.
pub const HEADER_SIZE: usize = 36;

const FLAG_ZSTD: u16 = 1 << 0;
const FLAG_QUANTIZE: u16 = 1 << 1;
const FLAG_DELTA: u16 = 1 << 2;

/// Which transforms of the cascade are active. Stored in the header as a
/// bitmask; the cascade order itself is fixed (quantize, delta, compress).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompressionFlags {
    pub zstd: bool,
    pub quantize: bool,
    pub delta: bool,
}

impl CompressionFlags {
    pub fn bits(self) -> u16 {
        let mut bits = 0;
        if self.zstd {
            bits |= FLAG_ZSTD;
        }
        if self.quantize {
            bits |= FLAG_QUANTIZE;
        }
        if self.delta {
            bits |= FLAG_DELTA;
        }
        bits
    }

    pub fn from_bits(bits: u16) -> Self {
        Self {
            zstd: bits & FLAG_ZSTD != 0,
            quantize: bits & FLAG_QUANTIZE != 0,
            delta: bits & FLAG_DELTA != 0,
        }
    }
}

/// Quantizer width. Only meaningful when the quantize flag is set; the writer
/// stores a zero level byte otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantizeLevel {
    Bit16,
    Bit8,
}

impl QuantizeLevel {
    pub fn level_byte(self) -> u8 {
        match self {
            QuantizeLevel::Bit16 => 0,
            QuantizeLevel::Bit8 => 1,
        }
    }

    pub fn from_level_byte(byte: u8) -> Self {
        if byte == 0 { QuantizeLevel::Bit16 } else { QuantizeLevel::Bit8 }
    }
}

/// The fixed 36-byte little-endian metadata record at the start of a file.
///
/// The byte layout mirrors a platform-padded record from the format's origin:
/// two padding bytes after `compression_type` and three after the level byte.
/// Offsets are written explicitly rather than relying on native struct layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub fft_resolution: u32,
    pub num_bands: u16,
    pub frame_rate: u16,
    pub total_frames: u32,
    /// Maximum smoothed bar value observed while encoding.
    pub max_amplitude: f32,
    pub flags: CompressionFlags,
    pub quantize_level: QuantizeLevel,
}

impl Header {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(MAGIC);
        buf[8..12].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf[12..16].copy_from_slice(&self.fft_resolution.to_le_bytes());
        buf[16..18].copy_from_slice(&self.num_bands.to_le_bytes());
        buf[18..20].copy_from_slice(&self.frame_rate.to_le_bytes());
        buf[20..24].copy_from_slice(&self.total_frames.to_le_bytes());
        buf[24..28].copy_from_slice(&self.max_amplitude.to_le_bytes());
        buf[28..30].copy_from_slice(&self.flags.bits().to_le_bytes());
        // Bytes 30..32 stay zero (record padding).
        buf[32] = if self.flags.quantize { self.quantize_level.level_byte() } else { 0 };
        // Bytes 33..36 stay zero.
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(FvzError::UnsupportedFormat(format!(
                "file too short for header: {} bytes",
                data.len()
            )));
        }
        if &data[0..6] != b"FFTVIS" {
            return Err(FvzError::UnsupportedFormat("magic mismatch".into()));
        }
        let version = i32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        if version != FORMAT_VERSION {
            return Err(FvzError::UnsupportedFormat(format!(
                "unsupported version {version} (expected {FORMAT_VERSION})"
            )));
        }

        Ok(Self {
            fft_resolution: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            num_bands: u16::from_le_bytes([data[16], data[17]]),
            frame_rate: u16::from_le_bytes([data[18], data[19]]),
            total_frames: u32::from_le_bytes([data[20], data[21], data[22], data[23]]),
            max_amplitude: f32::from_le_bytes([data[24], data[25], data[26], data[27]]),
            flags: CompressionFlags::from_bits(u16::from_le_bytes([data[28], data[29]])),
            quantize_level: QuantizeLevel::from_level_byte(data[32]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            fft_resolution: 4096,
            num_bands: 96,
            frame_rate: 60,
            total_frames: 1234,
            max_amplitude: 0.875,
            flags: CompressionFlags { zstd: true, quantize: true, delta: false },
            quantize_level: QuantizeLevel::Bit8,
        }
    }

    #[test]
    fn round_trips() {
        let header = sample_header();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        let decoded = Header::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn writes_exact_offsets() {
        let bytes = sample_header().to_bytes();
        assert_eq!(&bytes[0..8], b"FFTVIS\0\0");
        assert_eq!(i32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]), 2);
        assert_eq!(u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]), 4096);
        assert_eq!(u16::from_le_bytes([bytes[16], bytes[17]]), 96);
        assert_eq!(u16::from_le_bytes([bytes[18], bytes[19]]), 60);
        assert_eq!(u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]), 1234);
        assert_eq!(
            f32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
            0.875
        );
        // zstd | quantize = 0b011
        assert_eq!(u16::from_le_bytes([bytes[28], bytes[29]]), 0b011);
        assert_eq!(&bytes[30..32], &[0, 0]);
        assert_eq!(bytes[32], 1);
        assert_eq!(&bytes[33..36], &[0, 0, 0]);
    }

    #[test]
    fn quantize_level_zeroed_when_flag_clear() {
        let header = Header {
            flags: CompressionFlags::default(),
            quantize_level: QuantizeLevel::Bit8,
            ..sample_header()
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes[32], 0);
        assert_eq!(Header::from_bytes(&bytes).unwrap().quantize_level, QuantizeLevel::Bit16);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample_header().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            Header::from_bytes(&bytes),
            Err(FvzError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn rejects_version_one() {
        let mut bytes = sample_header().to_bytes();
        bytes[8..12].copy_from_slice(&1i32.to_le_bytes());
        assert!(matches!(
            Header::from_bytes(&bytes),
            Err(FvzError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn rejects_short_input() {
        let bytes = sample_header().to_bytes();
        assert!(matches!(
            Header::from_bytes(&bytes[..20]),
            Err(FvzError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn padding_is_ignored_on_read() {
        let mut bytes = sample_header().to_bytes();
        bytes[30] = 0xAB;
        bytes[31] = 0xCD;
        bytes[33] = 0xEF;
        let decoded = Header::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, sample_header());
    }

    #[test]
    fn flag_bits_round_trip() {
        for bits in 0..8u16 {
            assert_eq!(CompressionFlags::from_bits(bits).bits(), bits);
        }
    }
}
