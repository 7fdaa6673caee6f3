//! The lossy half of the cascade: quantization and inter-frame deltas.
//!
//! Forward order is fixed — quantize, then delta — and the inverse runs in
//! reverse. Zstd framing sits outside this module. The delta paths use
//! wrapping two's-complement arithmetic: a difference of two in-range
//! quantized values can exceed the storage width, but re-accumulating with
//! the same wrap recovers the original exactly.

use crate::codec::header::{Header, QuantizeLevel};
use crate::error::{FvzError, Result};

/// Payload bytes (pre-compression) for the given frames and cascade settings.
pub fn encode_payload(
    frames: &[Vec<f64>],
    quantize: bool,
    delta: bool,
    level: QuantizeLevel,
) -> Vec<u8> {
    match (delta, quantize) {
        (false, false) => frames
            .iter()
            .flat_map(|frame| frame.iter())
            .flat_map(|v| v.to_le_bytes())
            .collect(),
        (false, true) => match level {
            QuantizeLevel::Bit16 => frames
                .iter()
                .flat_map(|frame| frame.iter())
                .flat_map(|&v| quantize_u16(v).to_le_bytes())
                .collect(),
            QuantizeLevel::Bit8 => frames
                .iter()
                .flat_map(|frame| frame.iter())
                .map(|&v| quantize_u8(v))
                .collect(),
        },
        (true, true) => match level {
            QuantizeLevel::Bit16 => delta_encode_i16(frames),
            QuantizeLevel::Bit8 => delta_encode_i8(frames),
        },
        (true, false) => delta_encode_f64(frames),
    }
}

/// Inverts the quantize/delta cascade. The payload length must match the
/// header geometry exactly.
pub fn decode_payload(payload: &[u8], header: &Header) -> Result<Vec<Vec<f64>>> {
    let expected = expected_payload_len(header);
    if payload.len() != expected {
        return Err(FvzError::TruncatedPayload { expected, actual: payload.len() });
    }

    let bands = header.num_bands as usize;
    let total = header.total_frames as usize;
    let quantize = header.flags.quantize;
    let delta = header.flags.delta;

    let frames = match (delta, quantize) {
        (false, false) => chunk_frames(read_f64(payload), bands),
        (false, true) => match header.quantize_level {
            QuantizeLevel::Bit16 => chunk_frames(
                payload
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]) as f64 / 65535.0)
                    .collect(),
                bands,
            ),
            QuantizeLevel::Bit8 => {
                chunk_frames(payload.iter().map(|&b| b as f64 / 255.0).collect(), bands)
            }
        },
        (true, true) => match header.quantize_level {
            QuantizeLevel::Bit16 => delta_decode_i16(payload, total, bands),
            QuantizeLevel::Bit8 => delta_decode_i8(payload, total, bands),
        },
        (true, false) => delta_decode_f64(payload, total, bands),
    };

    Ok(frames)
}

/// Byte length the quantize/delta settings imply for the frame geometry.
pub fn expected_payload_len(header: &Header) -> usize {
    let values = header.total_frames as usize * header.num_bands as usize;
    values * bytes_per_value(header)
}

fn bytes_per_value(header: &Header) -> usize {
    if header.flags.quantize {
        match header.quantize_level {
            QuantizeLevel::Bit16 => 2,
            QuantizeLevel::Bit8 => 1,
        }
    } else {
        8
    }
}

fn quantize_u16(v: f64) -> u16 {
    (v * 65535.0).round().clamp(0.0, 65535.0) as u16
}

fn quantize_u8(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Signed quantizer for the delta paths: [0, 1] maps onto a symmetric
/// integer range so differences center on zero.
fn quantize_i16(v: f64) -> i16 {
    ((v * 2.0 - 1.0) * 32767.0).round().clamp(-32767.0, 32767.0) as i16
}

fn quantize_i8(v: f64) -> i8 {
    ((v * 2.0 - 1.0) * 127.0).round().clamp(-127.0, 127.0) as i8
}

fn delta_encode_i16(frames: &[Vec<f64>]) -> Vec<u8> {
    let bands = frames.first().map_or(0, Vec::len);
    let mut previous = vec![0i16; bands];
    let mut out = Vec::with_capacity(frames.len() * bands * 2);
    for frame in frames {
        for (j, &v) in frame.iter().enumerate() {
            let q = quantize_i16(v);
            out.extend_from_slice(&q.wrapping_sub(previous[j]).to_le_bytes());
            previous[j] = q;
        }
    }
    out
}

fn delta_encode_i8(frames: &[Vec<f64>]) -> Vec<u8> {
    let bands = frames.first().map_or(0, Vec::len);
    let mut previous = vec![0i8; bands];
    let mut out = Vec::with_capacity(frames.len() * bands);
    for frame in frames {
        for (j, &v) in frame.iter().enumerate() {
            let q = quantize_i8(v);
            out.push(q.wrapping_sub(previous[j]) as u8);
            previous[j] = q;
        }
    }
    out
}

fn delta_encode_f64(frames: &[Vec<f64>]) -> Vec<u8> {
    let bands = frames.first().map_or(0, Vec::len);
    let mut previous = vec![0.0f64; bands];
    let mut out = Vec::with_capacity(frames.len() * bands * 8);
    for frame in frames {
        for (j, &v) in frame.iter().enumerate() {
            out.extend_from_slice(&(v - previous[j]).to_le_bytes());
            previous[j] = v;
        }
    }
    out
}

fn delta_decode_i16(payload: &[u8], total: usize, bands: usize) -> Vec<Vec<f64>> {
    let mut current = vec![0i16; bands];
    let mut deltas = payload.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]]));
    (0..total)
        .map(|_| {
            current
                .iter_mut()
                .map(|slot| {
                    *slot = slot.wrapping_add(deltas.next().unwrap_or(0));
                    (*slot as f64 / 32767.0 + 1.0) / 2.0
                })
                .collect()
        })
        .collect()
}

fn delta_decode_i8(payload: &[u8], total: usize, bands: usize) -> Vec<Vec<f64>> {
    let mut current = vec![0i8; bands];
    let mut deltas = payload.iter().map(|&b| b as i8);
    (0..total)
        .map(|_| {
            current
                .iter_mut()
                .map(|slot| {
                    *slot = slot.wrapping_add(deltas.next().unwrap_or(0));
                    (*slot as f64 / 127.0 + 1.0) / 2.0
                })
                .collect()
        })
        .collect()
}

fn delta_decode_f64(payload: &[u8], total: usize, bands: usize) -> Vec<Vec<f64>> {
    let mut current = vec![0.0f64; bands];
    let mut deltas = read_f64(payload).into_iter();
    (0..total)
        .map(|_| {
            current
                .iter_mut()
                .map(|slot| {
                    *slot += deltas.next().unwrap_or(0.0);
                    *slot
                })
                .collect()
        })
        .collect()
}

fn read_f64(payload: &[u8]) -> Vec<f64> {
    payload
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect()
}

fn chunk_frames(values: Vec<f64>, bands: usize) -> Vec<Vec<f64>> {
    values.chunks_exact(bands).map(|chunk| chunk.to_vec()).collect()
}
