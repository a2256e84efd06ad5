//! Wire encoding of embedding vectors.
//!
//! An encoded vector is the base64 (standard alphabet) of:
//!
//! ```text
//! [width: u8 = 4 | 8][count: u32 LE][count little-endian f32 or f64]
//! ```
//!
//! Headerless buffers of exactly 512 `f32` (2048 bytes) or 512 `f64`
//! (4096 bytes) are also accepted on decode. A headered buffer is always
//! `5 + count * width` bytes long, which is odd and can never collide with
//! those two lengths.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use biogate_core::constants::EMBEDDING_DIMENSION;
use biogate_core::{Error, FaceEmbedding, Result};

const HEADER_LEN: usize = 5;
const F32_WIDTH: u8 = 4;
const F64_WIDTH: u8 = 8;

/// Encode `values` as headered little-endian `f32`.
#[must_use]
pub fn encode_vector(values: &[f32]) -> String {
    let mut buf = Vec::with_capacity(HEADER_LEN + values.len() * 4);
    buf.push(F32_WIDTH);
    buf.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for value in values {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    STANDARD.encode(buf)
}

#[must_use]
pub fn encode_embedding(embedding: &FaceEmbedding) -> String {
    encode_vector(embedding.as_slice())
}

/// Decode a vector of any length. `f64` payloads are narrowed to `f32`.
///
/// # Errors
/// Returns `InvalidEncoding` for bad base64, unknown widths or a byte count
/// that disagrees with the header.
pub fn decode_vector(encoded: &str) -> Result<Vec<f32>> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::InvalidEncoding(format!("base64: {e}")))?;

    if bytes.len() == EMBEDDING_DIMENSION * 4 {
        return Ok(read_floats(&bytes, F32_WIDTH));
    }
    if bytes.len() == EMBEDDING_DIMENSION * 8 {
        return Ok(read_floats(&bytes, F64_WIDTH));
    }

    let Some((&width, rest)) = bytes.split_first() else {
        return Err(Error::InvalidEncoding("empty buffer".to_string()));
    };
    if width != F32_WIDTH && width != F64_WIDTH {
        return Err(Error::InvalidEncoding(format!(
            "unsupported element width {width}"
        )));
    }
    let (count, body) = rest
        .split_first_chunk::<4>()
        .ok_or_else(|| Error::InvalidEncoding("truncated header".to_string()))?;
    let count = u32::from_le_bytes(*count) as usize;
    let expected = count.checked_mul(width as usize);
    if expected != Some(body.len()) {
        return Err(Error::InvalidEncoding(format!(
            "header announces {count} x {width} bytes, buffer holds {}",
            body.len()
        )));
    }
    Ok(read_floats(body, width))
}

/// Decode a reference embedding.
///
/// # Errors
/// Returns `InvalidEncoding` as [`decode_vector`] does, and `ShapeMismatch`
/// when the vector is not 512 long.
pub fn decode_embedding(encoded: &str) -> Result<FaceEmbedding> {
    let values = decode_vector(encoded)?;
    if values.len() != EMBEDDING_DIMENSION {
        return Err(Error::ShapeMismatch {
            left: EMBEDDING_DIMENSION,
            right: values.len(),
        });
    }
    FaceEmbedding::new(values)
}

fn read_floats(bytes: &[u8], width: u8) -> Vec<f32> {
    if width == F64_WIDTH {
        bytes
            .chunks_exact(8)
            .filter_map(|c| <[u8; 8]>::try_from(c).ok())
            .map(|c| f64::from_le_bytes(c) as f32)
            .collect()
    } else {
        bytes
            .chunks_exact(4)
            .filter_map(|c| <[u8; 4]>::try_from(c).ok())
            .map(f32::from_le_bytes)
            .collect()
    }
}
