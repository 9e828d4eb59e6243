//! Vector utilities shared by the store implementations.
//!
//! Embedding vectors are persisted as little-endian `f32` BLOBs and compared
//! with cosine similarity. Calling an embedding API lives in the `picc` app
//! crate.

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use picc_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![0.5f32, -1.25];
/// assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
/// ```
pub fn vec_to_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial words are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|word| f32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, sq_a, sq_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(d, sa, sb), (x, y)| {
            (d + x * y, sa + x * x, sb + y * y)
        });

    let magnitude = (sq_a * sq_b).sqrt();
    if magnitude <= f32::EPSILON {
        0.0
    } else {
        dot / magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_direction_is_one() {
        let v = [3.0, 4.0];
        let scaled = [6.0, 8.0];
        assert!((cosine_similarity(&v, &scaled) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_blob_drops_partial_word() {
        let mut blob = vec_to_blob(&[2.5]);
        blob.push(0xff);
        assert_eq!(blob_to_vec(&blob), vec![2.5]);
    }
}
