//! Face embedding and verification.

use crate::error::{AuthError, Result};
use biogate_core::constants::EMBEDDING_DIMENSION;
use biogate_core::{Error, FaceEmbedding, MatchThreshold};
use biogate_hardware::{FaceEmbedder, ImageFrame};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Euclidean distance between two vectors, accumulated in `f64`.
///
/// # Errors
/// Returns `ShapeMismatch` when the lengths differ.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> biogate_core::Result<f64> {
    if a.len() != b.len() {
        return Err(Error::ShapeMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum();
    Ok(sum.sqrt())
}

/// Outcome of one comparison. Lower distance is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceVerdict {
    pub matched: bool,
    pub distance: f64,
}

/// Wraps a [`FaceEmbedder`] with the length check and the threshold rule.
#[derive(Debug)]
pub struct FaceMatcher<E: FaceEmbedder> {
    embedder: E,
    threshold: MatchThreshold,
}

impl<E: FaceEmbedder> FaceMatcher<E> {
    pub fn new(embedder: E, threshold: MatchThreshold) -> Self {
        Self {
            embedder,
            threshold,
        }
    }

    pub fn threshold(&self) -> MatchThreshold {
        self.threshold
    }

    /// Embedding of the first detected face.
    ///
    /// # Errors
    /// `NoFaceDetected` for an empty detection list, `InvalidEmbedding` when
    /// the first vector is not exactly 512 long or holds non-finite values,
    /// and embedder failures as reported.
    pub async fn embed(&mut self, frame: &ImageFrame) -> Result<FaceEmbedding> {
        let faces = self.embedder.embeddings(frame).await?;
        let face_count = faces.len();
        let Some(first) = faces.into_iter().next() else {
            return Err(AuthError::NoFaceDetected);
        };
        if first.len() != EMBEDDING_DIMENSION {
            return Err(Error::InvalidEmbedding {
                expected: EMBEDDING_DIMENSION,
                actual: first.len(),
            }
            .into());
        }
        debug!(faces = face_count, "Face embedded");
        Ok(FaceEmbedding::new(first)?)
    }

    /// Compare a candidate against the enrolled reference.
    ///
    /// `matched` holds iff `distance < threshold`.
    pub fn verify(&self, candidate: &FaceEmbedding, reference: &FaceEmbedding) -> Result<FaceVerdict> {
        let distance = euclidean_distance(candidate.as_slice(), reference.as_slice())?;
        let matched = self.threshold.is_match(distance);
        debug!(distance, threshold = self.threshold.value(), matched, "Face verified");
        Ok(FaceVerdict { matched, distance })
    }
}
