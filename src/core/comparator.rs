//! The biometric capability the verifier depends on.
//!
//! Verification only needs two things from a face model: turn an image into
//! zero or more encodings, and decide whether two encodings are the same
//! person under a tolerance. [`OnnxComparator`] provides them with the ONNX
//! detector and recognizer; tests substitute their own implementation.

use crate::common::{Config, VoteError, Result};
use crate::core::detector::FaceDetector;
use crate::core::recognizer::{Encoding, FaceRecognizer};

pub trait BiometricComparator: Send + Sync {
    /// One encoding per detected face, in detector order. An image without a
    /// face yields an empty list, not an error.
    fn encode(&self, image: &[u8]) -> Result<Vec<Encoding>>;

    /// True when `candidate` is within `tolerance` of `known`.
    fn compare(&self, known: &[f32], candidate: &[f32], tolerance: f32) -> Result<bool> {
        Ok(face_distance(known, candidate)? <= tolerance)
    }
}

/// Euclidean distance between two encodings.
pub fn face_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.is_empty() || a.len() != b.len() {
        return Err(VoteError::Comparator(format!(
            "Cannot compare encodings of length {} and {}", a.len(), b.len()
        )));
    }

    let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Ok(sum.sqrt())
}

pub struct OnnxComparator {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxComparator {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            detector: FaceDetector::new(config)?,
            recognizer: FaceRecognizer::new(config)?,
        })
    }
}

impl BiometricComparator for OnnxComparator {
    fn encode(&self, image: &[u8]) -> Result<Vec<Encoding>> {
        let image = image::load_from_memory(image)?;
        let faces = self.detector.detect(&image)?;

        faces
            .iter()
            .map(|face| self.recognizer.get_encoding(&image, face))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Never;

    impl BiometricComparator for Never {
        fn encode(&self, _image: &[u8]) -> Result<Vec<Encoding>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn distance_is_euclidean() {
        let d = face_distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!((d - 5.0).abs() < 1e-6);
        assert_eq!(face_distance(&[0.5, 0.5], &[0.5, 0.5]).unwrap(), 0.0);
    }

    #[test]
    fn mismatched_lengths_are_comparator_errors() {
        assert!(matches!(face_distance(&[1.0], &[1.0, 2.0]), Err(VoteError::Comparator(_))));
        assert!(matches!(face_distance(&[], &[]), Err(VoteError::Comparator(_))));
    }

    #[test]
    fn default_compare_uses_inclusive_tolerance() {
        let known = [0.0, 0.0];
        assert!(Never.compare(&known, &[0.5, 0.0], 0.5).unwrap());
        assert!(!Never.compare(&known, &[0.51, 0.0], 0.5).unwrap());
    }
}
