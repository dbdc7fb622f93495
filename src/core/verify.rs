//! Verification of a captured photo against a voter's reference photo.
//!
//! Every path through [`Verifier::verify`] ends in a [`VerificationResult`];
//! storage and comparator failures become outcomes instead of errors. The
//! only write is the conditional `has_voted` update after a match, and the
//! probe capture is gone by the time `verify` returns.

use crate::common::{VoteError, Result};
use crate::core::comparator::BiometricComparator;
use crate::storage::{CaptureArea, VoterRecord, VoterStore};
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub const MSG_MATCHED: &str = "Face matched. Vote recorded.";
pub const MSG_NO_MATCH: &str = "Face did not match.";
pub const MSG_NO_REFERENCE_FACE: &str = "No face in registered photo.";
pub const MSG_NO_PROBE_FACE: &str = "No face detected in captured photo.";
pub const MSG_INVALID_INPUT: &str = "Missing voter ID or photo.";
pub const MSG_NOT_FOUND: &str = "Voter ID not found.";
pub const MSG_REFERENCE_MISSING: &str = "Stored photo not found.";
pub const MSG_CAPTURE_FAILED: &str = "Could not save photo.";
pub const MSG_LOOKUP_FAILED: &str = "Could not look up voter ID.";
pub const MSG_REFERENCE_UNREADABLE: &str = "Could not read stored photo.";
pub const MSG_RECORD_FAILED: &str = "Could not record vote.";
pub const MSG_COMPARISON_ERROR: &str = "Face verification error.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Matched,
    NoMatch,
    NoReferenceFace,
    NoProbeFace,
    InvalidInput,
    NotFound,
    /// The voter's reference photo is gone from the photo root.
    ReferencePhotoMissing,
    StorageFault,
    ComparisonError,
}

impl Outcome {
    pub fn is_match(self) -> bool {
        self == Outcome::Matched
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub outcome: Outcome,
    pub matched: bool,
    pub message: String,
    /// True only for the attempt whose commit flipped `has_voted`.
    pub vote_recorded: bool,
}

impl VerificationResult {
    fn new(outcome: Outcome, message: &str) -> Self {
        Self {
            outcome,
            matched: outcome.is_match(),
            message: message.to_string(),
            vote_recorded: false,
        }
    }
}

pub struct Verifier {
    store: VoterStore,
    captures: CaptureArea,
    comparator: Arc<dyn BiometricComparator>,
    tolerance: f32,
}

impl Verifier {
    pub fn new(
        store: VoterStore,
        captures: CaptureArea,
        comparator: Arc<dyn BiometricComparator>,
        tolerance: f32,
    ) -> Self {
        Self { store, captures, comparator, tolerance }
    }

    pub fn store(&self) -> &VoterStore {
        &self.store
    }

    /// Blocking: does file I/O, database access and model inference.
    pub fn verify(&self, voter_id: &str, probe_photo: &[u8]) -> VerificationResult {
        let voter_id = voter_id.trim();
        if voter_id.is_empty() || probe_photo.is_empty() {
            return VerificationResult::new(Outcome::InvalidInput, MSG_INVALID_INPUT);
        }

        let result = self.captures.with_capture(voter_id, probe_photo, |probe_path| {
            self.verify_capture(voter_id, probe_path)
        });

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Error saving photo for {}: {}", voter_id, e);
                VerificationResult::new(Outcome::StorageFault, MSG_CAPTURE_FAILED)
            }
        };

        tracing::info!(
            "Verification for {}: {:?} (recorded: {})",
            voter_id, result.outcome, result.vote_recorded
        );
        result
    }

    fn verify_capture(&self, voter_id: &str, probe_path: &Path) -> VerificationResult {
        let voter = match self.store.get(voter_id) {
            Ok(Some(voter)) => voter,
            Ok(None) => return VerificationResult::new(Outcome::NotFound, MSG_NOT_FOUND),
            Err(e) => {
                tracing::error!("Voter lookup failed for {}: {}", voter_id, e);
                return VerificationResult::new(Outcome::StorageFault, MSG_LOOKUP_FAILED);
            }
        };

        let reference = match self.store.load_reference_photo(&voter) {
            Ok(bytes) => bytes,
            Err(VoteError::ReferencePhotoMissing(path)) => {
                tracing::error!("Stored photo for {} missing at {}", voter_id, path.display());
                return VerificationResult::new(Outcome::ReferencePhotoMissing, MSG_REFERENCE_MISSING);
            }
            Err(e) => {
                tracing::error!("Could not read stored photo for {}: {}", voter_id, e);
                return VerificationResult::new(Outcome::StorageFault, MSG_REFERENCE_UNREADABLE);
            }
        };

        let probe = match fs::read(probe_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Could not read capture for {}: {}", voter_id, e);
                return VerificationResult::new(Outcome::StorageFault, MSG_CAPTURE_FAILED);
            }
        };

        match self.compare(&reference, &probe) {
            Ok(Outcome::Matched) => self.commit(&voter),
            Ok(Outcome::NoMatch) => VerificationResult::new(Outcome::NoMatch, MSG_NO_MATCH),
            Ok(Outcome::NoReferenceFace) => {
                tracing::warn!("No face found in registered photo for {}", voter_id);
                VerificationResult::new(Outcome::NoReferenceFace, MSG_NO_REFERENCE_FACE)
            }
            Ok(Outcome::NoProbeFace) => {
                VerificationResult::new(Outcome::NoProbeFace, MSG_NO_PROBE_FACE)
            }
            Ok(other) => {
                tracing::error!("Unexpected comparison outcome {:?} for {}", other, voter_id);
                VerificationResult::new(Outcome::ComparisonError, MSG_COMPARISON_ERROR)
            }
            Err(e) => {
                tracing::error!("Face match error for {}: {}", voter_id, e);
                VerificationResult::new(Outcome::ComparisonError, MSG_COMPARISON_ERROR)
            }
        }
    }

    /// Only the first encoding of each image is used; detectors list the most
    /// confident face first.
    fn compare(&self, reference: &[u8], probe: &[u8]) -> Result<Outcome> {
        let Some(known) = self.comparator.encode(reference)?.into_iter().next() else {
            return Ok(Outcome::NoReferenceFace);
        };
        let Some(candidate) = self.comparator.encode(probe)?.into_iter().next() else {
            return Ok(Outcome::NoProbeFace);
        };

        if self.comparator.compare(&known, &candidate, self.tolerance)? {
            Ok(Outcome::Matched)
        } else {
            Ok(Outcome::NoMatch)
        }
    }

    /// A match whose commit finds the voter already marked is still reported
    /// as a match: another attempt for the same voter got there first.
    fn commit(&self, voter: &VoterRecord) -> VerificationResult {
        match self.store.try_set_voted(&voter.voter_id) {
            Ok(recorded) => {
                if recorded {
                    tracing::info!("Vote recorded for {}", voter.voter_id);
                } else {
                    tracing::warn!("{} was already marked as voted; not recording again", voter.voter_id);
                }
                let mut result = VerificationResult::new(Outcome::Matched, MSG_MATCHED);
                result.vote_recorded = recorded;
                result
            }
            Err(e) => {
                tracing::error!("Failed to record vote for {}: {}", voter.voter_id, e);
                VerificationResult::new(Outcome::StorageFault, MSG_RECORD_FAILED)
            }
        }
    }
}
