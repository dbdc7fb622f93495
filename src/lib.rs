pub mod common;
pub mod core;
pub mod service;
pub mod storage;

// Re-export commonly used types
pub use common::{Config, DevMode, VoteError, Result};
pub use crate::core::{
    BiometricComparator, OnnxComparator, Encoding, Eligibility, check_eligibility,
    Outcome, VerificationResult, Verifier,
};
pub use service::{AppState, VoteServer};
pub use storage::{CaptureArea, VoterRecord, VoterStore};
