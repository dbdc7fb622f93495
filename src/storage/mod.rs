pub mod capture;
pub mod enrollment;
pub mod migrations;
pub mod voter_store;

pub use capture::{Capture, CaptureArea};
pub use enrollment::EnrollmentSummary;
pub use voter_store::{VoterRecord, VoterStore};
