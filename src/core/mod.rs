pub mod comparator;
pub mod detector;
pub mod eligibility;
pub mod recognizer;
pub mod session;
pub mod verify;

pub use comparator::{BiometricComparator, OnnxComparator, face_distance};
pub use detector::{FaceDetector, FaceBox};
pub use eligibility::{Eligibility, check_eligibility};
pub use recognizer::{FaceRecognizer, Encoding, l2_normalize};
pub use verify::{Outcome, VerificationResult, Verifier};
