use serde::{Serialize, Deserialize};

pub const ROUTE_CHECK_ID: &str = "/check_id";
pub const ROUTE_VERIFY_FACE: &str = "/verify_face";

/// Multipart field names accepted by `/verify_face`.
pub const FIELD_VOTER_ID: &str = "voter_id";
pub const FIELD_PHOTO: &str = "photo";

pub const MSG_BAD_REQUEST_BODY: &str = "Invalid request body.";
pub const MSG_BAD_UPLOAD: &str = "Invalid photo upload.";

// Request types
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CheckIdRequest {
    #[serde(default)]
    pub voter_id: Option<String>,
}

// Response types
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CheckIdResponse {
    pub valid: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VerifyFaceResponse {
    #[serde(rename = "match")]
    pub matched: bool,
    pub message: String,
}
