use crate::core::eligibility::{check_eligibility, Eligibility};
use crate::core::verify::{Outcome, Verifier, MSG_COMPARISON_ERROR, MSG_INVALID_INPUT, MSG_LOOKUP_FAILED};
use crate::service::protocol::{
    CheckIdRequest, CheckIdResponse, VerifyFaceResponse,
    FIELD_PHOTO, FIELD_VOTER_ID, MSG_BAD_REQUEST_BODY, MSG_BAD_UPLOAD,
};
use crate::storage::VoterStore;
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: VoterStore,
    pub verifier: Arc<Verifier>,
}

pub async fn check_id(
    State(state): State<AppState>,
    payload: Result<Json<CheckIdRequest>, JsonRejection>,
) -> (StatusCode, Json<CheckIdResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!("Rejected check_id body: {}", rejection);
            return check_response(StatusCode::BAD_REQUEST, false, MSG_BAD_REQUEST_BODY.to_string());
        }
    };

    let voter_id = request.voter_id.unwrap_or_default().trim().to_string();
    tracing::info!("Checking ID: {}", voter_id);

    let store = state.store.clone();
    let lookup_id = voter_id.clone();
    let eligibility = tokio::task::spawn_blocking(move || check_eligibility(&store, &lookup_id)).await;

    match eligibility {
        Ok(Ok(eligibility)) => {
            let status = if eligibility == Eligibility::InvalidInput {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            };
            check_response(status, eligibility.is_eligible(), eligibility.message(&voter_id))
        }
        Ok(Err(e)) => {
            tracing::error!("Eligibility lookup failed for {}: {}", voter_id, e);
            check_response(StatusCode::INTERNAL_SERVER_ERROR, false, MSG_LOOKUP_FAILED.to_string())
        }
        Err(e) => {
            tracing::error!("Eligibility task for {} did not complete: {}", voter_id, e);
            check_response(StatusCode::INTERNAL_SERVER_ERROR, false, MSG_LOOKUP_FAILED.to_string())
        }
    }
}

fn check_response(status: StatusCode, valid: bool, message: String) -> (StatusCode, Json<CheckIdResponse>) {
    (status, Json(CheckIdResponse { valid, message }))
}

pub async fn verify_face(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Json<VerifyFaceResponse>) {
    tracing::debug!("verify_face route hit");

    let (voter_id, photo) = match multipart {
        Ok(multipart) => match read_upload(multipart).await {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!("Could not read upload: {}", e);
                return verify_response(e.status(), false, MSG_BAD_UPLOAD);
            }
        },
        Err(rejection) => {
            tracing::warn!("Rejected verify_face body: {}", rejection);
            (None, None)
        }
    };

    let (Some(voter_id), Some(photo)) = (voter_id, photo) else {
        return verify_response(StatusCode::BAD_REQUEST, false, MSG_INVALID_INPUT);
    };
    tracing::info!("Received voter_id={}, photo of {} bytes", voter_id.trim(), photo.len());

    // Runs to completion even if the client goes away, so the capture is
    // always cleaned up by the verifier itself.
    let verifier = state.verifier.clone();
    let result = tokio::task::spawn_blocking(move || verifier.verify(&voter_id, &photo)).await;

    match result {
        Ok(result) => verify_response(status_for(result.outcome), result.matched, &result.message),
        Err(e) => {
            tracing::error!("Verification task did not complete: {}", e);
            verify_response(StatusCode::INTERNAL_SERVER_ERROR, false, MSG_COMPARISON_ERROR)
        }
    }
}

fn verify_response(status: StatusCode, matched: bool, message: &str) -> (StatusCode, Json<VerifyFaceResponse>) {
    (status, Json(VerifyFaceResponse { matched, message: message.to_string() }))
}

async fn read_upload(mut multipart: Multipart) -> Result<(Option<String>, Option<Bytes>), MultipartError> {
    let mut voter_id = None;
    let mut photo = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(FIELD_VOTER_ID) => voter_id = Some(field.text().await?),
            Some(FIELD_PHOTO) => photo = Some(field.bytes().await?),
            _ => {}
        }
    }

    Ok((voter_id, photo))
}

pub fn status_for(outcome: Outcome) -> StatusCode {
    match outcome {
        Outcome::Matched
        | Outcome::NoMatch
        | Outcome::NoReferenceFace
        | Outcome::NoProbeFace => StatusCode::OK,
        Outcome::InvalidInput => StatusCode::BAD_REQUEST,
        Outcome::NotFound => StatusCode::NOT_FOUND,
        Outcome::ReferencePhotoMissing
        | Outcome::StorageFault
        | Outcome::ComparisonError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
