use crate::common::Result;
use crate::storage::VoterStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    NotFound,
    AlreadyVoted,
    InvalidInput,
}

impl Eligibility {
    pub fn is_eligible(self) -> bool {
        self == Eligibility::Eligible
    }

    pub fn message(self, voter_id: &str) -> String {
        match self {
            Eligibility::Eligible => format!("Voter ID {} is valid.", voter_id),
            Eligibility::NotFound => format!("Voter ID {} not found.", voter_id),
            Eligibility::AlreadyVoted => format!("Voter ID {} has already voted.", voter_id),
            Eligibility::InvalidInput => "Voter ID cannot be empty.".to_string(),
        }
    }
}

/// Read-only gate run before any photo is accepted. Advisory only: the
/// commit in the verifier is what actually prevents a second vote.
pub fn check_eligibility(store: &VoterStore, voter_id: &str) -> Result<Eligibility> {
    let voter_id = voter_id.trim();
    if voter_id.is_empty() {
        return Ok(Eligibility::InvalidInput);
    }

    let eligibility = match store.get(voter_id)? {
        None => Eligibility::NotFound,
        Some(voter) if voter.has_voted => Eligibility::AlreadyVoted,
        Some(_) => Eligibility::Eligible,
    };

    tracing::info!("Eligibility for {}: {:?}", voter_id, eligibility);
    Ok(eligibility)
}
