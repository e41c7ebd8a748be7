use crate::proposal::ProposalId;
use cipher_grant_crypto::CryptoError;
use cipher_grant_storage::StorageError;
use cipher_grant_types::{Address, Amount, TypesError};
use thiserror::Error;

/// Errors that can occur in governance operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Already a member: {0}")]
    AlreadyMember(Address),

    #[error("Proposal {0} already finalized")]
    AlreadyFinalized(ProposalId),

    #[error("Not a member: {0}")]
    NotAMember(Address),

    #[error("Proposal {0} is not open for voting")]
    ProposalNotOpen(ProposalId),

    #[error("Proposal {0} is not funded")]
    NotFunded(ProposalId),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    #[error("Invalid vote choice: {0}")]
    InvalidChoice(String),

    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Corrupt ciphertext: {0}")]
    CorruptCiphertext(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Disbursement of {requested} exceeds remaining budget {remaining}")]
    ExceedsBudget { requested: Amount, remaining: Amount },

    #[error("Insufficient treasury funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt journal: {0}")]
    CorruptJournal(String),
}

impl GovernanceError {
    /// Security and integrity failures. These are never retried.
    pub fn is_security_failure(&self) -> bool {
        matches!(
            self,
            GovernanceError::Unauthorized(_) | GovernanceError::CorruptCiphertext(_)
        )
    }
}

impl From<CryptoError> for GovernanceError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Unauthorized => {
                GovernanceError::Unauthorized("reveal authorization rejected".to_string())
            }
            CryptoError::CorruptCiphertext(reason) => GovernanceError::CorruptCiphertext(reason),
            other => GovernanceError::Crypto(other.to_string()),
        }
    }
}

impl From<StorageError> for GovernanceError {
    fn from(e: StorageError) -> Self {
        GovernanceError::Storage(e.to_string())
    }
}

impl From<TypesError> for GovernanceError {
    fn from(e: TypesError) -> Self {
        match e {
            TypesError::InvalidAmount(reason) => GovernanceError::InvalidAmount(reason),
            other => GovernanceError::Validation(other.to_string()),
        }
    }
}
