use crate::{
    asset::{
        AssetClass,
        Operation,
    },
    contract::{
        TxHash,
        WriteError,
    },
    read_api::ReadError,
};
use std::fmt;
use thiserror::Error;

pub type Result<T, E = ClaimError> = std::result::Result<T, E>;

/// Everything that can stop a claim or stake action.
///
/// None of these are fatal: the desk reports them as a notice and returns the
/// affected class to idle (or to a dismissable failed record).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClaimError {
    #[error("{0}")]
    Validation(String),

    #[error("a {operation} of {class} is already in progress")]
    Busy {
        class: AssetClass,
        operation: Operation,
    },

    #[error("{operation} is not available for {class}")]
    Unsupported {
        class: AssetClass,
        operation: Operation,
    },

    #[error("approval failed: {0}")]
    Approval(String),

    #[error("transaction was not signed: {0}")]
    Signature(String),

    #[error("transaction {} failed: {}", display_hash(.hash), .reason.as_deref().unwrap_or("reverted"))]
    OnChain {
        hash: Option<TxHash>,
        reason: Option<String>,
    },

    /// The action was dropped before its record settled. A submitted
    /// transaction may still be mined.
    #[error("action abandoned before it settled{}", display_abandoned(.hash))]
    Abandoned { hash: Option<TxHash> },

    #[error("read api: {0}")]
    Read(#[from] ReadError),
}

fn display_hash(hash: &Option<TxHash>) -> String {
    hash.as_ref()
        .map(|h| h.to_string())
        .unwrap_or_else(|| "(unsubmitted)".to_string())
}

fn display_abandoned(hash: &Option<TxHash>) -> String {
    hash.as_ref()
        .map(|h| format!("; transaction {h} may still be mined"))
        .unwrap_or_default()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    Validation,
    Approval,
    Signature,
    OnChain,
    ReadSide,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Approval => "approval",
            ErrorCategory::Signature => "signature",
            ErrorCategory::OnChain => "on-chain",
            ErrorCategory::ReadSide => "read-side",
        };
        write!(f, "{name}")
    }
}

impl ClaimError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClaimError::Validation(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ClaimError::Validation(_)
            | ClaimError::Busy { .. }
            | ClaimError::Unsupported { .. } => ErrorCategory::Validation,
            ClaimError::Approval(_) => ErrorCategory::Approval,
            ClaimError::Signature(_) => ErrorCategory::Signature,
            ClaimError::OnChain { .. } | ClaimError::Abandoned { hash: Some(_) } => {
                ErrorCategory::OnChain
            }
            ClaimError::Abandoned { hash: None } => ErrorCategory::Signature,
            ClaimError::Read(_) => ErrorCategory::ReadSide,
        }
    }

    /// Error raised while the wallet was asked to sign the main action.
    pub fn from_submission(err: WriteError) -> Self {
        match err {
            WriteError::Reverted { reason } => ClaimError::OnChain { hash: None, reason },
            other => ClaimError::Signature(other.to_string()),
        }
    }

    /// Error raised while waiting for a submitted transaction to be mined.
    pub fn from_confirmation(hash: &TxHash, err: WriteError) -> Self {
        let reason = match err {
            WriteError::Reverted { reason } => reason,
            other => Some(other.to_string()),
        };
        ClaimError::OnChain {
            hash: Some(hash.clone()),
            reason,
        }
    }
}
