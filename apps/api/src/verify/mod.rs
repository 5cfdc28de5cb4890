//! Verify lookup: resolves a public verify hash to one of three display states.
//!
//! Only a sealed artifact is ever shown. An unsealed row is reported as
//! pending when the caller has just come back from checkout (the completion
//! webhook may still be in flight) and as not found otherwise.

use crate::engine::codes::is_valid_verify_hash;
use crate::models::artifact::ArtifactRow;
use crate::store::{ArtifactStore, StoreError};

pub mod handlers;
pub mod page;

#[derive(Debug, Clone, PartialEq)]
pub enum VerifyState {
    Sealed(ArtifactRow),
    Pending,
    NotFound,
}

impl VerifyState {
    pub fn label(&self) -> &'static str {
        match self {
            VerifyState::Sealed(_) => "sealed",
            VerifyState::Pending => "pending",
            VerifyState::NotFound => "not_found",
        }
    }
}

/// Read-only. Malformed hashes never reach the store.
pub async fn lookup(
    store: &dyn ArtifactStore,
    hash: &str,
    just_paid: bool,
) -> Result<VerifyState, StoreError> {
    if !is_valid_verify_hash(hash) {
        return Ok(VerifyState::NotFound);
    }

    Ok(match store.get_artifact_by_hash(hash).await? {
        Some(row) if row.is_sealed => VerifyState::Sealed(row),
        Some(_) if just_paid => VerifyState::Pending,
        _ => VerifyState::NotFound,
    })
}
