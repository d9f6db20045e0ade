use crate::git::GitError;
use crate::store::StoreError;

/// Failure of one reconcile attempt. Only ever logged: the request that
/// triggered the attempt has already been answered.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("project lookup failed: {0}")]
    Lookup(#[from] StoreError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("failed to prepare repository root: {0}")]
    Io(#[from] std::io::Error),
}
