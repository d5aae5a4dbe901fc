// error.rs
use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Failures surfaced by the oracle program.
///
/// Each variant names the invariant that was violated so that providers,
/// delegation operators and readers can branch on the custom error code.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("price feed already exists")]
    AlreadyExists,
    #[error("price feed not found")]
    NotFound,
    #[error("execution layer does not own the price feed")]
    WrongOwner,
    #[error("feed id does not match the price feed address")]
    IdentityMismatch,
    #[error("update timestamp is not newer than the stored one")]
    StaleUpdate,
    #[error("update signature is invalid")]
    BadSignature,
    #[error("value compute algorithm is not recognized")]
    UnsupportedAlgorithm,
    #[error("price feed is already delegated")]
    AlreadyDelegated,
    #[error("price feed is not delegated")]
    NotDelegated,
    #[error("price feed must be undelegated first")]
    MustUndelegateFirst,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("provider has no verification strategy")]
    UnknownProvider,
    #[error("signer is not the feed authority")]
    Unauthorized,
    #[error("price is older than the requested maximum age")]
    PriceTooOld,
}

impl From<OracleError> for ProgramError {
    fn from(e: OracleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
