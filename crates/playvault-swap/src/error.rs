//! Quote and swap error types.

use playvault_core::error::{AmountError, RemoteError};
use playvault_wallet::SignerError;
use thiserror::Error;

/// Quote request failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("quote source: {0}")]
    Source(#[from] RemoteError),

    /// Superseded by a newer request before a response arrived.
    #[error("quote request cancelled")]
    Cancelled,

    /// A response arrived for a request that is no longer the latest.
    /// Dropped without touching state.
    #[error("stale quote discarded (seq {seq}, latest {latest})")]
    StaleQuoteDiscarded { seq: u64, latest: u64 },

    #[error("invalid pair: {token_in} -> {token_out}")]
    InvalidPair { token_in: String, token_out: String },

    #[error(transparent)]
    Amount(#[from] AmountError),
}

impl QuoteError {
    /// Outcomes that are dropped silently rather than surfaced.
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Cancelled | Self::StaleQuoteDiscarded { .. })
    }
}

/// Swap planning and execution failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },

    #[error("slippage {0} bps exceeds 10000")]
    InvalidSlippage(u32),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("no quote to plan from")]
    NoQuote,

    #[error("storage registration on {contract} failed: {reason}")]
    RegistrationFailed { contract: String, reason: String },

    #[error("wrap failed: {0}")]
    WrapFailed(String),

    #[error("swap execution failed: {0}")]
    SwapExecutionFailed(String),

    /// The swap itself went through; the output is left in wrapped form.
    #[error("unwrap failed: {0}")]
    UnwrapFailed(String),

    #[error("signing: {0}")]
    Signing(#[from] SignerError),

    #[error("chain query: {0}")]
    Chain(#[from] RemoteError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error(transparent)]
    Quote(#[from] QuoteError),
}
