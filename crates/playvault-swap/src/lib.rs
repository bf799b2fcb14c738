//! # playvault-swap — quote tracking, planning and execution.
//!
//! A [`SwapOrchestrator`] drives one swap at a time through an explicit
//! state machine: sequenced quote requests, a balance- and
//! registration-aware plan, then strictly sequential signed submissions.
//!
//! # Modules
//!
//! - [`error`] — quote and swap errors
//! - [`slippage`] — basis-point tolerance and `minimum_receive`
//! - [`quote`] — sequenced, cancellable quote requests
//! - [`plan`] — ordered action lists from an applied quote
//! - [`executor`] — transaction grouping and sequential submission
//! - [`orchestrator`] — the swap state machine

pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod plan;
pub mod quote;
pub mod slippage;

#[cfg(test)]
mod testing;

pub use error::{QuoteError, SwapError};
pub use executor::{Phase, StepOutcome, StepReport};
pub use orchestrator::{SwapOrchestrator, SwapReport, SwapState};
pub use plan::{SwapPlan, SwapSettings};
pub use quote::{QuoteTracker, SwapQuote};
pub use slippage::SlippagePolicy;
