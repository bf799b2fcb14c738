//! Sequenced quote requests.
//!
//! Every request is stamped with a strictly increasing sequence number and
//! cancels the request before it. Only a response carrying the latest
//! issued sequence is applied, so quotes can never move backwards even when
//! responses arrive out of order.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use playvault_core::amount::TokenAmount;
use playvault_core::error::AmountError;
use playvault_core::traits::QuoteSource;
use playvault_core::types::{QuoteRequest, TokenInfo};

use crate::error::QuoteError;

/// A validated quote input: distinct tokens and a non-zero amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteInput {
    pub token_in: TokenInfo,
    pub token_out: TokenInfo,
    /// The amount as typed.
    pub amount_text: String,
    /// The typed amount truncated to `token_in` decimals.
    pub amount_in: TokenAmount,
}

impl QuoteInput {
    pub fn new(
        token_in: &TokenInfo,
        token_out: &TokenInfo,
        amount_text: &str,
    ) -> Result<Self, QuoteError> {
        if token_in.id == token_out.id {
            return Err(QuoteError::InvalidPair {
                token_in: token_in.id.clone(),
                token_out: token_out.id.clone(),
            });
        }
        let amount_in = TokenAmount::parse_human(amount_text, token_in.decimals)?;
        if amount_in.is_zero() {
            return Err(AmountError::Invalid(format!("{amount_text} is zero")).into());
        }
        Ok(Self {
            token_in: token_in.clone(),
            token_out: token_out.clone(),
            amount_text: amount_text.trim().to_string(),
            amount_in,
        })
    }
}

/// An applied quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    pub token_in: TokenInfo,
    pub token_out: TokenInfo,
    pub amount_text: String,
    pub amount_in: TokenAmount,
    pub expected_out: TokenAmount,
    pub seq: u64,
}

/// Handle for one issued request.
#[derive(Debug, Clone)]
pub struct QuoteTicket {
    pub seq: u64,
    cancel: CancellationToken,
}

impl QuoteTicket {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Debug, Default)]
pub struct QuoteTracker {
    issued: AtomicU64,
    in_flight: Mutex<Option<CancellationToken>>,
    latest: RwLock<Option<SwapQuote>>,
}

impl QuoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next sequence number and cancel the previous request.
    /// Any applied quote is dropped: it belonged to an older input.
    pub fn begin(&self) -> QuoteTicket {
        let cancel = CancellationToken::new();
        let seq = {
            let mut in_flight = self.in_flight.lock();
            if let Some(previous) = in_flight.replace(cancel.clone()) {
                previous.cancel();
            }
            self.issued.fetch_add(1, Ordering::AcqRel) + 1
        };
        *self.latest.write() = None;
        QuoteTicket { seq, cancel }
    }

    /// Highest sequence issued so far.
    pub fn latest_seq(&self) -> u64 {
        self.issued.load(Ordering::Acquire)
    }

    /// Apply a quote if its sequence is still the latest issued.
    pub fn apply(&self, quote: SwapQuote) -> Result<(), QuoteError> {
        let mut latest = self.latest.write();
        let current = self.latest_seq();
        if quote.seq != current {
            debug!(seq = quote.seq, latest = current, "stale quote discarded");
            return Err(QuoteError::StaleQuoteDiscarded {
                seq: quote.seq,
                latest: current,
            });
        }
        *latest = Some(quote);
        Ok(())
    }

    /// The applied quote, if any.
    pub fn latest(&self) -> Option<SwapQuote> {
        self.latest.read().clone()
    }

    /// Ask `source` for a quote under `ticket` and apply it.
    ///
    /// Returns [`QuoteError::Cancelled`] if a newer request was issued
    /// first, or [`QuoteError::StaleQuoteDiscarded`] if the response lost
    /// the race after arriving.
    pub async fn fetch(
        &self,
        ticket: &QuoteTicket,
        source: &dyn QuoteSource,
        input: &QuoteInput,
    ) -> Result<SwapQuote, QuoteError> {
        let request = QuoteRequest {
            token_in: input.token_in.id.clone(),
            token_out: input.token_out.id.clone(),
            amount_in: input.amount_text.clone(),
        };

        let response = tokio::select! {
            biased;
            _ = ticket.cancel.cancelled() => {
                debug!(seq = ticket.seq, "quote request cancelled");
                return Err(QuoteError::Cancelled);
            }
            response = source.quote(&request) => response?,
        };

        let expected_out =
            TokenAmount::parse_human(&response.expected_out, input.token_out.decimals)?;
        let quote = SwapQuote {
            token_in: input.token_in.clone(),
            token_out: input.token_out.clone(),
            amount_text: input.amount_text.clone(),
            amount_in: input.amount_in,
            expected_out,
            seq: ticket.seq,
        };
        self.apply(quote.clone())?;
        self.finish(ticket);
        debug!(seq = ticket.seq, expected_out = %quote.expected_out, "quote applied");
        Ok(quote)
    }

    fn finish(&self, ticket: &QuoteTicket) {
        let mut in_flight = self.in_flight.lock();
        if self.latest_seq() == ticket.seq {
            *in_flight = None;
        }
    }

    /// Cancel any in-flight request and forget the applied quote.
    pub fn reset(&self) {
        if let Some(token) = self.in_flight.lock().take() {
            token.cancel();
        }
        *self.latest.write() = None;
    }
}
