//! Swap state machine.
//!
//! ```text
//! Idle -> Quoting -> Quoted -> Planning -> Executing -> Succeeded
//!                                                    -> PartiallyFailed
//!                                                    -> Failed
//! ```
//!
//! Quoting may restart from `Quoting`, `Quoted` or `Planning` when the
//! input changes. Terminal states return to `Idle` through
//! [`SwapOrchestrator::reset`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use playvault_core::amount::TokenAmount;
use playvault_core::traits::{ChainView, QuoteSource, TransactionSubmitter};
use playvault_core::types::TokenInfo;
use playvault_wallet::Signer;

use crate::error::SwapError;
use crate::executor::{Executor, StepReport};
use crate::plan::{SwapPlan, SwapSettings, build_plan};
use crate::quote::{QuoteInput, QuoteTracker, SwapQuote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapState {
    Idle,
    Quoting,
    Quoted,
    Planning,
    Executing,
    Succeeded,
    PartiallyFailed,
    Failed,
}

impl SwapState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::PartiallyFailed | Self::Failed)
    }
}

impl fmt::Display for SwapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Quoting => "quoting",
            Self::Quoted => "quoted",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::PartiallyFailed => "partially_failed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of [`SwapOrchestrator::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReport {
    pub state: SwapState,
    pub plan: SwapPlan,
    pub steps: Vec<StepReport>,
    /// Index into `steps` of the step that failed.
    pub failed_step: Option<usize>,
    pub error: Option<SwapError>,
    /// Output the swap reported crediting.
    pub received: Option<TokenAmount>,
}

impl SwapReport {
    pub fn failed(&self) -> Option<&StepReport> {
        self.failed_step.and_then(|i| self.steps.get(i))
    }
}

pub struct SwapOrchestrator {
    settings: SwapSettings,
    signer: Signer,
    quotes: Arc<dyn QuoteSource>,
    chain: Arc<dyn ChainView>,
    submitter: Arc<dyn TransactionSubmitter>,
    tracker: QuoteTracker,
    state: Mutex<SwapState>,
    plan: Mutex<Option<SwapPlan>>,
}

impl SwapOrchestrator {
    pub fn new(
        settings: SwapSettings,
        signer: Signer,
        quotes: Arc<dyn QuoteSource>,
        chain: Arc<dyn ChainView>,
        submitter: Arc<dyn TransactionSubmitter>,
    ) -> Self {
        Self {
            settings,
            signer,
            quotes,
            chain,
            submitter,
            tracker: QuoteTracker::new(),
            state: Mutex::new(SwapState::Idle),
            plan: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SwapState {
        *self.state.lock()
    }

    pub fn settings(&self) -> &SwapSettings {
        &self.settings
    }

    /// The applied quote, if any.
    pub fn quote(&self) -> Option<SwapQuote> {
        self.tracker.latest()
    }

    /// Request a quote, superseding any earlier request.
    ///
    /// Returns `Ok(None)` when this request was overtaken by a newer one;
    /// its result is dropped without changing state.
    pub async fn request_quote(
        &self,
        token_in: &TokenInfo,
        token_out: &TokenInfo,
        amount_in: &str,
    ) -> Result<Option<SwapQuote>, SwapError> {
        let input = QuoteInput::new(token_in, token_out, amount_in)?;

        let ticket = {
            let mut state = self.state.lock();
            match *state {
                SwapState::Idle | SwapState::Quoting | SwapState::Quoted | SwapState::Planning => {}
                other => {
                    return Err(SwapError::InvalidState(format!("cannot quote while {other}")));
                }
            }
            *state = SwapState::Quoting;
            *self.plan.lock() = None;
            self.tracker.begin()
        };
        debug!(seq = ticket.seq, token_in = %token_in.id, token_out = %token_out.id, "quote requested");

        let fetched = self.tracker.fetch(&ticket, self.quotes.as_ref(), &input).await;

        let mut state = self.state.lock();
        let is_latest = self.tracker.latest_seq() == ticket.seq && *state == SwapState::Quoting;
        match fetched {
            Ok(quote) if is_latest => {
                *state = SwapState::Quoted;
                info!(seq = quote.seq, expected_out = %quote.expected_out, "quote ready");
                Ok(Some(quote))
            }
            Ok(_) => Ok(None),
            Err(err) if err.is_superseded() => Ok(None),
            Err(err) if is_latest => {
                *state = SwapState::Idle;
                warn!(seq = ticket.seq, error = %err, "quote failed");
                Err(SwapError::Quote(err))
            }
            Err(err) => {
                debug!(seq = ticket.seq, error = %err, "superseded quote failed");
                Ok(None)
            }
        }
    }

    /// Build a plan from the applied quote after checking balance and
    /// storage registration.
    pub async fn plan(&self) -> Result<SwapPlan, SwapError> {
        let quote = {
            let mut state = self.state.lock();
            if *state != SwapState::Quoted {
                return Err(SwapError::InvalidState(format!("cannot plan while {}", *state)));
            }
            let quote = self.tracker.latest().ok_or(SwapError::NoQuote)?;
            *state = SwapState::Planning;
            quote
        };

        match self.prepare_plan(&quote).await {
            Ok(plan) => {
                let state = self.state.lock();
                if *state != SwapState::Planning || self.tracker.latest_seq() != quote.seq {
                    return Err(SwapError::InvalidState(
                        "quote changed while planning".to_string(),
                    ));
                }
                *self.plan.lock() = Some(plan.clone());
                info!(seq = quote.seq, actions = ?plan.kinds(), "swap planned");
                Ok(plan)
            }
            Err(err) => {
                let mut state = self.state.lock();
                if *state == SwapState::Planning {
                    *state = SwapState::Quoted;
                }
                warn!(seq = quote.seq, error = %err, "planning failed");
                Err(err)
            }
        }
    }

    async fn prepare_plan(&self, quote: &SwapQuote) -> Result<SwapPlan, SwapError> {
        let account = self.signer.account_id()?;

        if !quote.token_in.is_native() {
            let have = self.chain.balance(&account, &quote.token_in).await?;
            let need = quote.amount_in.minor();
            if have < need {
                return Err(SwapError::InsufficientBalance { have, need });
            }
        }

        let needs_registration = if quote.token_out.requires_registration
            && !quote.token_out.is_native()
        {
            !self
                .chain
                .is_registered(&quote.token_out.id, &account)
                .await?
        } else {
            false
        };

        let plan = build_plan(quote, &self.settings, &account, needs_registration);

        // Wrap, storage and call deposits all draw on the native balance.
        let need = plan.native_outlay().unwrap_or(u128::MAX);
        let have = self.chain.balance(&account, &TokenInfo::native()).await?;
        if have < need {
            return Err(SwapError::InsufficientBalance { have, need });
        }
        Ok(plan)
    }

    /// Run the planned actions in order.
    ///
    /// Errors only when there is no plan to run. Step failures are reported
    /// through the returned [`SwapReport`].
    pub async fn execute(&self) -> Result<SwapReport, SwapError> {
        let plan = {
            let mut state = self.state.lock();
            if *state != SwapState::Planning {
                return Err(SwapError::InvalidState(format!("cannot execute while {}", *state)));
            }
            let plan = self
                .plan
                .lock()
                .take()
                .ok_or_else(|| SwapError::InvalidState("no plan".to_string()))?;
            *state = SwapState::Executing;
            plan
        };
        info!(seq = plan.quote_seq, "executing swap");
        let guard = ExecutionGuard {
            state: &self.state,
            seq: plan.quote_seq,
        };

        let executor = Executor::new(&self.signer, self.submitter.as_ref());
        let result = executor.run(&plan).await;

        let final_state = match &result.failure {
            None => SwapState::Succeeded,
            Some(_) if result.swap_succeeded() => SwapState::PartiallyFailed,
            Some(_) => SwapState::Failed,
        };
        guard.finish(final_state);

        let (failed_step, error) = match result.failure {
            Some((index, err)) => (Some(index), Some(err)),
            None => (None, None),
        };
        match &error {
            None => info!(seq = plan.quote_seq, "swap succeeded"),
            Some(err) => warn!(seq = plan.quote_seq, state = %final_state, error = %err, "swap did not complete"),
        }

        let received = result
            .received
            .map(|minor| TokenAmount::from_minor(minor, plan.token_out.decimals));
        Ok(SwapReport {
            state: final_state,
            plan,
            steps: result.steps,
            failed_step,
            error,
            received,
        })
    }

    /// Return to `Idle`, cancelling any quote request in flight.
    pub fn reset(&self) -> Result<(), SwapError> {
        let mut state = self.state.lock();
        if *state == SwapState::Executing {
            return Err(SwapError::InvalidState(
                "cannot reset while executing".to_string(),
            ));
        }
        self.tracker.reset();
        *self.plan.lock() = None;
        *state = SwapState::Idle;
        debug!("swap reset");
        Ok(())
    }
}

/// Holds the state at `Executing` for one run. Dropped without
/// [`finish`](Self::finish), the run was abandoned mid-flight and the swap
/// ends `Failed` so it can be reset.
struct ExecutionGuard<'a> {
    state: &'a Mutex<SwapState>,
    seq: u64,
}

impl ExecutionGuard<'_> {
    fn finish(self, final_state: SwapState) {
        *self.state.lock() = final_state;
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if *state == SwapState::Executing {
            *state = SwapState::Failed;
            warn!(seq = self.seq, "swap execution abandoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Phase, StepOutcome};
    use crate::testing::{
        FakeChain, FakeQuotes, FakeSubmitter, loaded_signer, unloaded_signer, usdc,
    };
    use playvault_core::constants::{Network, STORAGE_DEPOSIT, SWAP_ATTACHED_DEPOSIT};
    use playvault_core::types::{Action, ActionKind};
    use playvault_wallet::SignerError;
    use std::time::Duration;

    struct Harness {
        orch: SwapOrchestrator,
        submitter: Arc<FakeSubmitter>,
    }

    async fn harness(chain: FakeChain, submitter: FakeSubmitter, fail_quotes: bool) -> Harness {
        let submitter = Arc::new(submitter);
        let orch = SwapOrchestrator::new(
            SwapSettings::for_network(Network::Mainnet),
            loaded_signer().await,
            Arc::new(FakeQuotes {
                rate: 5,
                fail: fail_quotes,
            }),
            Arc::new(chain),
            submitter.clone(),
        );
        Harness { orch, submitter }
    }

    fn rich(registered: bool) -> FakeChain {
        FakeChain {
            balance: u128::MAX,
            registered,
        }
    }

    #[tokio::test]
    async fn native_to_token_happy_path() {
        let h = harness(rich(false), FakeSubmitter::default(), false).await;
        assert_eq!(h.orch.state(), SwapState::Idle);

        let quote = h
            .orch
            .request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(quote.expected_out.to_human_string(), "10");
        assert_eq!(h.orch.state(), SwapState::Quoted);

        let plan = h.orch.plan().await.unwrap();
        assert_eq!(
            plan.kinds(),
            vec![ActionKind::Wrap, ActionKind::RegisterAccount, ActionKind::FunctionCall]
        );
        assert_eq!(plan.minimum_receive.to_human_string(), "9.95");
        assert_eq!(h.orch.state(), SwapState::Planning);

        let report = h.orch.execute().await.unwrap();
        assert_eq!(report.state, SwapState::Succeeded);
        assert_eq!(report.steps.len(), 3);
        assert!(report.failed().is_none());
        assert_eq!(
            h.submitter.kinds(),
            vec![
                vec![ActionKind::Wrap],
                vec![ActionKind::RegisterAccount],
                vec![ActionKind::FunctionCall]
            ]
        );
        assert_eq!(h.orch.state(), SwapState::Succeeded);

        h.orch.reset().unwrap();
        assert_eq!(h.orch.state(), SwapState::Idle);
        assert!(h.orch.quote().is_none());
    }

    #[tokio::test]
    async fn late_response_for_older_request_is_dropped() {
        let h = harness(rich(true), FakeSubmitter::default(), false).await;
        let orch = &h.orch;

        let (native, usdc) = (TokenInfo::native(), usdc());

        let (older, newer) = tokio::join!(orch.request_quote(&native, &usdc, "1"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            orch.request_quote(&native, &usdc, "3").await
        });

        assert_eq!(older.unwrap(), None);
        let newer = newer.unwrap().unwrap();
        assert_eq!(newer.expected_out.to_human_string(), "15");
        assert_eq!(orch.state(), SwapState::Quoted);
        assert_eq!(orch.quote().unwrap().seq, newer.seq);
    }

    #[tokio::test]
    async fn insufficient_balance_blocks_planning() {
        let chain = FakeChain {
            balance: 1,
            registered: true,
        };
        let h = harness(chain, FakeSubmitter::default(), false).await;
        h.orch
            .request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap();

        let err = h.orch.plan().await.unwrap_err();
        assert_eq!(
            err,
            SwapError::InsufficientBalance {
                have: 1,
                need: 2_000_000_000_000_000_000_000_000 + SWAP_ATTACHED_DEPOSIT
            }
        );
        assert_eq!(h.orch.state(), SwapState::Quoted);
        assert!(h.submitter.kinds().is_empty());
    }

    #[tokio::test]
    async fn balance_must_cover_wrap_and_deposits() {
        let two_near = 2_000_000_000_000_000_000_000_000u128;
        let outlay = two_near + STORAGE_DEPOSIT + SWAP_ATTACHED_DEPOSIT;

        let chain = FakeChain {
            balance: two_near,
            registered: false,
        };
        let h = harness(chain, FakeSubmitter::default(), false).await;
        h.orch
            .request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap();
        assert_eq!(
            h.orch.plan().await.unwrap_err(),
            SwapError::InsufficientBalance {
                have: two_near,
                need: outlay
            }
        );

        let chain = FakeChain {
            balance: outlay,
            registered: false,
        };
        let h = harness(chain, FakeSubmitter::default(), false).await;
        h.orch
            .request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap();
        let plan = h.orch.plan().await.unwrap();
        assert!(plan.has_wrap() && plan.has_registration());
        assert_eq!(plan.native_outlay(), Some(outlay));
    }

    #[tokio::test]
    async fn token_input_needs_native_for_deposits() {
        let chain = FakeChain {
            balance: STORAGE_DEPOSIT,
            registered: false,
        };
        let h = harness(chain, FakeSubmitter::default(), false).await;
        h.orch
            .request_quote(&usdc(), &TokenInfo::fungible("dai.near", "DAI", 18), "2")
            .await
            .unwrap();
        assert_eq!(
            h.orch.plan().await.unwrap_err(),
            SwapError::InsufficientBalance {
                have: STORAGE_DEPOSIT,
                need: STORAGE_DEPOSIT + SWAP_ATTACHED_DEPOSIT
            }
        );
    }

    #[tokio::test]
    async fn abandoned_execution_can_be_reset() {
        let submitter = FakeSubmitter {
            delay: Duration::from_secs(5),
            ..Default::default()
        };
        let h = harness(rich(true), submitter, false).await;
        h.orch
            .request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap();
        h.orch.plan().await.unwrap();

        let run = tokio::time::timeout(Duration::from_millis(20), h.orch.execute()).await;
        assert!(run.is_err());
        assert_eq!(h.orch.state(), SwapState::Failed);

        h.orch.reset().unwrap();
        assert_eq!(h.orch.state(), SwapState::Idle);
    }

    #[tokio::test]
    async fn registered_account_gets_no_registration() {
        let h = harness(rich(true), FakeSubmitter::default(), false).await;
        h.orch
            .request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap();
        let plan = h.orch.plan().await.unwrap();
        assert_eq!(plan.kinds(), vec![ActionKind::Wrap, ActionKind::FunctionCall]);
    }

    #[tokio::test]
    async fn unwrap_failure_is_partial() {
        let submitter = FakeSubmitter {
            fail_on: Some(ActionKind::Unwrap),
            ..Default::default()
        };
        let h = harness(rich(true), submitter, false).await;
        h.orch
            .request_quote(&usdc(), &TokenInfo::native(), "10")
            .await
            .unwrap();
        h.orch.plan().await.unwrap();

        let report = h.orch.execute().await.unwrap();
        assert_eq!(report.state, SwapState::PartiallyFailed);
        let failed = report.failed().unwrap();
        assert_eq!(failed.phase, Phase::Settle);
        assert_eq!(failed.kinds, vec![ActionKind::Unwrap]);
        assert!(matches!(report.error, Some(SwapError::UnwrapFailed(_))));
        assert!(matches!(
            report.steps[0].outcome,
            StepOutcome::Succeeded { .. }
        ));
    }

    #[tokio::test]
    async fn wrap_failure_stops_before_swap() {
        let submitter = FakeSubmitter {
            fail_on: Some(ActionKind::Wrap),
            ..Default::default()
        };
        let h = harness(rich(true), submitter, false).await;
        h.orch
            .request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap();
        h.orch.plan().await.unwrap();

        let report = h.orch.execute().await.unwrap();
        assert_eq!(report.state, SwapState::Failed);
        assert!(matches!(report.error, Some(SwapError::WrapFailed(_))));
        assert_eq!(report.failed_step, Some(0));
        assert_eq!(h.submitter.kinds(), vec![vec![ActionKind::Wrap]]);
    }

    #[tokio::test]
    async fn registration_failure_names_contract() {
        let submitter = FakeSubmitter {
            fail_on: Some(ActionKind::RegisterAccount),
            ..Default::default()
        };
        let h = harness(rich(false), submitter, false).await;
        h.orch
            .request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap();
        h.orch.plan().await.unwrap();

        let report = h.orch.execute().await.unwrap();
        assert_eq!(report.state, SwapState::Failed);
        assert_eq!(
            report.error,
            Some(SwapError::RegistrationFailed {
                contract: "usdc.near".into(),
                reason: "execution reverted".into()
            })
        );
        assert_eq!(h.submitter.kinds().len(), 2);
    }

    #[tokio::test]
    async fn swap_failure_is_failed() {
        let submitter = FakeSubmitter {
            fail_on: Some(ActionKind::FunctionCall),
            ..Default::default()
        };
        let h = harness(rich(true), submitter, false).await;
        h.orch
            .request_quote(&usdc(), &TokenInfo::native(), "10")
            .await
            .unwrap();
        h.orch.plan().await.unwrap();

        let report = h.orch.execute().await.unwrap();
        assert_eq!(report.state, SwapState::Failed);
        assert!(matches!(report.error, Some(SwapError::SwapExecutionFailed(_))));
        // Unwrap never submitted.
        assert_eq!(h.submitter.kinds(), vec![vec![ActionKind::FunctionCall]]);
    }

    #[tokio::test]
    async fn unwrap_uses_received_amount() {
        let received = 49_900_000_000_000_000_000_000_000u128;
        let submitter = FakeSubmitter {
            received: Some(received),
            ..Default::default()
        };
        let h = harness(rich(true), submitter, false).await;
        h.orch
            .request_quote(&usdc(), &TokenInfo::native(), "10")
            .await
            .unwrap();
        let plan = h.orch.plan().await.unwrap();
        assert_ne!(plan.minimum_receive.minor(), received);

        let report = h.orch.execute().await.unwrap();
        assert_eq!(report.state, SwapState::Succeeded);
        assert_eq!(report.received.unwrap().minor(), received);

        let submitted = h.submitter.submitted.lock();
        let last = submitted.last().unwrap();
        assert_eq!(
            last.transaction.actions,
            vec![Action::Unwrap {
                contract: "wrap.near".into(),
                amount: received
            }]
        );
    }

    #[tokio::test]
    async fn quote_failure_returns_to_idle() {
        let h = harness(rich(true), FakeSubmitter::default(), true).await;
        let err = h
            .orch
            .request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Quote(_)));
        assert_eq!(h.orch.state(), SwapState::Idle);
    }

    #[tokio::test]
    async fn out_of_order_calls_are_rejected() {
        let h = harness(rich(true), FakeSubmitter::default(), false).await;
        assert!(matches!(h.orch.plan().await, Err(SwapError::InvalidState(_))));
        assert!(matches!(h.orch.execute().await, Err(SwapError::InvalidState(_))));

        h.orch
            .request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap();
        h.orch.plan().await.unwrap();
        h.orch.execute().await.unwrap();

        let err = h
            .orch
            .request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::InvalidState(_)));
    }

    #[tokio::test]
    async fn invalid_input_leaves_state_untouched() {
        let h = harness(rich(true), FakeSubmitter::default(), false).await;
        let err = h.orch.request_quote(&usdc(), &usdc(), "2").await.unwrap_err();
        assert!(matches!(err, SwapError::Quote(_)));
        assert_eq!(h.orch.state(), SwapState::Idle);
    }

    #[tokio::test]
    async fn planning_without_key_fails_closed() {
        let orch = SwapOrchestrator::new(
            SwapSettings::for_network(Network::Mainnet),
            unloaded_signer(),
            Arc::new(FakeQuotes {
                rate: 5,
                fail: false,
            }),
            Arc::new(rich(true)),
            Arc::new(FakeSubmitter::default()),
        );
        orch.request_quote(&TokenInfo::native(), &usdc(), "2")
            .await
            .unwrap();
        assert_eq!(
            orch.plan().await.unwrap_err(),
            SwapError::Signing(SignerError::KeyUnavailable)
        );
        assert_eq!(orch.state(), SwapState::Quoted);
    }
}
