//! Sequential execution of a swap plan.
//!
//! Actions are grouped into chain transactions by phase and receiver. The
//! swap call always travels alone. Each transaction is signed and submitted
//! only after the previous one has resolved; the first failure stops the run.

use serde::Serialize;
use tracing::{info, warn};

use playvault_core::traits::TransactionSubmitter;
use playvault_core::types::{Action, ActionKind, TxStatus};
use playvault_wallet::Signer;

use crate::error::SwapError;
use crate::plan::SwapPlan;

/// Where an action sits relative to the swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Wrap and storage registration.
    Prepare,
    Swap,
    /// Unwrap of the output.
    Settle,
}

impl Phase {
    pub fn of(action: &Action) -> Self {
        match action {
            Action::Wrap { .. } | Action::RegisterAccount { .. } => Self::Prepare,
            Action::FunctionCall(_) => Self::Swap,
            Action::Unwrap { .. } => Self::Settle,
        }
    }
}

/// Actions that go out in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxBatch {
    pub phase: Phase,
    pub receiver: String,
    pub actions: Vec<Action>,
}

impl TxBatch {
    pub fn kinds(&self) -> Vec<ActionKind> {
        self.actions.iter().map(Action::kind).collect()
    }
}

/// Group consecutive actions sharing phase and receiver.
pub fn group_transactions(actions: &[Action]) -> Vec<TxBatch> {
    let mut batches: Vec<TxBatch> = Vec::new();
    for action in actions {
        let phase = Phase::of(action);
        let receiver = action.receiver();
        match batches.last_mut() {
            Some(last)
                if phase != Phase::Swap && last.phase == phase && last.receiver == receiver =>
            {
                last.actions.push(action.clone());
            }
            _ => batches.push(TxBatch {
                phase,
                receiver: receiver.to_string(),
                actions: vec![action.clone()],
            }),
        }
    }
    batches
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded { received: Option<u128> },
    Failed { reason: String },
}

/// One submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub phase: Phase,
    pub receiver: String,
    pub kinds: Vec<ActionKind>,
    /// `None` when the transaction could not be signed.
    pub tx_hash: Option<String>,
    pub outcome: StepOutcome,
}

/// Result of running every batch, or stopping at the first failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub steps: Vec<StepReport>,
    /// Index into `steps` of the failed step and its error.
    pub failure: Option<(usize, SwapError)>,
    /// Amount the swap reported crediting, in output minor units.
    pub received: Option<u128>,
}

impl ExecutionResult {
    /// Whether the swap transaction itself succeeded.
    pub fn swap_succeeded(&self) -> bool {
        self.steps.iter().any(|s| {
            s.phase == Phase::Swap && matches!(s.outcome, StepOutcome::Succeeded { .. })
        })
    }
}

pub struct Executor<'a> {
    signer: &'a Signer,
    submitter: &'a dyn TransactionSubmitter,
}

impl<'a> Executor<'a> {
    pub fn new(signer: &'a Signer, submitter: &'a dyn TransactionSubmitter) -> Self {
        Self { signer, submitter }
    }

    pub async fn run(&self, plan: &SwapPlan) -> ExecutionResult {
        let mut result = ExecutionResult {
            steps: Vec::new(),
            failure: None,
            received: None,
        };

        for mut batch in group_transactions(&plan.actions) {
            if batch.phase == Phase::Settle {
                if let Some(received) = result.received {
                    refine_unwrap(&mut batch.actions, received);
                }
            }

            let step = result.steps.len();
            let signed = self
                .signer
                .transaction(batch.receiver.clone(), batch.actions.clone())
                .and_then(|tx| self.signer.sign_transaction(tx));
            let signed = match signed {
                Ok(signed) => signed,
                Err(err) => {
                    warn!(step, phase = ?batch.phase, error = %err, "transaction signing failed");
                    result.steps.push(report(&batch, None, StepOutcome::Failed {
                        reason: err.to_string(),
                    }));
                    result.failure = Some((step, SwapError::Signing(err)));
                    return result;
                }
            };

            let tx_hash = signed.hash.clone();
            info!(step, phase = ?batch.phase, receiver = %batch.receiver, tx_hash = %tx_hash, "submitting transaction");

            let reason = match self.submitter.submit(signed).await {
                Ok(outcome) => match outcome.status {
                    TxStatus::Success { received } => {
                        if batch.phase == Phase::Swap {
                            result.received = received;
                        }
                        result.steps.push(report(
                            &batch,
                            Some(tx_hash),
                            StepOutcome::Succeeded { received },
                        ));
                        continue;
                    }
                    TxStatus::Failure { reason } => reason,
                },
                Err(err) => err.to_string(),
            };

            warn!(step, phase = ?batch.phase, tx_hash = %tx_hash, reason = %reason, "transaction failed");
            let error = step_error(&batch, reason.clone());
            result
                .steps
                .push(report(&batch, Some(tx_hash), StepOutcome::Failed { reason }));
            result.failure = Some((step, error));
            return result;
        }
        result
    }
}

fn report(batch: &TxBatch, tx_hash: Option<String>, outcome: StepOutcome) -> StepReport {
    StepReport {
        phase: batch.phase,
        receiver: batch.receiver.clone(),
        kinds: batch.kinds(),
        tx_hash,
        outcome,
    }
}

fn refine_unwrap(actions: &mut [Action], received: u128) {
    for action in actions {
        if let Action::Unwrap { amount, .. } = action {
            *amount = received;
        }
    }
}

fn step_error(batch: &TxBatch, reason: String) -> SwapError {
    match batch.phase {
        Phase::Swap => SwapError::SwapExecutionFailed(reason),
        Phase::Settle => SwapError::UnwrapFailed(reason),
        Phase::Prepare
            if batch
                .actions
                .iter()
                .any(|a| matches!(a, Action::RegisterAccount { .. })) =>
        {
            SwapError::RegistrationFailed {
                contract: batch.receiver.clone(),
                reason,
            }
        }
        Phase::Prepare => SwapError::WrapFailed(reason),
    }
}
