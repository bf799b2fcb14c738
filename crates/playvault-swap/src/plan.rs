//! Turning an applied quote into an ordered action list.
//!
//! Order is fixed:
//!
//! 1. `Wrap` when the input is the native asset
//! 2. `RegisterAccount` when the output token needs storage registration
//!    and the account has none
//! 3. the exchange `swap` call, carrying `amount_in` and `min_amount_out`
//!    in its arguments and a one-yocto deposit
//! 4. `Unwrap` when the output is the native asset

use serde::{Deserialize, Serialize};
use serde_json::json;

use playvault_core::amount::TokenAmount;
use playvault_core::constants::{Network, STORAGE_DEPOSIT, SWAP_ATTACHED_DEPOSIT, SWAP_GAS};
use playvault_core::types::{AccountId, Action, ActionKind, FunctionCall, TokenInfo};

use crate::quote::SwapQuote;
use crate::slippage::SlippagePolicy;

/// Contracts and tolerance used when planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapSettings {
    pub wrap_contract: String,
    pub exchange_contract: String,
    pub slippage: SlippagePolicy,
}

impl SwapSettings {
    pub fn for_network(network: Network) -> Self {
        Self {
            wrap_contract: network.wrap_contract().to_string(),
            exchange_contract: network.exchange_contract().to_string(),
            slippage: SlippagePolicy::default(),
        }
    }

    pub fn with_slippage(mut self, slippage: SlippagePolicy) -> Self {
        self.slippage = slippage;
        self
    }

    /// Contract id the exchange knows a token by. The native asset trades
    /// in its wrapped form.
    pub fn exchange_token_id<'a>(&'a self, token: &'a TokenInfo) -> &'a str {
        if token.is_native() {
            &self.wrap_contract
        } else {
            &token.id
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    pub account_id: AccountId,
    pub token_in: TokenInfo,
    pub token_out: TokenInfo,
    pub amount_in: TokenAmount,
    pub expected_out: TokenAmount,
    pub minimum_receive: TokenAmount,
    pub quote_seq: u64,
    pub actions: Vec<Action>,
}

impl SwapPlan {
    pub fn kinds(&self) -> Vec<ActionKind> {
        self.actions.iter().map(Action::kind).collect()
    }

    pub fn has_wrap(&self) -> bool {
        self.actions.iter().any(|a| matches!(a, Action::Wrap { .. }))
    }

    pub fn has_unwrap(&self) -> bool {
        self.actions.iter().any(|a| matches!(a, Action::Unwrap { .. }))
    }

    pub fn has_registration(&self) -> bool {
        self.actions
            .iter()
            .any(|a| matches!(a, Action::RegisterAccount { .. }))
    }

    /// Native value the plan spends: wrapped input, storage deposits and
    /// deposits attached to calls. `None` on overflow.
    pub fn native_outlay(&self) -> Option<u128> {
        self.actions.iter().try_fold(0u128, |total, action| {
            let spent = match action {
                Action::Wrap { amount, .. } => *amount,
                Action::RegisterAccount { deposit, .. } => *deposit,
                Action::FunctionCall(call) => call.deposit_amount,
                Action::Unwrap { .. } => 0,
            };
            total.checked_add(spent)
        })
    }
}

/// Build the plan for `quote`. `needs_registration` is the result of the
/// storage check on the output token for `account_id`.
pub fn build_plan(
    quote: &SwapQuote,
    settings: &SwapSettings,
    account_id: &AccountId,
    needs_registration: bool,
) -> SwapPlan {
    let minimum_receive = settings.slippage.minimum_receive(quote.expected_out);
    let amount_in = quote.amount_in.minor();
    let mut actions = Vec::with_capacity(4);

    if quote.token_in.is_native() {
        actions.push(Action::Wrap {
            contract: settings.wrap_contract.clone(),
            amount: amount_in,
        });
    }

    if needs_registration {
        actions.push(Action::RegisterAccount {
            contract: quote.token_out.id.clone(),
            account_id: account_id.to_string(),
            deposit: STORAGE_DEPOSIT,
        });
    }

    let args = json!({
        "token_in": settings.exchange_token_id(&quote.token_in),
        "token_out": settings.exchange_token_id(&quote.token_out),
        "amount_in": amount_in.to_string(),
        "min_amount_out": minimum_receive.minor().to_string(),
    });
    actions.push(Action::FunctionCall(FunctionCall {
        contract: settings.exchange_contract.clone(),
        method: "swap".to_string(),
        args: args.to_string(),
        gas_budget: SWAP_GAS,
        deposit_amount: SWAP_ATTACHED_DEPOSIT,
    }));

    if quote.token_out.is_native() {
        actions.push(Action::Unwrap {
            contract: settings.wrap_contract.clone(),
            amount: minimum_receive.minor(),
        });
    }

    SwapPlan {
        account_id: account_id.clone(),
        token_in: quote.token_in.clone(),
        token_out: quote.token_out.clone(),
        amount_in: quote.amount_in,
        expected_out: quote.expected_out,
        minimum_receive,
        quote_seq: quote.seq,
        actions,
    }
}
