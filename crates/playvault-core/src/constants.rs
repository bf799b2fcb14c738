//! Protocol constants. On-chain amounts are integer minor units
//! (1 NEAR = 10^24 yoctoNEAR).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Token id used for the chain's native asset in quotes and plans.
pub const NATIVE_TOKEN_ID: &str = "near";

/// Decimals of the native asset and of its wrapped representation.
pub const NATIVE_DECIMALS: u8 = 24;

/// Denominator for basis-point arithmetic.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Upper bound for a slippage tolerance (100%).
pub const MAX_SLIPPAGE_BPS: u32 = BPS_DENOMINATOR;

/// Slippage applied when the caller does not configure one (0.5%).
pub const DEFAULT_SLIPPAGE_BPS: u32 = 50;

/// Length of an ed25519 signing seed.
pub const SEED_LEN: usize = 32;

/// Length of the envelope data key (AES-256).
pub const DATA_KEY_LEN: usize = 32;

/// AES-GCM nonce length.
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length.
pub const AUTH_TAG_LEN: usize = 16;

/// Prefix used in the textual form of public keys.
pub const PUBLIC_KEY_PREFIX: &str = "ed25519:";

/// One teragas.
pub const TGAS: u64 = 1_000_000_000_000;

/// Gas attached to the swap call.
pub const SWAP_GAS: u64 = 180 * TGAS;

/// Gas attached to wrap and unwrap calls.
pub const WRAP_GAS: u64 = 10 * TGAS;

/// Gas attached to storage registration.
pub const REGISTER_GAS: u64 = 30 * TGAS;

/// Storage deposit for registering an account on a fungible token contract
/// (0.00125 NEAR).
pub const STORAGE_DEPOSIT: u128 = 1_250_000_000_000_000_000_000;

/// Deposit attached to the swap call (1 yoctoNEAR). The traded amount
/// travels in the call arguments, never as attached native value.
pub const SWAP_ATTACHED_DEPOSIT: u128 = 1;

/// Default lifetime of a provisioned wallet record (30 days).
pub const DEFAULT_WALLET_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Network a wallet record belongs to.
///
/// # Examples
///
/// ```
/// use playvault_core::constants::Network;
/// assert_eq!(Network::default(), Network::Mainnet);
/// assert_eq!(Network::Testnet.wrap_contract(), "wrap.testnet");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Contract holding the fungible-token form of the native asset.
    pub fn wrap_contract(&self) -> &'static str {
        match self {
            Self::Mainnet => "wrap.near",
            Self::Testnet => "wrap.testnet",
        }
    }

    /// Default exchange contract that executes swaps.
    pub fn exchange_contract(&self) -> &'static str {
        match self {
            Self::Mainnet => "v2.ref-finance.near",
            Self::Testnet => "ref-finance-101.testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}
