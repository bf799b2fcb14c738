//! Slippage tolerance in basis points.

use serde::{Deserialize, Serialize};

use playvault_core::amount::TokenAmount;
use playvault_core::constants::{BPS_DENOMINATOR, DEFAULT_SLIPPAGE_BPS, MAX_SLIPPAGE_BPS};

use crate::error::SwapError;

/// Tolerance between the quoted output and the least the swap may return.
///
/// # Examples
///
/// ```
/// use playvault_core::amount::TokenAmount;
/// use playvault_swap::slippage::SlippagePolicy;
///
/// let policy = SlippagePolicy::new(50).unwrap();
/// let expected = TokenAmount::parse_human("100", 6).unwrap();
/// assert_eq!(policy.minimum_receive(expected).to_human_string(), "99.5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SlippagePolicy {
    bps: u32,
}

impl SlippagePolicy {
    /// `bps` must be within `0..=10000`.
    pub fn new(bps: u32) -> Result<Self, SwapError> {
        if bps > MAX_SLIPPAGE_BPS {
            return Err(SwapError::InvalidSlippage(bps));
        }
        Ok(Self { bps })
    }

    pub fn bps(&self) -> u32 {
        self.bps
    }

    /// `floor(expected * (10000 - bps) / 10000)`, computed without overflow.
    pub fn minimum_receive(&self, expected: TokenAmount) -> TokenAmount {
        let denom = BPS_DENOMINATOR as u128;
        let keep = (BPS_DENOMINATOR - self.bps) as u128;
        let minor = expected.minor();
        let floored = minor / denom * keep + minor % denom * keep / denom;
        TokenAmount::from_minor(floored, expected.decimals())
    }
}

impl Default for SlippagePolicy {
    fn default() -> Self {
        Self {
            bps: DEFAULT_SLIPPAGE_BPS,
        }
    }
}

impl TryFrom<u32> for SlippagePolicy {
    type Error = SwapError;

    fn try_from(bps: u32) -> Result<Self, Self::Error> {
        Self::new(bps)
    }
}

impl From<SlippagePolicy> for u32 {
    fn from(policy: SlippagePolicy) -> Self {
        policy.bps
    }
}
