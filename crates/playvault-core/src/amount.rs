//! Fixed-point token amounts.
//!
//! On-chain values are integer minor units. Human-readable decimal strings
//! are converted by shifting the decimal point by the token's `decimals`
//! and truncating any extra fractional digits. Conversion never rounds up,
//! so a parsed amount can never exceed what the user typed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AmountError;

/// Largest supported decimals: `10^38` still fits in a `u128`.
pub const MAX_DECIMALS: u8 = 38;

/// `10^decimals`, or `None` if it does not fit in a `u128`.
pub fn pow10(decimals: u8) -> Option<u128> {
    10u128.checked_pow(decimals as u32)
}

/// A token amount in minor units together with the token's decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAmount {
    minor: u128,
    decimals: u8,
}

impl TokenAmount {
    /// Wrap a raw minor-unit value.
    pub const fn from_minor(minor: u128, decimals: u8) -> Self {
        Self { minor, decimals }
    }

    /// The zero amount for a token with `decimals`.
    pub const fn zero(decimals: u8) -> Self {
        Self { minor: 0, decimals }
    }

    /// Parse a human-readable decimal string such as `"1.5"` or `".25"`.
    ///
    /// Fractional digits beyond `decimals` are dropped (truncation). Signs,
    /// exponents, separators and whitespace inside the number are rejected.
    pub fn parse_human(text: &str, decimals: u8) -> Result<Self, AmountError> {
        if decimals > MAX_DECIMALS {
            return Err(AmountError::UnsupportedDecimals(decimals));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(AmountError::Invalid("empty amount".into()));
        }

        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i, f),
            None => (text, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(AmountError::Invalid(text.to_string()));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(AmountError::Invalid(text.to_string()));
        }

        let scale = pow10(decimals).ok_or(AmountError::UnsupportedDecimals(decimals))?;

        let mut whole: u128 = 0;
        for b in int_part.bytes() {
            whole = whole
                .checked_mul(10)
                .and_then(|v| v.checked_add((b - b'0') as u128))
                .ok_or(AmountError::Overflow)?;
        }

        let kept = &frac_part[..frac_part.len().min(decimals as usize)];
        let mut frac: u128 = 0;
        for b in kept.bytes() {
            frac = frac * 10 + (b - b'0') as u128;
        }
        // Right-pad the kept digits up to `decimals`.
        let pad = pow10(decimals - kept.len() as u8).ok_or(AmountError::Overflow)?;
        frac = frac.checked_mul(pad).ok_or(AmountError::Overflow)?;

        let minor = whole
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac))
            .ok_or(AmountError::Overflow)?;

        Ok(Self { minor, decimals })
    }

    /// Raw minor-unit value.
    pub fn minor(&self) -> u128 {
        self.minor
    }

    /// Number of decimals of the token.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Add two amounts of the same token.
    pub fn checked_add(&self, other: &Self) -> Result<Self, AmountError> {
        self.same_decimals(other)?;
        let minor = self
            .minor
            .checked_add(other.minor)
            .ok_or(AmountError::Overflow)?;
        Ok(Self::from_minor(minor, self.decimals))
    }

    /// Subtract `other` from `self`, failing on underflow.
    pub fn checked_sub(&self, other: &Self) -> Result<Self, AmountError> {
        self.same_decimals(other)?;
        let minor = self
            .minor
            .checked_sub(other.minor)
            .ok_or(AmountError::Overflow)?;
        Ok(Self::from_minor(minor, self.decimals))
    }

    /// Human-readable form with trailing fractional zeros removed.
    pub fn to_human_string(&self) -> String {
        let Some(scale) = pow10(self.decimals) else {
            return self.minor.to_string();
        };
        let whole = self.minor / scale;
        let frac = self.minor % scale;
        if frac == 0 {
            return whole.to_string();
        }
        let digits = format!("{frac:0width$}", width = self.decimals as usize);
        format!("{whole}.{}", digits.trim_end_matches('0'))
    }

    fn same_decimals(&self, other: &Self) -> Result<(), AmountError> {
        if self.decimals != other.decimals {
            return Err(AmountError::DecimalsMismatch {
                left: self.decimals,
                right: other.decimals,
            });
        }
        Ok(())
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_human_string())
    }
}
