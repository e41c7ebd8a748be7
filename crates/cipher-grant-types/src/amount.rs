//! ETH-denominated amounts.
//!
//! Budgets, membership fees and disbursements are all `Amount`s, held as
//! integer wei so sums and differences are exact. ETH decimals only appear
//! when parsing user input and when printing.

use crate::error::TypesError;
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

/// Wei in one ETH.
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Decimal places of ETH.
pub const ETH_DECIMALS: usize = 18;

/// A non-negative ETH quantity in wei.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);
    /// Width of the fixed big-endian encoding used by [`Amount::to_be_bytes`].
    pub const ENCODED_LEN: usize = 16;

    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    /// Whole ETH.
    pub const fn from_eth(eth: u128) -> Self {
        Self(eth.saturating_mul(WEI_PER_ETH))
    }

    /// Thousandths of an ETH, as fee tables are written.
    pub const fn from_milli_eth(milli: u128) -> Self {
        Self(milli.saturating_mul(WEI_PER_ETH / 1_000))
    }

    pub const fn wei(&self) -> u128 {
        self.0
    }

    /// Convert a float ETH value through its shortest decimal form, so `0.3`
    /// becomes exactly 0.3 ETH. Negative and non-finite values are rejected.
    pub fn from_eth_f64(value: f64) -> Result<Self, TypesError> {
        if !value.is_finite() {
            return Err(TypesError::InvalidAmount(format!("{} is not finite", value)));
        }
        if value < 0.0 {
            return Err(TypesError::InvalidAmount(format!("{} is negative", value)));
        }
        if value == 0.0 {
            return Ok(Self::ZERO);
        }
        value.to_string().parse()
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Result<Amount, TypesError> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or(TypesError::AmountOverflow)
    }

    pub fn checked_sub(self, other: Amount) -> Result<Amount, TypesError> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or(TypesError::AmountUnderflow)
    }

    /// Difference that bottoms out at zero.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    pub fn to_be_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }
}

impl Add for Amount {
    type Output = Amount;

    /// Saturates at `u128::MAX` wei; use [`Amount::checked_add`] where overflow matters.
    fn add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }
}

impl TryFrom<f64> for Amount {
    type Error = TypesError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Amount::from_eth_f64(value)
    }
}

/// Exact ETH decimal without trailing zeros, e.g. `2.5` or `0.000000000000000001`.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / WEI_PER_ETH;
        let frac = self.0 % WEI_PER_ETH;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", frac, width = ETH_DECIMALS);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({} ETH)", self)
    }
}

/// Parses decimal ETH with up to 18 fractional digits, optionally suffixed
/// with `ETH`.
impl FromStr for Amount {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed
            .strip_suffix("ETH")
            .or_else(|| trimmed.strip_suffix("eth"))
            .unwrap_or(trimmed)
            .trim();

        if number.starts_with('-') {
            return Err(TypesError::InvalidAmount(format!("{} is negative", number)));
        }
        let number = number.strip_prefix('+').unwrap_or(number);
        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));

        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !is_digits(whole) || !is_digits(frac) {
            return Err(TypesError::InvalidAmount(format!(
                "{:?} is not a decimal ETH amount",
                s
            )));
        }
        if frac.len() > ETH_DECIMALS {
            return Err(TypesError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                number, ETH_DECIMALS
            )));
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| TypesError::AmountOverflow)?
        };
        let frac_wei: u128 = if frac.is_empty() {
            0
        } else {
            let scale = 10u128.pow((ETH_DECIMALS - frac.len()) as u32);
            frac.parse::<u128>().map_err(|_| TypesError::AmountOverflow)? * scale
        };

        whole
            .checked_mul(WEI_PER_ETH)
            .and_then(|wei| wei.checked_add(frac_wei))
            .map(Amount)
            .ok_or(TypesError::AmountOverflow)
    }
}
