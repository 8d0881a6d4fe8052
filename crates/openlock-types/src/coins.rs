//! Coin amounts held in escrow by locks.
//!
//! A [`Coins`] value is a multiset of `(denomination, amount)` pairs kept in
//! denomination order, so iteration (and everything derived from it) is
//! deterministic. Amounts are non-negative integers carried as [`Decimal`].
//!
//! `Decimal` holds at most 96 bits of mantissa (about 7.9e28). A
//! denomination with 18 decimal places therefore tops out near 79 billion
//! whole tokens per amount or bucket total; sums past that report
//! `AmountOverflow` rather than wrapping.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Denom, LockupError, Result};

/// A single `(denomination, amount)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: Denom,
    pub amount: Decimal,
}

impl Coin {
    #[must_use]
    pub fn new(denom: impl Into<Denom>, amount: impl Into<Decimal>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }

    /// Positive whole amount with a non-empty denomination.
    pub fn validate(&self) -> Result<()> {
        if self.denom.is_empty() {
            return Err(LockupError::InvalidCoins {
                reason: "empty denomination".into(),
            });
        }
        if self.amount <= Decimal::ZERO || !self.amount.fract().is_zero() {
            return Err(LockupError::InvalidCoins {
                reason: format!(
                    "{} must be a positive whole amount, got {}",
                    self.denom, self.amount
                ),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Per-denomination amounts, sorted by denomination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(BTreeMap<Denom, Decimal>);

impl Coins {
    /// Empty coin set.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct denominations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Amount of `denom` held, zero if absent.
    #[must_use]
    pub fn amount_of(&self, denom: &str) -> Decimal {
        self.0.get(denom).copied().unwrap_or(Decimal::ZERO)
    }

    /// Whether any amount of `denom` is held.
    #[must_use]
    pub fn contains(&self, denom: &str) -> bool {
        self.0.contains_key(denom)
    }

    /// Iterate `(denom, amount)` pairs in denomination order.
    pub fn iter(&self) -> impl Iterator<Item = (&Denom, &Decimal)> {
        self.0.iter()
    }

    /// Denominations held, in order.
    pub fn denoms(&self) -> impl Iterator<Item = &Denom> {
        self.0.keys()
    }

    /// Non-empty, and every amount a positive whole number.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(LockupError::InvalidCoins {
                reason: "no coins supplied".into(),
            });
        }
        for (denom, amount) in &self.0 {
            Coin::new(denom.clone(), *amount).validate()?;
        }
        Ok(())
    }

    /// `self + other`, or `AmountOverflow` naming the first denomination
    /// that does not fit.
    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        let mut sum = self.0.clone();
        for (denom, amount) in &other.0 {
            let slot = sum.entry(denom.clone()).or_insert(Decimal::ZERO);
            *slot = slot
                .checked_add(*amount)
                .ok_or_else(|| LockupError::AmountOverflow {
                    denom: denom.clone(),
                })?;
        }
        Ok(Self(sum))
    }

    /// Sum `coins`, merging repeated denominations.
    ///
    /// # Errors
    /// `AmountOverflow` naming the first denomination whose total does not
    /// fit.
    pub fn try_sum(coins: impl IntoIterator<Item = Coin>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for coin in coins {
            let slot = map.entry(coin.denom.clone()).or_insert(Decimal::ZERO);
            *slot = slot
                .checked_add(coin.amount)
                .ok_or(LockupError::AmountOverflow { denom: coin.denom })?;
        }
        Ok(Self(map))
    }

    /// `self - other`, dropping denominations that reach zero. `None` if
    /// `other` is not contained in `self`.
    #[must_use]
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        if !other.is_all_lte(self) {
            return None;
        }
        let mut rest = self.0.clone();
        for (denom, amount) in &other.0 {
            if let Some(slot) = rest.get_mut(denom) {
                *slot -= *amount;
                if slot.is_zero() {
                    rest.remove(denom);
                }
            }
        }
        Some(Self(rest))
    }

    /// Every amount in `self` is `<=` the same denomination in `other`.
    #[must_use]
    pub fn is_all_lte(&self, other: &Self) -> bool {
        self.0
            .iter()
            .all(|(denom, amount)| *amount <= other.amount_of(denom))
    }
}

impl From<Coin> for Coins {
    fn from(coin: Coin) -> Self {
        Self(BTreeMap::from([(coin.denom, coin.amount)]))
    }
}

/// Collects coins, summing repeated denominations. Meant for sources with
/// distinct denominations; a repeated denomination whose total exceeds
/// `Decimal::MAX` is capped there. Use [`Coins::try_sum`] when totals must
/// be exact.
impl FromIterator<Coin> for Coins {
    fn from_iter<I: IntoIterator<Item = Coin>>(iter: I) -> Self {
        let mut map = BTreeMap::new();
        for coin in iter {
            let slot = map.entry(coin.denom).or_insert(Decimal::ZERO);
            *slot = slot.saturating_add(coin.amount);
        }
        Self(map)
    }
}

impl<'a> IntoIterator for &'a Coins {
    type Item = (&'a Denom, &'a Decimal);
    type IntoIter = std::collections::btree_map::Iter<'a, Denom, Decimal>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (denom, amount)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{amount}{denom}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(pairs: &[(&str, i64)]) -> Coins {
        pairs
            .iter()
            .map(|(d, a)| Coin::new(*d, Decimal::new(*a, 0)))
            .collect()
    }

    #[test]
    fn collect_sums_duplicates() {
        let c = coins(&[("udym", 10), ("uatom", 5), ("udym", 15)]);
        assert_eq!(c.len(), 2);
        assert_eq!(c.amount_of("udym"), Decimal::new(25, 0));
        assert_eq!(c.to_string(), "5uatom,25udym");
    }

    #[test]
    fn validate_rejects_bad_amounts() {
        assert!(Coins::new().validate().is_err());
        assert!(coins(&[("udym", 0)]).validate().is_err());
        assert!(coins(&[("udym", -3)]).validate().is_err());
        let fractional: Coins = std::iter::once(Coin::new("udym", Decimal::new(15, 1))).collect();
        assert!(fractional.validate().is_err());
        assert!(coins(&[("", 1)]).validate().is_err());
        assert!(coins(&[("udym", 1), ("uatom", 2)]).validate().is_ok());
    }

    #[test]
    fn checked_sub_drops_zero_entries() {
        let held = coins(&[("udym", 100), ("uatom", 50)]);
        let rest = held.checked_sub(&coins(&[("uatom", 50)])).unwrap();
        assert_eq!(rest, coins(&[("udym", 100)]));
        assert!(!rest.contains("uatom"));
    }

    #[test]
    fn checked_sub_rejects_excess_and_foreign_denoms() {
        let held = coins(&[("udym", 100)]);
        assert!(held.checked_sub(&coins(&[("udym", 101)])).is_none());
        assert!(held.checked_sub(&coins(&[("uatom", 1)])).is_none());
    }

    #[test]
    fn is_all_lte_compares_per_denom() {
        let big = coins(&[("udym", 100), ("uatom", 50)]);
        assert!(coins(&[("udym", 60)]).is_all_lte(&big));
        assert!(big.is_all_lte(&big));
        assert!(!coins(&[("uosmo", 1)]).is_all_lte(&big));
        assert!(Coins::new().is_all_lte(&big));
    }

    #[test]
    fn checked_add_overflow() {
        let max = coins(&[("udym", 1)]);
        let huge: Coins = std::iter::once(Coin::new("udym", Decimal::MAX)).collect();
        let err = huge.checked_add(&max).unwrap_err();
        assert!(matches!(err, LockupError::AmountOverflow { .. }));
    }

    #[test]
    fn try_sum_reports_overflow() {
        let sum = Coins::try_sum([Coin::new("udym", 7), Coin::new("uatom", 1), Coin::new("udym", 3)])
            .unwrap();
        assert_eq!(sum, coins(&[("udym", 10), ("uatom", 1)]));

        let err = Coins::try_sum([Coin::new("udym", Decimal::MAX), Coin::new("udym", 1)])
            .unwrap_err();
        assert!(matches!(err, LockupError::AmountOverflow { denom } if denom == "udym"));
    }

    #[test]
    fn serde_roundtrip() {
        let c = coins(&[("udym", 100), ("uatom", 7)]);
        let json = serde_json::to_string(&c).unwrap();
        let back: Coins = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
