//! One accumulation tree per denomination.
//!
//! Trees are created on the first increase for a denomination and dropped
//! again once they empty out, so two indices holding the same entries are
//! structurally identical regardless of history.

use std::collections::BTreeMap;
use std::time::Duration;

use openlock_types::{Denom, LockupError, Result};
use rust_decimal::Decimal;

use crate::tree::AccumulationTree;

/// All per-denomination accumulation trees.
#[derive(Debug, Clone, Default)]
pub struct AccumulationIndex {
    trees: BTreeMap<Denom, AccumulationTree>,
}

impl AccumulationIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            trees: BTreeMap::new(),
        }
    }

    /// Add `amount` of `denom` at `duration`.
    pub fn increase(&mut self, denom: &str, duration: Duration, amount: Decimal) -> Result<()> {
        let tree = self
            .trees
            .entry(denom.to_string())
            .or_insert_with(|| AccumulationTree::new(denom));
        let result = tree.increase(duration, amount);
        if tree.is_empty() {
            self.trees.remove(denom);
        }
        result?;
        tracing::debug!(denom, ?duration, %amount, "Accumulation increased");
        Ok(())
    }

    /// Remove `amount` of `denom` from `duration`.
    ///
    /// # Errors
    /// `AccumulationUnderflow` (fatal) if more is removed than was added.
    pub fn decrease(&mut self, denom: &str, duration: Duration, amount: Decimal) -> Result<()> {
        let result = match self.trees.get_mut(denom) {
            Some(tree) => tree.decrease(duration, amount).map(|()| tree.is_empty()),
            None if amount.is_zero() => Ok(false),
            None => Err(LockupError::AccumulationUnderflow {
                denom: denom.to_string(),
                duration,
                stored: Decimal::ZERO,
                requested: amount,
            }),
        };
        match result {
            Ok(emptied) => {
                if emptied {
                    self.trees.remove(denom);
                }
                tracing::debug!(denom, ?duration, %amount, "Accumulation decreased");
                Ok(())
            }
            Err(err) => {
                tracing::error!(denom, ?duration, %amount, error = %err, "Accumulation underflow");
                Err(err)
            }
        }
    }

    /// Total `denom` locked for at least `duration`.
    #[must_use]
    pub fn suffix_sum(&self, denom: &str, duration: Duration) -> Decimal {
        self.trees
            .get(denom)
            .map_or(Decimal::ZERO, |t| t.suffix_sum(duration))
    }

    /// Total `denom` across every duration.
    #[must_use]
    pub fn total(&self, denom: &str) -> Decimal {
        self.trees.get(denom).map_or(Decimal::ZERO, AccumulationTree::total)
    }

    #[must_use]
    pub fn tree(&self, denom: &str) -> Option<&AccumulationTree> {
        self.trees.get(denom)
    }

    /// Denominations with a non-empty tree, in order.
    pub fn denoms(&self) -> impl Iterator<Item = &Denom> {
        self.trees.keys()
    }

    /// Trees in denomination order.
    pub fn trees(&self) -> impl Iterator<Item = &AccumulationTree> {
        self.trees.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Drop every tree.
    pub fn clear(&mut self) {
        self.trees.clear();
    }
}
