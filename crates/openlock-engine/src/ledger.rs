//! Escrow ledger boundary.
//!
//! The engine never moves value itself. It asks a [`Ledger`] to move coins
//! from an owner into the module-owned escrow pool (`escrow`) and back out
//! again (`release`). Both directions must be all-or-nothing across every
//! denomination in the request.
//!
//! [`InMemoryLedger`] is the reference implementation used by tests and by
//! hosts that keep balances in process.

use std::collections::{BTreeMap, HashMap};

use openlock_types::{AccountId, Coin, Coins, Denom, LockupError, Result};
use rust_decimal::Decimal;

/// Moves value between accounts and the escrow pool.
pub trait Ledger {
    /// Move `coins` from `from` into the escrow pool.
    ///
    /// # Errors
    /// `InsufficientBalance` if `from` cannot cover any denomination.
    /// Nothing moves on error.
    fn escrow(&mut self, from: AccountId, coins: &Coins) -> Result<()>;

    /// Move `coins` from the escrow pool to `to`.
    ///
    /// # Errors
    /// `InsufficientPool` if the pool cannot cover any denomination.
    /// Nothing moves on error.
    fn release(&mut self, to: AccountId, coins: &Coins) -> Result<()>;

    /// Escrow pool holdings of one denomination.
    fn pool_balance(&self, denom: &str) -> Decimal;

    /// Every non-zero escrow pool holding.
    fn pool_balances(&self) -> Coins;
}

/// Per-(account, denom) balances plus a single escrow pool.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    accounts: HashMap<(AccountId, Denom), Decimal>,
    pool: BTreeMap<Denom, Decimal>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account from outside the system.
    pub fn deposit(&mut self, account: AccountId, denom: &str, amount: Decimal) {
        *self
            .accounts
            .entry((account, denom.to_string()))
            .or_insert(Decimal::ZERO) += amount;
    }

    /// Credit the escrow pool directly. Used when importing a snapshot whose
    /// locks were funded elsewhere.
    pub fn fund_pool(&mut self, denom: &str, amount: Decimal) {
        *self.pool.entry(denom.to_string()).or_insert(Decimal::ZERO) += amount;
    }

    /// Spendable balance of `account` in `denom`.
    #[must_use]
    pub fn balance(&self, account: AccountId, denom: &str) -> Decimal {
        self.accounts
            .get(&(account, denom.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Total supply of a denomination: every account plus the pool.
    #[must_use]
    pub fn total_supply(&self, denom: &str) -> Decimal {
        let held: Decimal = self
            .accounts
            .iter()
            .filter(|((_, d), _)| d == denom)
            .map(|(_, amount)| *amount)
            .sum();
        held + self.pool_balance(denom)
    }
}

impl Ledger for InMemoryLedger {
    fn escrow(&mut self, from: AccountId, coins: &Coins) -> Result<()> {
        // Check every denomination before touching any.
        for (denom, amount) in coins {
            let available = self.balance(from, denom);
            if available < *amount {
                return Err(LockupError::InsufficientBalance {
                    denom: denom.clone(),
                    needed: *amount,
                    available,
                });
            }
        }

        for (denom, amount) in coins {
            if let Some(slot) = self.accounts.get_mut(&(from, denom.clone())) {
                *slot -= *amount;
            }
            *self.pool.entry(denom.clone()).or_insert(Decimal::ZERO) += *amount;
        }
        Ok(())
    }

    fn release(&mut self, to: AccountId, coins: &Coins) -> Result<()> {
        for (denom, amount) in coins {
            let available = self.pool_balance(denom);
            if available < *amount {
                return Err(LockupError::InsufficientPool {
                    denom: denom.clone(),
                    needed: *amount,
                    available,
                });
            }
        }

        for (denom, amount) in coins {
            if let Some(slot) = self.pool.get_mut(denom) {
                *slot -= *amount;
            }
            self.deposit(to, denom, *amount);
        }
        Ok(())
    }

    fn pool_balance(&self, denom: &str) -> Decimal {
        self.pool.get(denom).copied().unwrap_or(Decimal::ZERO)
    }

    fn pool_balances(&self) -> Coins {
        self.pool
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(denom, amount)| Coin::new(denom.clone(), *amount))
            .collect()
    }
}
