//! Token custody
//!
//! Transfers are external ledger effects: each call either fully applies or
//! fails leaving balances untouched. The incentive manager escrows incentive
//! funding on creation and pays rewards (and refunds) back out of escrow.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use super::{AccountId, TokenId};

/// Errors surfaced by the custody layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The paying account lacks funds.
    #[error("account {account} holds {held} of token {token}, needs {needed}")]
    InsufficientFunds {
        /// Account being debited.
        account: AccountId,
        /// Token being moved.
        token: TokenId,
        /// Balance actually held.
        held: u128,
        /// Amount the debit required.
        needed: u128,
    },

    /// Escrow does not cover the requested payout.
    #[error("escrow holds {held} of token {token}, payout needs {needed}")]
    EscrowShortfall {
        /// Token being paid out.
        token: TokenId,
        /// Amount escrowed.
        held: u128,
        /// Amount the payout required.
        needed: u128,
    },

    /// A balance would exceed the value-type range.
    #[error("balance overflow crediting {amount} of token {token} to account {account}")]
    BalanceOverflow {
        /// Account being credited.
        account: AccountId,
        /// Token being moved.
        token: TokenId,
        /// Amount being credited.
        amount: u128,
    },
}

/// Token custody effects, atomic per call.
pub trait TokenLedger: fmt::Debug {
    /// Move `amount` of `token` from `from` into escrow.
    fn collect(&mut self, token: TokenId, from: AccountId, amount: u128)
        -> Result<(), LedgerError>;

    /// Pay `amount` of `token` out of escrow to `to`.
    fn pay_out(&mut self, token: TokenId, to: AccountId, amount: u128) -> Result<(), LedgerError>;
}

/// In-memory ledger with an explicit escrow bucket per token.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    balances: HashMap<(AccountId, TokenId), u128>,
    escrow: HashMap<TokenId, u128>,
}

impl MemoryLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `token` to `account` out of thin air.
    pub fn mint(&mut self, account: AccountId, token: TokenId, amount: u128) {
        *self.balances.entry((account, token)).or_default() += amount;
    }

    /// Current balance of `account` in `token`.
    pub fn balance_of(&self, account: AccountId, token: TokenId) -> u128 {
        self.balances.get(&(account, token)).copied().unwrap_or(0)
    }

    /// Amount of `token` currently escrowed.
    pub fn escrowed(&self, token: TokenId) -> u128 {
        self.escrow.get(&token).copied().unwrap_or(0)
    }
}

impl TokenLedger for MemoryLedger {
    fn collect(
        &mut self,
        token: TokenId,
        from: AccountId,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let held = self.balance_of(from, token);
        if held < amount {
            return Err(LedgerError::InsufficientFunds {
                account: from,
                token,
                held,
                needed: amount,
            });
        }
        let escrowed = self.escrowed(token);
        let escrowed = escrowed
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow {
                account: from,
                token,
                amount,
            })?;
        self.balances.insert((from, token), held - amount);
        self.escrow.insert(token, escrowed);
        Ok(())
    }

    fn pay_out(&mut self, token: TokenId, to: AccountId, amount: u128) -> Result<(), LedgerError> {
        let held = self.escrowed(token);
        if held < amount {
            return Err(LedgerError::EscrowShortfall {
                token,
                held,
                needed: amount,
            });
        }
        let balance = self.balance_of(to, token);
        let balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow {
                account: to,
                token,
                amount,
            })?;
        self.escrow.insert(token, held - amount);
        self.balances.insert((to, token), balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_and_pay_out_round_trip() {
        let mut ledger = MemoryLedger::new();
        ledger.mint(1, 7, 100);

        ledger.collect(7, 1, 60).unwrap();
        assert_eq!(ledger.balance_of(1, 7), 40);
        assert_eq!(ledger.escrowed(7), 60);

        ledger.pay_out(7, 2, 25).unwrap();
        assert_eq!(ledger.balance_of(2, 7), 25);
        assert_eq!(ledger.escrowed(7), 35);
    }

    #[test]
    fn failed_transfers_change_nothing() {
        let mut ledger = MemoryLedger::new();
        ledger.mint(1, 7, 10);

        let err = ledger.collect(7, 1, 11).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                account: 1,
                token: 7,
                held: 10,
                needed: 11
            }
        );
        assert_eq!(ledger.balance_of(1, 7), 10);

        let err = ledger.pay_out(7, 2, 1).unwrap_err();
        assert!(matches!(err, LedgerError::EscrowShortfall { .. }));
        assert_eq!(ledger.balance_of(2, 7), 0);
    }
}
