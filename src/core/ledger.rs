//! Ledger collaborators.
//!
//! The controller never stores balances itself. It drives two external
//! collaborators through narrow traits:
//! - [`Ledger`]: the issued token (6 decimals); mint/burn restricted to
//!   holders of the `Controller` role
//! - [`CollateralTransfer`]: movements of the collateral asset (18 decimals)
//!   into and out of one holder's account
//!
//! In-memory implementations are provided for tests, simulations and the CLI.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::access::{AccessControl, Role};
use crate::error::Error;
use crate::utils::constants::PRICE_DECIMALS;
use crate::utils::crypto::{Address, Hash};

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors raised by ledger collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Caller may not mint or burn
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Balance too low for burn or transfer
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount requested
        required: u128,
        /// Balance held
        available: u128,
    },

    /// Zero amount
    #[error("amount cannot be zero")]
    ZeroAmount,

    /// Balance or supply overflow
    #[error("overflow in {0}")]
    Overflow(&'static str),
}

impl From<LedgerError> for Error {
    fn from(err: LedgerError) -> Self {
        Error::Ledger(err.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRAITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Issued-token ledger
pub trait Ledger: Send + Sync {
    /// Mint `amount` to `to`; `controller` must hold the Controller role
    fn mint(&self, controller: &Address, to: &Address, amount: u128) -> Result<(), LedgerError>;

    /// Burn `amount` from `from`; `controller` must hold the Controller role
    fn burn(&self, controller: &Address, from: &Address, amount: u128) -> Result<(), LedgerError>;

    /// Move `amount` from `from` to `to`
    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError>;

    /// Balance of `owner`
    fn balance_of(&self, owner: &Address) -> u128;

    /// Total supply
    fn total_supply(&self) -> u128;
}

/// Collateral movements for a fixed holder
pub trait CollateralTransfer: Send + Sync {
    /// Pay `amount` of collateral to `to`
    fn send(&self, to: &Address, amount: u128) -> Result<(), LedgerError>;

    /// Pull `amount` of collateral from `from` into the holder's account
    fn receive(&self, from: &Address, amount: u128) -> Result<(), LedgerError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// BALANCE BOOK
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
struct BalanceBook {
    total: u128,
    balances: HashMap<Address, u128>,
}

impl BalanceBook {
    fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn credit(&mut self, to: &Address, amount: u128) -> Result<(), LedgerError> {
        let total = self.total.checked_add(amount).ok_or(LedgerError::Overflow("total"))?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("balance"))?;
        self.balances.insert(*to, balance);
        self.total = total;
        Ok(())
    }

    fn debit(&mut self, from: &Address, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(from);
        } else {
            self.balances.insert(*from, remaining);
        }
        self.total -= amount;
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        if from == to {
            return Ok(());
        }
        // Debit first so a failed credit cannot create supply
        self.debit(from, amount)?;
        if let Err(e) = self.credit(to, amount) {
            self.credit(from, amount)?;
            return Err(e);
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory issued-token ledger
pub struct TokenLedger {
    /// Token symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u32,
    roles: Arc<dyn AccessControl>,
    book: RwLock<BalanceBook>,
}

impl TokenLedger {
    /// Create an empty ledger; mint/burn callers are checked against `roles`
    pub fn new(symbol: impl Into<String>, roles: Arc<dyn AccessControl>) -> Self {
        Self {
            symbol: symbol.into(),
            decimals: PRICE_DECIMALS,
            roles,
            book: RwLock::new(BalanceBook::default()),
        }
    }

    /// Number of non-zero holders
    pub fn holder_count(&self) -> usize {
        self.read_book().balances.len()
    }

    /// Verify supply invariant (total supply == sum of all balances)
    pub fn verify_supply_invariant(&self) -> bool {
        let book = self.read_book();
        book.balances.values().sum::<u128>() == book.total
    }

    /// Deterministic hash of supply and balances
    pub fn state_hash(&self) -> Hash {
        let book = self.read_book();
        let mut data = Vec::new();
        data.extend_from_slice(&book.total.to_be_bytes());

        let mut sorted: Vec<_> = book.balances.iter().collect();
        sorted.sort_by_key(|(k, _)| **k);
        for (owner, balance) in sorted {
            data.extend_from_slice(owner.as_bytes());
            data.extend_from_slice(&balance.to_be_bytes());
        }
        Hash::sha256(&data)
    }

    fn require_controller(&self, controller: &Address) -> Result<(), LedgerError> {
        if self.roles.has_role(controller, Role::Controller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized(format!(
                "{} is not a {} controller",
                controller.short(),
                self.symbol
            )))
        }
    }

    fn read_book(&self) -> std::sync::RwLockReadGuard<'_, BalanceBook> {
        self.book.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_book(&self) -> std::sync::RwLockWriteGuard<'_, BalanceBook> {
        self.book.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Ledger for TokenLedger {
    fn mint(&self, controller: &Address, to: &Address, amount: u128) -> Result<(), LedgerError> {
        self.require_controller(controller)?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        self.write_book().credit(to, amount)
    }

    fn burn(&self, controller: &Address, from: &Address, amount: u128) -> Result<(), LedgerError> {
        self.require_controller(controller)?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        self.write_book().debit(from, amount)
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError> {
        self.write_book().transfer(from, to, amount)
    }

    fn balance_of(&self, owner: &Address) -> u128 {
        self.read_book().balance_of(owner)
    }

    fn total_supply(&self) -> u128 {
        self.read_book().total
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL BANK
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory balances of the collateral asset
#[derive(Debug, Default)]
pub struct CollateralBank {
    book: RwLock<BalanceBook>,
}

impl CollateralBank {
    /// Create an empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `owner` out of thin air (deposits, test funding)
    pub fn credit(&self, owner: &Address, amount: u128) {
        let mut book = self.book.write().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = book.credit(owner, amount) {
            tracing::warn!(owner = %owner.short(), amount, error = %e, "collateral credit ignored");
        }
    }

    /// Move collateral between holders
    pub fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError> {
        self.book
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .transfer(from, to, amount)
    }

    /// Balance of `owner`
    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.book
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .balance_of(owner)
    }

    /// Transfer handle paying out of and into `owner`
    pub fn account(self: &Arc<Self>, owner: Address) -> BankAccount {
        BankAccount {
            bank: Arc::clone(self),
            owner,
        }
    }
}

/// [`CollateralTransfer`] handle bound to one holder of a [`CollateralBank`]
#[derive(Debug, Clone)]
pub struct BankAccount {
    bank: Arc<CollateralBank>,
    owner: Address,
}

impl BankAccount {
    /// Holder paying out of this account
    pub fn owner(&self) -> Address {
        self.owner
    }
}

impl CollateralTransfer for BankAccount {
    fn send(&self, to: &Address, amount: u128) -> Result<(), LedgerError> {
        self.bank.transfer(&self.owner, to, amount)
    }

    fn receive(&self, from: &Address, amount: u128) -> Result<(), LedgerError> {
        self.bank.transfer(from, &self.owner, amount)
    }
}
