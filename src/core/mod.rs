//! Core modules for the issuance engine.
//!
//! This module contains the fundamental building blocks:
//! - Configuration and engine parameters
//! - Ledger collaborators (issued token and collateral movements)

pub mod config;
pub mod ledger;

pub use config::*;
pub use ledger::*;
