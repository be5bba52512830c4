//! Utility modules for the issuance engine.
//!
//! This module contains shared utilities used across the engine:
//! - Identities and hashing
//! - Fixed-point arithmetic
//! - Validation helpers
//! - Clocks and reentrancy guards
//! - Constants

pub mod constants;
pub mod crypto;
pub mod guard;
pub mod math;
pub mod time;
pub mod validation;

pub use constants::*;
pub use crypto::*;
pub use guard::*;
pub use math::*;
pub use time::*;
pub use validation::*;
