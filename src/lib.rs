//! # Issuance Engine
//!
//! A controlled issuance engine: mints and redeems a 6-decimal stable-value
//! token against an 18-decimal collateral asset at an oracle price, subject
//! to rate limiting, price-move circuit breakers, reserve sufficiency,
//! per-issuer and global daily caps, and a timelocked procedure for
//! replacing the oracle.
//!
//! ## Architecture
//!
//! - **Oracle**: the `PriceOracle` contract with a configurable and a
//!   feed-backed implementation
//! - **Registry**: issuers and their rolling daily allowances
//! - **Protocol**: the `IssuanceController` state machine and its events
//! - **Core**: configuration and the ledger collaborators
//! - **Access**: roles checked through an injected `AccessControl`
//!
//! ## Example
//!
//! ```rust,ignore
//! use issuance::prelude::*;
//!
//! let controller = IssuanceController::new(address, config, oracle, ledger, collateral, roles, clock)?;
//! let issued = controller.mint(&alice, 1_000_000_000_000_000_000)?;
//! let collateral = controller.redeem(&alice, issued)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod access;
pub mod core;
pub mod error;
pub mod oracle;
pub mod protocol;
pub mod registry;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::access::{AccessControl, Role, RoleRegistry};
    pub use crate::core::{
        config::{ControllerConfig, EngineConfig, OracleConfig, RegistryConfig},
        ledger::{BankAccount, CollateralBank, CollateralTransfer, Ledger, TokenLedger},
    };
    pub use crate::error::{Error, Result};
    pub use crate::oracle::{
        ConfigurableOracle, FeedBackedOracle, FeedPrice, InMemoryFeedSource, OracleError, Price,
        PriceFeedSource, PriceOracle, PriceUpdateData,
    };
    pub use crate::protocol::{
        controller::IssuanceController,
        events::{EngineEvent, PauseTarget},
        state::{PauseState, PendingOracle, PriceHistory},
    };
    pub use crate::registry::{IssuerRecord, IssuerRegistry};
    pub use crate::utils::{
        crypto::{Address, Hash},
        time::{Clock, ManualClock, SystemClock, Timestamp},
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name
pub const ENGINE_NAME: &str = "issuance-engine";
