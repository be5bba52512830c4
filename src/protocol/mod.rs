//! Protocol module - issuance controller and its state machine.
//!
//! This module provides the controller that orchestrates mint, redeem and
//! oracle migration atomically, together with the events it emits.

pub mod controller;
pub mod events;
pub mod migration;
pub mod state;

pub use controller::*;
pub use events::*;
pub use state::*;
