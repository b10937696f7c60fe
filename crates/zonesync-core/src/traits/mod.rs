//! Core traits for zonesync
//!
//! This module defines the abstract interfaces that implementations must follow.
//!
//! - [`Provider`]: Fetch live records and apply changes through a vendor API

pub mod provider;

pub use provider::Provider;
