//! lift-rooms — scene navigation gated on identity, with profile provisioning.

pub mod config;
pub mod error;
pub mod identity;
pub mod navigator;
pub mod profile;
pub mod store;
