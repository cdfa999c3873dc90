//! Identity collaborator — the hosted auth service behind a trait, an HTTP
//! client for it, and the login flows built on top.

pub mod flows;
pub mod gotrue;
pub mod provider;

pub use flows::{AuthFlows, MIN_PASSWORD_LEN, SignInOutcome, SignUpOutcome};
pub use gotrue::GoTrueClient;
pub use provider::{IdentityProvider, User};
