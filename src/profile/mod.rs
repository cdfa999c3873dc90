//! Profile provisioning — one profile row per identity, each with a unique
//! generated username.

pub mod model;
pub mod provisioner;
pub mod username;

pub use model::{EmailPolicy, Profile, ProvisionRequest};
pub use provisioner::ProfileProvisioner;
pub use username::{RandomSuffix, SuffixSource};
