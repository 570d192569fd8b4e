//! Identities: storage, secrets and the account lifecycle.
pub mod models;
pub mod repo;
pub mod secrets;
pub mod service;

pub use self::models::{Identity, RecoveryChallenge};
pub use self::repo::IdentityRepository;
pub use self::service::{IdentityService, IdentityUpdate, IdentityView, NewIdentity, Provisioning};
