//! # Passport
//!
//! Identity service: signup and email verification, RS256 bearer tokens, role and
//! right based authorization, password recovery, and notifications delivered by a
//! background relay.
//!
//! ## Tokens
//!
//! Tokens are compact JWS objects signed with RS256 under a fixed key id. They carry
//! the identity id (`sub`), its role id, its right ids and an expiry. Access tokens
//! live for an hour and refresh tokens for a year. The verification key is
//! published at `/.well-known/jwks.json`.
//!
//! ## Authorization
//!
//! Every protected route first authenticates the bearer token and confirms the
//! identity is still active and verified. Admin routes then require the `admin`
//! role. Routes gated on other roles or on specific rights use
//! `authz::require_roles` and `authz::require_rights` with the names they accept.
//!
//! ## Storage
//!
//! Entities are JSON documents in a single Postgres table, or in memory when no
//! database is configured.

pub mod authz;
pub mod cli;
pub mod error;
pub mod identity;
pub mod notifications;
pub mod passport;
pub mod permissions;
pub mod recovery;
pub mod store;
pub mod token;

pub use passport::{APP_USER_AGENT, GIT_COMMIT_HASH};
