//! RS256 signed bearer tokens carrying a closed set of access claims.
//!
//! Tokens are compact JWS strings (`header.claims.signature`). Claims are parsed
//! field by field so a missing or mistyped claim surfaces as a named error
//! instead of a generic JSON failure.
mod jwks;
mod jwt;
mod keys;

pub use jwks::{Jwk, Jwks};
pub use jwt::{sign_rs256, verify_rs256, AccessClaims, Error, TokenHeader, ALGORITHM};
