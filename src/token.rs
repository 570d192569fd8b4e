//! Issues and validates RS256 bearer tokens.
//!
//! Key files are read on every call so replacing them on disk takes effect on the
//! next request without a restart. Access tokens live for an hour, refresh tokens
//! for a year; both carry the same claims. There is no revocation: a refresh token
//! stays usable until it expires.
use crate::error::Error;
use crate::identity::Identity;
use access_token::{sign_rs256, verify_rs256, AccessClaims, Jwks};
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Fixed key id published in the JWKS and stamped on every token.
pub const KEY_ID: &str = "passport-signing-key";

pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 60 * 60;
pub const REFRESH_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to read key file {path}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Token(#[from] access_token::Error),
}

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Token(access_token::Error::KeyParse | access_token::Error::Rsa(_))
            | TokenError::KeyFile { .. } => Self::Internal(err.into()),
            TokenError::Token(reason) => {
                debug!("rejected bearer token: {reason}");
                Self::Unauthorized
            }
        }
    }
}

/// Who a token speaks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub subject: Uuid,
    pub role: Uuid,
    pub rights: Vec<Uuid>,
}

impl Principal {
    #[must_use]
    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            subject: identity.id,
            role: identity.role_id,
            rights: identity.right_ids.clone(),
        }
    }

    fn to_wire(&self, exp: i64) -> AccessClaims {
        AccessClaims {
            sub: self.subject.to_string(),
            role: self.role.to_string(),
            rights: self.rights.iter().map(Uuid::to_string).collect(),
            exp,
        }
    }
}

/// Validated token contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Claims {
    pub principal: Principal,
    /// Unix seconds; the token is valid strictly before this instant.
    pub expires_at: i64,
}

impl TryFrom<AccessClaims> for Claims {
    type Error = access_token::Error;

    fn try_from(wire: AccessClaims) -> Result<Self, Self::Error> {
        let parse = |value: &str, name: &'static str| {
            Uuid::parse_str(value).map_err(|_| access_token::Error::InvalidClaim(name))
        };
        Ok(Self {
            principal: Principal {
                subject: parse(&wire.sub, "sub")?,
                role: parse(&wire.role, "role")?,
                rights: wire
                    .rights
                    .iter()
                    .map(|right| parse(right, "rights"))
                    .collect::<Result<_, _>>()?,
            },
            expires_at: wire.exp,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh_token: String,
}

#[derive(Clone, Debug)]
pub struct TokenService {
    private_key_path: PathBuf,
    public_key_path: PathBuf,
}

fn read_key(path: &Path) -> Result<Vec<u8>, TokenError> {
    std::fs::read(path).map_err(|source| TokenError::KeyFile {
        path: path.to_path_buf(),
        source,
    })
}

impl TokenService {
    pub fn new(private_key_path: impl Into<PathBuf>, public_key_path: impl Into<PathBuf>) -> Self {
        Self {
            private_key_path: private_key_path.into(),
            public_key_path: public_key_path.into(),
        }
    }

    fn sign(&self, principal: &Principal, exp: i64) -> Result<String, TokenError> {
        let private_key = read_key(&self.private_key_path)?;
        Ok(sign_rs256(&private_key, KEY_ID, &principal.to_wire(exp))?)
    }

    /// # Errors
    /// Returns an error if the private key cannot be read or used.
    pub fn issue_access_token(&self, principal: &Principal) -> Result<IssuedToken, TokenError> {
        self.issue_access_token_at(principal, Utc::now().timestamp())
    }

    /// # Errors
    /// Returns an error if the private key cannot be read or used.
    pub fn issue_access_token_at(
        &self,
        principal: &Principal,
        now: i64,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now + ACCESS_TOKEN_TTL_SECONDS;
        Ok(IssuedToken {
            token: self.sign(principal, expires_at)?,
            expires_at,
        })
    }

    /// # Errors
    /// Returns an error if the private key cannot be read or used.
    pub fn issue_refresh_token(&self, principal: &Principal) -> Result<String, TokenError> {
        self.issue_refresh_token_at(principal, Utc::now().timestamp())
    }

    /// # Errors
    /// Returns an error if the private key cannot be read or used.
    pub fn issue_refresh_token_at(
        &self,
        principal: &Principal,
        now: i64,
    ) -> Result<String, TokenError> {
        self.sign(principal, now + REFRESH_TOKEN_TTL_SECONDS)
    }

    /// Access and refresh token for a fresh sign-in.
    ///
    /// # Errors
    /// Returns an error if the private key cannot be read or used.
    pub fn issue_token_pair(&self, principal: &Principal) -> Result<TokenPair, TokenError> {
        let now = Utc::now().timestamp();
        Ok(TokenPair {
            access: self.issue_access_token_at(principal, now)?,
            refresh_token: self.issue_refresh_token_at(principal, now)?,
        })
    }

    /// # Errors
    /// Returns an error if the public key cannot be read, or the token is malformed,
    /// not RS256, badly signed, missing a claim, or expired.
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_token_at(token, Utc::now().timestamp())
    }

    /// # Errors
    /// See [`TokenService::validate_token`].
    pub fn validate_token_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let jwks = self.public_key()?;
        let wire = verify_rs256(token, &jwks, now)?;
        Ok(Claims::try_from(wire)?)
    }

    /// Exchange a valid refresh token for a new access token with the same claims.
    ///
    /// # Errors
    /// Fails exactly when [`TokenService::validate_token`] fails, or if signing fails.
    pub fn refresh(&self, refresh_token: &str) -> Result<IssuedToken, TokenError> {
        let now = Utc::now().timestamp();
        let claims = self.validate_token_at(refresh_token, now)?;
        self.issue_access_token_at(&claims.principal, now)
    }

    /// The verification key as a JWKS with the fixed key id.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be read or parsed.
    pub fn public_key(&self) -> Result<Jwks, TokenError> {
        let public_key = read_key(&self.public_key_path)?;
        Ok(Jwks::from_rsa_public_key_pem_or_der(&public_key, KEY_ID)?)
    }
}

#[cfg(test)]
pub(crate) mod test_keys {
    use super::TokenService;
    use std::path::PathBuf;

    pub fn private_key_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/signing_key.pem")
    }

    pub fn public_key_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/signing_key.pub.pem")
    }

    pub fn token_service() -> TokenService {
        TokenService::new(private_key_path(), public_key_path())
    }
}

#[cfg(test)]
mod tests {
    use super::test_keys::token_service;
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn principal() -> Principal {
        Principal {
            subject: Uuid::now_v7(),
            role: Uuid::now_v7(),
            rights: vec![Uuid::now_v7(), Uuid::now_v7()],
        }
    }

    #[test]
    fn access_token_round_trips_until_expiry() -> Result<(), TokenError> {
        let tokens = token_service();
        let principal = principal();
        let issued = tokens.issue_access_token_at(&principal, NOW)?;
        assert_eq!(issued.expires_at, NOW + 3600);

        let claims = tokens.validate_token_at(&issued.token, NOW + 3599)?;
        assert_eq!(claims.principal, principal);
        assert_eq!(claims.expires_at, issued.expires_at);

        assert!(matches!(
            tokens.validate_token_at(&issued.token, NOW + 3600),
            Err(TokenError::Token(access_token::Error::Expired))
        ));
        Ok(())
    }

    #[test]
    fn refresh_token_lives_a_year() -> Result<(), TokenError> {
        let tokens = token_service();
        let refresh = tokens.issue_refresh_token_at(&principal(), NOW)?;
        let claims = tokens.validate_token_at(&refresh, NOW + 364 * 24 * 3600)?;
        assert_eq!(claims.expires_at, NOW + REFRESH_TOKEN_TTL_SECONDS);
        Ok(())
    }

    #[test]
    fn refresh_reissues_access_for_the_same_principal() -> Result<(), TokenError> {
        let tokens = token_service();
        let principal = principal();
        let pair = tokens.issue_token_pair(&principal)?;

        let access = tokens.refresh(&pair.refresh_token)?;
        let claims = tokens.validate_token(&access.token)?;
        assert_eq!(claims.principal, principal);
        assert!(access.expires_at - Utc::now().timestamp() <= ACCESS_TOKEN_TTL_SECONDS);

        // An invalid refresh token never yields an access token.
        assert!(tokens.refresh("not.a.token").is_err());
        let expired = tokens.issue_refresh_token_at(&principal, NOW - REFRESH_TOKEN_TTL_SECONDS)?;
        assert!(matches!(
            tokens.refresh(&expired),
            Err(TokenError::Token(access_token::Error::Expired))
        ));
        Ok(())
    }

    #[test]
    fn rejects_non_uuid_claims() -> Result<(), Box<dyn std::error::Error>> {
        let private_key = std::fs::read(test_keys::private_key_path())?;
        let wire = AccessClaims {
            sub: "bob".to_string(),
            role: Uuid::now_v7().to_string(),
            rights: vec![],
            exp: NOW + 60,
        };
        let token = sign_rs256(&private_key, KEY_ID, &wire)?;
        assert!(matches!(
            token_service().validate_token_at(&token, NOW),
            Err(TokenError::Token(access_token::Error::InvalidClaim("sub")))
        ));
        Ok(())
    }

    #[test]
    fn publishes_fixed_key_id() -> Result<(), TokenError> {
        let jwks = token_service().public_key()?;
        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].kid, KEY_ID);
        assert_eq!(jwks.keys[0].alg.as_deref(), Some("RS256"));
        Ok(())
    }

    #[test]
    fn picks_up_rotated_keys_from_disk() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let private_path = dir.path().join("key.pem");
        let public_path = dir.path().join("key.pub.pem");
        std::fs::copy(test_keys::private_key_path(), &private_path)?;
        std::fs::copy(test_keys::public_key_path(), &public_path)?;

        let tokens = TokenService::new(&private_path, &public_path);
        let issued = tokens.issue_access_token_at(&principal(), NOW)?;
        assert!(tokens.validate_token_at(&issued.token, NOW).is_ok());

        std::fs::write(&public_path, b"garbage")?;
        assert!(matches!(
            tokens.validate_token_at(&issued.token, NOW),
            Err(TokenError::Token(access_token::Error::KeyParse))
        ));

        std::fs::remove_file(&private_path)?;
        assert!(matches!(
            tokens.issue_access_token_at(&principal(), NOW),
            Err(TokenError::KeyFile { .. })
        ));
        Ok(())
    }

    #[test]
    fn classifies_errors() {
        let err: Error = TokenError::Token(access_token::Error::Expired).into();
        assert!(matches!(err, Error::Unauthorized));
        let err: Error = TokenError::Token(access_token::Error::InvalidSignature).into();
        assert!(matches!(err, Error::Unauthorized));
        let err: Error = TokenError::Token(access_token::Error::KeyParse).into();
        assert!(matches!(err, Error::Internal(_)));
    }
}
