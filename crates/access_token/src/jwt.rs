use crate::jwks::Jwks;
use crate::keys::decode_private_key;
use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::errors::Error as RsaError;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use thiserror::Error;

/// The only accepted signing algorithm.
pub const ALGORITHM: &str = "RS256";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
    pub kid: String,
}

impl TokenHeader {
    fn rs256(kid: impl Into<String>) -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
            kid: kid.into(),
        }
    }
}

/// Claims carried by access and refresh tokens.
///
/// `role` and `rights` are identifiers, not names; resolving them is up to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: String,
    pub role: String,
    pub rights: Vec<String>,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("failed to parse RSA key")]
    KeyParse,
    #[error("rsa error")]
    Rsa(#[from] RsaError),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("missing claim: {0}")]
    MissingClaim(&'static str),
    #[error("invalid claim: {0}")]
    InvalidClaim(&'static str),
    #[error("token expired")]
    Expired,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn sign_payload<T: Serialize>(
    private_key_pem_or_der: &[u8],
    kid: impl Into<String>,
    payload: &T,
) -> Result<String, Error> {
    let header_b64 = b64e_json(&TokenHeader::rs256(kid))?;
    let claims_b64 = b64e_json(payload)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let private_key = decode_private_key(private_key_pem_or_der)?;
    let signing_key = SigningKey::<Sha256>::new(private_key);
    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Sign `claims` with an RSA private key (PEM or DER).
///
/// # Errors
///
/// Returns an error if the private key cannot be parsed or the claims cannot be encoded.
pub fn sign_rs256(
    private_key_pem_or_der: &[u8],
    kid: impl Into<String>,
    claims: &AccessClaims,
) -> Result<String, Error> {
    sign_payload(private_key_pem_or_der, kid, claims)
}

/// Verify an RS256 token and return its claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the header algorithm is not `RS256` or the `kid` is unknown,
/// - the signature does not verify,
/// - a claim is missing or has the wrong shape,
/// - `exp` is not strictly after `now_unix_seconds`.
pub fn verify_rs256(token: &str, jwks: &Jwks, now_unix_seconds: i64) -> Result<AccessClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let jwk = jwks
        .find_by_kid(&header.kid)
        .ok_or_else(|| Error::UnknownKid(header.kid.clone()))?;

    let verifying_key = VerifyingKey::<Sha256>::new(jwk.to_rsa_public_key()?);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| Error::InvalidSignature)?;
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)?;

    let payload: Value = b64d_json(claims_b64)?;
    let claims = parse_claims(&payload)?;
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}

fn parse_claims(payload: &Value) -> Result<AccessClaims, Error> {
    let object = payload.as_object().ok_or(Error::TokenFormat)?;

    let rights = required(object, "rights")?
        .as_array()
        .ok_or(Error::InvalidClaim("rights"))?
        .iter()
        .map(|right| non_empty_str(right, "rights"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AccessClaims {
        sub: non_empty_str(required(object, "sub")?, "sub")?,
        role: non_empty_str(required(object, "role")?, "role")?,
        rights,
        exp: required(object, "exp")?
            .as_i64()
            .ok_or(Error::InvalidClaim("exp"))?,
    })
}

fn required<'a>(object: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, Error> {
    match object.get(name) {
        None | Some(Value::Null) => Err(Error::MissingClaim(name)),
        Some(value) => Ok(value),
    }
}

fn non_empty_str(value: &Value, name: &'static str) -> Result<String, Error> {
    match value.as_str() {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(Error::InvalidClaim(name)),
    }
}
