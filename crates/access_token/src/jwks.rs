use crate::jwt::{Error, ALGORITHM};
use crate::keys::{decode_private_key, decode_public_key};
use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};

/// Published verification keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Find a key by `kid` (Key ID).
    #[must_use]
    pub fn find_by_kid(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// Build a single-key set from an RSA public key (PEM or DER).
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be parsed.
    pub fn from_rsa_public_key_pem_or_der(
        pem_or_der: &[u8],
        kid: impl Into<String>,
    ) -> Result<Self, Error> {
        let public_key = decode_public_key(pem_or_der)?;
        Ok(Self {
            keys: vec![Jwk::from_rsa_public_key(&public_key, kid)],
        })
    }

    /// Build a single-key set from an RSA private key (PEM or DER).
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be parsed.
    pub fn from_rsa_private_key_pem_or_der(
        pem_or_der: &[u8],
        kid: impl Into<String>,
    ) -> Result<Self, Error> {
        let private_key = decode_private_key(pem_or_der)?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self {
            keys: vec![Jwk::from_rsa_public_key(&public_key, kid)],
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    pub kid: String,
    pub n: String,
    pub e: String,
}

impl Jwk {
    #[must_use]
    pub fn from_rsa_public_key(public_key: &RsaPublicKey, kid: impl Into<String>) -> Self {
        Self {
            kty: "RSA".to_string(),
            alg: Some(ALGORITHM.to_string()),
            key_use: Some("sig".to_string()),
            kid: kid.into(),
            n: Base64UrlUnpadded::encode_string(&public_key.n().to_bytes_be()),
            e: Base64UrlUnpadded::encode_string(&public_key.e().to_bytes_be()),
        }
    }

    /// Convert this JWK back to an `RsaPublicKey`.
    ///
    /// # Errors
    ///
    /// Returns an error if the modulus or exponent are not valid base64url or do not
    /// form a valid RSA key.
    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey, Error> {
        if self.kty != "RSA" {
            return Err(Error::KeyParse);
        }
        let n = Base64UrlUnpadded::decode_vec(&self.n).map_err(|_| Error::Base64)?;
        let e = Base64UrlUnpadded::decode_vec(&self.e).map_err(|_| Error::Base64)?;
        RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e)).map_err(Error::Rsa)
    }
}
