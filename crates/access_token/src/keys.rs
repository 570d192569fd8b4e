use crate::jwt::Error;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

fn pem_str(pem: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(pem).map_err(|_| Error::KeyParse)
}

fn is_pem(bytes: &[u8]) -> bool {
    bytes.trim_ascii_start().starts_with(b"-----BEGIN")
}

/// Decode an RSA private key in PKCS#8 or PKCS#1 form, PEM or DER.
pub(crate) fn decode_private_key(pem_or_der: &[u8]) -> Result<RsaPrivateKey, Error> {
    if is_pem(pem_or_der) {
        let s = pem_str(pem_or_der)?.trim();
        return RsaPrivateKey::from_pkcs8_pem(s)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(s))
            .map_err(|_| Error::KeyParse);
    }

    RsaPrivateKey::from_pkcs8_der(pem_or_der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(pem_or_der))
        .map_err(|_| Error::KeyParse)
}

/// Decode an RSA public key in SPKI or PKCS#1 form, PEM or DER.
pub(crate) fn decode_public_key(pem_or_der: &[u8]) -> Result<RsaPublicKey, Error> {
    if is_pem(pem_or_der) {
        let s = pem_str(pem_or_der)?.trim();
        return RsaPublicKey::from_public_key_pem(s)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(s))
            .map_err(|_| Error::KeyParse);
    }

    RsaPublicKey::from_public_key_der(pem_or_der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(pem_or_der))
        .map_err(|_| Error::KeyParse)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PKCS8: &str = include_str!("../testdata/rsa_pkcs8.pem");
    const PKCS1: &str = include_str!("../testdata/rsa_pkcs1.pem");
    const PUBLIC: &str = include_str!("../testdata/rsa_public.pem");

    #[test]
    fn decodes_both_private_key_encodings() -> Result<(), Error> {
        let pkcs8 = decode_private_key(PKCS8.as_bytes())?;
        let pkcs1 = decode_private_key(PKCS1.as_bytes())?;
        assert_eq!(pkcs8, pkcs1);
        Ok(())
    }

    #[test]
    fn public_key_matches_private_key() -> Result<(), Error> {
        let private_key = decode_private_key(PKCS8.as_bytes())?;
        let public_key = decode_public_key(PUBLIC.as_bytes())?;
        assert_eq!(RsaPublicKey::from(&private_key), public_key);
        Ok(())
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            decode_private_key(b"not a key"),
            Err(Error::KeyParse)
        ));
        assert!(matches!(
            decode_public_key(b"-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----"),
            Err(Error::KeyParse)
        ));
    }
}
