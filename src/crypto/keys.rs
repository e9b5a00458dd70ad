use crate::utils::{BallotError, Result};
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;

/// PKCS#1 PEM of the RSA key (n = 5, e = 3) that stands in for "no signer".
/// Genesis and Ballot blocks carry it.
pub const GENESIS_KEY_PEM: &str =
    "-----BEGIN RSA PUBLIC KEY-----\nMAYCAQUCAQM=\n-----END RSA PUBLIC KEY-----\n";

/// A public key in its canonical wire/digest encoding (PKCS#1 PEM, LF endings).
///
/// The encoded bytes are kept verbatim so that digests computed by different
/// processes agree byte for byte; parsing into an RSA key happens on demand.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_rsa(key: &RsaPublicKey) -> Result<Self> {
        let pem = key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| BallotError::CryptoError(e.to_string()))?;
        Ok(Self(pem.into_bytes()))
    }

    /// Wrap already-encoded PEM bytes without parsing them.
    pub fn from_pem(pem: Vec<u8>) -> Self {
        Self(pem)
    }

    pub fn genesis() -> Self {
        Self(GENESIS_KEY_PEM.as_bytes().to_vec())
    }

    pub fn is_genesis(&self) -> bool {
        self.0 == GENESIS_KEY_PEM.as_bytes()
    }

    pub fn as_pem(&self) -> &[u8] {
        &self.0
    }

    pub fn to_rsa(&self) -> Result<RsaPublicKey> {
        let text = std::str::from_utf8(&self.0)
            .map_err(|e| BallotError::CryptoError(format!("public key is not utf-8: {}", e)))?;
        RsaPublicKey::from_pkcs1_pem(text).map_err(|e| BallotError::CryptoError(e.to_string()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = String::from_utf8_lossy(&self.0);
        let body: String = text.lines().filter(|l| !l.starts_with("-----")).collect();
        let head: String = body.chars().take(16).collect();
        write!(f, "PublicKey({}..)", head)
    }
}

/// An RSA key pair owned by one voter.
#[derive(Clone)]
pub struct Keypair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
    encoded: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair of `bits` modulus size
    pub fn generate(bits: usize) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        Self::from_private(private)
    }

    pub fn from_private(private: RsaPrivateKey) -> Result<Self> {
        let public = RsaPublicKey::from(&private);
        let encoded = PublicKey::from_rsa(&public)?;
        Ok(Self { private, public, encoded })
    }

    /// Canonical encoding of the public half
    pub fn public(&self) -> &PublicKey {
        &self.encoded
    }

    pub fn rsa_public(&self) -> &RsaPublicKey {
        &self.public
    }

    pub(crate) fn rsa_private(&self) -> &RsaPrivateKey {
        &self.private
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair").field("public", &self.encoded).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::traits::PublicKeyParts;
    use rsa::BigUint;

    #[test]
    fn genesis_key_parses_to_small_modulus() {
        let key = PublicKey::genesis();
        assert!(key.is_genesis());
        let rsa = key.to_rsa().unwrap();
        assert_eq!(rsa.n(), &BigUint::from(5u32));
        assert_eq!(rsa.e(), &BigUint::from(3u32));
    }

    #[test]
    fn pem_round_trips_through_rsa() {
        let kp = Keypair::generate(1024).unwrap();
        let pem = kp.public().as_pem().to_vec();
        assert!(pem.starts_with(b"-----BEGIN RSA PUBLIC KEY-----\n"));
        assert!(pem.ends_with(b"-----END RSA PUBLIC KEY-----\n"));

        let parsed = PublicKey::from_pem(pem).to_rsa().unwrap();
        assert_eq!(&parsed, kp.rsa_public());
        assert!(!kp.public().is_genesis());
    }

    #[test]
    fn garbage_pem_is_an_error() {
        assert!(PublicKey::from_pem(b"not a key".to_vec()).to_rsa().is_err());
        assert!(PublicKey::from_pem(vec![0xff, 0xfe]).to_rsa().is_err());
    }
}
