use crate::crypto::{Keypair, PublicKey};
use crate::utils::{BallotError, Result};
use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha384};

/// Trait for signing block payloads (PKCS#1 v1.5 over SHA-384)
pub trait Signer {
    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>>;
}

/// Trait for verifying block payload signatures
pub trait Verifier {
    fn verify(&self, msg: &[u8], sig: &[u8]) -> Result<()>;
}

impl Signer for Keypair {
    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        let hashed = Sha384::digest(msg);
        let sig = self.rsa_private().sign(Pkcs1v15Sign::new::<Sha384>(), &hashed)?;
        Ok(sig)
    }
}

impl Verifier for PublicKey {
    fn verify(&self, msg: &[u8], sig: &[u8]) -> Result<()> {
        let key = self.to_rsa()?;
        let hashed = Sha384::digest(msg);
        key.verify(Pkcs1v15Sign::new::<Sha384>(), &hashed, sig)
            .map_err(|_| BallotError::CryptoError("signature verification failed".into()))
    }
}
