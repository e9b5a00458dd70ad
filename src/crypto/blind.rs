//! Raw (unpadded) RSA and Chaum blinding.
//!
//! These are the countersignature primitives of the voting protocol and are
//! deliberately distinct from the padded PKCS#1 scheme in `sign.rs`, which
//! only authenticates block authorship.

use crate::utils::{BallotError, Result};
use num_bigint_dig::ModInverse;
use rand::RngCore;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};

/// Minimal big-endian encoding; zero encodes as the empty string.
pub fn int_to_bytes(x: &BigUint) -> Vec<u8> {
    if *x == BigUint::from(0u32) {
        Vec::new()
    } else {
        x.to_bytes_be()
    }
}

pub fn int_from_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// `m^d mod n`
pub fn raw_sign(m: &BigUint, key: &RsaPrivateKey) -> BigUint {
    m.modpow(key.d(), key.n())
}

/// `s^e mod n`
pub fn raw_verify(s: &BigUint, key: &RsaPublicKey) -> BigUint {
    s.modpow(key.e(), key.n())
}

/// Blind `m` for the holder of `key`.
///
/// Returns `(m * r^e mod n, r^-1 mod n)` for a fresh random `r` invertible
/// modulo `n`.
pub fn blind(m: &BigUint, key: &RsaPublicKey) -> Result<(BigUint, BigUint)> {
    let n = key.n();
    if m >= n {
        return Err(BallotError::CryptoError("message does not fit the modulus".into()));
    }
    let one = BigUint::from(1u32);
    let mut rng = rand::thread_rng();
    let mut buf = vec![0u8; (n.bits() + 7) / 8];

    loop {
        rng.fill_bytes(&mut buf);
        let r = BigUint::from_bytes_be(&buf) % n;
        if r <= one {
            continue;
        }
        let inverse = match r.clone().mod_inverse(n).and_then(|i| i.to_biguint()) {
            Some(i) => i,
            None => continue,
        };
        let blinded = (m * r.modpow(key.e(), n)) % n;
        return Ok((blinded, inverse));
    }
}

/// Strip the blinding factor from a raw signature over a blinded value.
pub fn unblind(blind_sig: &BigUint, inverse: &BigUint, key: &RsaPublicKey) -> BigUint {
    (blind_sig * inverse) % key.n()
}
