//! Crypto module: key management, block signatures, raw RSA blinding.
//!
//! - Keys: RSA generation and canonical PKCS#1 PEM encoding
//! - Sign: PKCS#1 v1.5 / SHA-384 signatures over block payloads
//! - Blind: unpadded RSA, blinding and unblinding for countersignatures

pub mod keys;
pub mod sign;
pub mod blind;

pub use keys::{Keypair, PublicKey, GENESIS_KEY_PEM};
pub use sign::{Signer, Verifier};
