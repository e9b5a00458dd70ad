//! `#[serde(with = ...)]` adapters for the wire map: binary fields travel
//! as base64 text, integers and timestamps as decimal strings.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serializer};

pub mod base64_bytes {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    /// Serialize bytes as standard base64
    pub fn serialize<S>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    /// Deserialize standard base64 into bytes
    pub fn deserialize<'de, D>(d: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        STANDARD.decode(s.as_bytes()).map_err(D::Error::custom)
    }
}

pub mod decimal_u64 {
    use super::*;

    pub fn serialize<S>(val: &u64, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&val.to_string())
    }

    pub fn deserialize<'de, D>(d: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        s.trim().parse::<u64>().map_err(D::Error::custom)
    }
}

pub mod decimal_f64 {
    use super::*;
    use crate::ledger::block::format_timestamp;

    pub fn serialize<S>(val: &f64, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&format_timestamp(*val))
    }

    pub fn deserialize<'de, D>(d: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        let v = s.parse::<f64>().map_err(D::Error::custom)?;
        if !v.is_finite() {
            return Err(D::Error::custom("timestamp must be finite"));
        }
        // the digest hashes the canonical spelling, so only that is accepted
        if format_timestamp(v) != s {
            return Err(D::Error::custom(format!("timestamp {:?} is not in canonical form", s)));
        }
        Ok(v)
    }
}
