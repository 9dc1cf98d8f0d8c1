//! key and signature text forms.
//!
//! public keys travel through json and the identity store as prefixed
//! hex strings (e.g. `"ed25519:ab12..."`); signatures arrive embedded in
//! url paths as bare hex. both parse deterministically.

use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// length of an ed25519 verification key in bytes.
const PUBLIC_KEY_LEN: usize = 32;

/// length of an ed25519 signature in bytes.
const SIGNATURE_LEN: usize = 64;

/// text prefix for serialized public keys.
const KEY_PREFIX: &str = "ed25519";

/// errors from parsing key or signature text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// the text does not start with the expected prefix.
    #[error("key must start with '{KEY_PREFIX}:'")]
    BadPrefix,

    /// the hex portion failed to decode.
    #[error("invalid hex in key material")]
    BadHex,

    /// decoded to the wrong number of bytes.
    #[error("wrong key material length: {0} bytes")]
    BadLength(usize),

    /// the bytes do not describe a valid curve point.
    #[error("bytes are not a valid ed25519 key")]
    InvalidKey,
}

/// an ed25519 verification key bound to a user id.
///
/// serializes as `"ed25519:<64 hex chars>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainPublicKey([u8; PUBLIC_KEY_LEN]);

impl DomainPublicKey {
    /// wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// build from a dalek verifying key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    /// parse the canonical text form.
    pub fn from_text(s: &str) -> Result<Self, KeyError> {
        let hex_str = s
            .strip_prefix(KEY_PREFIX)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or(KeyError::BadPrefix)?;
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::BadHex)?;
        let arr: [u8; PUBLIC_KEY_LEN] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| KeyError::BadLength(v.len()))?;
        Ok(Self(arr))
    }

    /// the canonical text form.
    pub fn to_text(&self) -> String {
        format!("{}:{}", KEY_PREFIX, hex::encode(self.0))
    }

    /// get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// decompress into a dalek verifying key.
    pub fn verifying_key(&self) -> Result<VerifyingKey, KeyError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| KeyError::InvalidKey)
    }

    /// short string representation for logging.
    pub fn short_string(&self) -> String {
        format!("{}:{:02x}{:02x}...", KEY_PREFIX, self.0[0], self.0[1])
    }
}

impl Serialize for DomainPublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for DomainPublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DomainPublicKey::from_text(&s).map_err(de::Error::custom)
    }
}

/// parse a path-embedded signature: 128 hex characters, 64 bytes.
pub fn parse_signature_text(s: &str) -> Result<Signature, KeyError> {
    let bytes = hex::decode(s).map_err(|_| KeyError::BadHex)?;
    let arr: [u8; SIGNATURE_LEN] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| KeyError::BadLength(v.len()))?;
    Ok(Signature::from_bytes(&arr))
}
