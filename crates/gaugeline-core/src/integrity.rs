//! Keyed integrity tags using HMAC-SHA256.
//!
//! The agent signs every metric it reports with a shared secret and the
//! server verifies the tag before applying the update. Tags travel as
//! lowercase hex strings in the `hash` field (or the `Hash` header).

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;

use crate::error::CoreError;

type HmacSha256 = Hmac<Sha256>;

/// A shared secret, pre-keyed into an HMAC instance.
///
/// There is no empty key: [`SigningKey::new`] returns `None` for an empty
/// secret, which is how callers express "hashing disabled".
#[derive(Clone)]
pub struct SigningKey {
    mac: HmacSha256,
}

impl SigningKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Option<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return None;
        }
        HmacSha256::new_from_slice(secret)
            .ok()
            .map(|mac| SigningKey { mac })
    }

    /// Computes the tag for `message`.
    pub fn digest(&self, message: &[u8]) -> Tag {
        let mut mac = self.mac.clone();
        mac.update(message);
        Tag(mac.finalize().into_bytes().to_vec())
    }

    /// Constant-time check of `tag` against the digest of `message`.
    pub fn verify(&self, message: &[u8], tag: &Tag) -> bool {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.verify_slice(&tag.0).is_ok()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Raw digest bytes of an integrity tag.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tag(Vec<u8>);

impl Tag {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.to_hex())
    }
}

impl FromStr for Tag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s.trim())
            .map(Tag)
            .map_err(|e| CoreError::Malformed {
                reason: format!("integrity tag is not hex: {}", e),
            })
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_disables_signing() {
        assert!(SigningKey::new("").is_none());
        assert!(SigningKey::new(b"k").is_some());
    }

    #[test]
    fn digest_is_sha256_sized_hex() {
        let key = SigningKey::new("secret").unwrap();
        let tag = key.digest(b"temp:gauge:1.000000");
        assert_eq!(tag.as_bytes().len(), 32);
        assert_eq!(tag.to_hex().len(), 64);
        assert!(tag.to_hex().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn known_vector() {
        // RFC 4231 test case 2.
        let key = SigningKey::new("Jefe").unwrap();
        let tag = key.digest(b"what do ya want for nothing?");
        assert_eq!(
            tag.to_hex(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hex_round_trip_and_rejects_garbage() {
        let key = SigningKey::new("secret").unwrap();
        let tag = key.digest(b"x");
        let parsed: Tag = tag.to_hex().parse().unwrap();
        assert_eq!(parsed, tag);
        assert!("zz".parse::<Tag>().is_err());
    }

    #[test]
    fn truncated_tag_does_not_verify() {
        let key = SigningKey::new("secret").unwrap();
        let tag = key.digest(b"msg");
        let short = Tag(tag.as_bytes()[..16].to_vec());
        assert!(key.verify(b"msg", &tag));
        assert!(!key.verify(b"msg", &short));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let key = SigningKey::new("super-secret").unwrap();
        assert_eq!(format!("{:?}", key), "SigningKey(..)");
    }
}
