//! Address identities
//!
//! Every participant (account, token, vault, adapter, module, sponsor) is
//! identified by a 20-byte address, rendered as `0x`-prefixed lowercase hex.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

use crate::AutoYieldError;

/// A 20-byte address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Never a valid vault, adapter or module.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Sentinel token address for the chain's native coin.
    pub const NATIVE: Address = Address([0xee; 20]);

    /// Create from raw bytes
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build from the last 20 bytes of a 32-byte digest.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }

    /// Deterministic address for a human-readable label.
    ///
    /// Used for deployed singletons (tokens, vaults, modules) so that demo
    /// and test worlds are stable across runs.
    pub fn from_label(label: &str) -> Self {
        let digest: [u8; 32] = Keccak256::digest(label.as_bytes()).into();
        Self::from_digest(&digest)
    }

    /// Parse from a byte slice (must be exactly 20 bytes)
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Short form for log lines: `0x1234…abcd`
    pub fn short(&self) -> String {
        let full = hex::encode(self.0);
        format!("0x{}…{}", &full[..4], &full[36..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AutoYieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| AutoYieldError::InvalidAddress {
            input: s.to_string(),
        })?;
        Self::from_slice(&bytes).ok_or_else(|| AutoYieldError::InvalidAddress {
            input: s.to_string(),
        })
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let addr = Address::from_label("usdc");
        let rendered = addr.to_string();
        assert!(rendered.starts_with("0x"));
        assert_eq!(rendered.len(), 42);
        assert_eq!(rendered.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("not-hex".parse::<Address>().is_err());
    }

    #[test]
    fn test_labels_are_deterministic() {
        assert_eq!(Address::from_label("vault"), Address::from_label("vault"));
        assert_ne!(Address::from_label("vault"), Address::from_label("adapter"));
    }

    #[test]
    fn test_sentinels() {
        assert!(Address::ZERO.is_zero());
        assert!(Address::NATIVE.is_native());
        assert!(!Address::NATIVE.is_zero());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let addr = Address::from_label("account");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
