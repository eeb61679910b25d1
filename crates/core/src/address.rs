//! Fixed-size identifiers: account/module addresses and transaction hashes
//!
//! Both render as `0x`-prefixed lowercase hex and serialize as that string.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseIdError;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Length in bytes
            pub const LEN: usize = $len;

            /// All-zero value
            pub const ZERO: Self = Self([0u8; $len]);

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; $len]
            }

            /// Build from a slice, right-padding with zeros or truncating.
            pub fn from_slice(bytes: &[u8]) -> Self {
                let mut out = [0u8; $len];
                let n = bytes.len().min($len);
                out[..n].copy_from_slice(&bytes[..n]);
                Self(out)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(raw).map_err(|e| ParseIdError::InvalidHex(e.to_string()))?;
                if bytes.len() != $len {
                    return Err(ParseIdError::InvalidLength {
                        expected: $len,
                        actual: bytes.len(),
                    });
                }
                Ok(Self::from_slice(&bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// 20-byte identity of an account, an owner, or a guard module
    Address,
    20
);

fixed_bytes!(
    /// 32-byte canonical transaction fingerprint
    TxHash,
    32
);

impl Address {
    /// Deterministic address derived from a human-readable label.
    ///
    /// Used to give modules and fixtures stable identities without key material.
    pub fn from_label(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        Self::from_slice(&digest[..Self::LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let addr = Address::from_label("alice");
        let s = addr.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 42);

        let parsed: Address = s.parse().unwrap();
        assert_eq!(parsed, addr);

        // Prefix is optional
        let parsed: Address = s.trim_start_matches("0x").parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_parse_wrong_length() {
        let result = "0xdeadbeef".parse::<Address>();
        assert!(matches!(
            result,
            Err(ParseIdError::InvalidLength { expected: 20, actual: 4 })
        ));
    }

    #[test]
    fn test_parse_invalid_hex() {
        assert!(matches!(
            "0xzz".parse::<TxHash>(),
            Err(ParseIdError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_from_label_is_stable() {
        assert_eq!(Address::from_label("timelock"), Address::from_label("timelock"));
        assert_ne!(Address::from_label("timelock"), Address::from_label("registry"));
        assert!(!Address::from_label("x").is_zero());
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = TxHash::new([7u8; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "07".repeat(32)));

        let parsed: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn test_from_slice_pads_and_truncates() {
        let short = Address::from_slice(&[1, 2]);
        assert_eq!(&short.as_bytes()[..2], &[1, 2]);
        assert!(short.as_bytes()[2..].iter().all(|b| *b == 0));

        let long = Address::from_slice(&[9u8; 32]);
        assert_eq!(long.as_bytes(), &[9u8; 20]);
    }
}
