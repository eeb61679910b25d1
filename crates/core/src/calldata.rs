//! Minimal call-data encoding for entry points that take a single address
//!
//! Layout: 4-byte selector followed by one 32-byte word holding the address
//! right-aligned. Only what the account engine and the timelock bypass need.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::address::Address;

/// Size of one argument word
const WORD: usize = 32;

/// First four bytes of the SHA-256 of an entry point signature
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector([u8; 4]);

impl Selector {
    /// Selector for a signature such as `"setGuard(address)"`
    pub fn of(signature: &str) -> Self {
        let digest = Sha256::digest(signature.as_bytes());
        let mut out = [0u8; 4];
        out.copy_from_slice(&digest[..4]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Whether `data` starts with this selector
    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() >= 4 && data[..4] == self.0
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector(0x{})", hex::encode(self.0))
    }
}

/// Encode a call to an entry point taking one address
pub fn encode_address_call(selector: Selector, arg: &Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(selector.as_bytes());
    data.extend_from_slice(&[0u8; WORD - Address::LEN]);
    data.extend_from_slice(arg.as_bytes());
    data
}

/// Decode a call produced by [`encode_address_call`].
///
/// Returns `None` unless the selector matches, the length is exact, and the
/// padding is zero.
pub fn decode_address_call(selector: Selector, data: &[u8]) -> Option<Address> {
    if data.len() != 4 + WORD || !selector.matches(data) {
        return None;
    }
    let word = &data[4..];
    let pad = WORD - Address::LEN;
    if word[..pad].iter().any(|b| *b != 0) {
        return None;
    }
    Some(Address::from_slice(&word[pad..]))
}
