//! Call data for the timelock's account-facing entry points

use multiguard_core::{decode_address_call, encode_address_call, Address, Selector};

/// Selector of `setCancellor(address)`
pub fn set_cancellor_selector() -> Selector {
    Selector::of("setCancellor(address)")
}

/// A call an account makes to the timelock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelockCall {
    /// `None` clears the cancellor (encoded as the zero address)
    SetCancellor(Option<Address>),
}

impl TimelockCall {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            TimelockCall::SetCancellor(cancellor) => encode_address_call(
                set_cancellor_selector(),
                &cancellor.unwrap_or(Address::ZERO),
            ),
        }
    }

    /// Decode call data; anything not exactly a known entry point is `None`
    pub fn decode(data: &[u8]) -> Option<Self> {
        decode_address_call(set_cancellor_selector(), data)
            .map(|a| TimelockCall::SetCancellor(Some(a).filter(|a| !a.is_zero())))
    }
}

/// Call data for `setCancellor(cancellor)`
pub fn encode_set_cancellor(cancellor: Option<Address>) -> Vec<u8> {
    TimelockCall::SetCancellor(cancellor).encode()
}
