//! Calls executed from an account's identity
//!
//! A call is `(to, value, data)`. The data is a closed set of payload shapes
//! so that the amount a call will pull from the account is known before it
//! runs: token transfers are decoded statically, opaque invocations declare
//! their debit up front.

use serde::{Deserialize, Serialize};

use crate::{Address, Assets};

/// Four-byte function selector
pub type Selector = [u8; 4];

/// An amount of a specific token a call is expected to pull from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDebit {
    pub token: Address,
    pub amount: Assets,
}

/// Call payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallData {
    /// No payload (plain native value transfer)
    Empty,
    /// `transfer(recipient, amount)` on the token contract at `to`
    TokenTransfer { recipient: Address, amount: Assets },
    /// Opaque call handled by the contract at `to`
    Invoke {
        selector: Selector,
        payload: Vec<u8>,
        /// Caller-declared debit, used to top up checking before the call runs
        debit: Option<TokenDebit>,
    },
}

/// A call made from the account's identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub to: Address,
    /// Native value attached to the call
    pub value: Assets,
    pub data: CallData,
}

impl Call {
    /// Plain native transfer
    pub fn native(to: Address, value: Assets) -> Self {
        Self {
            to,
            value,
            data: CallData::Empty,
        }
    }

    /// ERC-20 style transfer of `amount` of `token` to `recipient`
    pub fn token_transfer(token: Address, recipient: Address, amount: Assets) -> Self {
        Self {
            to: token,
            value: 0,
            data: CallData::TokenTransfer { recipient, amount },
        }
    }

    /// Opaque invocation of a contract
    pub fn invoke(
        to: Address,
        selector: Selector,
        payload: Vec<u8>,
        debit: Option<TokenDebit>,
    ) -> Self {
        Self {
            to,
            value: 0,
            data: CallData::Invoke {
                selector,
                payload,
                debit,
            },
        }
    }

    pub fn with_value(mut self, value: Assets) -> Self {
        self.value = value;
        self
    }

    /// Amount of `token` this call needs from the caller's checking balance.
    ///
    /// Returns `None` on overflow.
    pub fn required_debit(&self, token: &Address) -> Option<Assets> {
        let mut needed: Assets = 0;
        if token.is_native() {
            needed = needed.checked_add(self.value)?;
        }
        match &self.data {
            CallData::Empty => {}
            CallData::TokenTransfer { amount, .. } => {
                if self.to == *token {
                    needed = needed.checked_add(*amount)?;
                }
            }
            CallData::Invoke { debit, .. } => {
                if let Some(debit) = debit {
                    if debit.token == *token {
                        needed = needed.checked_add(debit.amount)?;
                    }
                }
            }
        }
        Some(needed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_transfer_debit() {
        let usdc = Address::from_label("usdc");
        let call = Call::token_transfer(usdc, Address::from_label("merchant"), 600);
        assert_eq!(call.required_debit(&usdc), Some(600));
        assert_eq!(call.required_debit(&Address::from_label("dai")), Some(0));
    }

    #[test]
    fn test_native_value_counts_for_native_token_only() {
        let call = Call::native(Address::from_label("friend"), 42);
        assert_eq!(call.required_debit(&Address::NATIVE), Some(42));
        assert_eq!(call.required_debit(&Address::from_label("usdc")), Some(0));
    }

    #[test]
    fn test_declared_debit() {
        let usdc = Address::from_label("usdc");
        let call = Call::invoke(
            Address::from_label("shop"),
            [0xde, 0xad, 0xbe, 0xef],
            vec![],
            Some(TokenDebit { token: usdc, amount: 250 }),
        );
        assert_eq!(call.required_debit(&usdc), Some(250));
    }
}
