//! Contracts an account can invoke
//!
//! A call target only ever sees the token ledger and the caller, never the
//! account or the entry point, so it cannot re-enter either.

use std::fmt;

use autoyield_crypto::keccak256;
use autoyield_ledger::TokenLedger;
use autoyield_types::{Address, Assets, AutoYieldError, Result, Selector};
use serde::{Deserialize, Serialize};

/// An invocable contract
pub trait CallTarget: Send + Sync + fmt::Debug {
    /// Address the target is deployed at
    fn address(&self) -> Address;

    /// Handle `selector(payload)` from `caller`. May pull funds from the
    /// caller through the ledger.
    fn invoke(
        &mut self,
        ledger: &mut TokenLedger,
        caller: &Address,
        selector: &Selector,
        payload: &[u8],
    ) -> Result<Vec<u8>>;

    fn box_clone(&self) -> Box<dyn CallTarget>;
}

impl Clone for Box<dyn CallTarget> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Four-byte selector of a function signature
pub fn selector(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A shop charging a fixed price per checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    address: Address,
    token: Address,
    price: Assets,
    orders: u64,
}

impl Merchant {
    pub fn new(address: Address, token: Address, price: Assets) -> Self {
        Self {
            address,
            token,
            price,
            orders: 0,
        }
    }

    pub fn checkout_selector() -> Selector {
        selector("checkout()")
    }

    pub fn orders(&self) -> u64 {
        self.orders
    }

    pub fn price(&self) -> Assets {
        self.price
    }

    pub fn token(&self) -> Address {
        self.token
    }
}

impl CallTarget for Merchant {
    fn address(&self) -> Address {
        self.address
    }

    fn invoke(
        &mut self,
        ledger: &mut TokenLedger,
        caller: &Address,
        selector: &Selector,
        _payload: &[u8],
    ) -> Result<Vec<u8>> {
        if *selector != Self::checkout_selector() {
            return Err(AutoYieldError::CallFailed {
                to: self.address,
                reason: format!("unknown selector 0x{}", hex::encode(selector)),
            });
        }
        ledger
            .transfer(&self.token, caller, &self.address, self.price)
            .map_err(|e| AutoYieldError::CallFailed {
                to: self.address,
                reason: e.to_string(),
            })?;
        self.orders += 1;
        Ok(self.orders.to_be_bytes().to_vec())
    }

    fn box_clone(&self) -> Box<dyn CallTarget> {
        Box::new(self.clone())
    }
}
