//! Install payload encodings
//!
//! - ECDSA validator: 20-byte owner address
//! - Rebalance executor: one or more 20-byte token addresses, concatenated
//! - Token receiver fallback: empty
//! - Spending cap hook: 20-byte token address followed by a 16-byte
//!   big-endian cap

use autoyield_types::{Address, Assets};

pub fn encode_owner(owner: &Address) -> Vec<u8> {
    owner.as_bytes().to_vec()
}

pub fn encode_tokens(tokens: &[Address]) -> Vec<u8> {
    tokens.iter().flat_map(|t| t.as_bytes().iter().copied()).collect()
}

pub fn encode_spending_cap(token: &Address, cap: Assets) -> Vec<u8> {
    let mut data = token.as_bytes().to_vec();
    data.extend_from_slice(&cap.to_be_bytes());
    data
}

pub(crate) fn decode_owner(data: &[u8]) -> Result<Address, String> {
    let owner = Address::from_slice(data)
        .ok_or_else(|| format!("owner must be 20 bytes, got {}", data.len()))?;
    if owner.is_zero() {
        return Err("owner must not be the zero address".to_string());
    }
    Ok(owner)
}

pub(crate) fn decode_tokens(data: &[u8]) -> Result<Vec<Address>, String> {
    if data.is_empty() || data.len() % 20 != 0 {
        return Err(format!(
            "token list must be a non-empty multiple of 20 bytes, got {}",
            data.len()
        ));
    }
    data.chunks(20)
        .map(|chunk| Address::from_slice(chunk).ok_or_else(|| "bad token".to_string()))
        .collect()
}

pub(crate) fn decode_spending_cap(data: &[u8]) -> Result<(Address, Assets), String> {
    if data.len() != 36 {
        return Err(format!("spending cap payload must be 36 bytes, got {}", data.len()));
    }
    let token = Address::from_slice(&data[..20]).ok_or_else(|| "bad token".to_string())?;
    let mut cap = [0u8; 16];
    cap.copy_from_slice(&data[20..]);
    Ok((token, Assets::from_be_bytes(cap)))
}
