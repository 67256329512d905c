// Utility helpers shared by handlers and services

use ethers::types::Address;

use crate::{
    constants::{MINTIFY_NFT_BASE_URL, OPENSEA_NFT_BASE_URL},
    error::{AppError, Result},
};

/// Lowercased `0x`-prefixed hex form used for storage keys and session ids.
pub fn normalize_wallet(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

pub fn parse_wallet_address(raw: &str) -> Result<Address> {
    let trimmed = raw.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| AppError::InvalidAddress(trimmed.to_string()))?;
    if hex_part.len() != 40 {
        return Err(AppError::InvalidAddress(trimmed.to_string()));
    }
    let bytes = hex::decode(hex_part).map_err(|_| AppError::InvalidAddress(trimmed.to_string()))?;
    Ok(Address::from_slice(&bytes))
}

pub fn mintify_url(contract: &str, token_id: &str) -> String {
    format!("{}/{}/{}", MINTIFY_NFT_BASE_URL, contract.trim(), token_id)
}

pub fn opensea_url(contract: &str, token_id: &str) -> String {
    format!(
        "{}/{}/{}",
        OPENSEA_NFT_BASE_URL,
        contract.trim().to_lowercase(),
        token_id
    )
}
