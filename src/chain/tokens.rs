use std::collections::HashMap;

use ethers::types::Address;
use lazy_static::lazy_static;

use crate::error::{AppError, Result};

/// Sentinel address routers use for the chain's native coin.
pub const NATIVE_PLACEHOLDER: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

pub const WETH_ADDRESS: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
    pub address: String,
}

lazy_static! {
    /// Well-known mainnet tokens, keyed by lowercase address. Saves a
    /// metadata round-trip for the tokens we touch constantly.
    pub static ref KNOWN_TOKENS: HashMap<String, TokenInfo> = {
        let mut m = HashMap::new();

        m.insert("0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(), TokenInfo {
            symbol: "USDT".to_string(),
            decimals: 6,
            address: "0xdAC17F958D2ee523a2206206994597C13D831ec7".to_string(),
        });
        m.insert("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(), TokenInfo {
            symbol: "USDC".to_string(),
            decimals: 6,
            address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
        });
        m.insert("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(), TokenInfo {
            symbol: "WETH".to_string(),
            decimals: 18,
            address: WETH_ADDRESS.to_string(),
        });
        m.insert("0x6b175474e89094c44da98b954eedeac495271d0f".to_string(), TokenInfo {
            symbol: "DAI".to_string(),
            decimals: 18,
            address: "0x6B175474E89094C44Da98b954EedeAC495271d0F".to_string(),
        });
        m.insert("0x2260fac5e5542a773aa44fbcfedf7c193bc2c599".to_string(), TokenInfo {
            symbol: "WBTC".to_string(),
            decimals: 8,
            address: "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599".to_string(),
        });

        m
    };
}

/// Whether `address` is the router's native-coin placeholder.
pub fn is_native(address: &str) -> bool {
    address.eq_ignore_ascii_case(NATIVE_PLACEHOLDER)
}

pub fn parse_address(address: &str) -> Result<Address> {
    address.trim().parse().map_err(|_| AppError::InvalidAddress)
}

pub fn get_token_by_address(address: &str) -> Option<&'static TokenInfo> {
    KNOWN_TOKENS.get(&address.to_lowercase())
}

pub fn known_decimals(address: &str) -> Option<u8> {
    get_token_by_address(address).map(|t| t.decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_native_ignores_case() {
        assert!(is_native(NATIVE_PLACEHOLDER));
        assert!(is_native(&NATIVE_PLACEHOLDER.to_lowercase()));
        assert!(!is_native(WETH_ADDRESS));
    }

    #[test]
    fn test_known_token_lookup() {
        let usdt = get_token_by_address("0xdAC17F958D2ee523a2206206994597C13D831ec7").unwrap();
        assert_eq!(usdt.symbol, "USDT");
        assert_eq!(usdt.decimals, 6);
        assert!(get_token_by_address("0x0000000000000000000000000000000000000042").is_none());
    }

    #[test]
    fn test_parse_address_trims_and_validates() {
        assert!(parse_address(" 0xdAC17F958D2ee523a2206206994597C13D831ec7 ").is_ok());
        assert!(parse_address("not-an-address").is_err());
        assert!(parse_address("0x123").is_err());
    }
}
