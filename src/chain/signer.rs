use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip712::TypedData;
use ethers::types::Address;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::providers::{PermitRequest, PermitSignature, WalletSigner};

/// Operator wallet backed by an in-memory private key.
#[derive(Clone)]
pub struct LocalWalletSigner {
    wallet: LocalWallet,
}

impl LocalWalletSigner {
    pub fn new(private_key: &str, chain_id: u64) -> Result<Self> {
        let wallet: LocalWallet = private_key
            .trim_start_matches("0x")
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid wallet private key: {}", e)))?;

        Ok(Self {
            wallet: wallet.with_chain_id(chain_id),
        })
    }

    pub fn wallet(&self) -> LocalWallet {
        self.wallet.clone()
    }
}

#[async_trait]
impl WalletSigner for LocalWalletSigner {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Signs an EIP-2612 permit as EIP-712 typed data. Domain version is
    /// fixed at "1", which the common permit tokens use.
    async fn sign_permit(&self, request: &PermitRequest) -> Result<PermitSignature> {
        let payload = json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" }
                ],
                "Permit": [
                    { "name": "owner", "type": "address" },
                    { "name": "spender", "type": "address" },
                    { "name": "value", "type": "uint256" },
                    { "name": "nonce", "type": "uint256" },
                    { "name": "deadline", "type": "uint256" }
                ]
            },
            "primaryType": "Permit",
            "domain": {
                "name": request.token_name,
                "version": "1",
                "chainId": request.chain_id,
                "verifyingContract": format!("{:?}", request.token),
            },
            "message": {
                "owner": format!("{:?}", request.owner),
                "spender": format!("{:?}", request.spender),
                "value": request.value.to_string(),
                "nonce": request.nonce.to_string(),
                "deadline": request.deadline.to_string(),
            }
        });

        let typed: TypedData = serde_json::from_value(payload)
            .map_err(|e| AppError::Signer(format!("Failed to build permit payload: {}", e)))?;

        let signature = self
            .wallet
            .sign_typed_data(&typed)
            .await
            .map_err(|e| AppError::Signer(format!("Permit signing failed: {}", e)))?;

        Ok(PermitSignature {
            v: signature.v,
            r: signature.r,
            s: signature.s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    const TEST_KEY: &str = "0x0123456789012345678901234567890123456789012345678901234567890123";

    #[tokio::test]
    async fn test_sign_permit_is_deterministic() {
        let signer = LocalWalletSigner::new(TEST_KEY, 1).unwrap();
        let request = PermitRequest {
            token: "0xdAC17F958D2ee523a2206206994597C13D831ec7".parse().unwrap(),
            token_name: "Tether USD".to_string(),
            chain_id: 1,
            owner: signer.address(),
            spender: "0x1111111254EEB25477B68fb85Ed929f73A960582".parse().unwrap(),
            value: U256::from(1_000_000u64),
            nonce: U256::zero(),
            deadline: U256::from(1_900_000_000u64),
        };

        let first = signer.sign_permit(&request).await.unwrap();
        let second = signer.sign_permit(&request).await.unwrap();

        assert_eq!(first.r, second.r);
        assert_eq!(first.s, second.s);
        assert_eq!(first.v, second.v);
        assert!(first.v == 27 || first.v == 28);
    }

    #[test]
    fn test_rejects_garbage_key() {
        assert!(LocalWalletSigner::new("not-a-key", 1).is_err());
    }
}
