use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::contract::Contract;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256};
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::providers::ChainClient;

/// `Error(string)` selector on revert payloads.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// `DOMAIN_SEPARATOR()` selector used to probe for EIP-2612 support.
const DOMAIN_SEPARATOR_SELECTOR: [u8; 4] = [0x36, 0x44, 0xe5, 0x15];

fn erc20_abi() -> Result<ethers::abi::Abi> {
    abi::parse_abi(&[
        "function balanceOf(address owner) external view returns (uint256)",
        "function allowance(address owner, address spender) external view returns (uint256)",
        "function approve(address spender, uint256 amount) external returns (bool)",
        "function name() external view returns (string)",
        "function nonces(address owner) external view returns (uint256)",
    ])
    .map_err(|e| AppError::Rpc(format!("Failed to parse ERC20 ABI: {}", e)))
}

/// JSON-RPC chain client with round-robin rotation across the configured
/// endpoints. Write paths sign with the operator wallet.
pub struct EthChainClient {
    providers: Vec<Arc<Provider<Http>>>,
    current_index: RwLock<usize>,
    wallet: LocalWallet,
    chain_id: u64,
}

impl EthChainClient {
    pub fn new(rpc_urls: &[String], chain_id: u64, wallet: LocalWallet) -> Result<Self> {
        let mut providers = Vec::new();

        for url in rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => providers.push(Arc::new(provider)),
                Err(e) => tracing::warn!("Failed to create provider for {}: {}", url, e),
            }
        }

        if providers.is_empty() {
            return Err(AppError::Config("No valid RPC providers configured".to_string()));
        }

        Ok(Self {
            providers,
            current_index: RwLock::new(0),
            wallet: wallet.with_chain_id(chain_id),
            chain_id,
        })
    }

    /// Round-robin to spread load; a bad endpoint only hits every Nth call.
    async fn provider(&self) -> Arc<Provider<Http>> {
        let mut index = self.current_index.write().await;
        let provider = self.providers[*index].clone();
        *index = (*index + 1) % self.providers.len();
        provider
    }

    async fn erc20(&self, token: Address) -> Result<Contract<Provider<Http>>> {
        Ok(Contract::new(token, erc20_abi()?, self.provider().await))
    }
}

fn map_call_error(err: ProviderError) -> AppError {
    if let ProviderError::JsonRpcClientError(inner) = &err {
        if let Some(rpc_err) = inner.as_error_response() {
            if let Some(reason) = rpc_err.data.as_ref().and_then(decode_revert_data) {
                return AppError::SimulationReverted(reason);
            }
            if rpc_err.message.contains("revert") {
                return AppError::SimulationReverted(rpc_err.message.clone());
            }
            return AppError::Rpc(rpc_err.message.clone());
        }
    }
    AppError::Rpc(format!("eth_call failed: {}", err))
}

/// Extracts the reason from an `Error(string)` revert payload.
fn decode_revert_data(data: &serde_json::Value) -> Option<String> {
    let hex_str = data.as_str()?;
    let raw = hex::decode(hex_str.trim_start_matches("0x")).ok()?;

    if raw.len() <= 4 || raw[0..4] != ERROR_STRING_SELECTOR {
        return None;
    }

    let tokens = abi::decode(&[ParamType::String], &raw[4..]).ok()?;
    match tokens.into_iter().next() {
        Some(Token::String(reason)) => Some(reason),
        _ => None,
    }
}

#[async_trait]
impl ChainClient for EthChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        let balance = self
            .provider()
            .await
            .get_balance(owner, None)
            .await
            .map_err(|e| AppError::Rpc(format!("Failed to get balance: {}", e)))?;
        Ok(balance)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let balance = self
            .erc20(token)
            .await?
            .method::<_, U256>("balanceOf", owner)
            .map_err(|e| AppError::Rpc(format!("Failed to build balanceOf call: {}", e)))?
            .call()
            .await
            .map_err(|e| AppError::Rpc(format!("balanceOf call failed: {}", e)))?;
        Ok(balance)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let allowance = self
            .erc20(token)
            .await?
            .method::<_, U256>("allowance", (owner, spender))
            .map_err(|e| AppError::Rpc(format!("Failed to build allowance call: {}", e)))?
            .call()
            .await
            .map_err(|e| AppError::Rpc(format!("allowance call failed: {}", e)))?;
        Ok(allowance)
    }

    async fn supports_permit(&self, token: Address) -> Result<bool> {
        let data = Bytes::from(DOMAIN_SEPARATOR_SELECTOR.to_vec());
        match self.call(token, data, U256::zero()).await {
            // A real separator is exactly one non-zero 32-byte word
            Ok(output) => Ok(output.len() == 32 && output.iter().any(|b| *b != 0)),
            Err(AppError::SimulationReverted(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn permit_nonce(&self, token: Address, owner: Address) -> Result<U256> {
        let nonce = self
            .erc20(token)
            .await?
            .method::<_, U256>("nonces", owner)
            .map_err(|e| AppError::Rpc(format!("Failed to build nonces call: {}", e)))?
            .call()
            .await
            .map_err(|e| AppError::Rpc(format!("nonces call failed: {}", e)))?;
        Ok(nonce)
    }

    async fn token_name(&self, token: Address) -> Result<String> {
        let name = self
            .erc20(token)
            .await?
            .method::<_, String>("name", ())
            .map_err(|e| AppError::Rpc(format!("Failed to build name call: {}", e)))?
            .call()
            .await
            .map_err(|e| AppError::Rpc(format!("name call failed: {}", e)))?;
        Ok(name)
    }

    async fn approve_max(&self, token: Address, spender: Address) -> Result<String> {
        let client = Arc::new(SignerMiddleware::new(self.provider().await, self.wallet.clone()));
        let contract = Contract::new(token, erc20_abi()?, client);

        let call = contract
            .method::<_, bool>("approve", (spender, U256::MAX))
            .map_err(|e| AppError::Rpc(format!("Failed to build approve call: {}", e)))?;

        let pending = call
            .send()
            .await
            .map_err(|e| AppError::Rpc(format!("Approve send failed: {}", e)))?;

        Ok(format!("{:?}", *pending))
    }

    async fn call(&self, to: Address, data: Bytes, value: U256) -> Result<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new()
            .from(self.wallet.address())
            .to(to)
            .data(data)
            .value(value)
            .into();

        self.provider()
            .await
            .call(&tx, None)
            .await
            .map_err(map_call_error)
    }

    async fn send_transaction(&self, to: Address, data: Bytes, value: U256) -> Result<String> {
        let client = SignerMiddleware::new(self.provider().await, self.wallet.clone());

        let tx = TransactionRequest::new().to(to).data(data).value(value);

        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(|e| AppError::Rpc(format!("Failed to send transaction: {}", e)))?;

        Ok(format!("{:?}", *pending))
    }

    async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>> {
        let hash: H256 = tx_hash
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("Invalid tx hash: {}", tx_hash)))?;

        let receipt = self
            .provider()
            .await
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| AppError::Rpc(format!("Failed to get receipt: {}", e)))?;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_revert_reason() {
        // Error("UniswapV2: INSUFFICIENT_OUTPUT_AMOUNT") encoded payload
        let reason = "UniswapV2: INSUFFICIENT_OUTPUT_AMOUNT";
        let encoded = abi::encode(&[Token::String(reason.to_string())]);
        let mut payload = ERROR_STRING_SELECTOR.to_vec();
        payload.extend_from_slice(&encoded);
        let data = json!(format!("0x{}", hex::encode(payload)));

        assert_eq!(decode_revert_data(&data).as_deref(), Some(reason));
    }

    #[test]
    fn test_decode_revert_ignores_other_payloads() {
        assert_eq!(decode_revert_data(&json!("0x")), None);
        assert_eq!(decode_revert_data(&json!("0xdeadbeef")), None);
        assert_eq!(decode_revert_data(&json!(42)), None);
    }
}
