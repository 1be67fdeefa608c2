use async_trait::async_trait;
use ethers::types::{Address, Bytes, TransactionReceipt, U256};

use crate::error::Result;

/// EIP-2612 permit parameters to be signed by the operator wallet.
#[derive(Debug, Clone)]
pub struct PermitRequest {
    pub token: Address,
    /// ERC20 `name()`, used as the EIP-712 domain name.
    pub token_name: String,
    pub chain_id: u64,
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub nonce: U256,
    pub deadline: U256,
}

#[derive(Debug, Clone, Copy)]
pub struct PermitSignature {
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl PermitSignature {
    /// 65-byte r || s || v hex form expected by router APIs.
    pub fn to_hex(&self) -> String {
        let mut out = [0u8; 65];
        self.r.to_big_endian(&mut out[0..32]);
        self.s.to_big_endian(&mut out[32..64]);
        out[64] = self.v as u8;
        format!("0x{}", hex::encode(out))
    }
}

/// Read and write access to the chain. One implementation speaks JSON-RPC;
/// tests swap in fakes.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    async fn native_balance(&self, owner: Address) -> Result<U256>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    /// Whether the token exposes an EIP-2612 DOMAIN_SEPARATOR.
    async fn supports_permit(&self, token: Address) -> Result<bool>;

    async fn permit_nonce(&self, token: Address, owner: Address) -> Result<U256>;

    /// ERC20 `name()`, needed for the permit domain.
    async fn token_name(&self, token: Address) -> Result<String>;

    /// Sends an unlimited `approve(spender, MAX)` and returns the tx hash.
    async fn approve_max(&self, token: Address, spender: Address) -> Result<String>;

    /// `eth_call` from the operator wallet. Reverts surface as
    /// `AppError::SimulationReverted` with the decoded reason.
    async fn call(&self, to: Address, data: Bytes, value: U256) -> Result<Bytes>;

    /// Signs and broadcasts a transaction from the operator wallet.
    async fn send_transaction(&self, to: Address, data: Bytes, value: U256) -> Result<String>;

    async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>>;
}

/// The operator wallet: address plus typed-data signing for permits.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_permit(&self, request: &PermitRequest) -> Result<PermitSignature>;
}
