use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ethers::abi::{self, Token};
use ethers::types::{Address, U256};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::chain::tokens;
use crate::error::Result;
use crate::providers::chain_client::{ChainClient, PermitRequest, WalletSigner};

/// `permit(address,address,uint256,uint256,uint8,bytes32,bytes32)`
const PERMIT_SELECTOR: [u8; 4] = [0xd5, 0x05, 0xac, 0xcf];

const PERMIT_TTL_SECS: u64 = 30 * 60;

/// How spending was authorized. Exactly one of these comes out of a
/// successful approval step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Approval {
    /// Native coin, nothing to approve.
    NotRequired,
    /// Signed EIP-2612 permit to be embedded in the swap calldata.
    Permit { calldata: String, deadline: u64 },
    /// Existing allowance already covers the amount.
    AlreadyApproved,
    /// An unlimited `approve` was broadcast.
    ApprovalSent { tx_hash: String },
}

/// Decides between gasless permits and on-chain approvals. Permit support
/// is probed once per (chain, token) and remembered; only a definitive
/// probe result is cached, a transport failure is retried next time.
pub struct ApprovalStep {
    chain: Arc<dyn ChainClient>,
    signer: Arc<dyn WalletSigner>,
    permit_support: Mutex<HashMap<(u64, Address), bool>>,
}

impl ApprovalStep {
    pub fn new(chain: Arc<dyn ChainClient>, signer: Arc<dyn WalletSigner>) -> Self {
        Self {
            chain,
            signer,
            permit_support: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run(&self, token_in: &str, spender: &str, amount: U256) -> Result<Approval> {
        if tokens::is_native(token_in) {
            return Ok(Approval::NotRequired);
        }
        let token = tokens::parse_address(token_in)?;
        let spender = tokens::parse_address(spender)?;
        let owner = self.signer.address();

        if self.token_supports_permit(token).await {
            match self.build_permit(token, owner, spender, amount).await {
                Ok(approval) => return Ok(approval),
                Err(e) => {
                    warn!("permit path failed, falling back to approve: {}", e);
                }
            }
        }

        let allowance = self.chain.allowance(token, owner, spender).await?;
        if allowance >= amount {
            debug!("allowance {} already covers {}", allowance, amount);
            return Ok(Approval::AlreadyApproved);
        }

        let tx_hash = self.chain.approve_max(token, spender).await?;
        Ok(Approval::ApprovalSent { tx_hash })
    }

    async fn token_supports_permit(&self, token: Address) -> bool {
        let key = (self.chain.chain_id(), token);
        if let Some(supported) = self.permit_support.lock().await.get(&key) {
            return *supported;
        }
        match self.chain.supports_permit(token).await {
            Ok(supported) => {
                self.permit_support.lock().await.insert(key, supported);
                supported
            }
            Err(e) => {
                // Inconclusive probe: take the traditional path now, ask
                // again next time
                warn!("permit probe failed for {:?}: {}", token, e);
                false
            }
        }
    }

    async fn build_permit(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        value: U256,
    ) -> Result<Approval> {
        let nonce = self.chain.permit_nonce(token, owner).await?;
        let token_name = self.chain.token_name(token).await?;
        let deadline_secs = Utc::now().timestamp() as u64 + PERMIT_TTL_SECS;
        let deadline = U256::from(deadline_secs);

        let request = PermitRequest {
            token,
            token_name,
            chain_id: self.chain.chain_id(),
            owner,
            spender,
            value,
            nonce,
            deadline,
        };
        let signature = self.signer.sign_permit(&request).await?;

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        signature.r.to_big_endian(&mut r);
        signature.s.to_big_endian(&mut s);
        let arguments = [
            Token::Address(owner),
            Token::Address(spender),
            Token::Uint(value),
            Token::Uint(deadline),
            Token::Uint(U256::from(signature.v)),
            Token::FixedBytes(r.to_vec()),
            Token::FixedBytes(s.to_vec()),
        ];
        let mut calldata = PERMIT_SELECTOR.to_vec();
        calldata.extend(abi::encode(&arguments));

        Ok(Approval::Permit {
            calldata: format!("0x{}", hex::encode(calldata)),
            deadline: deadline_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::providers::chain_client::testing::{FakeChainClient, FakeWallet, PermitProbe};

    use super::*;

    const TOKEN: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
    const SPENDER: &str = "0x6131B5fae19EA4f9D964eAc0408E4408b66337b5";

    fn token() -> Address {
        TOKEN.parse().unwrap()
    }

    fn step(chain: &Arc<FakeChainClient>, wallet: &Arc<FakeWallet>) -> ApprovalStep {
        ApprovalStep::new(chain.clone(), wallet.clone())
    }

    #[tokio::test]
    async fn test_native_token_needs_no_approval_and_no_rpc() {
        let chain = Arc::new(FakeChainClient::new(1));
        let wallet = Arc::new(FakeWallet::new());

        let approval = step(&chain, &wallet)
            .run(tokens::NATIVE_PLACEHOLDER, SPENDER, U256::from(100u64))
            .await
            .unwrap();

        assert_eq!(approval, Approval::NotRequired);
        assert_eq!(chain.probe_calls(token()), 0);
        assert_eq!(chain.approve_calls(), 0);
    }

    #[tokio::test]
    async fn test_permit_path_encodes_calldata_without_a_transaction() {
        let chain = Arc::new(FakeChainClient::new(1));
        let wallet = Arc::new(FakeWallet::new());
        chain.set_permit_probe(token(), PermitProbe::Supported);

        let before = Utc::now().timestamp() as u64;
        let approval = step(&chain, &wallet)
            .run(TOKEN, SPENDER, U256::from(100u64))
            .await
            .unwrap();

        match approval {
            Approval::Permit { calldata, deadline } => {
                assert!(calldata.starts_with("0xd505accf"));
                // selector + 7 words
                assert_eq!(calldata.len(), 2 + 8 + 7 * 64);
                assert!(deadline >= before + PERMIT_TTL_SECS);
            }
            other => panic!("expected a permit, got {:?}", other),
        }
        assert_eq!(chain.approve_calls(), 0);
        assert_eq!(wallet.signed().len(), 1);
    }

    #[tokio::test]
    async fn test_probe_result_is_memoized_per_token() {
        let chain = Arc::new(FakeChainClient::new(1));
        let wallet = Arc::new(FakeWallet::new());
        chain.set_permit_probe(token(), PermitProbe::Supported);
        let step = step(&chain, &wallet);

        step.run(TOKEN, SPENDER, U256::from(1u64)).await.unwrap();
        step.run(TOKEN, SPENDER, U256::from(2u64)).await.unwrap();

        assert_eq!(chain.probe_calls(token()), 1);
    }

    #[tokio::test]
    async fn test_transport_probe_failure_is_retried_next_run() {
        let chain = Arc::new(FakeChainClient::new(1));
        let wallet = Arc::new(FakeWallet::new());
        chain.set_permit_probe(token(), PermitProbe::TransportError);
        chain.set_allowance(U256::MAX);
        let step = step(&chain, &wallet);

        let first = step.run(TOKEN, SPENDER, U256::from(1u64)).await.unwrap();
        assert_eq!(first, Approval::AlreadyApproved);

        step.run(TOKEN, SPENDER, U256::from(1u64)).await.unwrap();
        assert_eq!(chain.probe_calls(token()), 2);
    }

    #[tokio::test]
    async fn test_signing_failure_falls_through_to_approve() {
        let chain = Arc::new(FakeChainClient::new(1));
        let wallet = Arc::new(FakeWallet::new());
        chain.set_permit_probe(token(), PermitProbe::Supported);
        wallet.fail_signing();

        let approval = step(&chain, &wallet)
            .run(TOKEN, SPENDER, U256::from(100u64))
            .await
            .unwrap();

        assert!(matches!(approval, Approval::ApprovalSent { .. }));
        assert_eq!(chain.approve_calls(), 1);
    }

    #[tokio::test]
    async fn test_sufficient_allowance_sends_nothing() {
        let chain = Arc::new(FakeChainClient::new(1));
        let wallet = Arc::new(FakeWallet::new());
        chain.set_allowance(U256::from(1_000u64));

        let approval = step(&chain, &wallet)
            .run(TOKEN, SPENDER, U256::from(100u64))
            .await
            .unwrap();

        assert_eq!(approval, Approval::AlreadyApproved);
        assert_eq!(chain.approve_calls(), 0);
    }

    #[tokio::test]
    async fn test_low_allowance_sends_one_unlimited_approve() {
        let chain = Arc::new(FakeChainClient::new(1));
        let wallet = Arc::new(FakeWallet::new());
        chain.set_allowance(U256::from(5u64));

        let approval = step(&chain, &wallet)
            .run(TOKEN, SPENDER, U256::from(100u64))
            .await
            .unwrap();

        assert!(matches!(approval, Approval::ApprovalSent { .. }));
        assert_eq!(chain.approve_calls(), 1);
    }

    #[tokio::test]
    async fn test_allowance_rpc_failure_aborts() {
        let chain = Arc::new(FakeChainClient::new(1));
        let wallet = Arc::new(FakeWallet::new());
        chain.fail_allowance("node down");

        let err = step(&chain, &wallet)
            .run(TOKEN, SPENDER, U256::from(100u64))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("node down"));
        assert_eq!(chain.approve_calls(), 0);
    }
}
