use std::sync::Arc;

use ethers::types::{Address, Bytes, U256};
use tracing::debug;

use crate::chain::tokens;
use crate::dex::EncodedSwap;
use crate::error::{AppError, Result};
use crate::providers::chain_client::ChainClient;

/// Dry-runs the built swap before any gas is spent. A build that names no
/// router or carries no calldata is rejected outright, it would burn gas
/// on a guaranteed failure.
pub struct SimulationStep {
    chain: Arc<dyn ChainClient>,
}

impl SimulationStep {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    pub async fn run(&self, swap: &EncodedSwap) -> Result<()> {
        let (to, data, value) = decoded_call(swap)?;
        self.chain.call(to, data, value).await?;
        debug!("swap simulation passed against router {:?}", to);
        Ok(())
    }
}

/// Hard validation of the build output, shared with the send step so the
/// simulated call and the broadcast call are byte-identical. Nothing here
/// touches the chain.
pub fn decoded_call(swap: &EncodedSwap) -> Result<(Address, Bytes, U256)> {
    let router = swap.router_address.trim();
    if router.is_empty() {
        return Err(AppError::InvalidInput(
            "Swap build returned no router address".to_string(),
        ));
    }
    let to = tokens::parse_address(router)?;
    if to == Address::zero() {
        return Err(AppError::InvalidInput(
            "Swap build returned the zero router address".to_string(),
        ));
    }

    let calldata = swap.calldata.trim().trim_start_matches("0x");
    if calldata.is_empty() {
        return Err(AppError::InvalidInput(
            "Swap build returned empty calldata".to_string(),
        ));
    }
    let data = hex::decode(calldata)
        .map_err(|_| AppError::InvalidInput("Swap build returned malformed calldata".to_string()))?;

    let value = U256::from_dec_str(swap.value.trim())
        .map_err(|_| AppError::InvalidInput("Swap build returned a malformed value".to_string()))?;

    Ok((to, Bytes::from(data), value))
}

#[cfg(test)]
mod tests {
    use crate::providers::chain_client::testing::FakeChainClient;

    use super::*;

    fn sample_swap() -> EncodedSwap {
        EncodedSwap {
            router_address: "0x6131B5fae19EA4f9D964eAc0408E4408b66337b5".to_string(),
            calldata: "0xe21fd0e9".to_string(),
            value: "0".to_string(),
            amount_out: "1000".to_string(),
            gas_estimate: None,
        }
    }

    #[tokio::test]
    async fn test_clean_simulation_passes() {
        let chain = Arc::new(FakeChainClient::new(1));
        let step = SimulationStep::new(chain.clone());

        step.run(&sample_swap()).await.unwrap();

        let calls = chain.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.as_ref(), [0xe2, 0x1f, 0xd0, 0xe9]);
    }

    #[tokio::test]
    async fn test_zero_router_is_rejected_without_simulating() {
        let chain = Arc::new(FakeChainClient::new(1));
        let step = SimulationStep::new(chain.clone());
        let mut swap = sample_swap();
        swap.router_address = format!("{:?}", Address::zero());

        let err = step.run(&swap).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(chain.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_calldata_is_rejected_without_simulating() {
        let chain = Arc::new(FakeChainClient::new(1));
        let step = SimulationStep::new(chain.clone());
        let mut swap = sample_swap();
        swap.calldata = "0x".to_string();

        let err = step.run(&swap).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(chain.calls().is_empty());
    }

    #[tokio::test]
    async fn test_revert_reason_blocks_the_send() {
        let chain = Arc::new(FakeChainClient::new(1));
        chain.script_call(Err(AppError::SimulationReverted(
            "TransferHelper: TRANSFER_FROM_FAILED".to_string(),
        )));
        let step = SimulationStep::new(chain.clone());

        let err = step.run(&sample_swap()).await.unwrap_err();

        match err {
            AppError::SimulationReverted(reason) => {
                assert!(reason.contains("TRANSFER_FROM_FAILED"));
            }
            other => panic!("expected a revert, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_native_value_is_attached() {
        let chain = Arc::new(FakeChainClient::new(1));
        let step = SimulationStep::new(chain.clone());
        let mut swap = sample_swap();
        swap.value = "1500000000000000000".to_string();

        step.run(&swap).await.unwrap();

        assert_eq!(
            chain.calls()[0].2,
            U256::from_dec_str("1500000000000000000").unwrap()
        );
    }
}
