use std::sync::Arc;

use ethers::types::{Address, U256};

use crate::chain::tokens;
use crate::dex::{RouteSummary, SwapRouteSource};
use crate::error::{AppError, Result};
use crate::providers::chain_client::ChainClient;

/// Successful prevalidation: the operator can pay and a route exists.
#[derive(Debug, Clone)]
pub struct PreValidated {
    pub balance: U256,
    pub route: RouteSummary,
}

/// Checks spendable balance and route availability before anything is
/// signed. Balance and route are fetched concurrently but the balance
/// verdict always wins: an unpayable swap is reported as such even when
/// the route lookup also failed.
pub struct PreValidationStep {
    chain: Arc<dyn ChainClient>,
    router: Arc<dyn SwapRouteSource>,
}

impl PreValidationStep {
    pub fn new(chain: Arc<dyn ChainClient>, router: Arc<dyn SwapRouteSource>) -> Self {
        Self { chain, router }
    }

    pub async fn run(
        &self,
        owner: Address,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
    ) -> Result<PreValidated> {
        let balance_lookup = self.balance_of(owner, token_in);
        let route_lookup = self.router.find_route(token_in, token_out, amount_in);
        let (balance, route) = tokio::join!(balance_lookup, route_lookup);

        let balance = balance?;
        if balance < amount_in {
            return Err(AppError::InsufficientBalance {
                have: balance.to_string(),
                need: amount_in.to_string(),
            });
        }
        Ok(PreValidated { balance, route: route? })
    }

    async fn balance_of(&self, owner: Address, token_in: &str) -> Result<U256> {
        if tokens::is_native(token_in) {
            self.chain.native_balance(owner).await
        } else {
            let token = tokens::parse_address(token_in)?;
            self.chain.token_balance(token, owner).await
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dex::testing::ScriptedRouter;
    use crate::providers::chain_client::testing::FakeChainClient;

    use super::*;

    const TOKEN_IN: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
    const TOKEN_OUT: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

    fn owner() -> Address {
        Address::repeat_byte(0x11)
    }

    fn step(chain: &Arc<FakeChainClient>, router: &Arc<ScriptedRouter>) -> PreValidationStep {
        PreValidationStep::new(chain.clone(), router.clone())
    }

    #[tokio::test]
    async fn test_success_carries_balance_and_route() {
        let chain = Arc::new(FakeChainClient::new(1));
        let router = Arc::new(ScriptedRouter::new());
        chain.set_token_balance(TOKEN_IN.parse().unwrap(), U256::from(500u64));

        let out = step(&chain, &router)
            .run(owner(), TOKEN_IN, TOKEN_OUT, U256::from(100u64))
            .await
            .unwrap();

        assert_eq!(out.balance, U256::from(500u64));
        assert_eq!(out.route.token_in, TOKEN_IN);
        assert_eq!(router.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_balance_error_dominates_route_error() {
        let chain = Arc::new(FakeChainClient::new(1));
        let router = Arc::new(ScriptedRouter::new());
        chain.fail_balances("node down");
        router.fail_route("no route");

        let err = step(&chain, &router)
            .run(owner(), TOKEN_IN, TOKEN_OUT, U256::from(100u64))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Rpc(_)));
        assert!(err.to_string().contains("node down"));
    }

    #[tokio::test]
    async fn test_insufficient_balance_beats_a_good_route() {
        let chain = Arc::new(FakeChainClient::new(1));
        let router = Arc::new(ScriptedRouter::new());
        chain.set_token_balance(TOKEN_IN.parse().unwrap(), U256::from(40u64));

        let err = step(&chain, &router)
            .run(owner(), TOKEN_IN, TOKEN_OUT, U256::from(100u64))
            .await
            .unwrap_err();

        match err {
            AppError::InsufficientBalance { have, need } => {
                assert_eq!(have, "40");
                assert_eq!(need, "100");
            }
            other => panic!("expected insufficient balance, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_route_error_surfaces_only_with_sufficient_balance() {
        let chain = Arc::new(FakeChainClient::new(1));
        let router = Arc::new(ScriptedRouter::new());
        chain.set_token_balance(TOKEN_IN.parse().unwrap(), U256::from(1_000u64));
        router.fail_route("no route");

        let err = step(&chain, &router)
            .run(owner(), TOKEN_IN, TOKEN_OUT, U256::from(100u64))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Router(_)));
    }

    #[tokio::test]
    async fn test_native_placeholder_reads_native_balance() {
        let chain = Arc::new(FakeChainClient::new(1));
        let router = Arc::new(ScriptedRouter::new());
        chain.set_native_balance(U256::from(2_000u64));

        let out = step(&chain, &router)
            .run(owner(), tokens::NATIVE_PLACEHOLDER, TOKEN_OUT, U256::from(100u64))
            .await
            .unwrap();

        assert_eq!(out.balance, U256::from(2_000u64));
    }
}
