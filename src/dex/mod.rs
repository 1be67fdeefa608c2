use std::time::{Duration, Instant};

use async_trait::async_trait;
use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub mod kyber;

pub use kyber::KyberClient;

/// A swap route found by the aggregator, amounts in the aggregator's own
/// string form. `raw` is the full summary object and must be passed back
/// untouched when building calldata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSummary {
    pub token_in: String,
    pub amount_in: String,
    pub token_out: String,
    pub amount_out: String,
    pub gas: String,
    pub route_id: String,
    pub router_address: String,
    pub raw: serde_json::Value,
}

/// A priced route held for reuse: amounts parsed to `U256` and stamped so
/// stale quotes can be refused.
#[derive(Debug, Clone)]
pub struct Quote {
    pub token_in: String,
    pub amount_in: U256,
    pub token_out: String,
    pub amount_out: U256,
    pub gas: String,
    pub route_id: String,
    pub router_address: String,
    pub raw: serde_json::Value,
    pub created_at: Instant,
}

impl Quote {
    pub fn from_summary(summary: RouteSummary) -> Result<Self> {
        let amount_in = U256::from_dec_str(&summary.amount_in)
            .map_err(|_| AppError::Router(format!("Non-numeric amountIn: {}", summary.amount_in)))?;
        let amount_out = U256::from_dec_str(&summary.amount_out).map_err(|_| {
            AppError::Router(format!("Non-numeric amountOut: {}", summary.amount_out))
        })?;
        Ok(Self {
            token_in: summary.token_in,
            amount_in,
            token_out: summary.token_out,
            amount_out,
            gas: summary.gas,
            route_id: summary.route_id,
            router_address: summary.router_address,
            raw: summary.raw,
            created_at: Instant::now(),
        })
    }

    pub fn to_summary(&self) -> RouteSummary {
        RouteSummary {
            token_in: self.token_in.clone(),
            amount_in: self.amount_in.to_string(),
            token_out: self.token_out.clone(),
            amount_out: self.amount_out.to_string(),
            gas: self.gas.clone(),
            route_id: self.route_id.clone(),
            router_address: self.router_address.clone(),
            raw: self.raw.clone(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Calldata for a routed swap, ready to simulate or send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedSwap {
    pub router_address: String,
    pub calldata: String,
    /// Native value to attach; nonzero only when selling the native coin.
    pub value: String,
    pub amount_out: String,
    pub gas_estimate: Option<String>,
}

/// Route discovery and calldata encoding for swaps.
#[async_trait]
pub trait SwapRouteSource: Send + Sync {
    /// Best route for swapping `amount_in` of `token_in` into `token_out`.
    async fn find_route(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
    ) -> Result<RouteSummary>;

    /// Turns a found route into executable calldata. `permit` carries a
    /// signed EIP-2612 permit when one was issued for this swap.
    async fn build_swap(
        &self,
        route: &RouteSummary,
        sender: &str,
        recipient: &str,
        slippage_bps: u32,
        deadline: u64,
        permit: Option<String>,
    ) -> Result<EncodedSwap>;
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    pub fn sample_route(
        token_in: &str,
        token_out: &str,
        amount_in: U256,
        amount_out: U256,
    ) -> RouteSummary {
        RouteSummary {
            token_in: token_in.to_string(),
            amount_in: amount_in.to_string(),
            token_out: token_out.to_string(),
            amount_out: amount_out.to_string(),
            gas: "210000".to_string(),
            route_id: "scripted-route".to_string(),
            router_address: "0x6131b5fae19ea4f9d964eac0408e4408b66337b5".to_string(),
            raw: serde_json::json!({ "routeID": "scripted-route" }),
        }
    }

    #[derive(Default)]
    struct RouterState {
        route_error: Option<String>,
        amount_out: Option<U256>,
        build_error: Option<String>,
        build: Option<EncodedSwap>,
        find_calls: u32,
        permits_passed: Vec<Option<String>>,
    }

    /// Scripted `SwapRouteSource`. Unscripted calls answer with a
    /// plausible route/build derived from the arguments.
    #[derive(Default)]
    pub struct ScriptedRouter {
        state: Mutex<RouterState>,
    }

    impl ScriptedRouter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_route(&self, message: &str) {
            self.state.lock().unwrap().route_error = Some(message.to_string());
        }

        pub fn set_amount_out(&self, amount: U256) {
            self.state.lock().unwrap().amount_out = Some(amount);
        }

        pub fn fail_build(&self, message: &str) {
            self.state.lock().unwrap().build_error = Some(message.to_string());
        }

        pub fn set_build(&self, build: EncodedSwap) {
            self.state.lock().unwrap().build = Some(build);
        }

        pub fn find_calls(&self) -> u32 {
            self.state.lock().unwrap().find_calls
        }

        /// The `permit` argument of each `build_swap` call, in order.
        pub fn permits_passed(&self) -> Vec<Option<String>> {
            self.state.lock().unwrap().permits_passed.clone()
        }
    }

    #[async_trait]
    impl SwapRouteSource for ScriptedRouter {
        async fn find_route(
            &self,
            token_in: &str,
            token_out: &str,
            amount_in: U256,
        ) -> Result<RouteSummary> {
            let mut state = self.state.lock().unwrap();
            state.find_calls += 1;
            if let Some(message) = &state.route_error {
                return Err(AppError::Router(message.clone()));
            }
            let amount_out = state.amount_out.unwrap_or(amount_in);
            Ok(sample_route(token_in, token_out, amount_in, amount_out))
        }

        async fn build_swap(
            &self,
            route: &RouteSummary,
            _sender: &str,
            _recipient: &str,
            _slippage_bps: u32,
            _deadline: u64,
            permit: Option<String>,
        ) -> Result<EncodedSwap> {
            let mut state = self.state.lock().unwrap();
            state.permits_passed.push(permit);
            if let Some(message) = &state.build_error {
                return Err(AppError::Router(message.clone()));
            }
            Ok(state.build.clone().unwrap_or_else(|| EncodedSwap {
                router_address: route.router_address.clone(),
                calldata: "0xe21fd0e90000000000000000000000000000000000000000000000000000000000000020".to_string(),
                value: if crate::chain::tokens::is_native(&route.token_in) {
                    route.amount_in.clone()
                } else {
                    "0".to_string()
                },
                amount_out: route.amount_out.clone(),
                gas_estimate: Some(route.gas.clone()),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> RouteSummary {
        RouteSummary {
            token_in: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
            amount_in: "1000000".to_string(),
            token_out: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(),
            amount_out: U256::MAX.to_string(),
            gas: "255000".to_string(),
            route_id: "route-abc123".to_string(),
            router_address: "0x6131b5fae19ea4f9d964eac0408e4408b66337b5".to_string(),
            raw: serde_json::json!({ "routeID": "route-abc123" }),
        }
    }

    #[test]
    fn test_quote_round_trip_is_lossless() {
        let summary = sample_summary();
        let quote = Quote::from_summary(summary.clone()).unwrap();

        assert_eq!(quote.amount_in, U256::from(1_000_000u64));
        assert_eq!(quote.amount_out, U256::MAX);

        let back = quote.to_summary();
        assert_eq!(back.token_in, summary.token_in);
        assert_eq!(back.amount_in, summary.amount_in);
        assert_eq!(back.token_out, summary.token_out);
        assert_eq!(back.amount_out, summary.amount_out);
        assert_eq!(back.gas, summary.gas);
        assert_eq!(back.route_id, summary.route_id);
        assert_eq!(back.router_address, summary.router_address);
        assert_eq!(back.raw, summary.raw);
    }

    #[test]
    fn test_quote_rejects_non_numeric_amounts() {
        let mut summary = sample_summary();
        summary.amount_in = "1.5e18".to_string();
        assert!(Quote::from_summary(summary).is_err());
    }

    #[test]
    fn test_quote_expiry() {
        let mut quote = Quote::from_summary(sample_summary()).unwrap();
        let ttl = Duration::from_secs(30);
        assert!(!quote.is_expired(ttl));

        quote.created_at = Instant::now() - Duration::from_secs(31);
        assert!(quote.is_expired(ttl));
    }
}
