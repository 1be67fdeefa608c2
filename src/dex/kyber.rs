use async_trait::async_trait;
use ethers::types::U256;
use serde::Deserialize;

use crate::chain::tokens;
use crate::dex::{EncodedSwap, RouteSummary, SwapRouteSource};
use crate::error::{AppError, Result};

/// Client for a KyberSwap-style aggregator API.
#[derive(Clone)]
pub struct KyberClient {
    client: reqwest::Client,
    base_url: String,
}

// ── Aggregator API response types ───────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: i64,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct RoutesData {
    #[serde(rename = "routeSummary")]
    route_summary: serde_json::Value,
    #[serde(rename = "routerAddress")]
    router_address: String,
}

#[derive(Debug, Deserialize)]
struct RouteSummaryFields {
    #[serde(rename = "tokenIn")]
    token_in: String,
    #[serde(rename = "amountIn")]
    amount_in: String,
    #[serde(rename = "tokenOut")]
    token_out: String,
    #[serde(rename = "amountOut")]
    amount_out: String,
    #[serde(rename = "gas", default)]
    gas: Option<String>,
    #[serde(rename = "routeID", default)]
    route_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BuildData {
    data: String,
    #[serde(rename = "routerAddress")]
    router_address: String,
    #[serde(rename = "amountOut")]
    amount_out: Option<String>,
    #[serde(rename = "gas", default)]
    gas: Option<String>,
}

// ── Implementation ──────────────────────────────────────────────────

impl KyberClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn unwrap_envelope<T>(envelope: ApiEnvelope<T>, context: &str) -> Result<T> {
        if envelope.code != 0 {
            return Err(AppError::Router(format!(
                "{}: {}",
                context,
                envelope.message.unwrap_or_else(|| format!("aggregator code {}", envelope.code))
            )));
        }
        envelope
            .data
            .ok_or_else(|| AppError::Router(format!("{}: empty aggregator response", context)))
    }
}

#[async_trait]
impl SwapRouteSource for KyberClient {
    async fn find_route(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
    ) -> Result<RouteSummary> {
        let url = format!("{}/routes", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("tokenIn", token_in),
                ("tokenOut", token_out),
                ("amountIn", &amount_in.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Router(format!("Route request failed: {}", e)))?;

        let envelope: ApiEnvelope<RoutesData> = response
            .json()
            .await
            .map_err(|e| AppError::Router(format!("Failed to parse route response: {}", e)))?;

        let data = Self::unwrap_envelope(envelope, "Route lookup failed")?;

        let fields: RouteSummaryFields = serde_json::from_value(data.route_summary.clone())
            .map_err(|e| AppError::Router(format!("Malformed route summary: {}", e)))?;

        Ok(RouteSummary {
            token_in: fields.token_in,
            amount_in: fields.amount_in,
            token_out: fields.token_out,
            amount_out: fields.amount_out,
            gas: fields.gas.unwrap_or_default(),
            route_id: fields.route_id.unwrap_or_default(),
            router_address: data.router_address,
            raw: data.route_summary,
        })
    }

    async fn build_swap(
        &self,
        route: &RouteSummary,
        sender: &str,
        recipient: &str,
        slippage_bps: u32,
        deadline: u64,
        permit: Option<String>,
    ) -> Result<EncodedSwap> {
        let url = format!("{}/route/build", self.base_url);

        let mut body = serde_json::json!({
            "routeSummary": route.raw,
            "sender": sender,
            "recipient": recipient,
            "slippageTolerance": slippage_bps,
            "deadline": deadline,
        });
        if let Some(permit_hex) = permit {
            body["permit"] = serde_json::Value::String(permit_hex);
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Router(format!("Build request failed: {}", e)))?;

        let envelope: ApiEnvelope<BuildData> = response
            .json()
            .await
            .map_err(|e| AppError::Router(format!("Failed to parse build response: {}", e)))?;

        let data = Self::unwrap_envelope(envelope, "Swap build failed")?;

        // Only a native-coin sell attaches value to the transaction
        let value = if tokens::is_native(&route.token_in) {
            route.amount_in.clone()
        } else {
            "0".to_string()
        };

        Ok(EncodedSwap {
            router_address: data.router_address,
            calldata: data.data,
            value,
            amount_out: data.amount_out.unwrap_or_else(|| route.amount_out.clone()),
            gas_estimate: data.gas,
        })
    }
}
