use std::env;

/// Connection details for the Ethereum chain we trade on.
#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    pub wallet_private_key: String,
}

/// Catalog sync pacing and shape.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub catalog_api_url: String,
    /// Upper bound of catalog pages; actual count comes from the API.
    pub total_pages: u32,
    pub page_size: u32,
    /// Pages fetched inline before the caller is unblocked.
    pub foreground_pages: u32,
    /// Last page the chained background jobs will reach.
    pub background_max_page: u32,
    pub pages_per_batch: u32,
    pub page_delay_ms: u64,
    pub foreground_timeout_secs: u64,
    /// Catalog freshness window; a newer checkpoint skips the sync.
    pub ttl_secs: i64,
    pub mediator_ttl_secs: i64,
    /// Background job attempts before the chain is marked failed.
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt.
    pub retry_base_secs: u64,
    pub job_poll_secs: u64,
}

/// Swap and purchase lifecycle knobs.
#[derive(Debug, Clone)]
pub struct TradingSettings {
    pub router_api_url: String,
    pub router_address: String,
    pub slippage_bps: u32,
    pub quote_ttl_secs: u64,
    /// How long a purchase is held before the auto-sell fires.
    pub hold_secs: i64,
    /// Stables tried in order when selling; first with a route wins.
    pub stables: Vec<StableToken>,
    pub auto_sell_poll_secs: u64,
    pub confirmation_poll_secs: u64,
}

#[derive(Debug, Clone)]
pub struct StableToken {
    pub symbol: String,
    pub address: String,
}

/// Block explorer API access.
#[derive(Debug, Clone)]
pub struct ExplorerSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    /// Floor between consecutive calls, keeps us under the free-tier rate.
    pub min_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub chain: ChainSettings,
    pub sync: SyncSettings,
    pub trading: TradingSettings,
    pub explorer: ExplorerSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        let rpc_urls = Self::parse_url_list(&env::var("ETH_RPC_URLS")?)?;
        let chain_id = env::var("CHAIN_ID")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;
        let wallet_private_key = env::var("WALLET_PRIVATE_KEY")?;

        let chain = ChainSettings {
            rpc_urls,
            chain_id,
            wallet_private_key,
        };

        let sync = SyncSettings {
            catalog_api_url: env::var("CATALOG_API_URL")?,
            total_pages: env::var("SYNC_TOTAL_PAGES")
                .unwrap_or_else(|_| "3218".to_string())
                .parse()?,
            page_size: env::var("SYNC_PAGE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            foreground_pages: env::var("SYNC_FOREGROUND_PAGES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            background_max_page: env::var("SYNC_BACKGROUND_MAX_PAGE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            pages_per_batch: env::var("SYNC_PAGES_PER_BATCH")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            page_delay_ms: env::var("SYNC_PAGE_DELAY_MS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            foreground_timeout_secs: env::var("SYNC_FOREGROUND_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            ttl_secs: env::var("SYNC_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,
            mediator_ttl_secs: env::var("MEDIATOR_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            max_attempts: env::var("SYNC_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            retry_base_secs: env::var("SYNC_RETRY_BASE_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            job_poll_secs: env::var("SYNC_JOB_POLL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        };

        let stables_raw = env::var("STABLE_TOKENS").unwrap_or_else(|_| {
            "USDT:0xdAC17F958D2ee523a2206206994597C13D831ec7,\
             USDC:0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
                .to_string()
        });

        let trading = TradingSettings {
            router_api_url: env::var("ROUTER_API_URL")?,
            router_address: env::var("ROUTER_ADDRESS")?,
            slippage_bps: env::var("SLIPPAGE_BPS")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            quote_ttl_secs: env::var("QUOTE_TTL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            hold_secs: env::var("AUTO_SELL_HOLD_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()?,
            stables: Self::parse_stable_tokens(&stables_raw)?,
            auto_sell_poll_secs: env::var("AUTO_SELL_POLL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            confirmation_poll_secs: env::var("CONFIRMATION_POLL_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()?,
        };

        let explorer = ExplorerSettings {
            api_url: env::var("EXPLORER_API_URL")
                .unwrap_or_else(|_| "https://api.etherscan.io/api".to_string()),
            api_key: env::var("EXPLORER_API_KEY").ok(),
            min_interval_ms: env::var("EXPLORER_MIN_INTERVAL_MS")
                .unwrap_or_else(|_| "334".to_string())
                .parse()?,
        };

        Ok(Config {
            database_url,
            server_host,
            server_port,
            chain,
            sync,
            trading,
            explorer,
        })
    }

    fn parse_url_list(urls_str: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        let urls: Vec<String> = urls_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if urls.is_empty() {
            return Err("RPC URLs list cannot be empty".into());
        }

        Ok(urls)
    }

    /// Parses `SYM:0xaddr,SYM:0xaddr`. Order is preserved: the first entry
    /// is the preferred sell target.
    fn parse_stable_tokens(raw: &str) -> Result<Vec<StableToken>, Box<dyn std::error::Error>> {
        let mut stables = Vec::new();

        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (symbol, address) = entry
                .split_once(':')
                .ok_or_else(|| format!("Invalid STABLE_TOKENS entry '{}', expected SYM:0xaddr", entry))?;
            let address = address.trim();
            if !address.starts_with("0x") || address.len() != 42 {
                return Err(format!("Invalid stable token address '{}'", address).into());
            }
            stables.push(StableToken {
                symbol: symbol.trim().to_uppercase(),
                address: address.to_string(),
            });
        }

        if stables.is_empty() {
            return Err("STABLE_TOKENS list cannot be empty".into());
        }

        Ok(stables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_list() {
        let urls = Config::parse_url_list("https://a.example, https://b.example ,").unwrap();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);

        assert!(Config::parse_url_list("  ,  ").is_err());
    }

    #[test]
    fn test_parse_stable_tokens_preserves_order() {
        let stables = Config::parse_stable_tokens(
            "USDT:0xdAC17F958D2ee523a2206206994597C13D831ec7,\
             USDC:0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        )
        .unwrap();

        assert_eq!(stables.len(), 2);
        assert_eq!(stables[0].symbol, "USDT");
        assert_eq!(stables[1].symbol, "USDC");
    }

    #[test]
    fn test_parse_stable_tokens_rejects_bad_entries() {
        assert!(Config::parse_stable_tokens("USDT=0xdAC17F958D2ee523a2206206994597C13D831ec7").is_err());
        assert!(Config::parse_stable_tokens("USDT:0x1234").is_err());
        assert!(Config::parse_stable_tokens("").is_err());
    }
}
