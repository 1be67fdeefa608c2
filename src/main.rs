use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradedesk::{Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradedesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| tradedesk::AppError::Config(e.to_string()))?;

    tracing::info!("Starting tradedesk on chain id {}", config.chain.chain_id);

    // Initialize database connection
    let db = sea_orm::Database::connect(&config.database_url)
        .await
        .map_err(tradedesk::AppError::Database)?;

    tracing::info!("Database connected successfully");

    // Run migrations
    migration::Migrator::up(&db, None)
        .await
        .map_err(tradedesk::AppError::Database)?;

    tracing::info!("Migrations completed successfully");

    // Initialize repositories
    let token_repo = Arc::new(tradedesk::db::TokenRepository::new(db.clone()));
    let purchase_repo = Arc::new(tradedesk::db::PurchaseRepository::new(db.clone()));
    let sync_job_repo = Arc::new(tradedesk::db::SyncJobRepository::new(db.clone()));
    let sync_state_repo = Arc::new(tradedesk::db::SyncStateRepository::new(db));

    // Initialize chain access
    let signer = Arc::new(tradedesk::chain::LocalWalletSigner::new(
        &config.chain.wallet_private_key,
        config.chain.chain_id,
    )?);
    let chain = Arc::new(tradedesk::chain::EthChainClient::new(
        &config.chain.rpc_urls,
        config.chain.chain_id,
        signer.wallet(),
    )?);
    tracing::info!("Chain client initialized, operator wallet loaded");

    // Initialize remote sources
    let catalog = Arc::new(tradedesk::catalog::CatalogClient::new(
        config.sync.catalog_api_url.clone(),
    ));
    let router_api = Arc::new(tradedesk::dex::KyberClient::new(
        config.trading.router_api_url.clone(),
    ));
    let explorer_gate = Arc::new(tradedesk::explorer::CallGate::new(
        std::time::Duration::from_millis(config.explorer.min_interval_ms),
    ));
    let explorer = Arc::new(tradedesk::explorer::ExplorerClient::new(
        config.explorer.api_url.clone(),
        config.explorer.api_key.clone(),
        explorer_gate,
    ));
    let balance_rpc = config.chain.rpc_urls.first().cloned().ok_or_else(|| {
        tradedesk::AppError::Config("At least one RPC URL is required".to_string())
    })?;
    let balances = Arc::new(tradedesk::providers::AlchemyBalanceClient::new(&balance_rpc));

    // Initialize the sync pipeline
    let sync_manager = Arc::new(tradedesk::sync::TokenSyncManager::new(
        config.sync.clone(),
        catalog.clone(),
        token_repo.clone(),
        sync_state_repo.clone(),
        sync_job_repo.clone(),
    ));
    let mediator = Arc::new(tradedesk::sync::TokenRemoteMediator::new(
        config.sync.clone(),
        catalog.clone(),
        token_repo.clone(),
        sync_state_repo.clone(),
    ));
    let job_runner = tradedesk::sync::SyncJobRunner::new(
        config.sync.clone(),
        catalog,
        token_repo.clone(),
        sync_state_repo,
        sync_job_repo,
    );

    // Jobs left running by a previous process go back to pending
    job_runner.recover_orphans().await?;

    // Initialize services
    let swap_service = Arc::new(tradedesk::services::SwapService::new(
        config.trading.clone(),
        chain.clone(),
        router_api,
        signer,
        purchase_repo.clone(),
    ));
    let purchase_service = Arc::new(tradedesk::services::PurchaseService::new(
        purchase_repo.clone(),
    ));
    let portfolio_service = Arc::new(tradedesk::services::PortfolioService::new(
        chain,
        balances,
        token_repo.clone(),
    ));

    // Spawn background workers on a shared shutdown flag
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let runner_handle = tokio::spawn(job_runner.start(shutdown_rx.clone()));
    let watcher = tradedesk::confirmation_watcher::ConfirmationWatcher::new(
        config.trading.clone(),
        purchase_repo.clone(),
        explorer,
    );
    let watcher_handle = tokio::spawn(watcher.start(shutdown_rx.clone()));
    let seller = tradedesk::auto_seller::AutoSeller::new(
        config.trading.clone(),
        purchase_repo,
        swap_service.clone(),
    );
    let seller_handle = tokio::spawn(seller.start(shutdown_rx));

    // Kick the catalog sync without blocking startup
    let boot_sync = sync_manager.clone();
    tokio::spawn(async move {
        match boot_sync.check_and_start_sync().await {
            Ok(true) => tracing::info!("Startup catalog sync finished"),
            Ok(false) => tracing::info!("Catalog cache is fresh, startup sync skipped"),
            Err(e) => tracing::error!("Startup catalog sync failed: {}", e),
        }
    });

    // Create app state
    let app_state = tradedesk::api::AppState::new(
        token_repo,
        sync_manager,
        mediator,
        swap_service,
        purchase_service,
        portfolio_service,
    );

    // Build application router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/tokens", get(tradedesk::api::tokens::list_tokens))
        .route("/api/tokens/load", post(tradedesk::api::tokens::load_tokens))
        .route("/api/sync/status", get(tradedesk::api::sync::sync_status))
        .route("/api/sync/refresh", post(tradedesk::api::sync::force_refresh))
        .route("/api/swap/quote", post(tradedesk::api::swap::get_quote))
        .route("/api/swap/execute", post(tradedesk::api::swap::execute_swap))
        .route("/api/purchases", get(tradedesk::api::purchases::list_purchases))
        .route(
            "/api/purchases/{tx_hash}/cancel",
            post(tradedesk::api::purchases::cancel_purchase),
        )
        .route(
            "/api/portfolio/{address}",
            get(tradedesk::api::portfolio::get_portfolio),
        )
        .with_state(app_state)
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| tradedesk::AppError::Internal(e.to_string()))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| tradedesk::AppError::Internal(e.to_string()))?;

    // Drain the workers before exiting
    tracing::info!("Server stopped, draining background workers");
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(runner_handle, watcher_handle, seller_handle);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn health_check() -> &'static str {
    "OK"
}
