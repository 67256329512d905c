use axum::http::HeaderValue;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod error;
mod integrations;
mod models;
mod services;
mod utils;

use config::Config;
use constants::API_VERSION;
use integrations::fighters_api::FightersApiClient;
use services::{
    metadata::Gateways, ownership::parse_enumeration_strategy, CounterBackend, Erc721Reader,
    FixedWindowLimiter, KvStore, MemoryCounterBackend, MemoryKvStore, MetadataFetcher,
    OwnershipResolver, ProfileStore, RedisCounterBackend, RedisKvStore, ResolutionEpochs,
    RpcForwarder, TrainingStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squad_unbound_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting Squad Unbound Backend Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    // Shared state: Redis when configured, process-local otherwise
    let (kv, counters): (Arc<dyn KvStore>, Arc<dyn CounterBackend>) = match &config.redis_url {
        Some(url) => {
            let redis = redis::Client::open(url.as_str())?;
            let redis_manager = redis::aio::ConnectionManager::new(redis).await?;
            tracing::info!("Redis connected; limiter counters and user state are shared");
            let kv: Arc<dyn KvStore> = Arc::new(RedisKvStore::new(redis_manager.clone()));
            let counters: Arc<dyn CounterBackend> =
                Arc::new(RedisCounterBackend::new(redis_manager));
            (kv, counters)
        }
        None => {
            let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
            let counters: Arc<dyn CounterBackend> =
                Arc::new(MemoryCounterBackend::new(config.rate_limit_max_tracked_clients));
            (kv, counters)
        }
    };
    let kv_backend = kv.name();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.metadata_fetch_timeout_secs.max(1)))
        .build()?;
    let gateways = Gateways::with_ipfs(&config.ipfs_gateway_url);
    let fetch_timeout = Duration::from_secs(config.metadata_fetch_timeout_secs.max(1));

    let metadata = Arc::new(MetadataFetcher::new(
        http.clone(),
        fetch_timeout,
        gateways.clone(),
    ));
    let strategy = parse_enumeration_strategy(Some(&config.enumeration_strategy))?;
    let mut resolver = OwnershipResolver::new(metadata, &config.collection_name)
        .with_strategy(strategy)
        .with_concurrency(config.metadata_fetch_concurrency)
        .with_max_tokens(config.max_tokens_per_wallet)
        .with_gateways(gateways.clone());

    if config.has_collection_contract() {
        let reader = Arc::new(Erc721Reader::from_config(&config)?);
        tracing::info!(
            "On-chain resolution enabled contract={:?} strategy={:?}",
            reader.contract_address(),
            strategy
        );
        let probe = reader.clone();
        let expected_chain = config.shape_chain_id;
        tokio::spawn(async move {
            if let Err(err) = probe.verify_chain_id(expected_chain).await {
                tracing::warn!("Shape RPC chain id check failed err={}", err);
            }
        });
        resolver = resolver.with_reader(reader);
    }

    if !config.fighters_api_url.is_empty() {
        tracing::info!("External fighter inventory enabled url={}", config.fighters_api_url);
        resolver = resolver.with_inventory(Arc::new(FightersApiClient::new(
            &config.fighters_api_url,
            http,
            fetch_timeout,
            gateways,
            &config.collection_name,
        )));
    }

    // Proxied RPC calls get their own client so the metadata timeout does not apply
    let rpc_http = reqwest::Client::builder().build()?;

    let app_state = api::AppState {
        resolver: Arc::new(resolver),
        epochs: ResolutionEpochs::new(),
        limiter: FixedWindowLimiter::from_config(&config, counters),
        forwarder: RpcForwarder::from_config(rpc_http, &config),
        profiles: ProfileStore::new(kv.clone()),
        training: TrainingStore::new(kv),
        kv_backend,
        config: config.clone(),
    };
    tracing::info!(
        "RPC guard upstream={} timeout={:?} limiter={} enabled={}",
        app_state.forwarder.upstream_url(),
        app_state.forwarder.timeout(),
        app_state.limiter.backend_name(),
        app_state.limiter.is_enabled()
    );

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // NFT ownership
        .route("/api/v1/nft/owned/{address}", get(api::nft::get_owned))
        .route("/api/v1/nft/session/{session_id}", get(api::nft::get_session))
        .route("/api/v1/nft/config", get(api::nft::get_collection_config))
        // Profile
        .route(
            "/api/v1/profile/{address}",
            get(api::profile::get_profile).put(api::profile::update_profile),
        )
        // Training
        .route("/api/v1/training/{address}", get(api::training::get_status))
        .route(
            "/api/v1/training/{address}/strava/connect",
            post(api::training::connect_strava),
        )
        .route(
            "/api/v1/training/{address}/strava",
            delete(api::training::disconnect_strava),
        )
        .route(
            "/api/v1/training/{address}/sync",
            post(api::training::sync_activity),
        )
        // Leaderboard
        .route(
            "/api/v1/leaderboard/{view}",
            get(api::leaderboard::get_leaderboard),
        )
        .layer(cors)
        // The RPC proxy sets its own CORS headers
        .route(
            "/api/rpc",
            post(api::rpc::proxy_rpc).options(api::rpc::rpc_preflight),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
