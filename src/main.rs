// NFT LAUNCHPAD SERVICE
// Handles: collection registry, whitelist Merkle roots and proofs,
// collection contract reads, mint transaction preparation

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ethers::providers::{Http, Provider};
use ethers::types::{Address, U256};
use ethers::utils::{format_ether, parse_ether};
use redis::aio::ConnectionManager;
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use nft_launchpad_service::collections::{CollectionStore, CreateCollectionRequest};
use nft_launchpad_service::config::Config;
use nft_launchpad_service::contract::{self, CollectionGateway};
use nft_launchpad_service::error::ServiceError;
use nft_launchpad_service::whitelist;

// ============================================================================
// APPLICATION STATE
// ============================================================================

#[derive(Clone)]
struct AppState {
    store: CollectionStore,
    gateway: Arc<CollectionGateway>,
    config: Config,
}

// ============================================================================
// UTILITY FUNCTIONS
// ============================================================================

fn get_current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn parse_address(input: &str) -> Result<Address, ServiceError> {
    let canonical = whitelist::normalize_address(input)?;
    canonical
        .parse()
        .map_err(|_| ServiceError::InvalidRequest(format!("Invalid address: {}", canonical)))
}

fn price_to_wei(price_eth: f64) -> Result<U256, ServiceError> {
    parse_ether(price_eth)
        .map_err(|e| ServiceError::Configuration(format!("Invalid stored price: {}", e)))
}

// ============================================================================
// API REQUEST TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionsQuery {
    contract_owner: Option<String>,
    my_collections: Option<String>,
    cursor: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhitelistRootRequest {
    /// Free-text comma-separated wallet list, as typed into the deploy form.
    wallets: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhitelistProofRequest {
    user_address: String,
    collection_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrepareMintRequest {
    collection_address: String,
    user_address: String,
    amount: u32,
    #[serde(default)]
    whitelist: bool,
}

// ============================================================================
// API HANDLERS
// ============================================================================

async fn create_collection_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = req.into_record()?;
    state.store.insert(&record).await?;

    info!(
        "Registered collection {} ({}) with {} whitelisted wallets",
        record.name,
        record.collection_address,
        record.whitelist_wallets.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Collection added successfully",
            "collection": record
        })),
    ))
}

async fn list_collections_handler(
    State(state): State<AppState>,
    Query(query): Query<ListCollectionsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = if query.my_collections.as_deref() == Some("true") {
        match &query.contract_owner {
            Some(owner) => Some(whitelist::normalize_address(owner)?),
            None => None,
        }
    } else {
        None
    };

    let (collections, next_cursor) = state
        .store
        .list(owner.as_deref(), query.cursor, state.config.page_size)
        .await?;

    Ok(Json(serde_json::json!({
        "collections": collections,
        "nextCursor": next_cursor
    })))
}

async fn get_collection_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let canonical = whitelist::normalize_address(&address)?;
    let collection = state.store.get(&canonical).await?;

    Ok(Json(serde_json::json!({ "collection": collection })))
}

async fn collection_config_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let config = state
        .gateway
        .collection_config(parse_address(&address)?)
        .await?;

    Ok(Json(serde_json::json!({
        "maxTokens": config.max_tokens.as_u64(),
        "mintPrice": format_ether(config.mint_price),
        "mintPriceWei": config.mint_price.to_string(),
        "whitelistPrice": format_ether(config.whitelist_price),
        "whitelistPriceWei": config.whitelist_price.to_string(),
        "maxMintPerTx": config.max_mint_per_tx.as_u64(),
        "maxMintPerWallet": config.max_mint_per_wallet.as_u64(),
    })))
}

async fn sale_config_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let sale = state.gateway.sale_config(parse_address(&address)?).await?;

    Ok(Json(serde_json::json!({
        "hasWhitelist": sale.has_whitelist,
        "whitelistStart": sale.whitelist_start,
        "whitelistEnd": sale.whitelist_end,
        "publicSaleStart": sale.public_sale_start,
        "publicSaleEnd": sale.public_sale_end,
        "phase": sale.phase_at(get_current_timestamp()),
    })))
}

async fn total_supply_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let supply = state.gateway.total_supply(parse_address(&address)?).await?;

    Ok(Json(serde_json::json!({ "totalSupply": supply.as_u64() })))
}

/// Deploy-time call site: the returned root is passed as a constructor
/// argument and becomes immutable on-chain.
async fn whitelist_root_handler(
    Json(req): Json<WhitelistRootRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let wallets = whitelist::parse_wallet_list(&req.wallets)?;
    let root = whitelist::build_root(&wallets)?;

    info!("Computed whitelist root over {} wallets", wallets.len());

    Ok(Json(serde_json::json!({
        "root": format!("{:?}", root),
        "walletCount": wallets.len()
    })))
}

/// Mint-time call site: rebuilds the tree from the persisted wallet list on
/// every request, so the proof always matches the committed root.
async fn whitelist_proof_handler(
    State(state): State<AppState>,
    Json(req): Json<WhitelistProofRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let canonical = whitelist::normalize_address(&req.collection_address)?;
    let collection = state.store.get(&canonical).await?;

    if !collection.has_whitelist {
        return Err(ServiceError::InvalidRequest(format!(
            "Collection {} has no whitelist",
            collection.collection_address
        )));
    }
    if collection.whitelist_wallets.is_empty() {
        error!(
            "Whitelist-enabled collection {} has no stored wallet list",
            collection.collection_address
        );
        return Err(ServiceError::Configuration(format!(
            "Whitelist set unavailable for collection {}",
            collection.collection_address
        )));
    }

    let proof = whitelist::generate_proof(&collection.whitelist_wallets, &req.user_address)?;
    let root = whitelist::build_root(&collection.whitelist_wallets)?;

    info!(
        "Generated {}-node proof for {} on {}",
        proof.len(),
        req.user_address,
        collection.collection_address
    );

    Ok(Json(serde_json::json!({
        "proof": proof.iter().map(|node| format!("{:?}", node)).collect::<Vec<_>>(),
        "root": format!("{:?}", root)
    })))
}

async fn prepare_mint_handler(
    State(state): State<AppState>,
    Json(req): Json<PrepareMintRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let canonical = whitelist::normalize_address(&req.collection_address)?;
    let collection = state.store.get(&canonical).await?;

    if req.amount < 1 || req.amount > collection.max_mint_per_tx {
        return Err(ServiceError::InvalidRequest(format!(
            "Amount must be between 1 and {}",
            collection.max_mint_per_tx
        )));
    }

    let amount = U256::from(req.amount);
    let (data, price_eth, proof) = if req.whitelist {
        if !collection.has_whitelist {
            return Err(ServiceError::InvalidRequest(format!(
                "Collection {} has no whitelist",
                collection.collection_address
            )));
        }
        if collection.whitelist_wallets.is_empty() {
            return Err(ServiceError::Configuration(format!(
                "Whitelist set unavailable for collection {}",
                collection.collection_address
            )));
        }
        let price = collection.whitelist_price.ok_or_else(|| {
            ServiceError::Configuration(format!(
                "Whitelist price missing for collection {}",
                collection.collection_address
            ))
        })?;
        let proof = whitelist::generate_proof(&collection.whitelist_wallets, &req.user_address)?;
        let data = contract::encode_whitelist_mint(&proof, amount)?;
        (data, price, Some(proof))
    } else {
        let data = contract::encode_public_mint(amount)?;
        (data, collection.price, None)
    };

    let value = contract::mint_value(price_to_wei(price_eth)?, amount)?;

    info!(
        "Prepared {} mint of {} for {} on {}",
        if req.whitelist { "whitelist" } else { "public" },
        req.amount,
        req.user_address,
        collection.collection_address
    );

    Ok(Json(serde_json::json!({
        "to": collection.collection_address,
        "data": format!("0x{}", hex::encode(&data[..])),
        "value": value.to_string(),
        "chainId": state.config.chain_id,
        "proof": proof.map(|nodes| {
            nodes.iter().map(|node| format!("{:?}", node)).collect::<Vec<_>>()
        }),
    })))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "nft-launchpad",
        "version": "2.0.0",
        "status": "healthy",
        "chainId": state.config.chain_id,
    }))
}

// ============================================================================
// MAIN
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    info!("Starting NFT Launchpad Service v2.0");

    let redis_client = redis::Client::open(config.redis_url.clone())?;
    let redis_conn = ConnectionManager::new(redis_client).await?;
    info!("Connected to Redis");

    let provider = Provider::<Http>::try_from(config.eth_rpc_url.clone())?;

    let state = AppState {
        store: CollectionStore::new(redis_conn),
        gateway: Arc::new(CollectionGateway::new(provider)),
        config: config.clone(),
    };

    let app = Router::new()
        .route(
            "/collections",
            post(create_collection_handler).get(list_collections_handler),
        )
        .route("/collections/:address", get(get_collection_handler))
        .route("/collections/:address/config", get(collection_config_handler))
        .route("/collections/:address/sale", get(sale_config_handler))
        .route("/collections/:address/supply", get(total_supply_handler))
        .route("/whitelist/root", post(whitelist_root_handler))
        .route("/whitelist/proof", post(whitelist_proof_handler))
        .route("/mint/prepare", post(prepare_mint_handler))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("NFT Launchpad Service running on {}", addr);
    info!("Chain id: {} | RPC: {}", config.chain_id, config.eth_rpc_url);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
