// Collection registry: validated records keyed by collection address,
// stored as JSON in Redis with a createdAt-ordered index for pagination.
//
// Records are create-only. The whitelist wallet list is normalized once at
// creation and never editable afterwards — the Merkle root committed at
// deploy time is immutable on-chain, so a mutable list would only produce
// proofs the contract rejects.

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::whitelist::{normalize_address, parse_wallet_list};

const COLLECTION_KEY_PREFIX: &str = "collection:";
const COLLECTION_INDEX_KEY: &str = "collections:index";
const OWNER_INDEX_PREFIX: &str = "collections:owner:";

const MAX_ROYALTY_PERCENT: u32 = 9;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub collection_address: String,
    pub contract_owner: String,
    pub name: String,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_image: Option<String>,
    pub max_tokens: u64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist_price: Option<f64>,
    pub max_mint_per_tx: u32,
    pub max_mint_per_wallet: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_sale_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_sale_end: Option<DateTime<Utc>>,
    pub has_whitelist: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub whitelist_wallets: Vec<String>,
    pub royalty_fee: u32,
    pub created_at: DateTime<Utc>,
}

/// Creation payload as sent by the deploy flow. Wallets arrive as the
/// free-text comma-separated string the creator typed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionRequest {
    pub collection_address: String,
    pub contract_owner: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub base_uri: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub collection_image: Option<String>,
    pub max_tokens: u64,
    pub price: f64,
    #[serde(default)]
    pub whitelist_price: Option<f64>,
    pub max_mint_per_tx: u32,
    pub max_mint_per_wallet: u32,
    #[serde(default)]
    pub public_sale_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub public_sale_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_whitelist: bool,
    #[serde(default)]
    pub whitelist_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub whitelist_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub whitelist_wallets: Option<String>,
    pub royalty_fee: u32,
}

fn is_display_name(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ')
}

impl CreateCollectionRequest {
    /// Validate the payload and produce the record that gets persisted.
    pub fn into_record(self) -> Result<CollectionRecord, ServiceError> {
        let collection_address = normalize_address(&self.collection_address)?;
        let contract_owner = normalize_address(&self.contract_owner)?;

        if self.name.len() < 3 || self.name.len() > 50 || !is_display_name(&self.name) {
            return Err(ServiceError::InvalidRequest(
                "Collection name must be 3-50 letters, numbers, or spaces".to_string(),
            ));
        }
        if self.symbol.len() < 3 || self.symbol.len() > 10 || !is_display_name(&self.symbol) {
            return Err(ServiceError::InvalidRequest(
                "Symbol must be 3-10 letters, numbers, or spaces".to_string(),
            ));
        }
        if let Some(description) = &self.description {
            if description.len() > 300 {
                return Err(ServiceError::InvalidRequest(
                    "Description must be at most 300 characters".to_string(),
                ));
            }
        }
        if self.max_tokens < 1 {
            return Err(ServiceError::InvalidRequest(
                "Max supply must be at least 1".to_string(),
            ));
        }
        if self.price < 0.0 {
            return Err(ServiceError::InvalidRequest(
                "Price must be at least 0".to_string(),
            ));
        }
        if self.max_mint_per_tx < 1 || self.max_mint_per_wallet < 1 {
            return Err(ServiceError::InvalidRequest(
                "Mint limits must be at least 1".to_string(),
            ));
        }
        if self.royalty_fee > MAX_ROYALTY_PERCENT {
            return Err(ServiceError::InvalidRequest(format!(
                "Max royalty fee is {}% (1% is reserved for the platform)",
                MAX_ROYALTY_PERCENT
            )));
        }

        let whitelist_wallets = match &self.whitelist_wallets {
            Some(raw) => parse_wallet_list(raw)?,
            None => Vec::new(),
        };

        if self.has_whitelist {
            match self.whitelist_price {
                Some(price) if price >= 0.0 => {}
                _ => {
                    return Err(ServiceError::InvalidRequest(
                        "Whitelist price is required when whitelist is enabled".to_string(),
                    ))
                }
            }
            if whitelist_wallets.is_empty() {
                return Err(ServiceError::InvalidRequest(
                    "Whitelist is enabled but no wallets were provided; disable the whitelist instead".to_string(),
                ));
            }
        }

        Ok(CollectionRecord {
            collection_address,
            contract_owner,
            name: self.name,
            symbol: self.symbol,
            base_uri: self.base_uri,
            description: self.description,
            collection_image: self.collection_image,
            max_tokens: self.max_tokens,
            price: self.price,
            whitelist_price: self.whitelist_price,
            max_mint_per_tx: self.max_mint_per_tx,
            max_mint_per_wallet: self.max_mint_per_wallet,
            public_sale_start: self.public_sale_start,
            public_sale_end: self.public_sale_end,
            has_whitelist: self.has_whitelist,
            whitelist_start: self.whitelist_start,
            whitelist_end: self.whitelist_end,
            whitelist_wallets,
            royalty_fee: self.royalty_fee,
            created_at: Utc::now(),
        })
    }
}

// ============================================================================
// REDIS STORE
// ============================================================================

#[derive(Clone)]
pub struct CollectionStore {
    redis: ConnectionManager,
}

impl CollectionStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn record_key(address: &str) -> String {
        format!("{}{}", COLLECTION_KEY_PREFIX, address)
    }

    fn owner_key(owner: &str) -> String {
        format!("{}{}", OWNER_INDEX_PREFIX, owner)
    }

    /// Create-only insert; an existing record under the same address is a
    /// client error, not an overwrite.
    pub async fn insert(&self, record: &CollectionRecord) -> Result<(), ServiceError> {
        let mut conn = self.redis.clone();
        let json =
            serde_json::to_string(record).map_err(|e| ServiceError::Redis(e.to_string()))?;

        let created: bool = conn
            .set_nx(Self::record_key(&record.collection_address), &json)
            .await
            .map_err(|e| ServiceError::Redis(e.to_string()))?;
        if !created {
            return Err(ServiceError::InvalidRequest(format!(
                "Collection {} already exists",
                record.collection_address
            )));
        }

        let score = record.created_at.timestamp_millis() as f64;
        let _: () = conn
            .zadd(COLLECTION_INDEX_KEY, &record.collection_address, score)
            .await
            .map_err(|e| ServiceError::Redis(e.to_string()))?;
        let _: () = conn
            .zadd(
                Self::owner_key(&record.contract_owner),
                &record.collection_address,
                score,
            )
            .await
            .map_err(|e| ServiceError::Redis(e.to_string()))?;

        Ok(())
    }

    pub async fn get(&self, address: &str) -> Result<CollectionRecord, ServiceError> {
        let mut conn = self.redis.clone();
        let json: Option<String> = conn
            .get(Self::record_key(address))
            .await
            .map_err(|e| ServiceError::Redis(e.to_string()))?;

        let json = json.ok_or_else(|| ServiceError::CollectionNotFound(address.to_string()))?;
        serde_json::from_str(&json).map_err(|e| ServiceError::Redis(e.to_string()))
    }

    /// Newest-first page of records. `cursor` is the createdAt millisecond
    /// timestamp of the last record of the previous page; the returned
    /// cursor is `None` once the listing is exhausted.
    pub async fn list(
        &self,
        owner: Option<&str>,
        cursor: Option<i64>,
        limit: usize,
    ) -> Result<(Vec<CollectionRecord>, Option<i64>), ServiceError> {
        let index_key = match owner {
            Some(owner) => Self::owner_key(owner),
            None => COLLECTION_INDEX_KEY.to_string(),
        };
        let max = match cursor {
            Some(ts) => format!("({}", ts),
            None => "+inf".to_string(),
        };

        let mut conn = self.redis.clone();
        let addresses: Vec<String> = conn
            .zrevrangebyscore_limit(&index_key, max, "-inf", 0, (limit + 1) as isize)
            .await
            .map_err(|e| ServiceError::Redis(e.to_string()))?;

        let has_more = addresses.len() > limit;
        let mut records = Vec::with_capacity(limit.min(addresses.len()));
        for address in addresses.iter().take(limit) {
            records.push(self.get(address).await?);
        }

        let next_cursor = if has_more {
            records.last().map(|r| r.created_at.timestamp_millis())
        } else {
            None
        };

        Ok((records, next_cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WhitelistError;

    fn request() -> CreateCollectionRequest {
        CreateCollectionRequest {
            collection_address: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
            contract_owner: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string(),
            name: "Genesis Drop".to_string(),
            symbol: "GEN".to_string(),
            base_uri: Some("ipfs://bafy/".to_string()),
            description: None,
            collection_image: None,
            max_tokens: 10_000,
            price: 0.05,
            whitelist_price: Some(0.03),
            max_mint_per_tx: 5,
            max_mint_per_wallet: 20,
            public_sale_start: None,
            public_sale_end: None,
            has_whitelist: true,
            whitelist_start: None,
            whitelist_end: None,
            whitelist_wallets: Some(
                "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359, \
                 0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB"
                    .to_string(),
            ),
            royalty_fee: 5,
        }
    }

    #[test]
    fn valid_request_normalizes_addresses() {
        let record = request().into_record().unwrap();
        assert_eq!(
            record.collection_address,
            "0xdAC17F958D2ee523a2206206994597C13D831ec7"
        );
        assert_eq!(
            record.whitelist_wallets,
            vec![
                "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359".to_string(),
                "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB".to_string(),
            ]
        );
    }

    #[test]
    fn short_name_is_rejected() {
        let mut req = request();
        req.name = "ab".to_string();
        assert!(matches!(
            req.into_record(),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn symbol_charset_is_enforced() {
        let mut req = request();
        req.symbol = "GE$".to_string();
        assert!(matches!(
            req.into_record(),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn royalty_above_cap_is_rejected() {
        let mut req = request();
        req.royalty_fee = 10;
        assert!(matches!(
            req.into_record(),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn whitelist_requires_a_price() {
        let mut req = request();
        req.whitelist_price = None;
        assert!(matches!(
            req.into_record(),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn whitelist_requires_wallets() {
        let mut req = request();
        req.whitelist_wallets = Some("  ".to_string());
        assert!(matches!(
            req.into_record(),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn malformed_wallet_aborts_creation() {
        let mut req = request();
        req.whitelist_wallets = Some("0x1234, nope".to_string());
        assert!(matches!(
            req.into_record(),
            Err(ServiceError::Whitelist(WhitelistError::InvalidAddress(_)))
        ));
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = request().into_record().unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"collectionAddress\""));
        assert!(json.contains("\"whitelistWallets\""));

        let parsed: CollectionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.collection_address, record.collection_address);
        assert_eq!(parsed.whitelist_wallets, record.whitelist_wallets);
        assert_eq!(parsed.created_at, record.created_at);
    }
}
