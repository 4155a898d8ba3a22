// Collection contract access: typed reads of the on-chain configuration,
// total supply, and calldata builders for the two mint entry points.

use std::sync::Arc;

use dashmap::DashMap;
use ethers::abi::{Abi, Token};
use ethers::contract::Contract;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, Bytes, H256, U256};
use serde::Serialize;

use crate::error::ServiceError;

// ============================================================================
// COLLECTION ABI
// ============================================================================

const COLLECTION_ABI: &str = r#"[
    {"constant":true,"inputs":[],"name":"collectionConfig","outputs":[{"name":"maxTokens","type":"uint256"},{"name":"mintPrice","type":"uint256"},{"name":"whitelistPrice","type":"uint256"},{"name":"maxMintPerTx","type":"uint256"},{"name":"maxMintPerWallet","type":"uint256"}],"type":"function"},
    {"constant":true,"inputs":[],"name":"saleConfig","outputs":[{"name":"hasWhitelist","type":"bool"},{"name":"whitelistStart","type":"uint256"},{"name":"whitelistEnd","type":"uint256"},{"name":"publicSaleStart","type":"uint256"},{"name":"publicSaleEnd","type":"uint256"}],"type":"function"},
    {"constant":true,"inputs":[],"name":"totalSupply","outputs":[{"name":"","type":"uint256"}],"type":"function"},
    {"constant":false,"inputs":[{"name":"amount","type":"uint256"}],"name":"publicMint","outputs":[],"payable":true,"type":"function"},
    {"constant":false,"inputs":[{"name":"proof","type":"bytes32[]"},{"name":"amount","type":"uint256"}],"name":"whitelistMint","outputs":[],"payable":true,"type":"function"}
]"#;

lazy_static::lazy_static! {
    static ref ABI: Abi = serde_json::from_str(COLLECTION_ABI).expect("collection ABI parses");
}

// ============================================================================
// ON-CHAIN CONFIG MIRRORS
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct CollectionConfig {
    pub max_tokens: U256,
    pub mint_price: U256,
    pub whitelist_price: U256,
    pub max_mint_per_tx: U256,
    pub max_mint_per_wallet: U256,
}

/// Sale windows as unix-second timestamps. A zero `publicSaleStart` means
/// the public sale opens when the whitelist window closes; a zero window end
/// leaves the window open-ended.
#[derive(Debug, Clone, Copy)]
pub struct SaleConfig {
    pub has_whitelist: bool,
    pub whitelist_start: u64,
    pub whitelist_end: u64,
    pub public_sale_start: u64,
    pub public_sale_end: u64,
}

impl From<(bool, U256, U256, U256, U256)> for SaleConfig {
    fn from(raw: (bool, U256, U256, U256, U256)) -> Self {
        let (has_whitelist, whitelist_start, whitelist_end, public_sale_start, public_sale_end) =
            raw;
        let whitelist_end = whitelist_end.as_u64();
        let public_sale_start = public_sale_start.as_u64();

        Self {
            has_whitelist,
            whitelist_start: whitelist_start.as_u64(),
            whitelist_end,
            public_sale_start: if public_sale_start == 0 {
                whitelist_end
            } else {
                public_sale_start
            },
            public_sale_end: public_sale_end.as_u64(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalePhase {
    NotStarted,
    Whitelist,
    Public,
    Ended,
}

fn window_contains(start: u64, end: u64, now: u64) -> bool {
    now >= start && (end == 0 || now < end)
}

impl SaleConfig {
    pub fn phase_at(&self, now: u64) -> SalePhase {
        if self.has_whitelist && window_contains(self.whitelist_start, self.whitelist_end, now) {
            return SalePhase::Whitelist;
        }
        if window_contains(self.public_sale_start, self.public_sale_end, now) {
            return SalePhase::Public;
        }

        let first_start = if self.has_whitelist && self.whitelist_start > 0 {
            self.whitelist_start
        } else {
            self.public_sale_start
        };
        if now < first_start {
            SalePhase::NotStarted
        } else {
            SalePhase::Ended
        }
    }
}

// ============================================================================
// GATEWAY
// ============================================================================

/// Read-side gateway to deployed collection contracts. Collection and sale
/// configuration are immutable after deployment, so successful reads are
/// cached for the life of the process; `totalSupply` is never cached.
pub struct CollectionGateway {
    provider: Arc<Provider<Http>>,
    collection_cache: DashMap<Address, CollectionConfig>,
    sale_cache: DashMap<Address, SaleConfig>,
}

impl CollectionGateway {
    pub fn new(provider: Provider<Http>) -> Self {
        Self {
            provider: Arc::new(provider),
            collection_cache: DashMap::new(),
            sale_cache: DashMap::new(),
        }
    }

    fn contract(&self, address: Address) -> Contract<Provider<Http>> {
        Contract::new(address, ABI.clone(), self.provider.clone())
    }

    pub async fn collection_config(
        &self,
        address: Address,
    ) -> Result<CollectionConfig, ServiceError> {
        if let Some(cached) = self.collection_cache.get(&address) {
            return Ok(*cached);
        }

        let (max_tokens, mint_price, whitelist_price, max_mint_per_tx, max_mint_per_wallet) = self
            .contract(address)
            .method::<_, (U256, U256, U256, U256, U256)>("collectionConfig", ())
            .map_err(|e| ServiceError::Contract(e.to_string()))?
            .call()
            .await
            .map_err(|e| ServiceError::Contract(e.to_string()))?;

        let config = CollectionConfig {
            max_tokens,
            mint_price,
            whitelist_price,
            max_mint_per_tx,
            max_mint_per_wallet,
        };
        self.collection_cache.insert(address, config);
        Ok(config)
    }

    pub async fn sale_config(&self, address: Address) -> Result<SaleConfig, ServiceError> {
        if let Some(cached) = self.sale_cache.get(&address) {
            return Ok(*cached);
        }

        let raw = self
            .contract(address)
            .method::<_, (bool, U256, U256, U256, U256)>("saleConfig", ())
            .map_err(|e| ServiceError::Contract(e.to_string()))?
            .call()
            .await
            .map_err(|e| ServiceError::Contract(e.to_string()))?;

        let config = SaleConfig::from(raw);
        self.sale_cache.insert(address, config);
        Ok(config)
    }

    pub async fn total_supply(&self, address: Address) -> Result<U256, ServiceError> {
        self.contract(address)
            .method::<_, U256>("totalSupply", ())
            .map_err(|e| ServiceError::Contract(e.to_string()))?
            .call()
            .await
            .map_err(|e| ServiceError::Contract(e.to_string()))
    }
}

// ============================================================================
// MINT CALLDATA
// ============================================================================

pub fn encode_public_mint(amount: U256) -> Result<Bytes, ServiceError> {
    let data = ABI
        .function("publicMint")
        .map_err(|e| ServiceError::Contract(e.to_string()))?
        .encode_input(&[Token::Uint(amount)])
        .map_err(|e| ServiceError::Contract(e.to_string()))?;
    Ok(Bytes::from(data))
}

pub fn encode_whitelist_mint(proof: &[H256], amount: U256) -> Result<Bytes, ServiceError> {
    let proof_tokens: Vec<Token> = proof
        .iter()
        .map(|node| Token::FixedBytes(node.as_bytes().to_vec()))
        .collect();

    let data = ABI
        .function("whitelistMint")
        .map_err(|e| ServiceError::Contract(e.to_string()))?
        .encode_input(&[Token::Array(proof_tokens), Token::Uint(amount)])
        .map_err(|e| ServiceError::Contract(e.to_string()))?;
    Ok(Bytes::from(data))
}

/// Wei to attach to a mint transaction.
pub fn mint_value(price_wei: U256, amount: U256) -> Result<U256, ServiceError> {
    price_wei
        .checked_mul(amount)
        .ok_or_else(|| ServiceError::Contract("Mint value overflows".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::keccak256;

    fn sale_config() -> SaleConfig {
        SaleConfig {
            has_whitelist: true,
            whitelist_start: 100,
            whitelist_end: 200,
            public_sale_start: 200,
            public_sale_end: 300,
        }
    }

    #[test]
    fn abi_exposes_the_collection_surface() {
        for name in [
            "collectionConfig",
            "saleConfig",
            "totalSupply",
            "publicMint",
            "whitelistMint",
        ] {
            assert!(ABI.function(name).is_ok(), "missing {}", name);
        }
    }

    #[test]
    fn phase_follows_the_sale_windows() {
        let config = sale_config();
        assert_eq!(config.phase_at(50), SalePhase::NotStarted);
        assert_eq!(config.phase_at(100), SalePhase::Whitelist);
        assert_eq!(config.phase_at(199), SalePhase::Whitelist);
        assert_eq!(config.phase_at(200), SalePhase::Public);
        assert_eq!(config.phase_at(299), SalePhase::Public);
        assert_eq!(config.phase_at(300), SalePhase::Ended);
    }

    #[test]
    fn whitelist_window_is_ignored_without_a_whitelist() {
        let mut config = sale_config();
        config.has_whitelist = false;
        assert_eq!(config.phase_at(150), SalePhase::NotStarted);
        assert_eq!(config.phase_at(250), SalePhase::Public);
    }

    #[test]
    fn zero_end_leaves_the_public_window_open() {
        let mut config = sale_config();
        config.public_sale_end = 0;
        assert_eq!(config.phase_at(1_000_000), SalePhase::Public);
    }

    #[test]
    fn zero_public_start_falls_back_to_whitelist_end() {
        let raw = (
            true,
            U256::from(100u64),
            U256::from(200u64),
            U256::zero(),
            U256::from(300u64),
        );
        let config = SaleConfig::from(raw);
        assert_eq!(config.public_sale_start, 200);
    }

    #[test]
    fn public_mint_calldata_carries_selector_and_amount() {
        let data = encode_public_mint(U256::from(3u64)).unwrap();
        let selector = &keccak256("publicMint(uint256)".as_bytes())[..4];

        assert_eq!(&data[..4], selector);
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(data[data.len() - 1], 3);
    }

    #[test]
    fn whitelist_mint_calldata_encodes_the_proof_array() {
        let proof = vec![
            H256::from(keccak256([1u8])),
            H256::from(keccak256([2u8])),
        ];
        let data = encode_whitelist_mint(&proof, U256::from(2u64)).unwrap();
        let selector = &keccak256("whitelistMint(bytes32[],uint256)".as_bytes())[..4];

        assert_eq!(&data[..4], selector);
        // selector + (offset, amount) head + array length + two nodes
        assert_eq!(data.len(), 4 + 64 + 32 + 32 * proof.len());
        // amount sits in the second head slot
        assert_eq!(data[4 + 63], 2);
        // proof nodes are embedded verbatim
        assert_eq!(&data[4 + 96..4 + 128], proof[0].as_bytes());
        assert_eq!(&data[4 + 128..], proof[1].as_bytes());
    }

    #[test]
    fn mint_value_multiplies_and_guards_overflow() {
        assert_eq!(
            mint_value(U256::from(50u64), U256::from(3u64)).unwrap(),
            U256::from(150u64)
        );
        assert!(mint_value(U256::MAX, U256::from(2u64)).is_err());
    }
}
