// Whitelist Merkle engine: address normalization, leaf encoding, and the
// two call sites that must stay consistent with each other — the root
// committed at deploy time and the proofs generated at mint time.

use ethers::types::{Address, H256};
use ethers::utils::{keccak256, to_checksum};

use crate::error::WhitelistError;
use crate::merkle::MerkleTree;

/// Canonicalize an address string: trim surrounding whitespace, validate the
/// shape, and return the EIP-55 checksummed form.
///
/// Mixed-case input encodes a checksum and must match it exactly;
/// all-lowercase and all-uppercase input carries no checksum and is
/// accepted as-is.
pub fn normalize_address(input: &str) -> Result<String, WhitelistError> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .ok_or_else(|| WhitelistError::InvalidAddress(trimmed.to_string()))?;

    if body.len() != 40 {
        return Err(WhitelistError::InvalidAddress(trimmed.to_string()));
    }

    let bytes = hex::decode(body)
        .map_err(|_| WhitelistError::InvalidAddress(trimmed.to_string()))?;
    let checksummed = to_checksum(&Address::from_slice(&bytes), None);

    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    if has_upper && has_lower && trimmed != checksummed {
        return Err(WhitelistError::InvalidAddress(trimmed.to_string()));
    }

    Ok(checksummed)
}

/// Merkle leaf for a canonical address: keccak256 over the packed 20-byte
/// address. Hashing the ASCII string instead yields leaves the deployed
/// verifier rejects.
pub fn leaf_hash(canonical: &str) -> Result<H256, WhitelistError> {
    let address: Address = canonical
        .parse()
        .map_err(|_| WhitelistError::InvalidAddress(canonical.to_string()))?;
    Ok(H256::from(keccak256(address.as_bytes())))
}

/// Split free-text comma-separated wallet input into canonical addresses.
/// The first malformed entry aborts the whole batch.
pub fn parse_wallet_list(raw: &str) -> Result<Vec<String>, WhitelistError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(normalize_address)
        .collect()
}

fn normalized_leaves(addresses: &[String]) -> Result<(Vec<String>, Vec<H256>), WhitelistError> {
    let canonical = addresses
        .iter()
        .map(|addr| normalize_address(addr))
        .collect::<Result<Vec<_>, _>>()?;
    let leaves = canonical
        .iter()
        .map(|addr| leaf_hash(addr))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((canonical, leaves))
}

/// Compute the Merkle root for a whitelist set. Called once per collection,
/// right before deployment; the result is committed into the contract's
/// immutable sale configuration.
pub fn build_root(addresses: &[String]) -> Result<H256, WhitelistError> {
    let (_, leaves) = normalized_leaves(addresses)?;
    MerkleTree::new(leaves).root()
}

/// Generate the sibling path proving `claimant` belongs to `addresses`.
///
/// Rebuilds the tree from the stored list on every call; nothing is cached,
/// so the proof always reflects exactly the set the root was built from. A
/// claimant absent from the set is a `NotWhitelisted` error before the tree
/// is ever queried.
pub fn generate_proof(addresses: &[String], claimant: &str) -> Result<Vec<H256>, WhitelistError> {
    let claimant = normalize_address(claimant)?;
    let (canonical, leaves) = normalized_leaves(addresses)?;

    if !canonical.iter().any(|addr| *addr == claimant) {
        return Err(WhitelistError::NotWhitelisted(claimant));
    }

    MerkleTree::new(leaves).proof(leaf_hash(&claimant)?)
}
