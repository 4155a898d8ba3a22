// End-to-end consistency between the two whitelist call sites: the root
// computed before deployment and the proofs generated at mint time must
// describe the same tree, and every proof must survive the sorted-pair fold
// the deployed verifier runs.

use ethers::types::H256;
use nft_launchpad_service::contract::encode_whitelist_mint;
use nft_launchpad_service::error::WhitelistError;
use nft_launchpad_service::merkle::verify_proof;
use nft_launchpad_service::whitelist::{
    build_root, generate_proof, leaf_hash, normalize_address, parse_wallet_list,
};

const WALLETS: [&str; 7] = [
    "0xdAC17F958D2ee523a2206206994597C13D831ec7",
    "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
    "0x6B175474E89094C44Da98b954EedeAC495271d0F",
    "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599",
    "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
    "0x514910771AF9Ca656af840dff83E8264EcF986CA",
    "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984",
];

const OUTSIDER: &str = "0x7D1AfA7B718fb893dB30A3aBc0Cfc608AaCfeBB0";

fn wallets(count: usize) -> Vec<String> {
    WALLETS[..count].iter().map(|s| s.to_string()).collect()
}

fn member_leaf(address: &str) -> H256 {
    leaf_hash(&normalize_address(address).unwrap()).unwrap()
}

#[test]
fn three_member_scenario() {
    let set = wallets(3);
    let root = build_root(&set).unwrap();

    let proof_a = generate_proof(&set, WALLETS[0]).unwrap();
    assert!(verify_proof(member_leaf(WALLETS[0]), &proof_a, root));

    // Tampering with a single byte must break verification.
    let mut tampered = proof_a.clone();
    let mut bytes = tampered[0].to_fixed_bytes();
    bytes[31] ^= 0x01;
    tampered[0] = H256::from(bytes);
    assert!(!verify_proof(member_leaf(WALLETS[0]), &tampered, root));
}

#[test]
fn every_member_verifies_across_set_sizes() {
    for count in 1..=WALLETS.len() {
        let set = wallets(count);
        let root = build_root(&set).unwrap();

        for member in &set {
            let proof = generate_proof(&set, member).unwrap();
            assert!(
                verify_proof(member_leaf(member), &proof, root),
                "member {} failed in a {}-wallet set",
                member,
                count
            );
        }
    }
}

#[test]
fn deploy_root_matches_proofs_from_the_persisted_copy() {
    // The creator types checksummed addresses into the deploy form; the
    // database copy may come back differently cased. Both call sites must
    // land on the same tree.
    let deploy_input = wallets(5);
    let persisted: Vec<String> = deploy_input.iter().map(|a| a.to_lowercase()).collect();

    let root = build_root(&deploy_input).unwrap();
    assert_eq!(root, build_root(&persisted).unwrap());

    for member in &deploy_input {
        let proof = generate_proof(&persisted, member).unwrap();
        assert!(verify_proof(member_leaf(member), &proof, root));
    }
}

#[test]
fn root_ignores_input_ordering() {
    let forward = wallets(6);
    let mut backward = forward.clone();
    backward.reverse();

    assert_eq!(build_root(&forward).unwrap(), build_root(&backward).unwrap());
}

#[test]
fn outsider_cannot_obtain_a_proof() {
    let set = wallets(4);
    let err = generate_proof(&set, OUTSIDER).unwrap_err();
    assert!(matches!(err, WhitelistError::NotWhitelisted(_)));
}

#[test]
fn proof_against_foreign_root_fails() {
    let set_a = wallets(4);
    let set_b = wallets(7);

    let root_b = build_root(&set_b).unwrap();
    let proof_a = generate_proof(&set_a, WALLETS[0]).unwrap();
    assert!(!verify_proof(member_leaf(WALLETS[0]), &proof_a, root_b));
}

#[test]
fn single_wallet_root_is_its_leaf() {
    let set = wallets(1);
    assert_eq!(build_root(&set).unwrap(), member_leaf(WALLETS[0]));
    assert!(generate_proof(&set, WALLETS[0]).unwrap().is_empty());
}

#[test]
fn free_text_input_feeds_the_same_tree() {
    let raw = wallets(4).join(" , ");
    let parsed = parse_wallet_list(&raw).unwrap();
    assert_eq!(build_root(&parsed).unwrap(), build_root(&wallets(4)).unwrap());
}

#[test]
fn generated_proof_encodes_into_mint_calldata() {
    let set = wallets(5);
    let proof = generate_proof(&set, WALLETS[2]).unwrap();
    let data = encode_whitelist_mint(&proof, 2u64.into()).unwrap();

    // Every sibling hash appears verbatim in the ABI-encoded payload.
    for node in &proof {
        assert!(
            data.windows(32).any(|window| window == node.as_bytes()),
            "proof node missing from calldata"
        );
    }
}
