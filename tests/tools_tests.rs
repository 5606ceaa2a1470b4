//! Tool calls end to end against scripted chains.

use ethers_core::abi::{encode, Token};
use ethers_core::types::{Address, U256};
use serde_json::{json, Value};
use std::sync::Arc;

use eth_mcp_server::{
    blockchain::{
        client::ClientError,
        contracts::{self, encode_call},
        mock::{MockChain, MockClientFactory},
        networks::NetworkRegistry,
    },
    config::{Config, PRIVATE_KEY_ENV},
    mcp::protocol::ToolResponse,
    tools::dispatch,
    AppState,
};

const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const VITALIK: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";
const TOKEN: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";
const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

struct Harness {
    state: AppState,
    factory: Arc<MockClientFactory>,
    mainnet: Arc<MockChain>,
    sepolia: Arc<MockChain>,
}

fn endpoint(name: &str) -> String {
    NetworkRegistry::builtin()
        .lookup(name)
        .unwrap()
        .rpc_template
        .clone()
}

fn harness_with(config: Config) -> Harness {
    let factory = Arc::new(MockClientFactory::new());
    let mut chains = Vec::new();
    for network in NetworkRegistry::builtin().list() {
        let chain = Arc::new(MockChain::new(network.chain_id));
        factory.add_chain(&network.rpc_template, chain.clone());
        chains.push((network.name.clone(), chain));
    }
    let pick = |name: &str| {
        chains
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.clone())
            .unwrap()
    };
    let mainnet = pick("mainnet");
    let sepolia = pick("sepolia");
    let state = AppState::new(config, factory.clone()).unwrap();
    Harness {
        state,
        factory,
        mainnet,
        sepolia,
    }
}

fn harness() -> Harness {
    harness_with(Config::default())
}

fn with_wallet() -> Harness {
    harness_with(Config {
        private_key: Some(DEV_KEY.to_string()),
        ..Config::default()
    })
}

fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

fn eth(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

async fn call(h: &Harness, tool: &str, args: Value) -> ToolResponse {
    dispatch(&h.state, tool, &args).await
}

fn text(resp: &ToolResponse) -> String {
    resp.joined_text()
}

fn as_json(resp: &ToolResponse) -> Value {
    serde_json::from_str(&resp.joined_text()).unwrap()
}

fn script_erc20(chain: &MockChain, token: Address, symbol: &str, decimals: u64) {
    chain.set_code(token, vec![0x60u8, 0x80]);
    chain.set_call(
        token,
        encode_call("symbol()", vec![]),
        encode(&[Token::String(symbol.to_string())]),
    );
    chain.set_call(
        token,
        encode_call("name()", vec![]),
        encode(&[Token::String(format!("{} Token", symbol))]),
    );
    chain.set_call(
        token,
        encode_call("decimals()", vec![]),
        encode(&[Token::Uint(U256::from(decimals))]),
    );
}

fn script_erc20_balance(chain: &MockChain, token: Address, owner: Address, amount: U256) {
    chain.set_call(
        token,
        encode_call("balanceOf(address)", vec![Token::Address(owner)]),
        encode(&[Token::Uint(amount)]),
    );
}

#[tokio::test]
async fn test_wallet_balance_on_default_network() {
    let h = harness();
    h.mainnet
        .set_balance(addr(VITALIK), eth(3) / 2);

    let resp = call(&h, "getWalletBalance", json!({"address": VITALIK})).await;
    assert!(!resp.is_error, "{}", text(&resp));
    let out = text(&resp);
    assert!(out.contains("1.5 ETH"), "{}", out);
    assert!(out.contains("1500000000000000000 wei"), "{}", out);
    assert!(out.contains("mainnet"), "{}", out);
}

#[tokio::test]
async fn test_named_provider_and_alias_share_a_connection() {
    let h = harness();
    h.sepolia.set_block_number(4_200_000);

    let first = call(&h, "getBlockNumber", json!({"provider": "sepolia"})).await;
    let second = call(&h, "getBlockNumber", json!({"provider": " Sepolia ", "chainId": 11155111})).await;
    assert!(text(&first).contains("4200000"));
    assert_eq!(text(&first), text(&second));
    assert_eq!(h.factory.connect_count(), 1);
}

#[tokio::test]
async fn test_unknown_provider_lists_supported_networks() {
    let h = harness();
    let resp = call(&h, "getBlockNumber", json!({"provider": "narnia"})).await;
    assert!(resp.is_error);
    let out = text(&resp);
    assert!(out.starts_with("UnknownNetwork:"), "{}", out);
    assert!(out.contains("narnia"));
    assert!(out.contains("mainnet") && out.contains("sepolia"));
    assert_eq!(h.factory.connect_count(), 0);
}

#[tokio::test]
async fn test_chain_id_mismatch_is_reported() {
    let h = harness();
    let resp = call(&h, "getGasPrice", json!({"provider": "sepolia", "chainId": 1})).await;
    assert!(resp.is_error);
    assert!(text(&resp).starts_with("ChainIdMismatch:"), "{}", text(&resp));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_connection_failure() {
    let h = harness();
    h.factory.set_unreachable(&endpoint("holesky"));
    let resp = call(&h, "getBlockNumber", json!({"provider": "holesky"})).await;
    assert!(resp.is_error);
    assert!(text(&resp).starts_with("ConnectionFailed:"), "{}", text(&resp));
}

#[tokio::test]
async fn test_every_bad_field_is_reported_at_once() {
    let h = harness();
    let resp = call(
        &h,
        "getERC20Allowance",
        json!({"tokenAddress": "0x1234", "ownerAddress": VITALIK}),
    )
    .await;
    assert!(resp.is_error);
    let out = text(&resp);
    assert!(out.starts_with("ValidationFailure: 2 invalid argument(s):"), "{}", out);
    assert!(out.contains("tokenAddress (address)"), "{}", out);
    assert!(out.contains("spenderAddress (required)"), "{}", out);
    assert_eq!(h.factory.connect_count(), 0);
}

#[tokio::test]
async fn test_unknown_tool() {
    let h = harness();
    let resp = call(&h, "mintMoney", json!({})).await;
    assert!(resp.is_error);
    assert!(text(&resp).contains("unknown tool 'mintMoney'"));
}

#[tokio::test]
async fn test_signing_tools_need_a_wallet() {
    let h = harness();
    let resp = call(&h, "sendTransaction", json!({"to": RECIPIENT, "value": "0.1"})).await;
    assert!(resp.is_error);
    let out = text(&resp);
    assert!(out.starts_with("NoWalletError:"), "{}", out);
    assert!(out.contains("generateWallet"));
    // The wallet check comes before any connection.
    assert_eq!(h.factory.connect_count(), 0);
}

#[tokio::test]
async fn test_send_transaction_signs_for_the_resolved_chain() {
    let h = with_wallet();
    h.sepolia.set_balance(addr(DEV_ADDRESS), eth(2));

    let resp = call(
        &h,
        "sendTransaction",
        json!({"to": RECIPIENT, "value": "0.25", "provider": "sepolia"}),
    )
    .await;
    assert!(!resp.is_error, "{}", text(&resp));
    let body = as_json(&resp);
    assert_eq!(body["chainId"], json!(11155111));
    assert!(body["explorerUrl"].as_str().unwrap().starts_with("https://sepolia.etherscan.io/tx/0x"));

    let sent = h.sepolia.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, addr(DEV_ADDRESS));
    assert_eq!(sent[0].chain_id, Some(11155111));
    assert_eq!(sent[0].tx.to_addr(), Some(&addr(RECIPIENT)));
    assert_eq!(sent[0].tx.value(), Some(&(eth(1) / 4)));
    assert_eq!(format!("{:?}", sent[0].hash), body["transactionHash"].as_str().unwrap());
    assert!(h.mainnet.sent_transactions().is_empty());
}

#[tokio::test]
async fn test_send_transaction_checks_balance_first() {
    let h = with_wallet();
    h.mainnet.set_balance(addr(DEV_ADDRESS), eth(1));
    let resp = call(&h, "sendTransaction", json!({"to": RECIPIENT, "value": "5"})).await;
    assert!(resp.is_error);
    assert!(text(&resp).starts_with("InsufficientBalance:"), "{}", text(&resp));
    assert!(h.mainnet.sent_transactions().is_empty());
}

#[tokio::test]
async fn test_node_rejection_is_classified() {
    let h = with_wallet();
    h.mainnet.set_balance(addr(DEV_ADDRESS), eth(1));
    h.mainnet
        .fail_sends_with(ClientError::Rpc("execution reverted: paused".into()));
    let resp = call(&h, "sendTransaction", json!({"to": RECIPIENT, "value": "0.1"})).await;
    assert!(resp.is_error);
    assert!(text(&resp).starts_with("UpstreamRevert:"), "{}", text(&resp));
}

#[tokio::test]
async fn test_wallet_lifecycle() {
    let h = harness();
    let before = as_json(&call(&h, "checkWalletExists", json!({})).await);
    assert_eq!(before["exists"], json!(false));

    let loaded = call(&h, "loadWallet", json!({"privateKey": DEV_KEY})).await;
    assert!(!loaded.is_error, "{}", text(&loaded));
    assert!(text(&loaded).contains(DEV_ADDRESS));

    let after = as_json(&call(&h, "checkWalletExists", json!({})).await);
    assert_eq!(after["exists"], json!(true));
    assert_eq!(after["address"], json!(DEV_ADDRESS));

    let bad = call(&h, "loadWallet", json!({"privateKey": "0x1234"})).await;
    assert!(bad.is_error);
    assert!(text(&bad).starts_with("ValidationFailure: privateKey:"), "{}", text(&bad));
    // A rejected key leaves the previous wallet active.
    let still = as_json(&call(&h, "checkWalletExists", json!({})).await);
    assert_eq!(still["address"], json!(DEV_ADDRESS));
}

#[tokio::test]
async fn test_generate_wallet_can_persist_to_environment() {
    let h = harness();
    let resp = call(&h, "generateWallet", json!({"saveToEnv": true})).await;
    assert!(!resp.is_error, "{}", text(&resp));
    let body = as_json(&resp);
    assert_eq!(body["persisted"], json!(true));
    assert_eq!(body["mnemonic"].as_str().unwrap().split_whitespace().count(), 12);
    assert_eq!(
        std::env::var(PRIVATE_KEY_ENV).unwrap(),
        body["privateKey"].as_str().unwrap()
    );
}

#[tokio::test]
async fn test_sign_message() {
    let h = with_wallet();
    let body = as_json(&call(&h, "signMessage", json!({"message": "hello"})).await);
    assert_eq!(body["address"], json!(DEV_ADDRESS));
    let signature = body["signature"].as_str().unwrap();
    assert!(signature.starts_with("0x"));
    assert_eq!(signature.len(), 2 + 130);
}

#[tokio::test]
async fn test_erc20_token_info_and_balance() {
    let h = harness();
    let token = addr(TOKEN);
    script_erc20(&h.mainnet, token, "DAI", 18);
    h.mainnet.set_call(
        token,
        encode_call("totalSupply()", vec![]),
        encode(&[Token::Uint(eth(1_000))]),
    );
    script_erc20_balance(&h.mainnet, token, addr(VITALIK), eth(5) / 2);

    let info = as_json(&call(&h, "getERC20TokenInfo", json!({"tokenAddress": TOKEN})).await);
    assert_eq!(info["symbol"], json!("DAI"));
    assert_eq!(info["name"], json!("DAI Token"));
    assert_eq!(info["decimals"], json!(18));
    assert_eq!(info["totalSupplyFormatted"], json!("1000.0"));

    let balance = call(
        &h,
        "getERC20Balance",
        json!({"tokenAddress": TOKEN, "ownerAddress": VITALIK}),
    )
    .await;
    assert!(text(&balance).contains("2.5 DAI"), "{}", text(&balance));
}

#[tokio::test]
async fn test_erc20_at_address_without_code_is_token_not_found() {
    let h = harness();
    let resp = call(
        &h,
        "getERC20Balance",
        json!({"tokenAddress": TOKEN, "ownerAddress": VITALIK}),
    )
    .await;
    assert!(resp.is_error);
    assert!(text(&resp).starts_with("TokenNotFound:"), "{}", text(&resp));
}

#[tokio::test]
async fn test_erc20_metadata_timeout_is_connection_failure() {
    let h = with_wallet();
    let token = addr(TOKEN);
    script_erc20(&h.mainnet, token, "USDC", 6);
    script_erc20_balance(&h.mainnet, token, addr(DEV_ADDRESS), U256::from(1_000_000u64));
    h.mainnet.set_call_error(
        token,
        encode_call("decimals()", vec![]),
        ClientError::Unreachable("request timed out after 30s".into()),
    );

    let info = call(&h, "getERC20TokenInfo", json!({"tokenAddress": TOKEN})).await;
    assert!(info.is_error);
    assert!(text(&info).starts_with("ConnectionFailed:"), "{}", text(&info));

    let transfer = call(
        &h,
        "transferERC20",
        json!({"tokenAddress": TOKEN, "recipientAddress": RECIPIENT, "amount": "0.5"}),
    )
    .await;
    assert!(transfer.is_error);
    assert!(text(&transfer).starts_with("ConnectionFailed:"), "{}", text(&transfer));
    assert!(h.mainnet.sent_transactions().is_empty());
}

#[tokio::test]
async fn test_transfer_erc20_uses_token_decimals() {
    let h = with_wallet();
    let token = addr(TOKEN);
    script_erc20(&h.mainnet, token, "USDC", 6);
    script_erc20_balance(&h.mainnet, token, addr(DEV_ADDRESS), U256::from(1_000_000u64));

    let short = call(
        &h,
        "transferERC20",
        json!({"tokenAddress": TOKEN, "recipientAddress": RECIPIENT, "amount": "5"}),
    )
    .await;
    assert!(short.is_error);
    assert!(text(&short).starts_with("InsufficientBalance:"), "{}", text(&short));

    let too_precise = call(
        &h,
        "transferERC20",
        json!({"tokenAddress": TOKEN, "recipientAddress": RECIPIENT, "amount": "0.0000001"}),
    )
    .await;
    assert!(text(&too_precise).contains("amount (precision)"), "{}", text(&too_precise));

    let ok = call(
        &h,
        "transferERC20",
        json!({"tokenAddress": TOKEN, "recipientAddress": RECIPIENT, "amount": "0.5"}),
    )
    .await;
    assert!(!ok.is_error, "{}", text(&ok));
    let sent = h.mainnet.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tx.to_addr(), Some(&token));
    assert_eq!(
        sent[0].tx.data().unwrap(),
        &contracts::erc20_transfer_data(addr(RECIPIENT), U256::from(500_000u64))
    );
}

#[tokio::test]
async fn test_transfer_nft_requires_ownership() {
    let h = with_wallet();
    let collection = addr(TOKEN);
    h.mainnet.set_code(collection, vec![0x60u8, 0x80]);
    h.mainnet.set_call(
        collection,
        encode_call("ownerOf(uint256)", vec![Token::Uint(U256::from(7u64))]),
        encode(&[Token::Address(addr(VITALIK))]),
    );

    let resp = call(
        &h,
        "transferNFT",
        json!({"contractAddress": TOKEN, "toAddress": RECIPIENT, "tokenId": "7"}),
    )
    .await;
    assert!(resp.is_error);
    assert!(text(&resp).starts_with("Unauthorized:"), "{}", text(&resp));
    assert!(h.mainnet.sent_transactions().is_empty());
}

#[tokio::test]
async fn test_transfer_nft_owned_by_wallet() {
    let h = with_wallet();
    let collection = addr(TOKEN);
    h.mainnet.set_code(collection, vec![0x60u8, 0x80]);
    h.mainnet.set_call(
        collection,
        encode_call("ownerOf(uint256)", vec![Token::Uint(U256::from(7u64))]),
        encode(&[Token::Address(addr(DEV_ADDRESS))]),
    );

    let resp = call(
        &h,
        "transferNFT",
        json!({"contractAddress": TOKEN, "toAddress": RECIPIENT, "tokenId": 7}),
    )
    .await;
    assert!(!resp.is_error, "{}", text(&resp));
    let sent = h.mainnet.sent_transactions();
    assert_eq!(
        sent[0].tx.data().unwrap(),
        &contracts::erc721_transfer_data(addr(DEV_ADDRESS), addr(RECIPIENT), U256::from(7u64))
    );
}

#[tokio::test]
async fn test_erc1155_uri_expands_id() {
    let h = harness();
    let collection = addr(TOKEN);
    h.mainnet.set_code(collection, vec![0x60u8, 0x80]);
    h.mainnet.set_call(
        collection,
        encode_call("uri(uint256)", vec![Token::Uint(U256::from(255u64))]),
        encode(&[Token::String("ipfs://meta/{id}.json".to_string())]),
    );
    let body = as_json(
        &call(
            &h,
            "getERC1155TokenURI",
            json!({"contractAddress": TOKEN, "tokenId": "0xff"}),
        )
        .await,
    );
    assert_eq!(body["uri"], json!("ipfs://meta/{id}.json"));
    assert_eq!(
        body["resolvedUri"],
        json!(format!("ipfs://meta/{:0>64}.json", "ff"))
    );
}

#[tokio::test]
async fn test_contract_call_with_human_readable_abi() {
    let h = harness();
    let token = addr(TOKEN);
    h.mainnet.set_code(token, vec![0x60u8, 0x80]);
    script_erc20_balance(&h.mainnet, token, addr(VITALIK), U256::from(42u64));

    let resp = call(
        &h,
        "contractCall",
        json!({
            "contractAddress": TOKEN,
            "abi": ["function balanceOf(address owner) view returns (uint256)"],
            "method": "balanceOf",
            "args": [VITALIK],
        }),
    )
    .await;
    assert!(!resp.is_error, "{}", text(&resp));
    assert_eq!(as_json(&resp)["result"], json!("42"));

    let wrong_arity = call(
        &h,
        "contractCall",
        json!({
            "contractAddress": TOKEN,
            "abi": ["function balanceOf(address owner) view returns (uint256)"],
            "method": "balanceOf",
            "args": [],
        }),
    )
    .await;
    assert!(wrong_arity.is_error);
    assert!(text(&wrong_arity).starts_with("ValidationFailure:"), "{}", text(&wrong_arity));
}

#[tokio::test]
async fn test_unit_conversions() {
    let h = harness();
    assert_eq!(
        text(&call(&h, "formatEther", json!({"wei": "1500000000000000000"})).await),
        "1500000000000000000 wei = 1.5 ETH"
    );
    assert_eq!(
        text(&call(&h, "parseUnits", json!({"value": "2.5", "unit": "6"})).await),
        "2500000"
    );
    assert_eq!(
        text(&call(&h, "formatUnits", json!({"value": "2500000000", "unit": "gwei"})).await),
        "2.5"
    );
}
