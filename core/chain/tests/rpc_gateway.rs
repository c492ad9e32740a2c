// Contract gateway tests against a mocked JSON-RPC node

use agentverse_chain::abi::{self, event_topic, Function, Token};
use agentverse_chain::events::AGENT_RUN_CREATED;
use agentverse_chain::gateway::{DEFAULT_FOLLOW_UP, RUN_AGENT};
use agentverse_chain::{
    Address, ChainError, ContractGateway, GatewayConfig, RpcClient, RpcContractGateway, RunId,
    Signer,
};
use primitive_types::U256;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const MANAGER: &str = "0x2222222222222222222222222222222222222222";
const TX_HASH: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";

fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
    }))
}

fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

async fn mount_method(server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(response)
        .mount(server)
        .await;
}

fn gateway(server: &MockServer) -> RpcContractGateway {
    let mut config = GatewayConfig::new(MANAGER.parse().unwrap(), 4);
    config.receipt_poll_interval = Duration::from_millis(1);
    config.receipt_poll_attempts = 3;
    let rpc = RpcClient::new(&server.uri(), Duration::from_secs(5));
    RpcContractGateway::new(rpc, config).unwrap()
}

fn signer() -> Signer {
    Signer::new(Address([0x11; 20]))
}

/// `data` field of the transaction in an `eth_sendTransaction` request
fn sent_data(req: &Request) -> Option<String> {
    let body: Value = serde_json::from_slice(&req.body).ok()?;
    if body["method"] != "eth_sendTransaction" {
        return None;
    }
    body["params"][0]["data"].as_str().map(str::to_string)
}

#[tokio::test]
async fn test_chain_id() {
    let server = MockServer::start().await;
    mount_method(&server, "eth_chainId", rpc_result(json!("0x539"))).await;

    let rpc = RpcClient::new(&server.uri(), Duration::from_secs(5));
    assert_eq!(rpc.get_chain_id().await.unwrap(), 1337);
}

#[tokio::test]
async fn test_rpc_error_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "execution reverted" }
        })))
        .mount(&server)
        .await;

    let err = gateway(&server).is_run_finished(RunId(1)).await.unwrap_err();
    match err {
        ChainError::Rpc { code, message } => {
            assert_eq!(code, -32000);
            assert_eq!(message, "execution reverted");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_reads_decode_contract_output() {
    let server = MockServer::start().await;
    let contents = abi::encode(&[Token::Array(vec![
        Token::String("Hello world!".to_string()),
        Token::String("Hi there!".to_string()),
    ])]);
    let finished = abi::encode(&[Token::Bool(true)]);

    let contents_selector = Function::parse("getMessageHistoryContents(uint256)")
        .unwrap()
        .selector();
    let contents_data = hex_data(&contents);
    Mock::given(method("POST"))
        .and(move |req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap_or_default();
            body["method"] == "eth_call"
                && body["params"][0]["data"]
                    .as_str()
                    .map(|d| d.starts_with(&hex_data(&contents_selector)))
                    .unwrap_or(false)
        })
        .respond_with(rpc_result(json!(contents_data)))
        .mount(&server)
        .await;
    mount_method(&server, "eth_call", rpc_result(json!(hex_data(&finished)))).await;

    let gateway = gateway(&server);
    assert_eq!(
        gateway.get_message_contents(RunId(42)).await.unwrap(),
        vec!["Hello world!".to_string(), "Hi there!".to_string()]
    );
    assert!(gateway.is_run_finished(RunId(42)).await.unwrap());
}

#[tokio::test]
async fn test_run_creation_round_trip() {
    let server = MockServer::start().await;
    let selector = hex_data(&Function::parse(RUN_AGENT).unwrap().selector());

    Mock::given(method("POST"))
        .and(move |req: &Request| {
            sent_data(req)
                .map(|data| data.starts_with(&selector))
                .unwrap_or(false)
        })
        .respond_with(rpc_result(json!(TX_HASH)))
        .expect(1)
        .mount(&server)
        .await;

    let run_id_topic = {
        let mut word = [0u8; 32];
        U256::from(42u64).to_big_endian(&mut word);
        hex_data(&word)
    };
    mount_method(
        &server,
        "eth_getTransactionReceipt",
        rpc_result(json!({
            "transactionHash": TX_HASH,
            "blockNumber": "0x10",
            "status": "0x1",
            "gasUsed": "0x5208",
            "logs": [
                {
                    "address": "0x9999999999999999999999999999999999999999",
                    "topics": ["0x01"],
                    "data": "0x"
                },
                {
                    "address": MANAGER,
                    "topics": [
                        hex_data(&event_topic(AGENT_RUN_CREATED)),
                        hex_data(&[0x11u8; 32]),
                        run_id_topic,
                    ],
                    "data": "0x"
                }
            ]
        })),
    )
    .await;

    let gateway = gateway(&server);
    let receipt = gateway
        .submit_run_creation(&signer(), "Hello world!", 5)
        .await
        .unwrap();
    assert_eq!(receipt.transaction_hash, TX_HASH);
    assert_eq!(gateway.run_created_ids(&receipt), vec![RunId(42)]);
}

#[tokio::test]
async fn test_follow_up_encodes_content_then_run_id() {
    let server = MockServer::start().await;
    let expected = hex_data(
        &Function::parse(DEFAULT_FOLLOW_UP)
            .unwrap()
            .encode_input(&[
                Token::String("more please".to_string()),
                Token::Uint(U256::from(7u64)),
            ])
            .unwrap(),
    );

    Mock::given(method("POST"))
        .and(move |req: &Request| sent_data(req).as_deref() == Some(expected.as_str()))
        .respond_with(rpc_result(json!(TX_HASH)))
        .expect(1)
        .mount(&server)
        .await;
    mount_method(
        &server,
        "eth_getTransactionReceipt",
        rpc_result(json!({ "transactionHash": TX_HASH, "status": "0x1", "logs": [] })),
    )
    .await;

    gateway(&server)
        .submit_follow_up(&signer(), RunId(7), "more please")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reverted_transaction() {
    let server = MockServer::start().await;
    mount_method(&server, "eth_sendTransaction", rpc_result(json!(TX_HASH))).await;
    mount_method(
        &server,
        "eth_getTransactionReceipt",
        rpc_result(json!({ "transactionHash": TX_HASH, "status": "0x0", "logs": [] })),
    )
    .await;

    let err = gateway(&server)
        .submit_run_creation(&signer(), "q", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Reverted(hash) if hash == TX_HASH));
}

#[tokio::test]
async fn test_receipt_timeout() {
    let server = MockServer::start().await;
    mount_method(&server, "eth_sendTransaction", rpc_result(json!(TX_HASH))).await;
    mount_method(&server, "eth_getTransactionReceipt", rpc_result(Value::Null)).await;

    let err = gateway(&server)
        .submit_run_creation(&signer(), "q", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::ReceiptTimeout { attempts: 3, .. }));
}

#[tokio::test]
async fn test_run_created_event_from_agent_contract() {
    let server = MockServer::start().await;
    let mut run_id_topic = [0u8; 32];
    U256::from(42u64).to_big_endian(&mut run_id_topic);

    let receipt: agentverse_chain::TransactionReceipt = serde_json::from_value(json!({
        "transactionHash": TX_HASH,
        "status": "0x1",
        "logs": [{
            "address": "0x3333333333333333333333333333333333333333",
            "topics": [
                hex_data(&event_topic(AGENT_RUN_CREATED)),
                hex_data(&[0x11u8; 32]),
                hex_data(&run_id_topic),
            ],
            "data": "0x"
        }]
    }))
    .unwrap();

    assert_eq!(gateway(&server).run_created_ids(&receipt), vec![RunId(42)]);
}
