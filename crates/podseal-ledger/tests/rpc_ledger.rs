//! RpcLedger against a mock node.

use std::time::Duration;

use podseal_core::{Address, ObjectId};
use podseal_ledger::{
    CallArg, DenialReason, LedgerError, LedgerOracle, RpcLedger, TransactionKind, APPROVE_FUNCTION,
    POLICY_MODULE,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn approval_kind() -> TransactionKind {
    TransactionKind::move_call(
        ObjectId::from_bytes([1; 32]),
        POLICY_MODULE,
        APPROVE_FUNCTION,
        vec![CallArg::Pure(vec![0xab, 0xcd])],
    )
}

#[tokio::test]
async fn test_successful_inspect_decodes_return_values() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "ledger_devInspectTransactionKind" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "success": true, "returnValues": ["0x0102"], "error": null }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ledger = RpcLedger::new(server.uri(), Duration::from_secs(5)).unwrap();
    let result = ledger
        .dev_inspect(&Address::from_bytes([2; 32]), &approval_kind())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.return_values, vec![vec![1, 2]]);
}

#[tokio::test]
async fn test_failed_inspect_carries_raw_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "success": false, "error": "MoveAbort(..., ESubscriptionExpired) in command 0" }
        })))
        .mount(&server)
        .await;

    let ledger = RpcLedger::new(server.uri(), Duration::from_secs(5)).unwrap();
    let result = ledger
        .dev_inspect(&Address::ZERO, &approval_kind())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.denial(), Some(DenialReason::SubscriptionExpired));
}

#[tokio::test]
async fn test_rpc_error_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "invalid params" }
        })))
        .mount(&server)
        .await;

    let ledger = RpcLedger::new(server.uri(), Duration::from_secs(5)).unwrap();
    let err = ledger
        .dev_inspect(&Address::ZERO, &approval_kind())
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Transport(_)));
}

#[tokio::test]
async fn test_http_failure_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let ledger = RpcLedger::new(server.uri(), Duration::from_secs(5)).unwrap();
    assert!(matches!(
        ledger.dev_inspect(&Address::ZERO, &approval_kind()).await,
        Err(LedgerError::Transport(_))
    ));
}
