//! JSON-RPC ledger client.
//!
//! Talks to a ledger full node over HTTP. Only the read-only simulation
//! endpoint is used; this client has no way to submit a transaction.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use podseal_core::Address;

use crate::error::{LedgerError, Result};
use crate::oracle::{InspectResult, LedgerId, LedgerOracle};
use crate::transaction::TransactionKind;

/// JSON-RPC method used for simulation.
pub const DEV_INSPECT_METHOD: &str = "ledger_devInspectTransactionKind";

#[derive(Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (String, String),
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<DevInspectResponse>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevInspectResponse {
    success: bool,
    #[serde(default)]
    return_values: Vec<String>,
    error: Option<String>,
}

/// HTTP JSON-RPC ledger oracle.
pub struct RpcLedger {
    endpoint: String,
    client: reqwest::Client,
}

impl RpcLedger {
    /// Create a client for the node at `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl LedgerOracle for RpcLedger {
    fn ledger_id(&self) -> LedgerId {
        LedgerId::new(self.endpoint.clone())
    }

    async fn dev_inspect(&self, sender: &Address, kind: &TransactionKind) -> Result<InspectResult> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: DEV_INSPECT_METHOD,
            params: (sender.to_hex(), hex::encode(kind.to_bytes())),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LedgerError::Transport(format!(
                "node returned {}",
                response.status()
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(LedgerError::Transport(format!(
                "rpc error {}: {}",
                err.code, err.message
            )));
        }

        let result = body
            .result
            .ok_or_else(|| LedgerError::InvalidResponse("missing result".into()))?;

        let return_values = result
            .return_values
            .iter()
            .map(|v| hex::decode(v.trim_start_matches("0x")))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;

        Ok(InspectResult {
            success: result.success,
            return_values,
            error: result.error,
        })
    }
}
