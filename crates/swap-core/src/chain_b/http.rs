//! HTTP JSON-RPC chain B adapter, and an in-memory mock for tests.
//!
//! Reference: spec §4.6. The wire format mirrors a NEAR-style
//! `query`/`broadcast_tx_commit` JSON-RPC surface; call payloads are
//! opaque method-name + serialized-args pairs against the configured
//! `htlcContract` account, matching how `HTLCCreateArgs` /
//! `HTLCCreatedEvent` are shaped in the NEAR reference contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use swap_types::OrchestratorError;
use tracing::{debug, warn};

use super::types::{DstHtlc, HtlcState};
use super::ChainBClient;

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<serde_json::Value>,
}

/// Live adapter over a NEAR-style JSON-RPC endpoint.
///
/// Falls back to `backup_rpc_url` (spec §6 `chainB.backupRpcUrl`) when
/// the primary endpoint fails, retrying up to `max_retries` times with
/// exponential back-off from `backoff_base_ms` before surfacing
/// [`OrchestratorError::RpcFailure`].
pub struct HttpChainBClient {
    http: Client,
    rpc_url: String,
    backup_rpc_url: Option<String>,
    htlc_contract: String,
    account_id: Option<String>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpChainBClient {
    /// Construct a client. Write methods require `account_id` to be
    /// `Some`; read methods work regardless.
    pub fn new(
        rpc_url: impl Into<String>,
        backup_rpc_url: Option<String>,
        htlc_contract: impl Into<String>,
        account_id: Option<String>,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Self {
        Self {
            http: Client::new(),
            rpc_url: rpc_url.into(),
            backup_rpc_url,
            htlc_contract: htlc_contract.into(),
            account_id,
            max_retries,
            backoff_base_ms,
        }
    }

    fn require_signer(&self) -> Result<&str, OrchestratorError> {
        self.account_id.as_deref().ok_or_else(|| OrchestratorError::WriteOperationsUnavailable { chain: "chain_b".into() })
    }

    async fn call<T: for<'de> Deserialize<'de>>(&self, method: &str, params: serde_json::Value) -> Result<T, OrchestratorError> {
        let request = JsonRpcRequest { jsonrpc: "2.0", id: "swap-core", method, params };

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            for url in [Some(&self.rpc_url), self.backup_rpc_url.as_ref()].into_iter().flatten() {
                match self.http.post(url.as_str()).json(&request).send().await {
                    Ok(resp) => match resp.json::<JsonRpcResponse<T>>().await {
                        Ok(parsed) => {
                            if let Some(error) = parsed.error {
                                return Err(OrchestratorError::ChainRejection(error.to_string()));
                            }
                            if let Some(result) = parsed.result {
                                return Ok(result);
                            }
                            last_err = Some("empty RPC result".to_string());
                        }
                        Err(e) => last_err = Some(e.to_string()),
                    },
                    Err(e) => last_err = Some(e.to_string()),
                }
            }

            if attempt < self.max_retries {
                let backoff = Duration::from_millis(self.backoff_base_ms * 2u64.pow(attempt));
                warn!(attempt, ?backoff, method, "chain B rpc call failed, retrying");
                tokio::time::sleep(backoff).await;
            }
        }

        Err(OrchestratorError::RpcFailure(last_err.unwrap_or_else(|| "unknown rpc failure".into())))
    }
}

#[async_trait]
impl ChainBClient for HttpChainBClient {
    async fn create_htlc(
        &self,
        receiver: &str,
        token: &str,
        amount: primitive_types::U256,
        hashlock: [u8; 32],
        timelock: u64,
        order_hash: [u8; 32],
    ) -> Result<(String, String), OrchestratorError> {
        let signer = self.require_signer()?;
        let params = json!({
            "signer_id": signer,
            "receiver_id": self.htlc_contract,
            "method_name": "create_htlc",
            "args": {
                "receiver": receiver,
                "token": token,
                "amount": amount.to_string(),
                "hashlock": hex::encode(hashlock),
                "timelock": timelock,
                "order_hash": hex::encode(order_hash),
            },
        });

        #[derive(Deserialize)]
        struct CreateResult {
            htlc_id: String,
            transaction_hash: String,
        }

        let result: CreateResult = self.call("broadcast_tx_commit", params).await?;
        debug!(htlc_id = %result.htlc_id, "chain B htlc created");
        Ok((result.htlc_id, result.transaction_hash))
    }

    async fn withdraw_htlc(&self, htlc_id: &str, secret: &[u8; 32]) -> Result<String, OrchestratorError> {
        let signer = self.require_signer()?;
        let params = json!({
            "signer_id": signer,
            "receiver_id": self.htlc_contract,
            "method_name": "withdraw",
            "args": { "htlc_id": htlc_id, "secret": hex::encode(secret) },
        });

        #[derive(Deserialize)]
        struct WithdrawResult {
            transaction_hash: String,
        }
        let result: WithdrawResult = self.call("broadcast_tx_commit", params).await?;
        Ok(result.transaction_hash)
    }

    async fn refund_htlc(&self, htlc_id: &str) -> Result<String, OrchestratorError> {
        let signer = self.require_signer()?;
        let params = json!({
            "signer_id": signer,
            "receiver_id": self.htlc_contract,
            "method_name": "refund",
            "args": { "htlc_id": htlc_id },
        });

        #[derive(Deserialize)]
        struct RefundResult {
            transaction_hash: String,
        }
        let result: RefundResult = self.call("broadcast_tx_commit", params).await?;
        Ok(result.transaction_hash)
    }

    async fn get_htlc(&self, htlc_id: &str) -> Result<DstHtlc, OrchestratorError> {
        let params = json!({
            "request_type": "call_function",
            "account_id": self.htlc_contract,
            "method_name": "get_htlc",
            "args_base64": BASE64_STANDARD.encode(json!({ "htlc_id": htlc_id }).to_string()),
        });
        self.call("query", params).await
    }

    async fn current_block(&self) -> Result<u64, OrchestratorError> {
        #[derive(Deserialize)]
        struct Status {
            height: u64,
        }
        let status: Status = self.call("block", json!({ "finality": "final" })).await?;
        Ok(status.height)
    }
}

/// In-memory mock used by tests and by `swap-node` in demo/dry-run mode.
#[derive(Default)]
pub struct MockChainBClient {
    htlcs: RwLock<HashMap<String, DstHtlc>>,
    next_id: AtomicU64,
    block: AtomicU64,
    /// When set, every write method fails instead of succeeding.
    pub fail_writes: std::sync::atomic::AtomicBool,
    /// When set, `create_htlc` sleeps this long before returning —
    /// used to exercise the `waitForBothLockedTimeout` bound (spec
    /// §4.8 step 4) without a real slow RPC endpoint.
    pub create_delay_ms: AtomicU64,
}

impl MockChainBClient {
    /// Construct an empty mock at block 0.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChainBClient for MockChainBClient {
    async fn create_htlc(
        &self,
        receiver: &str,
        token: &str,
        amount: primitive_types::U256,
        hashlock: [u8; 32],
        timelock: u64,
        order_hash: [u8; 32],
    ) -> Result<(String, String), OrchestratorError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(OrchestratorError::ChainRejection("mock configured to fail".into()));
        }
        let delay_ms = self.create_delay_ms.load(Ordering::Relaxed);
        if delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let htlc_id = format!("htlc-{id}");
        let htlc = DstHtlc {
            htlc_id: htlc_id.clone(),
            sender: "orchestrator.testnet".into(),
            receiver: receiver.into(),
            token: token.into(),
            amount,
            hashlock,
            timelock,
            secret: None,
            state: HtlcState::Active,
            order_hash,
        };
        self.htlcs.write().insert(htlc_id.clone(), htlc);
        Ok((htlc_id, format!("txB-{id}")))
    }

    async fn withdraw_htlc(&self, htlc_id: &str, secret: &[u8; 32]) -> Result<String, OrchestratorError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(OrchestratorError::ChainRejection("mock configured to fail".into()));
        }
        let mut htlcs = self.htlcs.write();
        let htlc = htlcs.get_mut(htlc_id).ok_or_else(|| OrchestratorError::NotFound(htlc_id.into()))?;
        if swap_crypto::keccak256(secret) != htlc.hashlock {
            return Err(OrchestratorError::ChainRejection("secret does not match hashlock".into()));
        }
        if htlc.state != HtlcState::Active {
            return Err(OrchestratorError::ChainRejection(format!("htlc not active: {:?}", htlc.state)));
        }
        htlc.state = HtlcState::Withdrawn;
        htlc.secret = Some(*secret);
        Ok(format!("txB-withdraw-{}", self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn refund_htlc(&self, htlc_id: &str) -> Result<String, OrchestratorError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(OrchestratorError::ChainRejection("mock configured to fail".into()));
        }
        let mut htlcs = self.htlcs.write();
        let htlc = htlcs.get_mut(htlc_id).ok_or_else(|| OrchestratorError::NotFound(htlc_id.into()))?;
        if htlc.state != HtlcState::Active {
            return Err(OrchestratorError::ChainRejection(format!("htlc not active: {:?}", htlc.state)));
        }
        htlc.state = HtlcState::Refunded;
        Ok(format!("txB-refund-{}", self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn get_htlc(&self, htlc_id: &str) -> Result<DstHtlc, OrchestratorError> {
        self.htlcs.read().get(htlc_id).cloned().ok_or_else(|| OrchestratorError::NotFound(htlc_id.into()))
    }

    async fn current_block(&self) -> Result<u64, OrchestratorError> {
        Ok(self.block.load(Ordering::Relaxed))
    }
}
