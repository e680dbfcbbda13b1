//! `ethers`-backed chain A adapter, and an in-memory mock for tests.
//!
//! Reference: spec §4.5. Grounded in `Dclock24-MSB::cross_chain_atomic_proof`'s
//! `ethers::prelude` usage (`Provider`, `Contract`, `.method().send().await`)
//! and the teacher's `HttpChainClient` read/write split.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::Abi;
use ethers::contract::Contract;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Filter, H256, U256 as EthersU256};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use swap_types::OrchestratorError;

use super::types::{ChainAEvent, SrcImmutables};
use super::ChainAClient;

/// Minimal factory ABI: `createSrcEscrow` plus the `SrcEscrowCreated` event.
const FACTORY_ABI_JSON: &str = r#"[
  {
    "name": "createSrcEscrow",
    "type": "function",
    "stateMutability": "payable",
    "inputs": [
      {"name": "orderHash", "type": "bytes32"},
      {"name": "hashlock", "type": "bytes32"},
      {"name": "maker", "type": "address"},
      {"name": "taker", "type": "address"},
      {"name": "token", "type": "address"},
      {"name": "amount", "type": "uint256"},
      {"name": "safetyDeposit", "type": "uint256"},
      {"name": "timelocks", "type": "uint256[4]"}
    ],
    "outputs": [{"name": "escrow", "type": "address"}]
  },
  {
    "name": "SrcEscrowCreated",
    "type": "event",
    "anonymous": false,
    "inputs": [
      {"name": "escrow", "type": "address", "indexed": true},
      {"name": "orderHash", "type": "bytes32", "indexed": true}
    ]
  }
]"#;

/// Minimal per-escrow ABI: `withdraw`, `cancel`, `immutables`, and the
/// two terminal events.
const ESCROW_ABI_JSON: &str = r#"[
  {
    "name": "withdraw",
    "type": "function",
    "stateMutability": "nonpayable",
    "inputs": [{"name": "secret", "type": "bytes32"}],
    "outputs": []
  },
  {
    "name": "cancel",
    "type": "function",
    "stateMutability": "nonpayable",
    "inputs": [],
    "outputs": []
  },
  {
    "name": "immutables",
    "type": "function",
    "stateMutability": "view",
    "inputs": [],
    "outputs": [
      {"name": "orderHash", "type": "bytes32"},
      {"name": "hashlock", "type": "bytes32"},
      {"name": "maker", "type": "address"},
      {"name": "taker", "type": "address"},
      {"name": "token", "type": "address"},
      {"name": "amount", "type": "uint256"},
      {"name": "safetyDeposit", "type": "uint256"},
      {"name": "timelocks", "type": "uint256[4]"}
    ]
  },
  {
    "name": "SrcEscrowWithdrawn",
    "type": "event",
    "anonymous": false,
    "inputs": [{"name": "secret", "type": "bytes32", "indexed": false}]
  },
  {
    "name": "SrcEscrowCancelled",
    "type": "event",
    "anonymous": false,
    "inputs": []
  }
]"#;

/// Minimal ERC-20 ABI: `allowance` and `approve`.
const ERC20_ABI_JSON: &str = r#"[
  {
    "name": "allowance",
    "type": "function",
    "stateMutability": "view",
    "inputs": [
      {"name": "owner", "type": "address"},
      {"name": "spender", "type": "address"}
    ],
    "outputs": [{"name": "", "type": "uint256"}]
  },
  {
    "name": "approve",
    "type": "function",
    "stateMutability": "nonpayable",
    "inputs": [
      {"name": "spender", "type": "address"},
      {"name": "amount", "type": "uint256"}
    ],
    "outputs": [{"name": "", "type": "bool"}]
  }
]"#;

fn parse_address(s: &str) -> Result<Address, OrchestratorError> {
    s.parse::<Address>().map_err(|e| OrchestratorError::Validation(format!("invalid EVM address {s}: {e}")))
}

fn to_evm_u256(value: primitive_types::U256) -> EthersU256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    EthersU256::from_big_endian(&bytes)
}

fn from_evm_u256(value: EthersU256) -> primitive_types::U256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    primitive_types::U256::from_big_endian(&bytes)
}

/// Live EVM adapter over an HTTP JSON-RPC endpoint.
///
/// Writes require `signer`; constructed read-only when chain A
/// configuration carries no `signerKey` (spec §6), in which case write
/// methods fail with [`OrchestratorError::WriteOperationsUnavailable`].
pub struct EvmChainAClient {
    provider: Arc<Provider<Http>>,
    signer: Option<LocalWallet>,
    factory_address: Address,
    factory_abi: Abi,
    escrow_abi: Abi,
    erc20_abi: Abi,
    chain_id: u64,
}

impl EvmChainAClient {
    /// Construct a client against `rpc_url`, optionally able to sign
    /// with `signer_key` (hex, with or without `0x` prefix).
    pub fn new(rpc_url: &str, chain_id: u64, factory_address: [u8; 20], signer_key: Option<&str>) -> Result<Self, OrchestratorError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| OrchestratorError::Validation(format!("invalid chain A rpc url: {e}")))?;

        let signer = signer_key
            .map(|key| {
                let wallet: LocalWallet = key
                    .parse()
                    .map_err(|e| OrchestratorError::Validation(format!("invalid chain A signer key: {e}")))?;
                Ok::<_, OrchestratorError>(wallet.with_chain_id(chain_id))
            })
            .transpose()?;

        let factory_abi: Abi = serde_json::from_str(FACTORY_ABI_JSON)
            .map_err(|e| OrchestratorError::Internal(format!("invalid factory ABI: {e}")))?;
        let escrow_abi: Abi = serde_json::from_str(ESCROW_ABI_JSON)
            .map_err(|e| OrchestratorError::Internal(format!("invalid escrow ABI: {e}")))?;
        let erc20_abi: Abi = serde_json::from_str(ERC20_ABI_JSON)
            .map_err(|e| OrchestratorError::Internal(format!("invalid ERC-20 ABI: {e}")))?;

        Ok(Self {
            provider: Arc::new(provider),
            signer,
            factory_address: Address::from(factory_address),
            factory_abi,
            escrow_abi,
            erc20_abi,
            chain_id,
        })
    }

    fn require_signer(&self) -> Result<&LocalWallet, OrchestratorError> {
        self.signer.as_ref().ok_or_else(|| OrchestratorError::WriteOperationsUnavailable { chain: "chain_a".into() })
    }

    fn signing_middleware(&self) -> Result<SignerMiddleware<Provider<Http>, LocalWallet>, OrchestratorError> {
        let signer = self.require_signer()?.clone();
        Ok(SignerMiddleware::new((*self.provider).clone(), signer))
    }
}

#[async_trait]
impl ChainAClient for EvmChainAClient {
    async fn ensure_allowance(&self, token: [u8; 20], amount: primitive_types::U256) -> Result<Option<String>, OrchestratorError> {
        let signer = self.require_signer()?;
        let owner = signer.address();
        let read_contract = Contract::new(Address::from(token), self.erc20_abi.clone(), self.provider.clone());

        let current: EthersU256 = read_contract
            .method("allowance", (owner, self.factory_address))
            .map_err(|e| OrchestratorError::Internal(format!("encode allowance: {e}")))?
            .call()
            .await
            .map_err(|e| OrchestratorError::RpcFailure(e.to_string()))?;

        if current >= to_evm_u256(amount) {
            return Ok(None);
        }

        let client = Arc::new(self.signing_middleware()?);
        let write_contract = Contract::new(Address::from(token), self.erc20_abi.clone(), client);
        let call = write_contract
            .method::<_, bool>("approve", (self.factory_address, to_evm_u256(amount)))
            .map_err(|e| OrchestratorError::Internal(format!("encode approve: {e}")))?;

        let pending = call.send().await.map_err(|e| OrchestratorError::ChainRejection(e.to_string()))?;
        let receipt = pending
            .confirmations(1)
            .await
            .map_err(|e| OrchestratorError::RpcFailure(e.to_string()))?
            .ok_or_else(|| OrchestratorError::RpcFailure("transaction dropped from mempool".into()))?;

        let tx_hash = format!("{:#x}", receipt.transaction_hash);
        debug!(%tx_hash, "chain A allowance approved");
        Ok(Some(tx_hash))
    }

    async fn create_src_escrow(&self, immutables: &SrcImmutables) -> Result<(String, String), OrchestratorError> {
        let signer = self.require_signer()?.clone();
        let client = Arc::new(self.signing_middleware()?);
        let contract = Contract::new(self.factory_address, self.factory_abi.clone(), client.clone());

        let timelocks = [
            EthersU256::from(immutables.deployed_at),
            EthersU256::from(immutables.withdrawal),
            EthersU256::from(immutables.public_withdrawal),
            EthersU256::from(immutables.cancellation),
        ];

        let call = contract
            .method::<_, Address>(
                "createSrcEscrow",
                (
                    H256::from(immutables.order_hash),
                    H256::from(immutables.hashlock),
                    Address::from(immutables.maker),
                    Address::from(immutables.taker),
                    Address::from(immutables.token),
                    to_evm_u256(immutables.amount),
                    to_evm_u256(immutables.safety_deposit),
                    timelocks,
                ),
            )
            .map_err(|e| OrchestratorError::Internal(format!("encode createSrcEscrow: {e}")))?
            .value(to_evm_u256(immutables.safety_deposit));

        // Reference: spec §4.5 "estimates gas and applies a 20% buffer;
        // rejects with InsufficientFunds if the signer balance is below
        // safetyDeposit + gasReserve".
        let gas_estimate = call
            .estimate_gas()
            .await
            .map_err(|e| OrchestratorError::RpcFailure(format!("gas estimation failed: {e}")))?;
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| OrchestratorError::RpcFailure(e.to_string()))?;
        let gas_reserve = gas_estimate.saturating_mul(EthersU256::from(120)) / EthersU256::from(100) * gas_price;
        let required = to_evm_u256(immutables.safety_deposit).saturating_add(gas_reserve);

        let balance = self
            .provider
            .get_balance(signer.address(), None)
            .await
            .map_err(|e| OrchestratorError::RpcFailure(e.to_string()))?;
        if balance < required {
            return Err(OrchestratorError::InsufficientFunds {
                required: required.to_string(),
                available: balance.to_string(),
            });
        }

        let call = call.gas(gas_reserve / gas_price.max(EthersU256::from(1)));
        let pending = call.send().await.map_err(|e| OrchestratorError::ChainRejection(e.to_string()))?;
        let receipt = pending
            .confirmations(1)
            .await
            .map_err(|e| OrchestratorError::RpcFailure(e.to_string()))?
            .ok_or_else(|| OrchestratorError::RpcFailure("transaction dropped from mempool".into()))?;

        let tx_hash = format!("{:#x}", receipt.transaction_hash);
        let escrow_log = receipt
            .logs
            .first()
            .ok_or_else(|| OrchestratorError::ChainRejection("no SrcEscrowCreated log in receipt".into()))?;
        let escrow_address = escrow_log
            .topics
            .get(1)
            .map(|topic| format!("{:#x}", Address::from(*topic)))
            .ok_or_else(|| OrchestratorError::ChainRejection("SrcEscrowCreated log missing escrow topic".into()))?;

        debug!(%escrow_address, %tx_hash, "chain A src escrow created");
        Ok((escrow_address, tx_hash))
    }

    async fn withdraw_src_escrow(&self, escrow_address: &str, secret: &[u8; 32]) -> Result<String, OrchestratorError> {
        let client = Arc::new(self.signing_middleware()?);
        let address = parse_address(escrow_address)?;
        let contract = Contract::new(address, self.escrow_abi.clone(), client);

        let call = contract
            .method::<_, ()>("withdraw", H256::from(*secret))
            .map_err(|e| OrchestratorError::Internal(format!("encode withdraw: {e}")))?;

        let pending = call.send().await.map_err(|e| OrchestratorError::ChainRejection(e.to_string()))?;
        let receipt = pending
            .confirmations(1)
            .await
            .map_err(|e| OrchestratorError::RpcFailure(e.to_string()))?
            .ok_or_else(|| OrchestratorError::RpcFailure("transaction dropped from mempool".into()))?;

        Ok(format!("{:#x}", receipt.transaction_hash))
    }

    async fn cancel_src_escrow(&self, escrow_address: &str) -> Result<String, OrchestratorError> {
        let client = Arc::new(self.signing_middleware()?);
        let address = parse_address(escrow_address)?;
        let contract = Contract::new(address, self.escrow_abi.clone(), client);

        let call = contract
            .method::<_, ()>("cancel", ())
            .map_err(|e| OrchestratorError::Internal(format!("encode cancel: {e}")))?;

        let pending = call.send().await.map_err(|e| OrchestratorError::ChainRejection(e.to_string()))?;
        let receipt = pending
            .confirmations(1)
            .await
            .map_err(|e| OrchestratorError::RpcFailure(e.to_string()))?
            .ok_or_else(|| OrchestratorError::RpcFailure("transaction dropped from mempool".into()))?;

        Ok(format!("{:#x}", receipt.transaction_hash))
    }

    async fn get_immutables(&self, escrow_address: &str) -> Result<SrcImmutables, OrchestratorError> {
        let address = parse_address(escrow_address)?;
        let contract = Contract::new(address, self.escrow_abi.clone(), self.provider.clone());

        let (order_hash, hashlock, maker, taker, token, amount, safety_deposit, timelocks): (
            H256,
            H256,
            Address,
            Address,
            Address,
            EthersU256,
            EthersU256,
            [EthersU256; 4],
        ) = contract
            .method("immutables", ())
            .map_err(|e| OrchestratorError::Internal(format!("encode immutables: {e}")))?
            .call()
            .await
            .map_err(|e| OrchestratorError::RpcFailure(e.to_string()))?;

        Ok(SrcImmutables {
            order_hash: order_hash.into(),
            hashlock: hashlock.into(),
            maker: maker.into(),
            taker: taker.into(),
            token: token.into(),
            amount: from_evm_u256(amount),
            safety_deposit: from_evm_u256(safety_deposit),
            deployed_at: timelocks[0].as_u64(),
            withdrawal: timelocks[1].as_u64(),
            public_withdrawal: timelocks[2].as_u64(),
            cancellation: timelocks[3].as_u64(),
        })
    }

    async fn current_block(&self) -> Result<u64, OrchestratorError> {
        self.provider.get_block_number().await.map(|n| n.as_u64()).map_err(|e| OrchestratorError::RpcFailure(e.to_string()))
    }

    async fn subscribe_events(&self, from_block: u64) -> Result<mpsc::Receiver<ChainAEvent>, OrchestratorError> {
        let (tx, rx) = mpsc::channel(256);
        let provider = self.provider.clone();
        let factory_address = self.factory_address;

        tokio::spawn(async move {
            let filter = Filter::new().address(factory_address).from_block(from_block);
            let mut watcher = match provider.watch(&filter).await {
                Ok(w) => w,
                Err(e) => {
                    warn!(error = %e, "chain A log watcher failed to start");
                    return;
                }
            };

            use futures_util::StreamExt;
            while let Some(log) = watcher.next().await {
                let Some(block_number) = log.block_number else { continue };
                let Some(tx_hash) = log.transaction_hash else { continue };

                if log.topics.len() >= 3 {
                    let escrow_address = format!("{:#x}", Address::from(log.topics[1]));
                    let order_hash: [u8; 32] = log.topics[2].into();
                    let event = ChainAEvent::SrcEscrowCreated {
                        escrow_address,
                        order_hash,
                        tx_hash: format!("{:#x}", tx_hash),
                        block_number: block_number.as_u64(),
                    };
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// In-memory mock used by tests and by `swap-node` in demo/dry-run mode.
#[derive(Default)]
pub struct MockChainAClient {
    escrows: RwLock<HashMap<String, SrcImmutables>>,
    allowances: RwLock<HashMap<[u8; 20], primitive_types::U256>>,
    next_id: std::sync::atomic::AtomicU64,
    block: std::sync::atomic::AtomicU64,
    /// When set, every write method fails with this error instead of
    /// succeeding — used to exercise the executor's failure paths.
    pub fail_writes: std::sync::atomic::AtomicBool,
}

impl MockChainAClient {
    /// Construct an empty mock at block 0.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChainAClient for MockChainAClient {
    async fn ensure_allowance(&self, token: [u8; 20], amount: primitive_types::U256) -> Result<Option<String>, OrchestratorError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(OrchestratorError::ChainRejection("mock configured to fail".into()));
        }
        let mut allowances = self.allowances.write();
        let current = allowances.get(&token).copied().unwrap_or_default();
        if current >= amount {
            return Ok(None);
        }
        allowances.insert(token, amount);
        Ok(Some(format!("0xapprove{:060x}", self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed))))
    }

    async fn create_src_escrow(&self, immutables: &SrcImmutables) -> Result<(String, String), OrchestratorError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(OrchestratorError::ChainRejection("mock configured to fail".into()));
        }
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let address = format!("0x{id:040x}");
        self.escrows.write().insert(address.clone(), immutables.clone());
        Ok((address, format!("0xtx{id:060x}")))
    }

    async fn withdraw_src_escrow(&self, escrow_address: &str, secret: &[u8; 32]) -> Result<String, OrchestratorError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(OrchestratorError::ChainRejection("mock configured to fail".into()));
        }
        let escrows = self.escrows.read();
        let immutables = escrows.get(escrow_address).ok_or_else(|| OrchestratorError::NotFound(escrow_address.into()))?;
        if swap_crypto::keccak256(secret) != immutables.hashlock {
            return Err(OrchestratorError::ChainRejection("secret does not match hashlock".into()));
        }
        Ok(format!("0xwithdraw{:060x}", self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed)))
    }

    async fn cancel_src_escrow(&self, escrow_address: &str) -> Result<String, OrchestratorError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(OrchestratorError::ChainRejection("mock configured to fail".into()));
        }
        if !self.escrows.read().contains_key(escrow_address) {
            return Err(OrchestratorError::NotFound(escrow_address.into()));
        }
        Ok(format!("0xcancel{:060x}", self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed)))
    }

    async fn get_immutables(&self, escrow_address: &str) -> Result<SrcImmutables, OrchestratorError> {
        self.escrows.read().get(escrow_address).cloned().ok_or_else(|| OrchestratorError::NotFound(escrow_address.into()))
    }

    async fn current_block(&self) -> Result<u64, OrchestratorError> {
        Ok(self.block.load(std::sync::atomic::Ordering::Relaxed))
    }

    async fn subscribe_events(&self, _from_block: u64) -> Result<mpsc::Receiver<ChainAEvent>, OrchestratorError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }
}
