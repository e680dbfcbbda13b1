//! # Swap Node
//!
//! Process wiring for the cross-chain swap orchestrator: resolves
//! configuration, constructs the `swap-core` components, and runs the
//! single reactor (spec §5 "a single reactor drives EventMonitor and
//! TimeoutScheduler") until shutdown.
//!
//! Grounded in the teacher's `node-runtime` crate: a thin binary that
//! constructs subsystems and keeps the process alive until `Ctrl+C`,
//! generalized here into a reusable [`OrchestratorApp`] so integration
//! tests can build and drive the same wiring the binary uses.

#![warn(missing_docs)]

pub mod config_loader;

use std::sync::Arc;
use std::time::Duration;

use swap_core::chain_a::{ChainAClient, EvmChainAClient};
use swap_core::chain_b::{ChainBClient, HttpChainBClient};
use swap_core::{
    CompletionMode, CrossChainExecutor, EventMonitor, ExecutionLedger, Notifier, SecretStore, SessionStore,
    TimeoutScheduler,
};
use swap_bus::InMemoryNotificationBus;
use swap_crypto::SecretKey;
use swap_types::OrchestratorConfig;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

/// Errors constructing an [`OrchestratorApp`].
#[derive(Debug, Error)]
pub enum AppBuildError {
    /// Configuration loading failed.
    #[error(transparent)]
    Config(#[from] config_loader::ConfigLoadError),
    /// A component failed to construct from valid configuration (e.g.
    /// a malformed signer key or RPC URL).
    #[error(transparent)]
    Orchestrator(#[from] swap_types::OrchestratorError),
    /// The configured encryption key was not valid.
    #[error(transparent)]
    Crypto(#[from] swap_crypto::CryptoError),
}

/// The fully wired orchestrator: every spec §2 component, ready to run
/// the reactor loop or be driven directly by an embedding transport
/// layer (spec §1, "out of scope").
pub struct OrchestratorApp {
    /// Authoritative session state (spec §4.2).
    pub sessions: Arc<SessionStore>,
    /// Per-session execution step ledger (spec §4.10).
    pub ledger: Arc<ExecutionLedger>,
    /// Chain A (EVM) outbound port (spec §4.5).
    pub chain_a: Arc<dyn ChainAClient>,
    /// Chain B (non-EVM) outbound port (spec §4.6).
    pub chain_b: Arc<dyn ChainBClient>,
    /// Session/step pub-sub fan-out (spec §4.11).
    pub notifier: Arc<Notifier>,
    /// Deadline scheduler (spec §4.9).
    pub timeouts: Arc<TimeoutScheduler>,
    /// Unified chain observation stream (spec §4.7).
    pub monitor: Arc<EventMonitor>,
    /// The atomic-swap sequencer (spec §4.8).
    pub executor: Arc<CrossChainExecutor>,
    config: OrchestratorConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl OrchestratorApp {
    /// Build the application from a resolved [`OrchestratorConfig`].
    pub fn build(config: OrchestratorConfig) -> Result<Self, AppBuildError> {
        let key = SecretKey::from_hex(&config.secret.encryption_key)?;
        let secrets = Arc::new(SecretStore::new(key, config.secret.ttl_seconds));
        let sessions = Arc::new(SessionStore::new(config.session.max_active, secrets));
        let ledger = Arc::new(ExecutionLedger::new());

        let chain_a: Arc<dyn ChainAClient> = Arc::new(EvmChainAClient::new(
            &config.chain_a.rpc_url,
            config.chain_a.chain_id,
            config.chain_a.factory_address,
            config.chain_a.signer_key.as_deref(),
        )?);

        let chain_b: Arc<dyn ChainBClient> = Arc::new(HttpChainBClient::new(
            config.chain_b.rpc_url.clone(),
            config.chain_b.backup_rpc_url.clone(),
            config.chain_b.htlc_contract.clone(),
            resolve_chain_b_account(&config),
            config.monitor.max_retries,
            config.monitor.backoff_base_ms,
        ));

        let bus = Arc::new(InMemoryNotificationBus::new());
        let notifier = Arc::new(Notifier::new(bus));

        let timeouts = Arc::new(TimeoutScheduler::new(Duration::from_secs(1)));
        let monitor = Arc::new(EventMonitor::new(
            chain_a.clone(),
            chain_b.clone(),
            Duration::from_millis(config.monitor.poll_interval_ms),
            config.monitor.confirmation_depth,
        ));

        // The orchestrator completes both legs itself only when it
        // holds a chain A signer; otherwise it publishes the revealed
        // secret and waits for the external taker (spec §9 "Some
        // flows in the repo require the external client to perform
        // the final A-side withdraw").
        let completion_mode = if config.chain_a.signer_key.is_some() {
            CompletionMode::OrchestratorCompletesBoth
        } else {
            CompletionMode::ClientCompletesSrc
        };

        let executor = Arc::new(CrossChainExecutor::new(
            sessions.clone(),
            ledger.clone(),
            chain_a.clone(),
            chain_b.clone(),
            notifier.clone(),
            timeouts.clone(),
            monitor.clone(),
            config.clone(),
            completion_mode,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            sessions,
            ledger,
            chain_a,
            chain_b,
            notifier,
            timeouts,
            monitor,
            executor,
            config,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Spawn the single reactor (chain A subscription, chain B
    /// polling, timeout firing) plus the periodic session sweep, and
    /// drive fired deadlines and monitor events into the executor
    /// until [`OrchestratorApp::shutdown`] is called.
    ///
    /// Reference: spec §5 "a single reactor drives EventMonitor and
    /// TimeoutScheduler"; spec §4.2 "Periodic `sweep()`".
    pub async fn run(&self) {
        let mut monitor_rx = self.monitor.subscribe().expect("monitor subscribed exactly once");
        let mut deadline_rx = self.timeouts.subscribe().expect("timeouts subscribed exactly once");

        let chain_a_monitor = self.monitor.clone();
        let chain_a_task = tokio::spawn(async move {
            if let Err(e) = chain_a_monitor.run_chain_a(0).await {
                tracing::error!(error = %e, "chain A event subscription ended");
            }
        });

        let chain_b_monitor = self.monitor.clone();
        let chain_b_shutdown = self.shutdown_rx.clone();
        let chain_b_task = tokio::spawn(async move {
            chain_b_monitor.run_chain_b(chain_b_shutdown).await;
        });

        let timeouts = self.timeouts.clone();
        let timeout_shutdown = self.shutdown_rx.clone();
        let timeout_task = tokio::spawn(async move {
            timeouts.run(timeout_shutdown).await;
        });

        let sweep_sessions = self.sessions.clone();
        let mut sweep_shutdown = self.shutdown_rx.clone();
        let sweep_interval_ms = self.config.session.cleanup_interval_ms;
        let sweep_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(sweep_interval_ms));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep_sessions.sweep();
                    }
                    _ = sweep_shutdown.changed() => {
                        if *sweep_shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        let executor = self.executor.clone();
        let mut deadline_shutdown = self.shutdown_rx.clone();
        let deadline_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(fired) = deadline_rx.recv() => {
                        executor.handle_fired_deadline(fired).await;
                    }
                    _ = deadline_shutdown.changed() => {
                        if *deadline_shutdown.borrow() {
                            break;
                        }
                    }
                    else => break,
                }
            }
        });

        let executor = self.executor.clone();
        let mut monitor_shutdown = self.shutdown_rx.clone();
        let monitor_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = monitor_rx.recv() => {
                        executor.handle_monitor_event(event).await;
                    }
                    _ = monitor_shutdown.changed() => {
                        if *monitor_shutdown.borrow() {
                            break;
                        }
                    }
                    else => break,
                }
            }
        });

        info!("orchestrator reactor running");
        let mut shutdown_rx = self.shutdown_rx.clone();
        let _ = shutdown_rx.changed().await;

        chain_a_task.abort();
        let _ = tokio::join!(chain_b_task, timeout_task, sweep_task, deadline_task, monitor_task);
    }

    /// Signal the reactor to stop. Drains in-flight operations up to
    /// `grace_period` before returning (spec §5 "Shutdown drains
    /// in-flight operations up to a configurable grace period, then
    /// marks them `failed`... timeout callbacks remain scheduled for
    /// restart recovery").
    pub async fn shutdown(&self, grace_period: Duration) {
        let _ = self.shutdown_tx.send(true);
        tokio::time::sleep(grace_period).await;
    }
}

/// Resolve the chain B signer account, preferring a filesystem
/// credential store over inline configuration (spec §4.6 "Credential
/// model... loaded from either a filesystem credential store or
/// environment configuration, in that order of precedence").
fn resolve_chain_b_account(config: &OrchestratorConfig) -> Option<String> {
    if let Ok(credential_path) = std::env::var("SWAP_CHAIN_B_CREDENTIAL_FILE") {
        if let Ok(contents) = std::fs::read_to_string(&credential_path) {
            let account_id = contents.trim();
            if !account_id.is_empty() {
                return Some(account_id.to_string());
            }
        }
    }
    config.chain_b.account_id.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use swap_types::{ChainAConfig, ChainBConfig, MonitorConfig, SecretConfig, SessionConfig, TimelockConfig};

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            chain_a: ChainAConfig { rpc_url: "http://localhost:8545".into(), chain_id: 1337, factory_address: [0u8; 20], signer_key: None },
            chain_b: ChainBConfig {
                network_id: "testnet".into(),
                rpc_url: "http://localhost:3030".into(),
                backup_rpc_url: None,
                htlc_contract: "htlc.testnet".into(),
                account_id: None,
                private_key: None,
            },
            session: SessionConfig::default(),
            timelocks: TimelockConfig::default(),
            monitor: MonitorConfig::default(),
            secret: SecretConfig { ttl_seconds: 3600, encryption_key: hex::encode([0x11u8; 32]) },
        }
    }

    #[test]
    fn build_without_signer_key_succeeds_in_read_only_mode() {
        let app = OrchestratorApp::build(config()).unwrap();
        assert_eq!(app.sessions.active_len(), 0);
    }

    #[test]
    fn build_rejects_malformed_encryption_key() {
        let mut cfg = config();
        cfg.secret.encryption_key = "not-hex".into();
        assert!(OrchestratorApp::build(cfg).is_err());
    }
}
