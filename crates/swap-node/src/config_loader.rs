//! Resolving an [`OrchestratorConfig`] from layered configuration
//! sources: built-in defaults, an optional config file, then
//! environment variable overrides.
//!
//! Reference: spec §6 "Configuration surface". Grounded in the
//! `config` crate layering pattern named in `swap-types::config`'s
//! doc comment; generalized here from "named in a comment" to an
//! actual loader because a runnable node needs one.

use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use swap_types::{ChainAConfig, ChainBConfig, MonitorConfig, OrchestratorConfig, SecretConfig, SessionConfig, TimelockConfig};

/// Errors resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The `config` crate failed to merge or deserialize a layer.
    #[error("configuration error: {0}")]
    Source(#[from] config::ConfigError),

    /// A required field had no default and was not supplied by any
    /// layer.
    #[error("missing required configuration: {0}")]
    MissingRequired(&'static str),
}

/// Raw, partially-optional shape the `config` crate deserializes
/// into before it is validated and converted to [`OrchestratorConfig`].
///
/// Every field is optional so a layer (file, env) may omit it and
/// fall through to [`defaults`]; chain A/B endpoints and the secret
/// encryption key have no sane default and are rejected if still
/// missing after all layers are merged.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    chain_a: RawChainA,
    chain_b: RawChainB,
    session: Option<SessionConfig>,
    timelocks: Option<TimelockConfig>,
    monitor: Option<MonitorConfig>,
    secret: RawSecret,
}

#[derive(Debug, Default, Deserialize)]
struct RawChainA {
    rpc_url: Option<String>,
    chain_id: Option<u64>,
    factory_address: Option<String>,
    signer_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawChainB {
    network_id: Option<String>,
    rpc_url: Option<String>,
    backup_rpc_url: Option<String>,
    htlc_contract: Option<String>,
    account_id: Option<String>,
    private_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSecret {
    ttl_seconds: Option<u64>,
    encryption_key: Option<String>,
}

fn parse_factory_address(hex_str: &str) -> Result<[u8; 20], ConfigLoadError> {
    let bytes = hex::decode(hex_str.trim_start_matches("0x"))
        .map_err(|_| ConfigLoadError::MissingRequired("chainA.factoryAddress must be hex"))?;
    if bytes.len() != 20 {
        return Err(ConfigLoadError::MissingRequired("chainA.factoryAddress must be 20 bytes"));
    }
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&bytes);
    Ok(addr)
}

/// Load configuration from (in increasing precedence): built-in
/// defaults, an optional file at `path` (if it exists; format is
/// inferred from its extension — `.json`, `.toml`, or `.yaml`), then
/// `SWAP_`-prefixed environment variables (e.g.
/// `SWAP_CHAIN_A__RPC_URL`, `SWAP_SECRET__ENCRYPTION_KEY`).
///
/// Reference: spec §6 "Persisted state layout... Backing store is
/// pluggable"; the configuration resolution itself follows the same
/// layered-override shape a pluggable persistence layer would.
pub fn load(path: Option<&str>) -> Result<OrchestratorConfig, ConfigLoadError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::from(Path::new(path)));
        }
    }
    builder = builder.add_source(Environment::with_prefix("SWAP").separator("__"));

    let raw: RawConfig = builder.build()?.try_deserialize().unwrap_or_default();

    let chain_a = ChainAConfig {
        rpc_url: raw.chain_a.rpc_url.ok_or(ConfigLoadError::MissingRequired("chainA.rpcUrl"))?,
        chain_id: raw.chain_a.chain_id.ok_or(ConfigLoadError::MissingRequired("chainA.chainId"))?,
        factory_address: parse_factory_address(
            &raw.chain_a.factory_address.ok_or(ConfigLoadError::MissingRequired("chainA.factoryAddress"))?,
        )?,
        signer_key: raw.chain_a.signer_key,
    };

    let chain_b = ChainBConfig {
        network_id: raw.chain_b.network_id.ok_or(ConfigLoadError::MissingRequired("chainB.networkId"))?,
        rpc_url: raw.chain_b.rpc_url.ok_or(ConfigLoadError::MissingRequired("chainB.rpcUrl"))?,
        backup_rpc_url: raw.chain_b.backup_rpc_url,
        htlc_contract: raw.chain_b.htlc_contract.ok_or(ConfigLoadError::MissingRequired("chainB.htlcContract"))?,
        account_id: raw.chain_b.account_id,
        private_key: raw.chain_b.private_key,
    };

    let secret = SecretConfig {
        ttl_seconds: raw.secret.ttl_seconds.unwrap_or(3600),
        encryption_key: raw.secret.encryption_key.ok_or(ConfigLoadError::MissingRequired("secret.encryptionKey"))?,
    };

    Ok(OrchestratorConfig {
        chain_a,
        chain_b,
        session: raw.session.unwrap_or_default(),
        timelocks: raw.timelocks.unwrap_or_default(),
        monitor: raw.monitor.unwrap_or_default(),
        secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    #[test]
    fn loads_minimal_file_with_defaults_filled_in() {
        let file = sample_file(
            r#"{
                "chain_a": {"rpc_url": "http://localhost:8545", "chain_id": 1337, "factory_address": "0011223344556677889900112233445566778899"},
                "chain_b": {"network_id": "testnet", "rpc_url": "http://localhost:3030", "htlc_contract": "htlc.testnet"},
                "secret": {"encryption_key": "4242424242424242424242424242424242424242424242424242424242424242"}
            }"#,
        );
        let config = load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.chain_a.chain_id, 1337);
        assert_eq!(config.session.max_active, SessionConfig::default().max_active);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let err = load(Some("/nonexistent/path/does/not/exist")).unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingRequired(_)));
    }
}
