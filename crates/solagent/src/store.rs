use crate::{
    config::{AgentConfig, NetworkMode},
    paths::AgentPaths,
};
use eyre::Context as _;
use std::{fs, path::PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

/// Apply environment variable overrides on top of the file/default config.
fn apply_env_overrides(cfg: &mut AgentConfig) {
    /// Helper: if an env var is set and non-empty, apply `setter` with the trimmed value.
    fn apply_env(var: &str, setter: impl FnOnce(&str)) {
        if let Ok(u) = std::env::var(var) {
            let t = u.trim();
            if !t.is_empty() {
                setter(t);
            }
        }
    }

    apply_env("SOLAGENT_NETWORK_MODE", |v| match v.parse::<NetworkMode>() {
        Ok(m) => cfg.network_mode = m,
        Err(e) => warn!(error = %e, "ignoring SOLAGENT_NETWORK_MODE"),
    });
    let mode = cfg.network_mode;
    apply_env("SOLAGENT_SOLANA_RPC_URL", |v| match mode {
        NetworkMode::Mainnet => v.clone_into(&mut cfg.rpc.solana_rpc_url_mainnet),
        NetworkMode::Testnet => v.clone_into(&mut cfg.rpc.solana_rpc_url_testnet),
        NetworkMode::Devnet => v.clone_into(&mut cfg.rpc.solana_rpc_url_devnet),
    });
    apply_env("SOLAGENT_WORMHOLESCAN_API_BASE_URL", |v| match mode {
        NetworkMode::Mainnet => v.clone_into(&mut cfg.http.wormholescan_api_base_url),
        NetworkMode::Testnet => v.clone_into(&mut cfg.http.wormholescan_api_base_url_testnet),
        NetworkMode::Devnet => v.clone_into(&mut cfg.http.guardian_api_base_url_devnet),
    });
    if let Ok(v) = std::env::var("SOLAGENT_VAA_TIMEOUT_SECONDS") {
        if let Ok(n) = v.trim().parse::<u64>() {
            if n > 0 {
                cfg.bridge.vaa_timeout_seconds = n;
            }
        }
    }
}

impl ConfigStore {
    pub fn new(paths: &AgentPaths) -> Self {
        Self {
            path: paths.config_file(),
        }
    }

    pub fn load_or_init_default(&self) -> eyre::Result<AgentConfig> {
        if !self.path.exists() {
            let cfg = AgentConfig::default();
            self.save(&cfg)?;
            let mut cfg = cfg;
            apply_env_overrides(&mut cfg);
            return Ok(cfg);
        }

        let s = fs::read_to_string(&self.path).context("read config.toml")?;
        let mut cfg: AgentConfig = toml::from_str(&s).context("parse config.toml")?;
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    pub fn save(&self, cfg: &AgentConfig) -> eyre::Result<()> {
        if let Some(parent) = self.path.parent() {
            crate::fsutil::ensure_private_dir(parent)?;
        }
        let s = toml::to_string_pretty(cfg).context("serialize config.toml")?;
        crate::fsutil::write_string_atomic_restrictive(
            &self.path,
            &s,
            crate::fsutil::MODE_FILE_PRIVATE,
        )
        .context("write config.toml")?;
        Ok(())
    }
}
