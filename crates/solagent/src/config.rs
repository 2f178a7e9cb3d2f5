use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr, time::Duration};

pub const SOLANA_MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const SOLANA_DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";
pub const SOLANA_LOCAL_RPC_URL: &str = "http://127.0.0.1:8899";

/// Wormhole network environment. `Testnet` pairs Solana devnet with the public EVM testnets,
/// `Devnet` is a local guardian devnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Mainnet,
    Testnet,
    Devnet,
}

impl NetworkMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "Mainnet",
            Self::Testnet => "Testnet",
            Self::Devnet => "Devnet",
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkMode {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "main" | "prod" | "production" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            "devnet" | "dev" | "local" => Ok(Self::Devnet),
            other => eyre::bail!("unknown network: {other} (expected Mainnet, Testnet or Devnet)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Wormholescan API base URL (mainnet). Used to fetch signed VAAs. Keyless.
    pub wormholescan_api_base_url: String,
    /// Wormholescan API base URL (testnet).
    pub wormholescan_api_base_url_testnet: String,
    /// Guardian REST base URL for a local devnet (same `signed_vaa` route shape).
    pub guardian_api_base_url_devnet: String,
    /// Per-request timeout for VAA lookups (milliseconds).
    pub vaa_request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            wormholescan_api_base_url: "https://api.wormholescan.io/v1".into(),
            wormholescan_api_base_url_testnet: "https://api.testnet.wormholescan.io/v1".into(),
            guardian_api_base_url_devnet: "http://127.0.0.1:7071/v1".into(),
            vaa_request_timeout_ms: 5_000,
        }
    }
}

impl HttpConfig {
    pub fn guardian_base_url(&self, mode: NetworkMode) -> &str {
        match mode {
            NetworkMode::Mainnet => &self.wormholescan_api_base_url,
            NetworkMode::Testnet => &self.wormholescan_api_base_url_testnet,
            NetworkMode::Devnet => &self.guardian_api_base_url_devnet,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Solana RPC endpoint URLs per network.
    pub solana_rpc_url_mainnet: String,
    pub solana_rpc_url_testnet: String,
    pub solana_rpc_url_devnet: String,
    /// Additional Solana mainnet RPC endpoints to try if the primary fails.
    pub solana_fallback_rpc_urls_mainnet: Vec<String>,
    /// Additional Solana devnet RPC endpoints to try if the primary fails.
    pub solana_fallback_rpc_urls_testnet: Vec<String>,
    /// Optional default Solana compute unit limit for locally built transactions.
    pub solana_default_compute_unit_limit: Option<u32>,
    /// Optional default Solana compute unit price (micro-lamports per CU).
    pub solana_default_compute_unit_price_micro_lamports: Option<u64>,
    /// EVM RPC endpoints keyed by chain config name (`ethereum`, `base-sepolia`, ...).
    pub evm_rpc_urls: BTreeMap<String, String>,
    /// EVM fallback RPC endpoints keyed by chain config name.
    pub evm_fallback_rpc_urls: BTreeMap<String, Vec<String>>,
    /// EVM chain IDs keyed by chain config name.
    pub evm_chain_ids: BTreeMap<String, u64>,
}

/// A single EVM chain definition used by the table-driven [`RpcConfig::default()`].
struct EvmChainDef {
    name: &'static str,
    rpc_url: &'static str,
    chain_id: u64,
    fallbacks: &'static [&'static str],
}

fn populate_evm_chains(
    table: &[EvmChainDef],
    urls: &mut BTreeMap<String, String>,
    fallbacks: &mut BTreeMap<String, Vec<String>>,
    ids: &mut BTreeMap<String, u64>,
) {
    for def in table {
        urls.insert(def.name.into(), def.rpc_url.into());
        ids.insert(def.name.into(), def.chain_id);
        fallbacks.insert(
            def.name.into(),
            def.fallbacks.iter().map(|&s| s.into()).collect(),
        );
    }
}

const EVM_MAINNETS: &[EvmChainDef] = &[
    EvmChainDef {
        name: "ethereum",
        rpc_url: "https://eth.llamarpc.com",
        chain_id: 1,
        fallbacks: &[
            "https://ethereum-rpc.publicnode.com",
            "https://cloudflare-eth.com",
        ],
    },
    EvmChainDef {
        name: "base",
        rpc_url: "https://mainnet.base.org",
        chain_id: 8453,
        fallbacks: &["https://base-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "arbitrum",
        rpc_url: "https://arb1.arbitrum.io/rpc",
        chain_id: 42161,
        fallbacks: &["https://arbitrum-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "optimism",
        rpc_url: "https://mainnet.optimism.io",
        chain_id: 10,
        fallbacks: &["https://optimism-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "polygon",
        rpc_url: "https://polygon-rpc.com",
        chain_id: 137,
        fallbacks: &["https://polygon-bor-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "bnb",
        rpc_url: "https://bsc-dataseed.binance.org",
        chain_id: 56,
        fallbacks: &["https://bsc-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "avalanche",
        rpc_url: "https://api.avax.network/ext/bc/C/rpc",
        chain_id: 43114,
        fallbacks: &["https://avalanche-c-chain-rpc.publicnode.com"],
    },
];

const EVM_TESTNETS: &[EvmChainDef] = &[
    EvmChainDef {
        name: "sepolia",
        rpc_url: "https://ethereum-sepolia-rpc.publicnode.com",
        chain_id: 11_155_111,
        fallbacks: &["https://rpc.sepolia.org"],
    },
    EvmChainDef {
        name: "base-sepolia",
        rpc_url: "https://sepolia.base.org",
        chain_id: 84532,
        fallbacks: &["https://base-sepolia-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "arbitrum-sepolia",
        rpc_url: "https://sepolia-rollup.arbitrum.io/rpc",
        chain_id: 421_614,
        fallbacks: &["https://arbitrum-sepolia-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "optimism-sepolia",
        rpc_url: "https://sepolia.optimism.io",
        chain_id: 11_155_420,
        fallbacks: &["https://optimism-sepolia-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "polygon-amoy",
        rpc_url: "https://rpc-amoy.polygon.technology",
        chain_id: 80002,
        fallbacks: &["https://polygon-amoy-bor-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "bnb-testnet",
        rpc_url: "https://data-seed-prebsc-1-s1.bnbchain.org:8545",
        chain_id: 97,
        fallbacks: &["https://bsc-testnet-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "avalanche-fuji",
        rpc_url: "https://api.avax-test.network/ext/bc/C/rpc",
        chain_id: 43113,
        fallbacks: &["https://avalanche-fuji-c-chain-rpc.publicnode.com"],
    },
];

/// Local guardian devnet EVM nodes.
const EVM_DEVNETS: &[EvmChainDef] = &[
    EvmChainDef {
        name: "ethereum-devnet",
        rpc_url: "http://127.0.0.1:8545",
        chain_id: 1337,
        fallbacks: &[],
    },
    EvmChainDef {
        name: "bnb-devnet",
        rpc_url: "http://127.0.0.1:8546",
        chain_id: 1397,
        fallbacks: &[],
    },
];

impl Default for RpcConfig {
    fn default() -> Self {
        let mut evm_rpc_urls = BTreeMap::new();
        let mut evm_fallback_rpc_urls: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut evm_chain_ids = BTreeMap::new();

        for table in [EVM_MAINNETS, EVM_TESTNETS, EVM_DEVNETS] {
            populate_evm_chains(
                table,
                &mut evm_rpc_urls,
                &mut evm_fallback_rpc_urls,
                &mut evm_chain_ids,
            );
        }

        Self {
            solana_rpc_url_mainnet: SOLANA_MAINNET_RPC_URL.into(),
            solana_rpc_url_testnet: SOLANA_DEVNET_RPC_URL.into(),
            solana_rpc_url_devnet: SOLANA_LOCAL_RPC_URL.into(),
            solana_fallback_rpc_urls_mainnet: vec![
                "https://solana-rpc.publicnode.com".into(),
                "https://solana.drpc.org".into(),
            ],
            solana_fallback_rpc_urls_testnet: vec!["https://rpc.ankr.com/solana_devnet".into()],
            solana_default_compute_unit_limit: None,
            solana_default_compute_unit_price_micro_lamports: None,
            evm_rpc_urls,
            evm_fallback_rpc_urls,
            evm_chain_ids,
        }
    }
}

impl RpcConfig {
    pub fn solana_rpc_url(&self, mode: NetworkMode) -> &str {
        match mode {
            NetworkMode::Mainnet => &self.solana_rpc_url_mainnet,
            NetworkMode::Testnet => &self.solana_rpc_url_testnet,
            NetworkMode::Devnet => &self.solana_rpc_url_devnet,
        }
    }

    pub fn solana_fallback_urls(&self, mode: NetworkMode) -> &[String] {
        match mode {
            NetworkMode::Mainnet => &self.solana_fallback_rpc_urls_mainnet,
            NetworkMode::Testnet => &self.solana_fallback_rpc_urls_testnet,
            NetworkMode::Devnet => &[],
        }
    }
}

/// How the destination-side `createWrapped` submission is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    /// Broadcast and move straight on to polling for the wrapped asset.
    #[default]
    FireAndForget,
    /// Wait for the receipt; a failed submission aborts the attestation.
    AwaitConfirmation,
}

/// What a failed wrapped-asset lookup means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LookupFailurePolicy {
    /// Report "not wrapped" (and log the failure).
    #[default]
    AssumeAbsent,
    /// Surface the failure to the caller.
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Upper bound on waiting for the `AttestMeta` VAA.
    pub vaa_timeout_seconds: u64,
    /// Pause between signed-VAA probes while waiting.
    pub guardian_poll_interval_ms: u64,
    pub wrapped_asset_poll_attempts: u32,
    pub wrapped_asset_poll_interval_ms: u64,
    pub attestation_poll_attempts: u32,
    /// How long each transfer-attestation attempt may wait for the VAA.
    pub attestation_fetch_timeout_seconds: u64,
    /// Pause after a failed transfer-attestation attempt.
    pub attestation_retry_delay_seconds: u64,
    /// Gas limit for the destination signer when submitting attestations.
    pub evm_gas_limit: u64,
    pub submit_policy: SubmitPolicy,
    pub lookup_failure_policy: LookupFailurePolicy,
    /// Relayer-completed transfers. Off: the destination signer redeems.
    pub automatic: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            vaa_timeout_seconds: 25 * 60,
            guardian_poll_interval_ms: 1_000,
            wrapped_asset_poll_attempts: 10,
            wrapped_asset_poll_interval_ms: 2_000,
            attestation_poll_attempts: 10,
            attestation_fetch_timeout_seconds: 60,
            attestation_retry_delay_seconds: 30,
            evm_gas_limit: 2_500_000,
            submit_policy: SubmitPolicy::default(),
            lookup_failure_policy: LookupFailurePolicy::default(),
            automatic: false,
        }
    }
}

impl BridgeConfig {
    pub const fn vaa_timeout(&self) -> Duration {
        Duration::from_secs(self.vaa_timeout_seconds)
    }

    pub const fn guardian_poll_interval(&self) -> Duration {
        Duration::from_millis(self.guardian_poll_interval_ms)
    }

    pub const fn wrapped_asset_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wrapped_asset_poll_interval_ms)
    }

    pub const fn attestation_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.attestation_fetch_timeout_seconds)
    }

    pub const fn attestation_retry_delay(&self) -> Duration {
        Duration::from_secs(self.attestation_retry_delay_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Network used when a request omits `network`.
    pub network_mode: NetworkMode,
    pub rpc: RpcConfig,
    pub http: HttpConfig,
    pub bridge: BridgeConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_mode_parses_sdk_and_lowercase_names() -> eyre::Result<()> {
        assert_eq!("Testnet".parse::<NetworkMode>()?, NetworkMode::Testnet);
        assert_eq!("mainnet".parse::<NetworkMode>()?, NetworkMode::Mainnet);
        assert_eq!(" Devnet ".parse::<NetworkMode>()?, NetworkMode::Devnet);
        assert!("moonnet".parse::<NetworkMode>().is_err());
        Ok(())
    }

    #[test]
    fn bridge_defaults_match_protocol_budgets() {
        let b = BridgeConfig::default();
        assert_eq!(b.vaa_timeout(), Duration::from_secs(1500));
        assert_eq!(b.wrapped_asset_poll_attempts, 10);
        assert_eq!(b.wrapped_asset_poll_interval(), Duration::from_secs(2));
        assert_eq!(b.attestation_poll_attempts, 10);
        assert_eq!(b.attestation_fetch_timeout(), Duration::from_secs(60));
        assert_eq!(b.attestation_retry_delay(), Duration::from_secs(30));
        assert_eq!(b.evm_gas_limit, 2_500_000);
        assert_eq!(b.submit_policy, SubmitPolicy::FireAndForget);
        assert_eq!(b.lookup_failure_policy, LookupFailurePolicy::AssumeAbsent);
        assert!(!b.automatic, "manual transfers by default");
    }

    #[test]
    fn partial_toml_keeps_defaults() -> eyre::Result<()> {
        let cfg: AgentConfig = toml::from_str(
            r#"
network_mode = "testnet"

[bridge]
submit_policy = "await_confirmation"
wrapped_asset_poll_attempts = 3
"#,
        )?;
        assert_eq!(cfg.network_mode, NetworkMode::Testnet);
        assert_eq!(cfg.bridge.submit_policy, SubmitPolicy::AwaitConfirmation);
        assert_eq!(cfg.bridge.wrapped_asset_poll_attempts, 3);
        assert_eq!(cfg.bridge.vaa_timeout_seconds, 1500);
        assert_eq!(
            cfg.rpc.evm_chain_ids.get("base-sepolia").copied(),
            Some(84532)
        );
        assert_eq!(cfg.rpc.solana_rpc_url(NetworkMode::Testnet), SOLANA_DEVNET_RPC_URL);
        Ok(())
    }
}
