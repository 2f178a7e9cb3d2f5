pub mod evm;
pub mod solana;

use crate::config::NetworkMode;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Solana,
    Evm,
    Sui,
    Aptos,
}

/// Chains reachable through the Wormhole token bridge, named as the Wormhole SDK names them.
///
/// Testnet flavours of `Bsc` and `Avalanche` keep their mainnet name; the network decides
/// which deployment is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Chain {
    Solana,
    Ethereum,
    Bsc,
    Polygon,
    Avalanche,
    Sui,
    Aptos,
    Arbitrum,
    Optimism,
    Base,
    Sepolia,
    ArbitrumSepolia,
    BaseSepolia,
    OptimismSepolia,
    PolygonSepolia,
}

impl Chain {
    pub const ALL: [Self; 15] = [
        Self::Solana,
        Self::Ethereum,
        Self::Bsc,
        Self::Polygon,
        Self::Avalanche,
        Self::Sui,
        Self::Aptos,
        Self::Arbitrum,
        Self::Optimism,
        Self::Base,
        Self::Sepolia,
        Self::ArbitrumSepolia,
        Self::BaseSepolia,
        Self::OptimismSepolia,
        Self::PolygonSepolia,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solana => "Solana",
            Self::Ethereum => "Ethereum",
            Self::Bsc => "Bsc",
            Self::Polygon => "Polygon",
            Self::Avalanche => "Avalanche",
            Self::Sui => "Sui",
            Self::Aptos => "Aptos",
            Self::Arbitrum => "Arbitrum",
            Self::Optimism => "Optimism",
            Self::Base => "Base",
            Self::Sepolia => "Sepolia",
            Self::ArbitrumSepolia => "ArbitrumSepolia",
            Self::BaseSepolia => "BaseSepolia",
            Self::OptimismSepolia => "OptimismSepolia",
            Self::PolygonSepolia => "PolygonSepolia",
        }
    }

    pub const fn platform(self) -> Platform {
        match self {
            Self::Solana => Platform::Solana,
            Self::Sui => Platform::Sui,
            Self::Aptos => Platform::Aptos,
            Self::Ethereum
            | Self::Bsc
            | Self::Polygon
            | Self::Avalanche
            | Self::Arbitrum
            | Self::Optimism
            | Self::Base
            | Self::Sepolia
            | Self::ArbitrumSepolia
            | Self::BaseSepolia
            | Self::OptimismSepolia
            | Self::PolygonSepolia => Platform::Evm,
        }
    }

    pub const fn wormhole_chain_id(self) -> u16 {
        match self {
            Self::Solana => 1,
            Self::Ethereum => 2,
            Self::Bsc => 4,
            Self::Polygon => 5,
            Self::Avalanche => 6,
            Self::Sui => 21,
            Self::Aptos => 22,
            Self::Arbitrum => 23,
            Self::Optimism => 24,
            Self::Base => 30,
            Self::Sepolia => 10002,
            Self::ArbitrumSepolia => 10003,
            Self::BaseSepolia => 10004,
            Self::OptimismSepolia => 10005,
            Self::PolygonSepolia => 10007,
        }
    }

    pub fn from_wormhole_chain_id(id: u16) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.wormhole_chain_id() == id)
    }

    /// Decimals of the chain's native gas asset.
    pub const fn native_decimals(self) -> u8 {
        match self.platform() {
            Platform::Solana | Platform::Sui => 9,
            Platform::Aptos => 8,
            Platform::Evm => 18,
        }
    }

    /// Key into the `[rpc]` EVM tables for this chain on `mode`.
    pub const fn evm_config_name(self, mode: NetworkMode) -> Option<&'static str> {
        match (mode, self) {
            (NetworkMode::Mainnet, Self::Ethereum) => Some("ethereum"),
            (NetworkMode::Mainnet, Self::Base) => Some("base"),
            (NetworkMode::Mainnet, Self::Arbitrum) => Some("arbitrum"),
            (NetworkMode::Mainnet, Self::Optimism) => Some("optimism"),
            (NetworkMode::Mainnet, Self::Polygon) => Some("polygon"),
            (NetworkMode::Mainnet, Self::Bsc) => Some("bnb"),
            (NetworkMode::Mainnet, Self::Avalanche) => Some("avalanche"),
            (NetworkMode::Testnet, Self::Sepolia) => Some("sepolia"),
            (NetworkMode::Testnet, Self::BaseSepolia) => Some("base-sepolia"),
            (NetworkMode::Testnet, Self::ArbitrumSepolia) => Some("arbitrum-sepolia"),
            (NetworkMode::Testnet, Self::OptimismSepolia) => Some("optimism-sepolia"),
            (NetworkMode::Testnet, Self::PolygonSepolia) => Some("polygon-amoy"),
            (NetworkMode::Testnet, Self::Bsc) => Some("bnb-testnet"),
            (NetworkMode::Testnet, Self::Avalanche) => Some("avalanche-fuji"),
            (NetworkMode::Devnet, Self::Ethereum) => Some("ethereum-devnet"),
            (NetworkMode::Devnet, Self::Bsc) => Some("bnb-devnet"),
            _ => None,
        }
    }

    /// Token bridge contract on an EVM chain.
    pub const fn evm_token_bridge(self, mode: NetworkMode) -> Option<&'static str> {
        match (mode, self) {
            (NetworkMode::Mainnet, Self::Ethereum) => {
                Some("0x3ee18B2214AFF97000D974cf647E7C347E8fa585")
            }
            (NetworkMode::Mainnet, Self::Arbitrum) => {
                Some("0x0b2402144Bb366A632D14B83F244D2e0e21bD39c")
            }
            (NetworkMode::Mainnet, Self::Optimism) => {
                Some("0x1D68124e65faFC907325e3EDbF8c4d84499DAa8b")
            }
            (NetworkMode::Mainnet, Self::Polygon) => {
                Some("0x5a58505a96D1dbf8dF91cB21B54419FC36e93fdE")
            }
            (NetworkMode::Mainnet, Self::Base) => Some("0x8d2de8d2f73F1dfe8B72d0d8E9FfFBCf7AaC8AEf"),
            (NetworkMode::Mainnet, Self::Bsc) => Some("0xB6F6D86a8f9879A9c87f643768d9efc38c1Da6E7"),
            (NetworkMode::Mainnet, Self::Avalanche) => {
                Some("0x0e082F06FF657D94310cB8cE8B0D9a04541d8052")
            }
            (NetworkMode::Testnet, Self::Sepolia) => Some("0xDB5492265f6038831E89f495670FF909aDe94bd9"),
            (NetworkMode::Testnet, Self::ArbitrumSepolia | Self::PolygonSepolia) => {
                Some("0xC7A204bDBFe983FCD8d8E61D02b475D4073fF97e")
            }
            (NetworkMode::Testnet, Self::OptimismSepolia) => {
                Some("0x99737Ec4B815d816c49A385943baf0380e75c0Ac")
            }
            (NetworkMode::Testnet, Self::BaseSepolia) => {
                Some("0x86F55A04690fdE37C5C5F6D0cA379B2eD2f334f9")
            }
            (NetworkMode::Testnet, Self::Bsc) => Some("0x9dcF9D205C9De35334D646BeE44b2D2859712A09"),
            (NetworkMode::Testnet, Self::Avalanche) => {
                Some("0x61E44E506Ca5659E6c0bba9b678586fA2d729756")
            }
            (NetworkMode::Devnet, Self::Ethereum | Self::Bsc) => {
                Some("0x0290FB167208Af455bB137780163b7B7a9a10C16")
            }
            _ => None,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = eyre::Report;

    /// Accepts Wormhole names (`BaseSepolia`) and config names (`base-sepolia`, `bnb`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        let alias = match norm.as_str() {
            "bnb" | "bnbtestnet" | "bsctestnet" => Some(Self::Bsc),
            "avalanchefuji" | "fuji" => Some(Self::Avalanche),
            "polygonamoy" | "amoy" => Some(Self::PolygonSepolia),
            "eth" => Some(Self::Ethereum),
            "sol" => Some(Self::Solana),
            _ => None,
        };
        alias
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|c| c.as_str().to_lowercase() == norm)
            })
            .ok_or_else(|| eyre::eyre!("unknown chain: {}", s.trim()))
    }
}

/// Wormhole core bridge and token bridge program ids on Solana.
#[derive(Debug, Clone, Copy)]
pub struct SolanaWormholePrograms {
    pub core_bridge: Pubkey,
    pub token_bridge: Pubkey,
}

impl SolanaWormholePrograms {
    pub fn for_network(mode: NetworkMode) -> eyre::Result<Self> {
        let (core, token) = match mode {
            NetworkMode::Mainnet => (
                "worm2ZoG2kUd4vFXhvjh93UUH596ayRfgQ2MgjNMTth",
                "wormDTUJ6AWPNvk59vGQbDvGJmqbDTdgWgAqcLBCgUb",
            ),
            NetworkMode::Testnet => (
                "3u8hJUVTA4jH1wYAyUur7FFZVQ8H635K3tSHHF4ssjQ5",
                "DZnkkTmCiFWfYTfT41X3Rd1kDgozqzxWaHqsw6W4x2oe",
            ),
            NetworkMode::Devnet => (
                "Bridge1p5gheXUvJ6jGWGeCsgPKgnE3YgdGKRVCMY9o",
                "B6RHG3mfcckmrYN1UhmJzyS1XX3fZKbkeUcpJe9Sy3FE",
            ),
        };
        Ok(Self {
            core_bridge: solana::SolanaChain::parse_pubkey(core)?,
            token_bridge: solana::SolanaChain::parse_pubkey(token)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wormhole_and_config_names() -> eyre::Result<()> {
        assert_eq!("BaseSepolia".parse::<Chain>()?, Chain::BaseSepolia);
        assert_eq!("base-sepolia".parse::<Chain>()?, Chain::BaseSepolia);
        assert_eq!("solana".parse::<Chain>()?, Chain::Solana);
        assert_eq!("bnb".parse::<Chain>()?, Chain::Bsc);
        assert_eq!("polygon-amoy".parse::<Chain>()?, Chain::PolygonSepolia);
        assert!("Narnia".parse::<Chain>().is_err());
        Ok(())
    }

    #[test]
    fn wormhole_ids_round_trip() {
        for c in Chain::ALL {
            assert_eq!(
                Chain::from_wormhole_chain_id(c.wormhole_chain_id()),
                Some(c),
                "id collision for {c}"
            );
        }
        assert_eq!(Chain::Solana.wormhole_chain_id(), 1);
        assert_eq!(Chain::BaseSepolia.wormhole_chain_id(), 10004);
    }

    #[test]
    fn every_configured_evm_chain_has_a_token_bridge_and_rpc() {
        let rpc = crate::config::RpcConfig::default();
        for mode in [NetworkMode::Mainnet, NetworkMode::Testnet, NetworkMode::Devnet] {
            for c in Chain::ALL {
                let Some(name) = c.evm_config_name(mode) else {
                    continue;
                };
                assert_eq!(c.platform(), Platform::Evm, "{c} is not evm");
                assert!(c.evm_token_bridge(mode).is_some(), "{c}/{mode} has no bridge");
                assert!(rpc.evm_rpc_urls.contains_key(name), "{name} has no rpc url");
                assert!(rpc.evm_chain_ids.contains_key(name), "{name} has no chain id");
            }
        }
    }

    #[test]
    fn solana_programs_resolve_for_every_network() {
        for mode in [NetworkMode::Mainnet, NetworkMode::Testnet, NetworkMode::Devnet] {
            let p = SolanaWormholePrograms::for_network(mode);
            assert!(p.is_ok(), "{mode}: {p:?}");
        }
    }
}
