//! Wormhole token bridge: wrapped-token attestation and cross-chain transfers out of Solana.

pub mod actions;
pub mod attest;
pub mod bridge;
pub mod client;
pub mod evm_bridge;
pub mod lookup;
pub mod signer;
pub mod solana_bridge;
pub mod transfer;
pub mod vaa;
pub mod wormholescan;

#[cfg(test)]
pub mod testing;

use crate::chains::{evm::EvmChain, solana::SolanaChain, Chain, Platform};
use crate::errors::BridgeError;
use eyre::Context as _;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A token on its home chain. `Native` is the chain's gas asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenId {
    Native(Chain),
    Token { chain: Chain, address: String },
}

impl TokenId {
    pub const fn chain(&self) -> Chain {
        match self {
            Self::Native(c) | Self::Token { chain: c, .. } => *c,
        }
    }

    pub const fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Native(_) => None,
            Self::Token { address, .. } => Some(address),
        }
    }

    /// Key used for logging and lock maps.
    pub fn key(&self) -> String {
        match self {
            Self::Native(c) => format!("{c}:native"),
            Self::Token { chain, address } => format!("{chain}:{address}"),
        }
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// An address in its chain-native string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainAddress {
    pub chain: Chain,
    pub address: String,
}

impl ChainAddress {
    /// Validate and normalize `address` for `chain`.
    pub fn parse(chain: Chain, address: &str) -> eyre::Result<Self> {
        let address = match chain.platform() {
            Platform::Solana => SolanaChain::parse_pubkey(address)
                .map_err(|e| BridgeError::InvalidRequest(format!("{address}: {e:#}")))?
                .to_string(),
            Platform::Evm => EvmChain::parse_address(address)
                .map_err(|e| BridgeError::InvalidRequest(format!("{address}: {e:#}")))?
                .to_checksum(None),
            Platform::Sui | Platform::Aptos => address.trim().to_owned(),
        };
        Ok(Self { chain, address })
    }

    /// 32-byte Wormhole universal address. EVM addresses are left-padded.
    pub fn universal(&self) -> eyre::Result<[u8; 32]> {
        match self.chain.platform() {
            Platform::Solana => Ok(SolanaChain::parse_pubkey(&self.address)?.to_bytes()),
            Platform::Evm => {
                let a = EvmChain::parse_address(&self.address)?;
                let mut out = [0_u8; 32];
                out.get_mut(12..)
                    .ok_or_else(|| eyre::eyre!("universal address layout"))?
                    .copy_from_slice(a.as_slice());
                Ok(out)
            }
            Platform::Sui | Platform::Aptos => {
                let t = self.address.trim();
                let t = t.strip_prefix("0x").unwrap_or(t);
                let b = hex::decode(t).context("decode hex address")?;
                let mut out = [0_u8; 32];
                let start = 32_usize
                    .checked_sub(b.len())
                    .ok_or_else(|| eyre::eyre!("address longer than 32 bytes"))?;
                out.get_mut(start..)
                    .ok_or_else(|| eyre::eyre!("universal address layout"))?
                    .copy_from_slice(&b);
                Ok(out)
            }
        }
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxId {
    pub chain: Chain,
    pub txid: String,
}

impl TxId {
    pub fn new(chain: Chain, txid: impl Into<String>) -> Self {
        Self {
            chain,
            txid: txid.into(),
        }
    }
}

/// Identifies one Wormhole message: emitter chain, emitter and sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WormholeMessageId {
    pub chain: Chain,
    pub emitter: [u8; 32],
    pub sequence: u64,
}

impl WormholeMessageId {
    pub fn emitter_hex(&self) -> String {
        hex::encode(self.emitter)
    }
}

impl fmt::Display for WormholeMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wormhole:{}:{}:{}",
            self.chain.wormhole_chain_id(),
            self.emitter_hex(),
            self.sequence
        )
    }
}

/// Result of asking a destination chain whether a token has a wrapped form there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrappedAssetRecord {
    Wrapped(ChainAddress),
    NotWrapped,
    LookupFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evm_universal_address_is_left_padded() -> eyre::Result<()> {
        let a = ChainAddress::parse(
            Chain::BaseSepolia,
            "0x86f55a04690fde37c5c5f6d0ca379b2ed2f334f9",
        )?;
        assert_eq!(a.address, "0x86F55A04690fdE37C5C5F6D0cA379B2eD2f334f9");
        let u = a.universal()?;
        assert_eq!(u.get(..12), Some([0_u8; 12].as_slice()));
        assert_eq!(u.get(12), Some(&0x86));
        Ok(())
    }

    #[test]
    fn bad_addresses_are_invalid_requests() {
        let e = ChainAddress::parse(Chain::Solana, "not a key");
        let code = e
            .as_ref()
            .err()
            .and_then(crate::errors::find_bridge_error)
            .map(BridgeError::code);
        assert_eq!(code, Some("invalid_request"));
    }

    #[test]
    fn message_id_display_matches_wormholescan_path_parts() {
        let id = WormholeMessageId {
            chain: Chain::Solana,
            emitter: [0xab; 32],
            sequence: 7,
        };
        let s = id.to_string();
        assert!(s.starts_with("wormhole:1:abab"), "{s}");
        assert!(s.ends_with(":7"), "{s}");
    }

    #[test]
    fn token_keys_distinguish_native_from_mints() {
        let n = TokenId::Native(Chain::Solana);
        let t = TokenId::Token {
            chain: Chain::Solana,
            address: "So11111111111111111111111111111111111111112".into(),
        };
        assert_ne!(n.key(), t.key());
        assert!(n.is_native());
        assert_eq!(t.address(), Some("So11111111111111111111111111111111111111112"));
    }
}
