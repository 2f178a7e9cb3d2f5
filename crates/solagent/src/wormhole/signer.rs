use super::ChainAddress;
use crate::chains::{Chain, Platform};
use crate::errors::BridgeError;
use crate::keys::KeyMaterial;
use alloy::signers::local::PrivateKeySigner;
use solana_sdk::{signature::Keypair, signer::Signer as _};
use std::sync::Arc;

#[derive(Clone)]
pub enum SignerKey {
    Solana(Arc<Keypair>),
    Evm(PrivateKeySigner),
}

/// A chain-bound signing capability, built per operation.
#[derive(Clone)]
pub struct SignerHandle {
    pub chain: Chain,
    pub address: ChainAddress,
    pub key: SignerKey,
    /// Gas limit for EVM submissions; `None` lets the node estimate.
    pub gas_limit: Option<u64>,
}

impl std::fmt::Debug for SignerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerHandle")
            .field("chain", &self.chain)
            .field("address", &self.address.address)
            .field("gas_limit", &self.gas_limit)
            .finish_non_exhaustive()
    }
}

impl SignerHandle {
    pub fn solana_keypair(&self) -> eyre::Result<&Keypair> {
        match &self.key {
            SignerKey::Solana(k) => Ok(k),
            SignerKey::Evm(_) => eyre::bail!("{} signer is not a solana signer", self.chain),
        }
    }

    pub fn evm_signer(&self) -> eyre::Result<&PrivateKeySigner> {
        match &self.key {
            SignerKey::Evm(s) => Ok(s),
            SignerKey::Solana(_) => eyre::bail!("{} signer is not an evm signer", self.chain),
        }
    }
}

/// Build the signer for `chain` from the process key material.
pub fn resolve_signer(
    keys: &KeyMaterial,
    chain: Chain,
    gas_limit: Option<u64>,
) -> eyre::Result<SignerHandle> {
    match chain.platform() {
        Platform::Solana => {
            let kp = keys.solana().ok_or_else(|| {
                BridgeError::UnsupportedPlatform(format!(
                    "{chain}: no solana key configured (set {})",
                    crate::keys::SOLANA_PRIVATE_KEY_ENV
                ))
            })?;
            Ok(SignerHandle {
                chain,
                address: ChainAddress {
                    chain,
                    address: kp.pubkey().to_string(),
                },
                key: SignerKey::Solana(Arc::clone(kp)),
                gas_limit: None,
            })
        }
        Platform::Evm => {
            let s = keys.evm().ok_or_else(|| {
                BridgeError::UnsupportedPlatform(format!(
                    "{chain}: no evm key configured (set {})",
                    crate::keys::ETH_PRIVATE_KEY_ENV
                ))
            })?;
            Ok(SignerHandle {
                chain,
                address: ChainAddress {
                    chain,
                    address: s.address().to_checksum(None),
                },
                key: SignerKey::Evm(s.clone()),
                gas_limit,
            })
        }
        Platform::Sui | Platform::Aptos => Err(BridgeError::UnsupportedPlatform(format!(
            "{chain}: no signer implementation for this platform"
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::find_bridge_error;

    fn code(r: &eyre::Result<SignerHandle>) -> Option<&'static str> {
        r.as_ref()
            .err()
            .and_then(find_bridge_error)
            .map(BridgeError::code)
    }

    #[test]
    fn resolves_per_platform_family() -> eyre::Result<()> {
        let keys = KeyMaterial::for_tests(Some(Keypair::new()), Some(PrivateKeySigner::random()));
        let sol = resolve_signer(&keys, Chain::Solana, Some(1))?;
        assert!(sol.solana_keypair().is_ok());
        assert_eq!(sol.gas_limit, None, "gas limit is evm only");
        let evm = resolve_signer(&keys, Chain::BaseSepolia, Some(2_500_000))?;
        assert!(evm.evm_signer().is_ok());
        assert!(evm.solana_keypair().is_err());
        assert_eq!(evm.gas_limit, Some(2_500_000));
        assert!(evm.address.address.starts_with("0x"));
        Ok(())
    }

    #[test]
    fn sui_aptos_and_missing_keys_are_unsupported() {
        let keys = KeyMaterial::for_tests(Some(Keypair::new()), None);
        assert_eq!(code(&resolve_signer(&keys, Chain::Sui, None)), Some("unsupported_platform"));
        assert_eq!(code(&resolve_signer(&keys, Chain::Aptos, None)), Some("unsupported_platform"));
        assert_eq!(code(&resolve_signer(&keys, Chain::Sepolia, None)), Some("unsupported_platform"));
        let none = KeyMaterial::default();
        assert_eq!(code(&resolve_signer(&none, Chain::Solana, None)), Some("unsupported_platform"));
    }
}
