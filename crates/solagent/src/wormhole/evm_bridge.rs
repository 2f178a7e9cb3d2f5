//! EVM side of the Wormhole token bridge: wrapped-asset queries, `createWrapped` and
//! `completeTransfer` submissions.

use super::signer::SignerHandle;
use super::vaa::SignedVaa;
use crate::chains::{evm::EvmChain, Chain, Platform};
use crate::config::{NetworkMode, RpcConfig};
use crate::errors::BridgeError;
use alloy::primitives::{Address, B256};
use eyre::Context as _;
use std::{str::FromStr as _, time::Duration};

#[derive(Debug, Clone)]
pub struct EvmTokenBridge {
    network: NetworkMode,
    rpc: RpcConfig,
    receipt_timeout: Duration,
}

impl EvmTokenBridge {
    pub const fn new(network: NetworkMode, rpc: RpcConfig, receipt_timeout: Duration) -> Self {
        Self {
            network,
            rpc,
            receipt_timeout,
        }
    }

    /// RPC client and token bridge address for `chain` on this network.
    pub fn chain(&self, chain: Chain) -> eyre::Result<(EvmChain, Address)> {
        if chain.platform() != Platform::Evm {
            return Err(BridgeError::UnsupportedPlatform(format!("{chain} is not an evm chain")).into());
        }
        let (Some(name), Some(bridge)) = (
            chain.evm_config_name(self.network),
            chain.evm_token_bridge(self.network),
        ) else {
            return Err(BridgeError::InvalidRequest(format!(
                "{chain} has no token bridge on {}",
                self.network
            ))
            .into());
        };
        let evm = EvmChain::from_config(&self.rpc, name)?;
        let bridge = EvmChain::parse_address(bridge).context("token bridge address")?;
        Ok((evm, bridge))
    }

    pub async fn wrapped_asset(
        &self,
        chain: Chain,
        token_chain: u16,
        token_address: [u8; 32],
    ) -> eyre::Result<Option<Address>> {
        let (evm, bridge) = self.chain(chain)?;
        evm.wrapped_asset(bridge, token_chain, B256::from(token_address))
            .await
    }

    pub async fn create_wrapped(&self, signer: &SignerHandle, vaa: &SignedVaa) -> eyre::Result<B256> {
        let (evm, bridge) = self.chain(signer.chain)?;
        let s = signer.evm_signer()?;
        let tx = EvmChain::build_create_wrapped(s.address(), bridge, &vaa.bytes, signer.gas_limit);
        evm.send_tx(s, tx).await
    }

    /// Redeem a transfer VAA and wait for the receipt.
    pub async fn complete_transfer(&self, signer: &SignerHandle, vaa: &SignedVaa) -> eyre::Result<B256> {
        let (evm, bridge) = self.chain(signer.chain)?;
        let s = signer.evm_signer()?;
        let tx = EvmChain::build_complete_transfer(s.address(), bridge, &vaa.bytes, signer.gas_limit);
        evm.simulate_tx_strict(&tx)
            .await
            .context("simulate completeTransfer")?;
        let h = evm.send_tx(s, tx).await?;
        evm.confirm_tx(h, self.receipt_timeout).await?;
        Ok(h)
    }

    pub async fn confirm(&self, chain: Chain, txid: &str) -> eyre::Result<()> {
        let (evm, _) = self.chain(chain)?;
        let h = B256::from_str(txid.trim()).context("parse tx hash")?;
        evm.confirm_tx(h, self.receipt_timeout).await
    }

    pub async fn decimals(&self, chain: Chain, token: &str) -> eyre::Result<u8> {
        let (evm, _) = self.chain(chain)?;
        evm.get_erc20_decimals(EvmChain::parse_address(token)?)
            .await
    }
}
