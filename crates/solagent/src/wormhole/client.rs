use super::bridge::{TokenBridge, TransferIntent, TransferQuote};
use super::evm_bridge::EvmTokenBridge;
use super::signer::SignerHandle;
use super::solana_bridge::SolanaTokenBridge;
use super::vaa::SignedVaa;
use super::{ChainAddress, TokenId, TxId, WormholeMessageId};
use crate::amount::truncate_to_wormhole_precision;
use crate::chains::{solana::SolanaChain, Chain, Platform, SolanaWormholePrograms};
use crate::config::{AgentConfig, NetworkMode};
use crate::errors::BridgeError;
use async_trait::async_trait;
use eyre::Context as _;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::{str::FromStr as _, time::Duration};

const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Token bridge access for one network: Solana as source, EVM chains as destinations.
#[derive(Debug, Clone)]
pub struct WormholeClient {
    solana: SolanaTokenBridge,
    evm: EvmTokenBridge,
}

fn unsupported(what: &str, chain: Chain) -> eyre::Report {
    BridgeError::UnsupportedPlatform(format!("{what} on {chain}")).into()
}

fn solana_mint(token: &TokenId) -> eyre::Result<Option<Pubkey>> {
    match token {
        TokenId::Native(Chain::Solana) => Ok(None),
        TokenId::Token {
            chain: Chain::Solana,
            address,
        } => Ok(Some(SolanaChain::parse_pubkey(address).map_err(|e| {
            BridgeError::InvalidRequest(format!("token {address}: {e:#}"))
        })?)),
        other => Err(unsupported("tokens native to other chains", other.chain())),
    }
}

fn solana_signature(tx: &TxId) -> eyre::Result<Signature> {
    Signature::from_str(tx.txid.trim()).context("parse solana signature")
}

impl WormholeClient {
    pub fn new(cfg: &AgentConfig, network: NetworkMode) -> eyre::Result<Self> {
        let programs = SolanaWormholePrograms::for_network(network)?;
        let rpc = SolanaChain::for_network(&cfg.rpc, network);
        Ok(Self {
            solana: SolanaTokenBridge::new(rpc, programs),
            evm: EvmTokenBridge::new(network, cfg.rpc.clone(), RECEIPT_TIMEOUT),
        })
    }

    /// The token's origin as the bridge sees it: Solana mints the bridge created map back to
    /// their home chain and address.
    async fn origin(&self, token: &TokenId) -> eyre::Result<(u16, [u8; 32])> {
        let mint = solana_mint(token)?.unwrap_or_else(spl_token::native_mint::id);
        if let Some(meta) = self.solana.wrapped_meta(&mint).await? {
            return Ok((meta.chain, meta.token_address));
        }
        Ok((Chain::Solana.wormhole_chain_id(), mint.to_bytes()))
    }
}

#[async_trait]
impl TokenBridge for WormholeClient {
    async fn wrapped_asset(
        &self,
        destination: Chain,
        token: &TokenId,
    ) -> eyre::Result<Option<ChainAddress>> {
        if let TokenId::Token { chain, address } = token {
            if *chain == destination {
                return Ok(Some(ChainAddress::parse(*chain, address)?));
            }
        }
        let (origin_chain, origin_address) = self.origin(token).await?;
        match destination.platform() {
            Platform::Evm => {
                if origin_chain == destination.wormhole_chain_id() {
                    let a = alloy::primitives::Address::from_slice(
                        origin_address
                            .get(12..)
                            .ok_or_else(|| eyre::eyre!("origin address layout"))?,
                    );
                    return Ok(Some(ChainAddress {
                        chain: destination,
                        address: a.to_checksum(None),
                    }));
                }
                let a = self
                    .evm
                    .wrapped_asset(destination, origin_chain, origin_address)
                    .await?;
                Ok(a.map(|a| ChainAddress {
                    chain: destination,
                    address: a.to_checksum(None),
                }))
            }
            Platform::Solana => {
                let m = self.solana.wrapped_mint(origin_chain, origin_address).await?;
                Ok(m.map(|m| ChainAddress {
                    chain: destination,
                    address: m.to_string(),
                }))
            }
            Platform::Sui | Platform::Aptos => Err(unsupported("wrapped asset lookup", destination)),
        }
    }

    async fn create_attestation(
        &self,
        signer: &SignerHandle,
        token: &TokenId,
    ) -> eyre::Result<TxId> {
        if signer.chain != Chain::Solana {
            return Err(unsupported("attestation", signer.chain));
        }
        let mint = solana_mint(token)?.unwrap_or_else(spl_token::native_mint::id);
        let sig = self.solana.attest(signer.solana_keypair()?, &mint).await?;
        Ok(TxId::new(Chain::Solana, sig.to_string()))
    }

    async fn parse_messages(&self, tx: &TxId) -> eyre::Result<Vec<WormholeMessageId>> {
        if tx.chain != Chain::Solana {
            return Err(unsupported("message parsing", tx.chain));
        }
        self.solana.message_ids(&solana_signature(tx)?).await
    }

    async fn submit_attestation(
        &self,
        signer: &SignerHandle,
        vaa: &SignedVaa,
    ) -> eyre::Result<TxId> {
        if signer.chain.platform() != Platform::Evm {
            return Err(unsupported("attestation submission", signer.chain));
        }
        let h = self.evm.create_wrapped(signer, vaa).await?;
        Ok(TxId::new(signer.chain, format!("{h:#x}")))
    }

    async fn confirm_transaction(&self, tx: &TxId) -> eyre::Result<()> {
        match tx.chain.platform() {
            // Solana submissions are confirmed before they return.
            Platform::Solana => Ok(()),
            Platform::Evm => self.evm.confirm(tx.chain, &tx.txid).await,
            Platform::Sui | Platform::Aptos => Err(unsupported("confirmation", tx.chain)),
        }
    }

    async fn decimals(&self, token: &TokenId) -> eyre::Result<u8> {
        match token {
            TokenId::Native(c) => Ok(c.native_decimals()),
            TokenId::Token { chain, address } => match chain.platform() {
                Platform::Solana => {
                    let mint = SolanaChain::parse_pubkey(address)?;
                    self.solana.rpc.get_mint_decimals(mint).await
                }
                Platform::Evm => self.evm.decimals(*chain, address).await,
                Platform::Sui | Platform::Aptos => Err(unsupported("decimals", *chain)),
            },
        }
    }

    async fn quote_transfer(&self, intent: &TransferIntent) -> eyre::Result<TransferQuote> {
        if intent.automatic {
            return Err(BridgeError::InvalidRequest(format!(
                "no relayer serves {} -> {}; set bridge.automatic = false",
                intent.from.chain, intent.to.chain
            ))
            .into());
        }
        let delivered = truncate_to_wormhole_precision(intent.amount, intent.decimals);
        Ok(TransferQuote {
            source_amount: intent.amount,
            destination_amount: i128::try_from(delivered).context("amount out of range")?,
            relayer_fee: None,
        })
    }

    async fn initiate_transfer(
        &self,
        signer: &SignerHandle,
        intent: &TransferIntent,
    ) -> eyre::Result<Vec<TxId>> {
        if signer.chain != Chain::Solana || intent.token.chain() != Chain::Solana {
            return Err(unsupported("transfer initiation", signer.chain));
        }
        let mint = solana_mint(&intent.token)?;
        let amount = u64::try_from(intent.amount).map_err(|_overflow| {
            BridgeError::InvalidRequest(format!("amount {} exceeds u64", intent.amount))
        })?;
        let sig = self
            .solana
            .transfer(
                signer.solana_keypair()?,
                mint.as_ref(),
                amount,
                intent.to.universal()?,
                intent.to.chain.wormhole_chain_id(),
            )
            .await?;
        Ok(vec![TxId::new(Chain::Solana, sig.to_string())])
    }

    async fn complete_transfer(
        &self,
        signer: &SignerHandle,
        vaa: &SignedVaa,
    ) -> eyre::Result<Vec<TxId>> {
        if signer.chain.platform() != Platform::Evm {
            return Err(unsupported("transfer redemption", signer.chain));
        }
        let h = self.evm.complete_transfer(signer, vaa).await?;
        Ok(vec![TxId::new(signer.chain, format!("{h:#x}"))])
    }
}
