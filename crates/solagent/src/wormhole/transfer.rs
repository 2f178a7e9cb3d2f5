//! Token transfers out of Solana: wrap if needed, quote, initiate, and for manual transfers
//! wait for the transfer VAA and redeem it on the destination chain.

use super::attest::{AttestationIssuer, AttestationLocks};
use super::bridge::{wait_for_vaa, Guardians, TokenBridge, TransferIntent};
use super::signer::SignerHandle;
use super::vaa::{parse_transfer_payload, SignedVaa, VaaKind};
use super::{TokenId, TxId};
use crate::amount::{format_amount_base_to_ui_string, parse_amount_ui_to_base_u128};
use crate::chains::Chain;
use crate::config::BridgeConfig;
use crate::errors::{find_bridge_error, BridgeError};
use crate::retry::poll_fixed;

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub destination: Chain,
    /// Human units, e.g. `"0.5"`.
    pub amount: String,
    pub token: TokenId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed {
        src_tx_ids: Vec<TxId>,
        /// Empty for automatic transfers.
        dst_tx_ids: Vec<TxId>,
        transfer_id: String,
    },
    /// The source side committed but the destination never redeemed. Redeem again from
    /// `transfer_id`; do not re-initiate.
    PartiallyCompleted {
        src_tx_ids: Vec<TxId>,
        transfer_id: String,
        code: &'static str,
        cause: String,
    },
}

pub struct TokenTransferOrchestrator<'a> {
    pub bridge: &'a dyn TokenBridge,
    pub guardians: &'a dyn Guardians,
    pub cfg: &'a BridgeConfig,
    pub locks: &'a AttestationLocks,
}

impl TokenTransferOrchestrator<'_> {
    pub async fn run(
        &self,
        source: &SignerHandle,
        destination: &SignerHandle,
        req: &TransferRequest,
    ) -> eyre::Result<TransferOutcome> {
        if destination.chain != req.destination {
            eyre::bail!(
                "destination signer is for {}, transfer targets {}",
                destination.chain,
                req.destination
            );
        }
        let token = &req.token;

        if !token.is_native() {
            self.ensure_wrapped(source, destination, token).await?;
        }

        let decimals = self
            .bridge
            .decimals(token)
            .await
            .map_err(|e| BridgeError::step("decimals", e))?;
        let amount = parse_amount_ui_to_base_u128(&req.amount, u32::from(decimals))
            .map_err(|e| BridgeError::InvalidRequest(format!("amount {:?}: {e}", req.amount)))?;
        if amount == 0 {
            return Err(BridgeError::InvalidRequest(format!(
                "amount {:?} is zero at {decimals} decimals",
                req.amount
            ))
            .into());
        }

        let intent = TransferIntent {
            token: token.clone(),
            amount,
            decimals,
            from: source.address.clone(),
            to: destination.address.clone(),
            automatic: self.cfg.automatic,
        };
        let quote = self
            .bridge
            .quote_transfer(&intent)
            .await
            .map_err(|e| BridgeError::step("quote", e))?;
        tracing::info!(
            step = "quote",
            %token,
            chain = %req.destination,
            amount,
            amount_ui = %format_amount_base_to_ui_string(amount, u32::from(decimals))?,
            destination_amount = quote.destination_amount,
            automatic = intent.automatic,
            "transfer quoted"
        );
        if intent.automatic && quote.destination_amount < 0 {
            return Err(BridgeError::AmountTooLowForFee {
                destination_amount: quote.destination_amount,
            }
            .into());
        }

        let src_tx_ids = self
            .bridge
            .initiate_transfer(source, &intent)
            .await
            .map_err(|e| BridgeError::step("initiate_transfer", e))?;
        let Some(transfer_id) = src_tx_ids.first().map(|t| t.txid.clone()) else {
            eyre::bail!("transfer initiation returned no transaction ids");
        };
        tracing::info!(step = "initiate_transfer", %token, txid = %transfer_id, "transfer initiated");

        if intent.automatic {
            return Ok(TransferOutcome::Completed {
                src_tx_ids,
                dst_tx_ids: vec![],
                transfer_id,
            });
        }

        // Value has left the source chain; from here failures are partial.
        match self.redeem(destination, &src_tx_ids).await {
            Ok(dst_tx_ids) => {
                tracing::info!(step = "complete_transfer", txid = %transfer_id, chain = %req.destination, "transfer redeemed");
                Ok(TransferOutcome::Completed {
                    src_tx_ids,
                    dst_tx_ids,
                    transfer_id,
                })
            }
            Err(e) => {
                let code = find_bridge_error(&e).map_or("bridge_error", BridgeError::code);
                let cause = format!("{e:#}");
                tracing::error!(txid = %transfer_id, code, %cause, "transfer committed on source but not redeemed");
                Ok(TransferOutcome::PartiallyCompleted {
                    src_tx_ids,
                    transfer_id,
                    code,
                    cause,
                })
            }
        }
    }

    async fn ensure_wrapped(
        &self,
        source: &SignerHandle,
        destination: &SignerHandle,
        token: &TokenId,
    ) -> eyre::Result<()> {
        let issuer = AttestationIssuer {
            bridge: self.bridge,
            guardians: self.guardians,
            cfg: self.cfg,
            locks: self.locks,
        };
        // createWrapped runs with the fixed gas limit even when redemption estimates.
        let wrapper = SignerHandle {
            gas_limit: Some(self.cfg.evm_gas_limit),
            ..destination.clone()
        };
        let out = issuer
            .run(source, &wrapper, token)
            .await
            .map_err(|e| BridgeError::CreateWrappedTokenFailed(format!("{e:#}")))?;
        tracing::info!(
            %token,
            chain = %destination.chain,
            wrapped = %out.wrapped.address,
            already_wrapped = out.already_wrapped,
            "token wrapped on destination"
        );
        Ok(())
    }

    async fn redeem(&self, destination: &SignerHandle, src_tx_ids: &[TxId]) -> eyre::Result<Vec<TxId>> {
        let vaa = self.await_transfer_vaa(src_tx_ids).await?;
        let payload = parse_transfer_payload(&vaa.parsed.payload)?;
        if payload.to_chain != destination.chain.wormhole_chain_id() {
            let chain = Chain::from_wormhole_chain_id(payload.to_chain)
                .map_or_else(|| payload.to_chain.to_string(), |c| c.to_string());
            eyre::bail!("transfer vaa targets {chain}, not {}", destination.chain);
        }
        tracing::debug!(
            token_chain = payload.token_chain,
            token = %hex::encode(payload.token_address),
            recipient = %hex::encode(payload.to),
            normalized_amount = %hex::encode(payload.amount),
            "redeeming transfer vaa"
        );
        self.bridge
            .complete_transfer(destination, &vaa)
            .await
            .map_err(|e| BridgeError::step("complete_transfer", e))
    }

    /// Each attempt re-reads the source messages and gives the guardians up to the fetch
    /// timeout; failed attempts pause for the retry delay.
    async fn await_transfer_vaa(&self, src_tx_ids: &[TxId]) -> eyre::Result<SignedVaa> {
        let attempts = self.cfg.attestation_poll_attempts;
        let vaa = poll_fixed(attempts, self.cfg.attestation_retry_delay(), move |attempt| async move {
            match self.fetch_transfer_vaa(src_tx_ids).await {
                Ok(vaa) => Some(vaa),
                Err(e) => {
                    tracing::warn!(step = "await_attestation", attempt, error = %format!("{e:#}"), "transfer attestation not available");
                    None
                }
            }
        })
        .await;
        vaa.ok_or_else(|| BridgeError::AttestationTimeout { attempts }.into())
    }

    async fn fetch_transfer_vaa(&self, src_tx_ids: &[TxId]) -> eyre::Result<SignedVaa> {
        for tx in src_tx_ids {
            let messages = self.bridge.parse_messages(tx).await?;
            if let Some(message) = messages.first() {
                return wait_for_vaa(
                    self.guardians,
                    message,
                    VaaKind::Transfer,
                    self.cfg.attestation_fetch_timeout(),
                    self.cfg.guardian_poll_interval(),
                )
                .await;
            }
        }
        Err(BridgeError::NoMessageFound {
            txid: src_tx_ids
                .first()
                .map(|t| t.txid.clone())
                .unwrap_or_default(),
        }
        .into())
    }
}
