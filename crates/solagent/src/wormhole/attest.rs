//! Wrapped-token creation: attest on the source chain, wait for the guardians, submit the
//! `AttestMeta` VAA on the destination chain and poll until the wrapped asset is queryable.

use super::bridge::{wait_for_vaa, Guardians, TokenBridge};
use super::lookup::WrappedAssetLookup;
use super::signer::SignerHandle;
use super::vaa::{SignedVaa, VaaKind};
use super::{ChainAddress, TokenId, TxId, WrappedAssetRecord};
use crate::chains::Chain;
use crate::config::{BridgeConfig, SubmitPolicy};
use crate::errors::BridgeError;
use crate::retry::poll_fixed;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationStep {
    CheckExisting,
    Attest,
    AwaitMessage,
    AwaitVaa,
    Submit,
    PollWrappedAsset,
}

impl AttestationStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckExisting => "check_existing",
            Self::Attest => "attest",
            Self::AwaitMessage => "await_message",
            Self::AwaitVaa => "await_vaa",
            Self::Submit => "submit_attestation",
            Self::PollWrappedAsset => "poll_wrapped_asset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationOutcome {
    pub wrapped: ChainAddress,
    /// `None` when the token was already wrapped and nothing was submitted.
    pub attestation_txid: Option<TxId>,
    pub submit_txid: Option<TxId>,
    pub already_wrapped: bool,
}

type LockKey = (Chain, Chain, String);

/// Per `(source, destination, token)` mutual exclusion for attestation attempts.
#[derive(Debug, Clone, Default)]
pub struct AttestationLocks {
    inner: Arc<Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl AttestationLocks {
    pub async fn acquire(
        &self,
        source: Chain,
        destination: Chain,
        token: &TokenId,
    ) -> OwnedMutexGuard<()> {
        let m = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on.
            map.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(map.entry((source, destination, token.key())).or_default())
        };
        m.lock_owned().await
    }
}

pub struct AttestationIssuer<'a> {
    pub bridge: &'a dyn TokenBridge,
    pub guardians: &'a dyn Guardians,
    pub cfg: &'a BridgeConfig,
    pub locks: &'a AttestationLocks,
}

fn at(step: AttestationStep) -> impl FnOnce(eyre::Report) -> eyre::Report {
    move |e| BridgeError::step(step.as_str(), e)
}

impl AttestationIssuer<'_> {
    /// Create the wrapped form of `token` on the destination signer's chain, or return the
    /// existing one.
    pub async fn run(
        &self,
        source: &SignerHandle,
        destination: &SignerHandle,
        token: &TokenId,
    ) -> eyre::Result<AttestationOutcome> {
        let dst = destination.chain;
        let _guard = self.locks.acquire(source.chain, dst, token).await;
        let lookup = WrappedAssetLookup::new(self.bridge, self.cfg.lookup_failure_policy);

        if let Some(existing) = lookup
            .resolve(dst, token)
            .await
            .map_err(at(AttestationStep::CheckExisting))?
        {
            tracing::info!(step = "check_existing", %token, chain = %dst, wrapped = %existing.address, "wrapped asset exists; nothing to attest");
            return Ok(AttestationOutcome {
                wrapped: existing,
                attestation_txid: None,
                submit_txid: None,
                already_wrapped: true,
            });
        }

        let tx = self
            .bridge
            .create_attestation(source, token)
            .await
            .map_err(at(AttestationStep::Attest))?;
        tracing::info!(step = "attest", %token, chain = %tx.chain, txid = %tx.txid, "attestation submitted");

        let messages = self
            .bridge
            .parse_messages(&tx)
            .await
            .map_err(at(AttestationStep::AwaitMessage))?;
        let Some(message) = messages.first().copied() else {
            return Err(BridgeError::NoMessageFound { txid: tx.txid }.into());
        };
        tracing::info!(step = "await_message", %message, sequence = message.sequence, "attestation message parsed");

        let vaa = wait_for_vaa(
            self.guardians,
            &message,
            VaaKind::AttestMeta,
            self.cfg.vaa_timeout(),
            self.cfg.guardian_poll_interval(),
        )
        .await
        .map_err(at(AttestationStep::AwaitVaa))?;

        let submit_txid = self.submit(destination, &vaa, &tx).await?;

        // Under fire-and-forget this poll is what confirms the submission.
        let lookup = &lookup;
        let attempts = self.cfg.wrapped_asset_poll_attempts;
        let wrapped = poll_fixed(
            attempts,
            self.cfg.wrapped_asset_poll_interval(),
            move |attempt| async move {
                match lookup.lookup(dst, token).await {
                    WrappedAssetRecord::Wrapped(a) => Some(a),
                    WrappedAssetRecord::NotWrapped => {
                        tracing::debug!(step = "poll_wrapped_asset", attempt, chain = %dst, "wrapped asset not visible yet");
                        None
                    }
                    WrappedAssetRecord::LookupFailed(cause) => {
                        tracing::warn!(step = "poll_wrapped_asset", attempt, chain = %dst, %cause, "wrapped asset lookup failed");
                        None
                    }
                }
            },
        )
        .await;
        let Some(wrapped) = wrapped else {
            tracing::warn!(step = "poll_wrapped_asset", %token, chain = %dst, attempts, "wrapped asset never appeared");
            return Err(BridgeError::WrappedAssetNotConfirmed { attempts }.into());
        };
        tracing::info!(step = "poll_wrapped_asset", %token, chain = %dst, wrapped = %wrapped.address, "wrapped asset created");

        Ok(AttestationOutcome {
            wrapped,
            attestation_txid: Some(tx),
            submit_txid,
            already_wrapped: false,
        })
    }

    /// Broadcast `createWrapped`. Under fire-and-forget a failed broadcast is logged and the
    /// wrapped-asset poll decides the outcome.
    async fn submit(
        &self,
        destination: &SignerHandle,
        vaa: &SignedVaa,
        attestation: &TxId,
    ) -> eyre::Result<Option<TxId>> {
        let dst = destination.chain;
        let policy = self.cfg.submit_policy;
        let submitted = match self.bridge.submit_attestation(destination, vaa).await {
            Ok(tx) => tx,
            Err(e) if policy == SubmitPolicy::FireAndForget => {
                tracing::warn!(step = "submit_attestation", chain = %dst, attestation = %attestation.txid, error = %format!("{e:#}"), "createWrapped broadcast failed; polling anyway");
                return Ok(None);
            }
            Err(e) => return Err(at(AttestationStep::Submit)(e)),
        };
        tracing::info!(step = "submit_attestation", chain = %dst, txid = %submitted.txid, ?policy, "createWrapped broadcast");
        if policy == SubmitPolicy::AwaitConfirmation {
            self.bridge
                .confirm_transaction(&submitted)
                .await
                .map_err(at(AttestationStep::Submit))?;
        }
        Ok(Some(submitted))
    }
}
