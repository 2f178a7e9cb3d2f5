use super::signer::SignerHandle;
use super::vaa::{SignedVaa, VaaKind};
use super::{ChainAddress, TokenId, TxId, WormholeMessageId};
use crate::chains::Chain;
use crate::errors::BridgeError;
use async_trait::async_trait;
use std::time::Duration;

/// A transfer ready to quote and initiate. `amount` is in the token's smallest unit.
#[derive(Debug, Clone)]
pub struct TransferIntent {
    pub token: TokenId,
    pub amount: u128,
    pub decimals: u8,
    pub from: ChainAddress,
    pub to: ChainAddress,
    pub automatic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferQuote {
    pub source_amount: u128,
    /// Signed: relayer fees can push it below zero.
    pub destination_amount: i128,
    pub relayer_fee: Option<u128>,
}

/// Chain-side token bridge operations. Source-side calls run on the token's home chain,
/// destination-side calls on the chain named by the signer or argument.
#[async_trait]
pub trait TokenBridge: Send + Sync {
    /// `None` when `token` has no wrapped form on `destination`.
    async fn wrapped_asset(
        &self,
        destination: Chain,
        token: &TokenId,
    ) -> eyre::Result<Option<ChainAddress>>;

    async fn create_attestation(&self, signer: &SignerHandle, token: &TokenId)
        -> eyre::Result<TxId>;

    /// Outbound Wormhole messages emitted by a confirmed transaction.
    async fn parse_messages(&self, tx: &TxId) -> eyre::Result<Vec<WormholeMessageId>>;

    /// Broadcast `createWrapped` on the signer's chain. Does not wait for inclusion.
    async fn submit_attestation(&self, signer: &SignerHandle, vaa: &SignedVaa)
        -> eyre::Result<TxId>;

    /// Wait for a broadcast transaction and fail if it reverted.
    async fn confirm_transaction(&self, tx: &TxId) -> eyre::Result<()>;

    async fn decimals(&self, token: &TokenId) -> eyre::Result<u8>;

    async fn quote_transfer(&self, intent: &TransferIntent) -> eyre::Result<TransferQuote>;

    async fn initiate_transfer(
        &self,
        signer: &SignerHandle,
        intent: &TransferIntent,
    ) -> eyre::Result<Vec<TxId>>;

    async fn complete_transfer(&self, signer: &SignerHandle, vaa: &SignedVaa)
        -> eyre::Result<Vec<TxId>>;
}

/// The guardian network's signed-VAA store.
#[async_trait]
pub trait Guardians: Send + Sync {
    /// One probe. `None` while the VAA is not yet available.
    async fn signed_vaa(&self, id: &WormholeMessageId) -> eyre::Result<Option<Vec<u8>>>;
}

/// Poll `guardians` for the VAA of `id` until `timeout` elapses.
///
/// Probe errors are logged and polling continues. A VAA of another payload kind is a
/// protocol error and ends the wait immediately.
pub async fn wait_for_vaa(
    guardians: &dyn Guardians,
    id: &WormholeMessageId,
    kind: VaaKind,
    timeout: Duration,
    interval: Duration,
) -> eyre::Result<SignedVaa> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut probes = 0_u32;
    loop {
        probes = probes.saturating_add(1);
        match guardians.signed_vaa(id).await {
            Ok(Some(bytes)) => {
                let vaa = SignedVaa::decode(bytes)?;
                if vaa.kind != Some(kind) {
                    eyre::bail!(
                        "vaa {id} has payload kind {:?}, expected {kind}",
                        vaa.kind.map(|k| k.to_string())
                    );
                }
                tracing::info!(message = %id, %kind, probes, "signed vaa observed");
                return Ok(vaa);
            }
            Ok(None) => {
                tracing::debug!(message = %id, probes, "vaa not yet signed");
            }
            Err(e) => {
                tracing::warn!(message = %id, probes, error = %format!("{e:#}"), "vaa probe failed");
            }
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
    Err(BridgeError::VaaTimeout {
        message_id: id.to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wormhole::testing::FakeGuardians;
    use crate::wormhole::vaa::fixtures;

    fn msg() -> WormholeMessageId {
        WormholeMessageId {
            chain: Chain::Solana,
            emitter: [4; 32],
            sequence: 11,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_vaa_not_found() -> eyre::Result<()> {
        let g = FakeGuardians::never();
        let started = tokio::time::Instant::now();
        let r = wait_for_vaa(
            &g,
            &msg(),
            VaaKind::AttestMeta,
            Duration::from_secs(1500),
            Duration::from_secs(1),
        )
        .await;
        let Err(e) = r else {
            eyre::bail!("expected a timeout");
        };
        assert!(e.to_string().contains("VAA not found"), "{e}");
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(1500), "{waited:?}");
        assert!(waited < Duration::from_secs(1502), "{waited:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_polling_through_probe_errors() -> eyre::Result<()> {
        let payload = fixtures::attest_meta_payload([1; 32], 6, "T");
        let bytes = fixtures::vaa_bytes(1, [4; 32], 11, &payload);
        let g = FakeGuardians::after(3, bytes).with_errors();
        let vaa = wait_for_vaa(
            &g,
            &msg(),
            VaaKind::AttestMeta,
            Duration::from_secs(60),
            Duration::from_secs(1),
        )
        .await?;
        assert_eq!(vaa.parsed.sequence, 11);
        assert_eq!(g.probes(), 4);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_payload_kind_is_rejected() -> eyre::Result<()> {
        let payload = fixtures::transfer_payload([1; 32], [2; 32], 10004);
        let g = FakeGuardians::after(0, fixtures::vaa_bytes(1, [4; 32], 11, &payload));
        let r = wait_for_vaa(
            &g,
            &msg(),
            VaaKind::AttestMeta,
            Duration::from_secs(60),
            Duration::from_secs(1),
        )
        .await;
        let Err(e) = r else {
            eyre::bail!("expected a kind mismatch");
        };
        assert!(e.to_string().contains("expected TokenBridge:AttestMeta"), "{e}");
        assert_eq!(g.probes(), 1);
        Ok(())
    }
}
