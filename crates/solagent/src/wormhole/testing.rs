//! In-memory `TokenBridge` and `Guardians` doubles that record every call.

use super::bridge::{Guardians, TokenBridge, TransferIntent, TransferQuote};
use super::signer::{SignerHandle, SignerKey};
use super::vaa::{fixtures, SignedVaa};
use super::{ChainAddress, TokenId, TxId, WormholeMessageId};
use crate::chains::Chain;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use solana_sdk::{signature::Keypair, signer::Signer as _};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const EMITTER: [u8; 32] = [1; 32];
pub const ATTEST_SEQUENCE: u64 = 100;
pub const TRANSFER_SEQUENCE: u64 = 200;
pub const WRAPPED_ADDRESS: &str = "0x00000000000000000000000000000000000000A1";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    WrappedAsset(Chain),
    CreateAttestation(String),
    ParseMessages(String),
    SubmitAttestation(Chain),
    Confirm(String),
    Decimals,
    Quote,
    Initiate(u128),
    Complete(Chain),
}

#[derive(Debug, Default)]
pub struct BridgeState {
    calls: Vec<Call>,
    wrapped: HashMap<(Chain, String), ChainAddress>,
    /// Lookups that still report "absent" after an attestation was submitted.
    hidden_lookups: u32,
    pending_wrap: Option<(Chain, String)>,
    attestations: u32,
    /// Gas limit of the destination signer per `createWrapped` / `completeTransfer` call.
    gas_limits: Vec<(&'static str, Option<u64>)>,
}

/// Scriptable bridge. Defaults: nothing wrapped, submissions succeed, the wrapped asset is
/// visible on the first lookup after `submit_attestation`.
#[derive(Debug, Default)]
pub struct FakeBridge {
    pub state: Mutex<BridgeState>,
    pub decimals: u8,
    pub lookup_fails: bool,
    pub never_wraps: bool,
    pub submit_fails: bool,
    pub confirm_fails: bool,
    pub complete_fails: bool,
    pub no_messages: bool,
    pub quote_destination: Option<i128>,
}

impl FakeBridge {
    pub fn new() -> Self {
        Self {
            decimals: 6,
            ..Self::default()
        }
    }

    pub fn with_wrapped(self, destination: Chain, token: &TokenId) -> Self {
        self.insert_wrapped(destination, token);
        self
    }

    /// Make the wrapped asset exist, as if someone else created it.
    pub fn insert_wrapped(&self, destination: Chain, token: &TokenId) {
        lock(&self.state).wrapped.insert(
            (destination, token.key()),
            ChainAddress {
                chain: destination,
                address: WRAPPED_ADDRESS.to_owned(),
            },
        );
    }

    /// Keep reporting "absent" for `n` lookups after the attestation lands.
    pub fn with_hidden_lookups(self, n: u32) -> Self {
        lock(&self.state).hidden_lookups = n;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }

    pub fn gas_limits(&self) -> Vec<(&'static str, Option<u64>)> {
        lock(&self.state).gas_limits.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        lock(&self.state).calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, c: Call) {
        lock(&self.state).calls.push(c);
    }
}

#[async_trait]
impl TokenBridge for FakeBridge {
    async fn wrapped_asset(
        &self,
        destination: Chain,
        token: &TokenId,
    ) -> eyre::Result<Option<ChainAddress>> {
        // Yield so concurrent callers interleave.
        tokio::task::yield_now().await;
        let mut s = lock(&self.state);
        s.calls.push(Call::WrappedAsset(destination));
        if self.lookup_fails {
            eyre::bail!("rpc unavailable");
        }
        let key = (destination, token.key());
        if let Some(a) = s.wrapped.get(&key) {
            return Ok(Some(a.clone()));
        }
        if s.pending_wrap.as_ref() == Some(&key) && !self.never_wraps {
            if s.hidden_lookups > 0 {
                s.hidden_lookups -= 1;
                return Ok(None);
            }
            let a = ChainAddress {
                chain: destination,
                address: WRAPPED_ADDRESS.to_owned(),
            };
            s.wrapped.insert(key, a.clone());
            return Ok(Some(a));
        }
        Ok(None)
    }

    async fn create_attestation(
        &self,
        _signer: &SignerHandle,
        token: &TokenId,
    ) -> eyre::Result<TxId> {
        tokio::task::yield_now().await;
        let mut s = lock(&self.state);
        s.attestations += 1;
        s.calls.push(Call::CreateAttestation(token.key()));
        Ok(TxId::new(
            Chain::Solana,
            format!("attest-{}-{}", token.key(), s.attestations),
        ))
    }

    async fn parse_messages(&self, tx: &TxId) -> eyre::Result<Vec<WormholeMessageId>> {
        self.record(Call::ParseMessages(tx.txid.clone()));
        if self.no_messages {
            return Ok(vec![]);
        }
        let sequence = if tx.txid.starts_with("attest-") {
            ATTEST_SEQUENCE
        } else {
            TRANSFER_SEQUENCE
        };
        Ok(vec![WormholeMessageId {
            chain: tx.chain,
            emitter: EMITTER,
            sequence,
        }])
    }

    async fn submit_attestation(
        &self,
        signer: &SignerHandle,
        vaa: &SignedVaa,
    ) -> eyre::Result<TxId> {
        self.record(Call::SubmitAttestation(signer.chain));
        lock(&self.state)
            .gas_limits
            .push(("createWrapped", signer.gas_limit));
        if self.submit_fails {
            eyre::bail!("createWrapped reverted");
        }
        let meta = super::vaa::parse_asset_meta(&vaa.parsed.payload)?;
        let mut s = lock(&self.state);
        // The fake attests one token per test; key the pending wrap by the signer chain.
        let token_key = s
            .calls
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::CreateAttestation(k) => Some(k.clone()),
                _ => None,
            })
            .unwrap_or_default();
        s.pending_wrap = Some((signer.chain, token_key));
        Ok(TxId::new(signer.chain, format!("0xwrap{}", meta.decimals)))
    }

    async fn confirm_transaction(&self, tx: &TxId) -> eyre::Result<()> {
        self.record(Call::Confirm(tx.txid.clone()));
        if self.confirm_fails {
            eyre::bail!("transaction {} reverted", tx.txid);
        }
        Ok(())
    }

    async fn decimals(&self, token: &TokenId) -> eyre::Result<u8> {
        self.record(Call::Decimals);
        Ok(match token {
            TokenId::Native(c) => c.native_decimals(),
            TokenId::Token { .. } => self.decimals,
        })
    }

    async fn quote_transfer(&self, intent: &TransferIntent) -> eyre::Result<TransferQuote> {
        self.record(Call::Quote);
        let destination_amount = match self.quote_destination {
            Some(d) => d,
            None => i128::try_from(intent.amount)?,
        };
        Ok(TransferQuote {
            source_amount: intent.amount,
            destination_amount,
            relayer_fee: intent.automatic.then_some(1),
        })
    }

    async fn initiate_transfer(
        &self,
        _signer: &SignerHandle,
        intent: &TransferIntent,
    ) -> eyre::Result<Vec<TxId>> {
        self.record(Call::Initiate(intent.amount));
        Ok(vec![TxId::new(Chain::Solana, "transfer-sig-1")])
    }

    async fn complete_transfer(
        &self,
        signer: &SignerHandle,
        _vaa: &SignedVaa,
    ) -> eyre::Result<Vec<TxId>> {
        self.record(Call::Complete(signer.chain));
        lock(&self.state)
            .gas_limits
            .push(("completeTransfer", signer.gas_limit));
        if self.complete_fails {
            eyre::bail!("completeTransfer reverted: insufficient funds for gas");
        }
        Ok(vec![TxId::new(signer.chain, "0xredeem")])
    }
}

#[derive(Debug, Default)]
struct GuardianState {
    probes: u32,
    pending: u32,
    errors: bool,
    any: Option<Vec<u8>>,
    by_sequence: HashMap<u64, Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct FakeGuardians {
    state: Mutex<GuardianState>,
}

impl FakeGuardians {
    /// Never produces a VAA.
    pub fn never() -> Self {
        Self::default()
    }

    /// Not ready for `pending` probes, then returns `bytes` for any message.
    pub fn after(pending: u32, bytes: Vec<u8>) -> Self {
        let g = Self::default();
        {
            let mut s = lock(&g.state);
            s.pending = pending;
            s.any = Some(bytes);
        }
        g
    }

    /// Serves the attestation VAA for `ATTEST_SEQUENCE` and the transfer VAA for
    /// `TRANSFER_SEQUENCE`.
    pub fn protocol(destination: Chain) -> Self {
        let g = Self::default();
        {
            let mut s = lock(&g.state);
            s.by_sequence.insert(
                ATTEST_SEQUENCE,
                fixtures::vaa_bytes(
                    1,
                    EMITTER,
                    ATTEST_SEQUENCE,
                    &fixtures::attest_meta_payload([5; 32], 6, "TKN"),
                ),
            );
            s.by_sequence.insert(
                TRANSFER_SEQUENCE,
                fixtures::vaa_bytes(
                    1,
                    EMITTER,
                    TRANSFER_SEQUENCE,
                    &fixtures::transfer_payload([5; 32], [6; 32], destination.wormhole_chain_id()),
                ),
            );
        }
        g
    }

    /// Drop the VAA for one sequence so waits on it time out.
    pub fn without(self, sequence: u64) -> Self {
        lock(&self.state).by_sequence.remove(&sequence);
        self
    }

    /// Pending probes fail instead of reporting "not yet".
    pub fn with_errors(self) -> Self {
        lock(&self.state).errors = true;
        self
    }

    pub fn probes(&self) -> u32 {
        lock(&self.state).probes
    }
}

#[async_trait]
impl Guardians for FakeGuardians {
    async fn signed_vaa(&self, id: &WormholeMessageId) -> eyre::Result<Option<Vec<u8>>> {
        let mut s = lock(&self.state);
        s.probes += 1;
        if s.pending > 0 {
            s.pending -= 1;
            if s.errors {
                eyre::bail!("guardian api 503");
            }
            return Ok(None);
        }
        if let Some(b) = s.by_sequence.get(&id.sequence) {
            return Ok(Some(b.clone()));
        }
        Ok(s.any.clone())
    }
}

pub fn solana_signer() -> SignerHandle {
    let kp = Keypair::new();
    SignerHandle {
        chain: Chain::Solana,
        address: ChainAddress {
            chain: Chain::Solana,
            address: kp.pubkey().to_string(),
        },
        key: SignerKey::Solana(Arc::new(kp)),
        gas_limit: None,
    }
}

pub fn evm_signer(chain: Chain) -> SignerHandle {
    let s = PrivateKeySigner::random();
    SignerHandle {
        chain,
        address: ChainAddress {
            chain,
            address: s.address().to_checksum(None),
        },
        key: SignerKey::Evm(s),
        gas_limit: Some(2_500_000),
    }
}

pub fn spl_token() -> TokenId {
    TokenId::Token {
        chain: Chain::Solana,
        address: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_owned(),
    }
}
