//! `create_wrapped_token` and `transfer_token`: request parsing, signer resolution and the
//! response shapes served to agents. Failures never escape as errors; they come back in the
//! response with a stable `errorCode`.

use super::attest::{AttestationIssuer, AttestationLocks};
use super::bridge::{Guardians, TokenBridge};
use super::client::WormholeClient;
use super::signer::resolve_signer;
use super::transfer::{TokenTransferOrchestrator, TransferOutcome, TransferRequest};
use super::wormholescan::WormholescanClient;
use super::{ChainAddress, TokenId, TxId};
use crate::chains::Chain;
use crate::config::{AgentConfig, NetworkMode};
use crate::errors::{BridgeError, ToolError};
use crate::keys::KeyMaterial;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide state shared by every request.
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    pub cfg: AgentConfig,
    pub keys: KeyMaterial,
    pub locks: AttestationLocks,
}

impl AgentContext {
    pub fn new(cfg: AgentConfig, keys: KeyMaterial) -> Self {
        Self {
            cfg,
            keys,
            locks: AttestationLocks::default(),
        }
    }

    pub fn network(&self, requested: Option<&str>) -> eyre::Result<NetworkMode> {
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(self.cfg.network_mode),
            Some(s) => s
                .parse()
                .map_err(|e| BridgeError::InvalidRequest(format!("{e:#}")).into()),
        }
    }

    fn clients(&self, network: NetworkMode) -> eyre::Result<(WormholeClient, WormholescanClient)> {
        let bridge = WormholeClient::new(&self.cfg, network)?;
        let guardians = WormholescanClient::new(
            self.cfg.http.guardian_base_url(network),
            Duration::from_millis(self.cfg.http.vaa_request_timeout_ms),
        )?;
        Ok((bridge, guardians))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWrappedTokenRequest {
    pub destination_chain: String,
    pub token_address: String,
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTokenRequest {
    pub destination_chain: String,
    pub transfer_amount: String,
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWrappedTokenResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapped_token: Option<ChainAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation_txid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Completed,
    PartiallyCompleted,
    #[default]
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTokenResponse {
    pub success: bool,
    pub status: TransferStatus,
    pub src_tx_ids: Vec<String>,
    pub dst_tx_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

fn invalid(e: &eyre::Report) -> eyre::Report {
    BridgeError::InvalidRequest(format!("{e:#}")).into()
}

fn destination_chain(s: &str) -> eyre::Result<Chain> {
    let chain: Chain = s.parse().map_err(|e| invalid(&e))?;
    if chain == Chain::Solana {
        return Err(BridgeError::InvalidRequest(
            "destination chain must differ from the source chain (Solana)".to_owned(),
        )
        .into());
    }
    Ok(chain)
}

fn solana_token(address: &str) -> eyre::Result<TokenId> {
    let a = ChainAddress::parse(Chain::Solana, address)?;
    Ok(TokenId::Token {
        chain: Chain::Solana,
        address: a.address,
    })
}

fn txids(v: Vec<TxId>) -> Vec<String> {
    v.into_iter().map(|t| t.txid).collect()
}

pub async fn create_wrapped_token(
    ctx: &AgentContext,
    req: &CreateWrappedTokenRequest,
) -> CreateWrappedTokenResponse {
    let clients = ctx
        .network(req.network.as_deref())
        .and_then(|n| ctx.clients(n));
    match clients {
        Ok((bridge, guardians)) => create_wrapped_token_with(ctx, &bridge, &guardians, req).await,
        Err(e) => create_wrapped_failure(&e),
    }
}

pub async fn create_wrapped_token_with(
    ctx: &AgentContext,
    bridge: &dyn TokenBridge,
    guardians: &dyn Guardians,
    req: &CreateWrappedTokenRequest,
) -> CreateWrappedTokenResponse {
    let run = async {
        let dst = destination_chain(&req.destination_chain)?;
        let token = solana_token(&req.token_address)?;
        let src_signer = resolve_signer(&ctx.keys, Chain::Solana, None)?;
        let dst_signer = resolve_signer(&ctx.keys, dst, Some(ctx.cfg.bridge.evm_gas_limit))?;
        AttestationIssuer {
            bridge,
            guardians,
            cfg: &ctx.cfg.bridge,
            locks: &ctx.locks,
        }
        .run(&src_signer, &dst_signer, &token)
        .await
    };
    match run.await {
        Ok(out) => CreateWrappedTokenResponse {
            success: true,
            wrapped_token: Some(out.wrapped),
            attestation_txid: out.attestation_txid.map(|t| t.txid),
            ..CreateWrappedTokenResponse::default()
        },
        Err(e) => create_wrapped_failure(&e),
    }
}

fn create_wrapped_failure(e: &eyre::Report) -> CreateWrappedTokenResponse {
    let te = ToolError::from_report(e);
    tracing::warn!(code = te.code, error = %te.message, "create wrapped token failed");
    CreateWrappedTokenResponse {
        success: false,
        error: Some(format!("create wrapped token failed: {}", te.message)),
        error_code: Some(te.code),
        ..CreateWrappedTokenResponse::default()
    }
}

pub async fn transfer_token(ctx: &AgentContext, req: &TransferTokenRequest) -> TransferTokenResponse {
    let clients = ctx
        .network(req.network.as_deref())
        .and_then(|n| ctx.clients(n));
    match clients {
        Ok((bridge, guardians)) => transfer_token_with(ctx, &bridge, &guardians, req).await,
        Err(e) => transfer_failure(&e),
    }
}

pub async fn transfer_token_with(
    ctx: &AgentContext,
    bridge: &dyn TokenBridge,
    guardians: &dyn Guardians,
    req: &TransferTokenRequest,
) -> TransferTokenResponse {
    let run = async {
        let destination = destination_chain(&req.destination_chain)?;
        let token = match req.token_address.as_deref().map(str::trim) {
            None | Some("") => TokenId::Native(Chain::Solana),
            Some(a) => solana_token(a)?,
        };
        let src_signer = resolve_signer(&ctx.keys, Chain::Solana, None)?;
        // Redemption gas is left to the node's estimate.
        let dst_signer = resolve_signer(&ctx.keys, destination, None)?;
        let transfer = TransferRequest {
            destination,
            amount: req.transfer_amount.clone(),
            token,
        };
        TokenTransferOrchestrator {
            bridge,
            guardians,
            cfg: &ctx.cfg.bridge,
            locks: &ctx.locks,
        }
        .run(&src_signer, &dst_signer, &transfer)
        .await
    };
    match run.await {
        Ok(TransferOutcome::Completed {
            src_tx_ids,
            dst_tx_ids,
            transfer_id,
        }) => TransferTokenResponse {
            success: true,
            status: TransferStatus::Completed,
            src_tx_ids: txids(src_tx_ids),
            dst_tx_ids: txids(dst_tx_ids),
            transfer_id: Some(transfer_id),
            ..TransferTokenResponse::default()
        },
        Ok(TransferOutcome::PartiallyCompleted {
            src_tx_ids,
            transfer_id,
            code,
            cause,
        }) => TransferTokenResponse {
            success: false,
            status: TransferStatus::PartiallyCompleted,
            src_tx_ids: txids(src_tx_ids),
            dst_tx_ids: vec![],
            transfer_id: Some(transfer_id),
            error: Some(format!("transfer token failed: {cause}")),
            error_code: Some(code),
        },
        Err(e) => transfer_failure(&e),
    }
}

fn transfer_failure(e: &eyre::Report) -> TransferTokenResponse {
    let te = ToolError::from_report(e);
    tracing::warn!(code = te.code, error = %te.message, "transfer token failed");
    TransferTokenResponse {
        success: false,
        status: TransferStatus::Failed,
        error: Some(format!("transfer token failed: {}", te.message)),
        error_code: Some(te.code),
        ..TransferTokenResponse::default()
    }
}
