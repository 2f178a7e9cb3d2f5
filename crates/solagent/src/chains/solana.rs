use eyre::Context as _;
use serde_json::{json, Value};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::RpcRequest;
use solana_client::rpc_response::RpcSimulateTransactionResult;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    account::Account,
    hash::Hash,
    instruction::Instruction,
    program_pack::Pack as _,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer as _,
};
use spl_token::state::Mint;
use std::{str::FromStr as _, time::Duration};

use crate::config::{NetworkMode, RpcConfig};
use crate::retry::{try_all_with_backoff, BackoffConfig};

const fn compute_budget_program_id() -> Pubkey {
    // Base58("ComputeBudget111111111111111111111111111111")
    Pubkey::new_from_array([
        3, 6, 70, 111, 229, 33, 23, 50, 255, 236, 173, 186, 114, 195, 155, 231, 188, 140, 229, 187,
        197, 247, 18, 107, 44, 67, 155, 58, 64, 0, 0, 0,
    ])
}

fn compute_budget_set_compute_unit_limit(units: u32) -> Instruction {
    let mut data = Vec::with_capacity(1 + 4);
    data.push(2); // SetComputeUnitLimit
    data.extend_from_slice(&units.to_le_bytes());
    Instruction {
        program_id: compute_budget_program_id(),
        accounts: vec![],
        data,
    }
}

fn compute_budget_set_compute_unit_price(micro_lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(1 + 8);
    data.push(3); // SetComputeUnitPrice
    data.extend_from_slice(&micro_lamports.to_le_bytes());
    Instruction {
        program_id: compute_budget_program_id(),
        accounts: vec![],
        data,
    }
}

/// Solana JSON-RPC access with fallback endpoints and backoff.
#[derive(Debug, Clone)]
pub struct SolanaChain {
    pub rpc_url: String,
    pub fallback_rpc_urls: Vec<String>,
    pub default_compute_unit_limit: Option<u32>,
    pub default_compute_unit_price_micro_lamports: Option<u64>,
}

impl SolanaChain {
    pub fn new_with_fallbacks(
        rpc_url: &str,
        fallback_rpc_urls: &[String],
        default_compute_unit_limit: Option<u32>,
        default_compute_unit_price_micro_lamports: Option<u64>,
    ) -> Self {
        Self {
            rpc_url: rpc_url.to_owned(),
            fallback_rpc_urls: fallback_rpc_urls.to_vec(),
            default_compute_unit_limit,
            default_compute_unit_price_micro_lamports,
        }
    }

    pub fn for_network(rpc: &RpcConfig, mode: NetworkMode) -> Self {
        Self::new_with_fallbacks(
            rpc.solana_rpc_url(mode),
            rpc.solana_fallback_urls(mode),
            rpc.solana_default_compute_unit_limit,
            rpc.solana_default_compute_unit_price_micro_lamports,
        )
    }

    fn with_compute_budget_defaults(&self, mut instructions: Vec<Instruction>) -> Vec<Instruction> {
        let has_compute_budget = instructions
            .iter()
            .any(|ix| ix.program_id == compute_budget_program_id());
        if has_compute_budget {
            return instructions;
        }

        let mut prefix: Vec<Instruction> = vec![];
        if let Some(l) = self.default_compute_unit_limit.filter(|l| *l > 0) {
            prefix.push(compute_budget_set_compute_unit_limit(l));
        }
        if let Some(p) = self
            .default_compute_unit_price_micro_lamports
            .filter(|p| *p > 0)
        {
            prefix.push(compute_budget_set_compute_unit_price(p));
        }
        if prefix.is_empty() {
            return instructions;
        }
        prefix.append(&mut instructions);
        prefix
    }

    fn all_rpc_urls(&self) -> Vec<String> {
        let mut urls = Vec::with_capacity(1 + self.fallback_rpc_urls.len());
        if !self.rpc_url.trim().is_empty() {
            urls.push(self.rpc_url.trim().to_owned());
        }
        for u in &self.fallback_rpc_urls {
            let t = u.trim();
            if t.is_empty() || urls.iter().any(|x| x == t) {
                continue;
            }
            urls.push(t.to_owned());
        }
        urls
    }

    fn rpc_for_url(url: &str) -> RpcClient {
        RpcClient::new_with_timeout_and_commitment(
            url.to_owned(),
            Duration::from_secs(20),
            CommitmentConfig::confirmed(),
        )
    }

    async fn with_fallback_and_backoff_cfg<T, Fut>(
        &self,
        cfg: &BackoffConfig,
        context_label: &'static str,
        f: impl Fn(RpcClient) -> Fut + Sync,
    ) -> eyre::Result<T>
    where
        T: Send,
        Fut: std::future::Future<Output = eyre::Result<T>> + Send,
    {
        let urls = self.all_rpc_urls();
        try_all_with_backoff(
            &urls,
            cfg,
            |u| {
                let u = u.clone();
                let f = &f;
                async move {
                    let rpc = Self::rpc_for_url(&u);
                    f(rpc).await
                }
            },
            context_label,
        )
        .await
    }

    async fn with_fallback_and_backoff<T, Fut>(
        &self,
        context_label: &'static str,
        f: impl Fn(RpcClient) -> Fut + Sync,
    ) -> eyre::Result<T>
    where
        T: Send,
        Fut: std::future::Future<Output = eyre::Result<T>> + Send,
    {
        let cfg = BackoffConfig::default();
        self.with_fallback_and_backoff_cfg(&cfg, context_label, f)
            .await
    }

    pub async fn get_account(&self, key: &Pubkey) -> eyre::Result<Account> {
        let k = *key;
        self.with_fallback_and_backoff("get account", |rpc| async move {
            let a = rpc.get_account(&k).await.context("get account")?;
            Ok(a)
        })
        .await
    }

    pub async fn get_account_optional(&self, key: &Pubkey) -> eyre::Result<Option<Account>> {
        let k = *key;
        self.with_fallback_and_backoff("get account (optional)", |rpc| async move {
            let resp = rpc
                .get_account_with_commitment(&k, CommitmentConfig::confirmed())
                .await
                .context("get account")?;
            Ok(resp.value)
        })
        .await
    }

    pub async fn get_latest_blockhash(&self) -> eyre::Result<Hash> {
        self.with_fallback_and_backoff("latest blockhash", |rpc| async move {
            let bh = rpc
                .get_latest_blockhash()
                .await
                .context("latest blockhash")?;
            Ok(bh)
        })
        .await
    }

    pub async fn get_minimum_balance_for_rent_exemption(&self, len: usize) -> eyre::Result<u64> {
        self.with_fallback_and_backoff("rent exemption", |rpc| async move {
            let v = rpc
                .get_minimum_balance_for_rent_exemption(len)
                .await
                .context("get minimum balance for rent exemption")?;
            Ok(v)
        })
        .await
    }

    /// Log lines of a confirmed transaction. Retries while the node has not indexed it yet.
    pub async fn get_transaction_logs(&self, sig: &Signature) -> eyre::Result<Vec<String>> {
        let sig_s = sig.to_string();
        let cfg = BackoffConfig {
            rounds: 8,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            jitter_max_ms: 200,
        };
        self.with_fallback_and_backoff_cfg(&cfg, "get transaction", |rpc| {
            let sig_s = sig_s.clone();
            async move {
                let v: Value = rpc
                    .send(
                        RpcRequest::GetTransaction,
                        json!([sig_s, {
                            "encoding": "json",
                            "commitment": "confirmed",
                            "maxSupportedTransactionVersion": 0
                        }]),
                    )
                    .await
                    .context("get transaction")?;
                if v.is_null() {
                    eyre::bail!("transaction {sig_s} not found yet");
                }
                Ok(parse_log_messages(&v))
            }
        })
        .await
    }

    /// Sign with the fee payer plus any extra signers, simulate, send, and wait for confirmation.
    pub async fn sign_and_send_instructions_multi(
        &self,
        fee_payer: &Keypair,
        additional_signers: &[&Keypair],
        instructions: Vec<Instruction>,
    ) -> eyre::Result<Signature> {
        let instructions = self.with_compute_budget_defaults(instructions);
        let bh = self.get_latest_blockhash().await?;
        let mut signers: Vec<&Keypair> = Vec::with_capacity(1 + additional_signers.len());
        signers.push(fee_payer);
        signers.extend_from_slice(additional_signers);

        let msg = solana_sdk::message::Message::new(&instructions, Some(&fee_payer.pubkey()));
        let tx = solana_sdk::transaction::Transaction::new(&signers, msg, bh);
        let sig = *tx
            .signatures
            .first()
            .ok_or_else(|| eyre::eyre!("missing transaction signature"))?;

        self.with_fallback_and_backoff("simulate tx", |rpc| {
            let tx = tx.clone();
            async move {
                let sim: RpcSimulateTransactionResult = rpc
                    .simulate_transaction(&tx)
                    .await
                    .context("simulate tx")?
                    .value;
                if let Some(err) = sim.err {
                    let logs = sim.logs.unwrap_or_default();
                    tracing::debug!(?err, ?logs, "solana simulation failed");
                    eyre::bail!("transaction simulation failed: {err}");
                }
                Ok(())
            }
        })
        .await?;

        self.with_fallback_and_backoff("send tx", |rpc| {
            let tx = tx.clone();
            async move {
                rpc.send_transaction(&tx).await.context("send tx")?;
                Ok(())
            }
        })
        .await?;

        let confirm_cfg = BackoffConfig {
            rounds: 12,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(3),
            jitter_max_ms: 200,
        };
        self.with_fallback_and_backoff_cfg(&confirm_cfg, "confirm tx", |rpc| async move {
            let ok = rpc.confirm_transaction(&sig).await.context("confirm tx")?;
            if ok {
                Ok(())
            } else {
                eyre::bail!("transaction not yet confirmed")
            }
        })
        .await?;

        tracing::info!(%sig, "solana transaction confirmed");
        Ok(sig)
    }

    pub fn parse_pubkey(s: &str) -> eyre::Result<Pubkey> {
        Pubkey::from_str(s.trim()).context("parse solana pubkey")
    }

    pub async fn get_mint_decimals(&self, mint: Pubkey) -> eyre::Result<u8> {
        self.with_fallback_and_backoff("get mint decimals", |rpc| async move {
            let mint_acc = rpc.get_account(&mint).await.context("get mint account")?;
            let m = Mint::unpack(&mint_acc.data).context("unpack mint")?;
            Ok(m.decimals)
        })
        .await
    }
}

fn parse_log_messages(tx: &Value) -> Vec<String> {
    tx.get("meta")
        .and_then(|m| m.get("logMessages"))
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_system_interface::instruction as system_instruction;

    fn local_chain() -> SolanaChain {
        SolanaChain::new_with_fallbacks("http://127.0.0.1:8899", &[], Some(1_400_000), Some(50_000))
    }

    #[test]
    fn prepends_compute_budget_instructions_when_configured() -> eyre::Result<()> {
        let sol = local_chain();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let ixs: Vec<Instruction> = vec![system_instruction::transfer(&a, &b, 1)];
        let out = sol.with_compute_budget_defaults(ixs);
        assert_eq!(out.len(), 3);
        let first = out.first().ok_or_else(|| eyre::eyre!("missing first ix"))?;
        assert_eq!(first.program_id, compute_budget_program_id());
        Ok(())
    }

    #[test]
    fn does_not_duplicate_compute_budget_instructions() {
        let sol = local_chain();
        let mut ixs: Vec<Instruction> = vec![compute_budget_set_compute_unit_limit(10_000)];
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        ixs.push(system_instruction::transfer(&a, &b, 1));
        let out = sol.with_compute_budget_defaults(ixs);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn fallback_urls_are_deduplicated() {
        let sol = SolanaChain::new_with_fallbacks(
            "http://a",
            &["http://a".into(), " ".into(), "http://b".into()],
            None,
            None,
        );
        assert_eq!(sol.all_rpc_urls(), vec!["http://a".to_owned(), "http://b".to_owned()]);
    }

    #[test]
    fn reads_log_messages_from_get_transaction() {
        let v = json!({
            "slot": 1,
            "meta": {
                "err": null,
                "logMessages": [
                    "Program worm2ZoG2kUd4vFXhvjh93UUH596ayRfgQ2MgjNMTth invoke [2]",
                    "Program log: Sequence: 42"
                ]
            }
        });
        let logs = parse_log_messages(&v);
        assert_eq!(logs.len(), 2);
        assert!(parse_log_messages(&json!({"meta": {}})).is_empty());
    }
}
