use crate::config::RpcConfig;
use crate::retry::{try_all_with_backoff, BackoffConfig};
use alloy::{
    consensus::{SignableTransaction as _, TxEip1559, TxEnvelope, TxLegacy},
    network::TransactionBuilder as _,
    primitives::{Address, Bytes, TxKind, B256, U256},
    providers::{Provider as _, RootProvider},
    rpc::types::{BlockNumberOrTag, TransactionReceipt, TransactionRequest},
    signers::{local::PrivateKeySigner, SignerSync as _},
    sol,
    sol_types::SolCall as _,
};
use eyre::Context as _;
use alloy::transports::http::reqwest::{self, Client};
use std::{str::FromStr as _, time::Duration};
use tokio::time::sleep;

const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_RPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

type EvmProvider = RootProvider;

pub fn compute_eip1559_fees(base_fee: u128, gas_price: u128) -> (u128, u128) {
    // priority: max(1.5 gwei, gas_price / 10)
    // max_fee: base_fee * 2 + priority
    let min_priority: u128 = 1_500_000_000;
    let priority = std::cmp::max(min_priority, gas_price / 10);

    let mut max_fee = base_fee.saturating_mul(2).saturating_add(priority);
    let min_fee = base_fee.saturating_add(priority);
    if max_fee < min_fee {
        max_fee = min_fee;
    }
    (max_fee, priority)
}

/// Prefer EIP-1559 fees when the chain reports a base fee, legacy gas price otherwise.
pub fn apply_fee_policy(
    mut tx: TransactionRequest,
    base_fee: Option<u128>,
    gas_price: u128,
    from: Address,
    chain_id: u64,
) -> TransactionRequest {
    if tx.max_fee_per_gas.is_some()
        || tx.max_priority_fee_per_gas.is_some()
        || tx.gas_price.is_some()
    {
        return tx;
    }

    if tx.chain_id.is_none() {
        tx.chain_id = Some(chain_id);
    }
    if tx.from.is_none() {
        tx.from = Some(from);
    }

    if let Some(base_fee) = base_fee {
        let (max_fee, priority) = compute_eip1559_fees(base_fee, gas_price);
        tx.max_fee_per_gas = Some(max_fee);
        tx.max_priority_fee_per_gas = Some(priority);
    } else {
        tx.gas_price = Some(gas_price);
    }
    tx
}

fn broadcast_err_is_ok(err: &eyre::Report) -> bool {
    let s = format!("{err:#}").to_lowercase();
    s.contains("already known")
        || s.contains("known transaction")
        || s.contains("already imported")
        || s.contains("already in mempool")
}

fn build_and_sign_tx(
    signer: &PrivateKeySigner,
    tx: &TransactionRequest,
) -> eyre::Result<(TxEnvelope, B256)> {
    let to = tx.to.unwrap_or(TxKind::Create);
    let value = tx.value.unwrap_or(U256::ZERO);
    let input = tx.input.clone().into_input().unwrap_or_default();
    let nonce = tx.nonce.unwrap_or(0);
    let gas_limit = tx.gas.unwrap_or(21_000);

    if tx.max_fee_per_gas.is_some() {
        let consensus_tx = TxEip1559 {
            chain_id: tx.chain_id.unwrap_or(1),
            nonce,
            gas_limit,
            max_fee_per_gas: tx.max_fee_per_gas.unwrap_or(0),
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas.unwrap_or(0),
            to,
            value,
            input,
            access_list: tx.access_list.clone().unwrap_or_default(),
        };
        let hash = consensus_tx.signature_hash();
        let sig = signer.sign_hash_sync(&hash).context("sign eip1559")?;
        let signed_tx = consensus_tx.into_signed(sig);
        let tx_hash = *signed_tx.hash();
        Ok((TxEnvelope::Eip1559(signed_tx), tx_hash))
    } else {
        let consensus_tx = TxLegacy {
            chain_id: tx.chain_id,
            nonce,
            gas_price: tx.gas_price.unwrap_or(0),
            gas_limit,
            to,
            value,
            input,
        };
        let hash = consensus_tx.signature_hash();
        let sig = signer.sign_hash_sync(&hash).context("sign legacy")?;
        let signed_tx = consensus_tx.into_signed(sig);
        let tx_hash = *signed_tx.hash();
        Ok((TxEnvelope::Legacy(signed_tx), tx_hash))
    }
}

sol! {
    #[sol(rpc)]
    contract IERC20 {
        function decimals() external view returns (uint8);
    }
}

sol! {
    #[sol(rpc)]
    contract IWormholeTokenBridge {
        function wrappedAsset(uint16 tokenChainId, bytes32 tokenAddress) external view returns (address);
        function createWrapped(bytes encodedVm) external returns (address token);
        function completeTransfer(bytes encodedVm) external;
    }
}

#[derive(Debug, Clone)]
pub struct EvmChain {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub fallback_rpc_urls: Vec<String>,
}

impl EvmChain {
    pub fn for_name(name: &str, chain_id: u64, rpc_url: &str, fallback_rpc_urls: &[String]) -> Self {
        Self {
            name: name.to_owned(),
            chain_id,
            rpc_url: rpc_url.to_owned(),
            fallback_rpc_urls: fallback_rpc_urls.to_vec(),
        }
    }

    /// Resolve a chain by its `[rpc]` config name.
    pub fn from_config(rpc: &RpcConfig, name: &str) -> eyre::Result<Self> {
        let url = rpc
            .evm_rpc_urls
            .get(name)
            .ok_or_else(|| eyre::eyre!("no rpc url configured for evm chain {name}"))?;
        let chain_id = *rpc
            .evm_chain_ids
            .get(name)
            .ok_or_else(|| eyre::eyre!("no chain id configured for evm chain {name}"))?;
        let fallbacks = rpc
            .evm_fallback_rpc_urls
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(Self::for_name(name, chain_id, url, fallbacks))
    }

    fn provider_for_url(url: &str) -> eyre::Result<EvmProvider> {
        let u: reqwest::Url = url
            .parse()
            .with_context(|| format!("invalid rpc url: {url}"))?;
        let client = Client::builder()
            .timeout(DEFAULT_RPC_TIMEOUT)
            .connect_timeout(DEFAULT_RPC_CONNECT_TIMEOUT)
            .build()
            .context("build rpc http client")?;
        let http = alloy::transports::http::Http::with_client(client, u);
        let rpc_client = alloy::rpc::client::RpcClient::new(http, false);
        Ok(RootProvider::new(rpc_client))
    }

    pub fn provider(&self) -> eyre::Result<EvmProvider> {
        Self::provider_for_url(self.rpc_url.as_str())
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

    async fn with_fallback_cfg<T, Fut>(
        &self,
        cfg: &BackoffConfig,
        context_label: &'static str,
        f: impl Fn(EvmProvider) -> Fut + Sync,
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
                    let p = Self::provider_for_url(&u)?;
                    f(p).await
                }
            },
            context_label,
        )
        .await
    }

    async fn with_fallback_and_backoff<T, Fut>(
        &self,
        context_label: &'static str,
        f: impl Fn(EvmProvider) -> Fut + Sync,
    ) -> eyre::Result<T>
    where
        T: Send,
        Fut: std::future::Future<Output = eyre::Result<T>> + Send,
    {
        self.with_fallback_cfg(&BackoffConfig::default(), context_label, f)
            .await
    }

    pub async fn get_erc20_decimals(&self, token: Address) -> eyre::Result<u8> {
        self.with_fallback_and_backoff("erc20 decimals", |p| async move {
            let d = IERC20::new(token, &p)
                .decimals()
                .call()
                .await
                .context("erc20 decimals")?;
            Ok(d)
        })
        .await
    }

    /// `wrappedAsset(chain, address)` on the token bridge. One pass over the endpoints, no
    /// backoff rounds. `None` when the bridge returns the zero address.
    pub async fn wrapped_asset(
        &self,
        token_bridge: Address,
        token_chain: u16,
        token_address: B256,
    ) -> eyre::Result<Option<Address>> {
        let once = BackoffConfig {
            rounds: 1,
            ..BackoffConfig::default()
        };
        let a = self
            .with_fallback_cfg(&once, "wrapped asset", |p| async move {
                let a = IWormholeTokenBridge::new(token_bridge, &p)
                    .wrappedAsset(token_chain, token_address)
                    .call()
                    .await
                    .context("wrappedAsset")?;
                Ok(a)
            })
            .await?;
        Ok((a != Address::ZERO).then_some(a))
    }

    pub fn build_create_wrapped(
        from: Address,
        token_bridge: Address,
        vaa: &[u8],
        gas_limit: Option<u64>,
    ) -> TransactionRequest {
        let input = IWormholeTokenBridge::createWrappedCall {
            encodedVm: Bytes::copy_from_slice(vaa),
        }
        .abi_encode();
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(token_bridge)
            .with_input(input)
            .with_value(U256::ZERO);
        match gas_limit {
            Some(g) => tx.with_gas_limit(g),
            None => tx,
        }
    }

    pub fn build_complete_transfer(
        from: Address,
        token_bridge: Address,
        vaa: &[u8],
        gas_limit: Option<u64>,
    ) -> TransactionRequest {
        let input = IWormholeTokenBridge::completeTransferCall {
            encodedVm: Bytes::copy_from_slice(vaa),
        }
        .abi_encode();
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(token_bridge)
            .with_input(input)
            .with_value(U256::ZERO);
        match gas_limit {
            Some(g) => tx.with_gas_limit(g),
            None => tx,
        }
    }

    /// Simulate using the configured primary RPC only.
    pub async fn simulate_tx_strict(&self, tx: &TransactionRequest) -> eyre::Result<Bytes> {
        let p = self.provider()?;
        let out = p
            .call(tx.clone())
            .block(BlockNumberOrTag::Pending.into())
            .await
            .context("eth_call")?;
        Ok(out)
    }

    async fn pick_healthy_provider(&self) -> eyre::Result<EvmProvider> {
        let urls = self.all_rpc_urls();
        let cfg = BackoffConfig::default();
        try_all_with_backoff(
            &urls,
            &cfg,
            |u| {
                let u = u.clone();
                async move {
                    let p = Self::provider_for_url(&u)?;
                    p.get_block_number().await.context("get block number")?;
                    Ok(p)
                }
            },
            "select rpc",
        )
        .await
    }

    /// Fill fees, nonce and gas, sign once and broadcast across endpoints. Does not wait for
    /// the receipt.
    pub async fn send_tx(
        &self,
        signer: &PrivateKeySigner,
        mut tx: TransactionRequest,
    ) -> eyre::Result<B256> {
        let provider = self.pick_healthy_provider().await?;
        let from = signer.address();

        tx.chain_id = Some(self.chain_id);
        if tx.from.is_none() {
            tx.from = Some(from);
        }

        if tx.gas_price.is_none() && tx.max_fee_per_gas.is_none() {
            let base_fee = provider
                .get_block_by_number(BlockNumberOrTag::Pending)
                .await
                .ok()
                .flatten()
                .and_then(|b| b.header.base_fee_per_gas.map(u128::from));

            let gp = provider.get_gas_price().await.context("get gas price")?;
            tx = apply_fee_policy(tx, base_fee, gp, from, self.chain_id);
        }

        if tx.nonce.is_none() {
            let n = provider
                .get_transaction_count(from)
                .pending()
                .await
                .context("get nonce")?;
            tx.nonce = Some(n);
        }

        if tx.gas.is_none() {
            let gas = provider
                .estimate_gas(tx.clone())
                .await
                .context("estimate gas")?;
            let gas = gas.saturating_mul(120) / 100;
            tx.gas = Some(gas);
        }

        let (envelope, tx_hash) = build_and_sign_tx(signer, &tx).context("sign tx")?;
        let raw_bytes = alloy::eips::eip2718::Encodable2718::encoded_2718(&envelope);

        let urls = self.all_rpc_urls();
        let cfg = BackoffConfig::default();
        try_all_with_backoff(
            &urls,
            &cfg,
            |u| {
                let u = u.clone();
                let raw_bytes = raw_bytes.clone();
                async move {
                    let p = Self::provider_for_url(&u)?;
                    match p.send_raw_transaction(&raw_bytes).await {
                        Ok(_pending) => Ok(()),
                        Err(e) => {
                            let ae: eyre::Report = e.into();
                            if broadcast_err_is_ok(&ae) {
                                Ok(())
                            } else {
                                Err(ae).context("broadcast raw tx")
                            }
                        }
                    }
                }
            },
            "send transaction",
        )
        .await?;

        tracing::info!(chain = %self.name, tx = %format!("{tx_hash:#x}"), "evm transaction broadcast");
        Ok(tx_hash)
    }

    pub async fn get_tx_receipt(&self, tx: B256) -> eyre::Result<Option<TransactionReceipt>> {
        self.with_fallback_and_backoff("get tx receipt", |p| async move {
            let r = p
                .get_transaction_receipt(tx)
                .await
                .context("get transaction receipt")?;
            Ok(r)
        })
        .await
    }

    pub async fn wait_for_tx_receipt(
        &self,
        tx: B256,
        timeout: Duration,
    ) -> eyre::Result<TransactionReceipt> {
        let start = tokio::time::Instant::now();
        loop {
            if start.elapsed() > timeout {
                eyre::bail!("timed out waiting for tx receipt");
            }
            if let Some(r) = self.get_tx_receipt(tx).await? {
                return Ok(r);
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    /// Wait for the receipt and fail on a reverted status.
    pub async fn confirm_tx(&self, tx: B256, timeout: Duration) -> eyre::Result<()> {
        let r = self.wait_for_tx_receipt(tx, timeout).await?;
        if !r.status() {
            eyre::bail!("transaction {tx:#x} reverted");
        }
        Ok(())
    }

    pub fn parse_address(s: &str) -> eyre::Result<Address> {
        Address::from_str(s.trim()).context("parse evm address")
    }
}
