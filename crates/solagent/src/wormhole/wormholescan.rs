use super::bridge::Guardians;
use super::WormholeMessageId;
use async_trait::async_trait;
use base64::Engine as _;
use eyre::Context as _;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Signed-VAA lookups against the Wormholescan API (or a guardian REST endpoint with the same
/// `signed_vaa` route).
#[derive(Debug, Clone)]
pub struct WormholescanClient {
    base_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedVaaResponse {
    vaa_bytes: Option<String>,
}

impl WormholescanClient {
    pub fn new(base_url: &str, timeout: Duration) -> eyre::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            http,
        })
    }

    fn signed_vaa_url(&self, id: &WormholeMessageId) -> String {
        format!(
            "{}/signed_vaa/{}/{}/{}",
            self.base_url,
            id.chain.wormhole_chain_id(),
            id.emitter_hex(),
            id.sequence
        )
    }
}

fn decode_signed_vaa_body(body: &str) -> eyre::Result<Option<Vec<u8>>> {
    let r: SignedVaaResponse = serde_json::from_str(body).context("wormholescan json")?;
    let Some(b64) = r
        .vaa_bytes
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return Ok(None);
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .context("decode vaaBytes")?;
    Ok(Some(bytes))
}

#[async_trait]
impl Guardians for WormholescanClient {
    async fn signed_vaa(&self, id: &WormholeMessageId) -> eyre::Result<Option<Vec<u8>>> {
        let url = self.signed_vaa_url(id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("wormholescan request")?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            eyre::bail!("wormholescan http {}", resp.status());
        }
        let body = resp.text().await.context("wormholescan body")?;
        decode_signed_vaa_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::Chain;

    #[test]
    fn url_uses_chain_id_hex_emitter_and_sequence() -> eyre::Result<()> {
        let c = WormholescanClient::new("https://api.testnet.wormholescan.io/v1/", Duration::from_secs(5))?;
        let id = WormholeMessageId {
            chain: Chain::Solana,
            emitter: [0x0f; 32],
            sequence: 9,
        };
        let u = c.signed_vaa_url(&id);
        assert_eq!(
            u,
            format!(
                "https://api.testnet.wormholescan.io/v1/signed_vaa/1/{}/9",
                "0f".repeat(32)
            )
        );
        Ok(())
    }

    #[test]
    fn body_decoding() -> eyre::Result<()> {
        assert_eq!(decode_signed_vaa_body(r#"{"vaaBytes":"AQID"}"#)?, Some(vec![1, 2, 3]));
        assert_eq!(decode_signed_vaa_body(r#"{"vaaBytes":""}"#)?, None);
        assert_eq!(decode_signed_vaa_body("{}")?, None);
        assert!(decode_signed_vaa_body(r#"{"vaaBytes":"%%"}"#).is_err());
        Ok(())
    }
}
