use alloy::signers::local::PrivateKeySigner;
use eyre::Context as _;
use secrecy::{ExposeSecret as _, SecretString};
use solana_keypair::Keypair;
use solana_signer::Signer as _;
use std::{fmt, sync::Arc};
use zeroize::Zeroizing;

pub const SOLANA_PRIVATE_KEY_ENV: &str = "SOLANA_PRIVATE_KEY";
pub const ETH_PRIVATE_KEY_ENV: &str = "ETH_PRIVATE_KEY";

/// Private keys held by the process, one per platform family. Either may be absent.
#[derive(Clone, Default)]
pub struct KeyMaterial {
    solana: Option<Arc<Keypair>>,
    evm: Option<PrivateKeySigner>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("solana", &self.solana.as_ref().map(|k| k.pubkey()))
            .field("evm", &self.evm.as_ref().map(PrivateKeySigner::address))
            .finish()
    }
}

fn read_secret_env(name: &str) -> Option<SecretString> {
    let v = std::env::var(name).ok()?;
    if v.trim().is_empty() {
        return None;
    }
    Some(SecretString::new(v.into()))
}

impl KeyMaterial {
    /// Read `SOLANA_PRIVATE_KEY` (base58) and `ETH_PRIVATE_KEY` (hex). Unset keys stay absent;
    /// malformed keys are an error.
    pub fn from_env() -> eyre::Result<Self> {
        let sol = read_secret_env(SOLANA_PRIVATE_KEY_ENV);
        let evm = read_secret_env(ETH_PRIVATE_KEY_ENV);
        Self::from_secrets(sol.as_ref(), evm.as_ref())
    }

    pub fn from_secrets(
        solana: Option<&SecretString>,
        evm: Option<&SecretString>,
    ) -> eyre::Result<Self> {
        let solana = solana
            .map(|s| parse_solana_keypair(s.expose_secret()))
            .transpose()
            .with_context(|| format!("invalid {SOLANA_PRIVATE_KEY_ENV}"))?
            .map(Arc::new);
        let evm = evm
            .map(|s| parse_evm_signer(s.expose_secret()))
            .transpose()
            .with_context(|| format!("invalid {ETH_PRIVATE_KEY_ENV}"))?;
        if let Some(k) = &solana {
            tracing::debug!(pubkey = %k.pubkey(), "loaded solana key");
        }
        if let Some(s) = &evm {
            tracing::debug!(address = %s.address(), "loaded evm key");
        }
        Ok(Self { solana, evm })
    }

    pub fn solana(&self) -> Option<&Arc<Keypair>> {
        self.solana.as_ref()
    }

    pub const fn evm(&self) -> Option<&PrivateKeySigner> {
        self.evm.as_ref()
    }

    #[cfg(test)]
    pub fn for_tests(solana: Option<Keypair>, evm: Option<PrivateKeySigner>) -> Self {
        Self {
            solana: solana.map(Arc::new),
            evm,
        }
    }
}

fn parse_solana_keypair(s: &str) -> eyre::Result<Keypair> {
    let bytes = Zeroizing::new(
        bs58::decode(s.trim())
            .into_vec()
            .context("decode base58 keypair")?,
    );
    if bytes.len() != 64 {
        eyre::bail!("expected a 64-byte keypair, got {} bytes", bytes.len());
    }
    Keypair::try_from(bytes.as_slice()).context("parse solana keypair")
}

fn parse_evm_signer(s: &str) -> eyre::Result<PrivateKeySigner> {
    let t = s.trim();
    let t = t.strip_prefix("0x").unwrap_or(t);
    let bytes = Zeroizing::new(hex::decode(t).context("decode hex private key")?);
    PrivateKeySigner::from_slice(&bytes).context("parse evm private key")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_key_formats() -> eyre::Result<()> {
        let kp = Keypair::new();
        let sol = SecretString::new(bs58::encode(kp.to_bytes()).into_string().into());
        let evm = SecretString::new(format!("0x{}", "11".repeat(32)).into());
        let km = KeyMaterial::from_secrets(Some(&sol), Some(&evm))?;
        assert_eq!(km.solana().map(|k| k.pubkey()), Some(kp.pubkey()));
        assert!(km.evm().is_some());
        Ok(())
    }

    #[test]
    fn missing_keys_are_not_an_error() -> eyre::Result<()> {
        let km = KeyMaterial::from_secrets(None, None)?;
        assert!(km.solana().is_none());
        assert!(km.evm().is_none());
        Ok(())
    }

    #[test]
    fn malformed_keys_are_rejected_without_echoing_them() -> eyre::Result<()> {
        let bad = SecretString::new("not-base58-0OIl".to_owned().into());
        let Err(e) = KeyMaterial::from_secrets(Some(&bad), None) else {
            eyre::bail!("malformed key accepted");
        };
        let msg = format!("{e:#}");
        assert!(msg.contains(SOLANA_PRIVATE_KEY_ENV), "{msg}");
        assert!(!msg.contains("not-base58"), "{msg}");

        let short = SecretString::new("abcd".to_owned().into());
        assert!(KeyMaterial::from_secrets(None, Some(&short)).is_err());
        Ok(())
    }

    #[test]
    fn debug_output_shows_only_public_parts() {
        let kp = Keypair::new();
        let secret_b58 = bs58::encode(kp.to_bytes()).into_string();
        let pubkey = kp.pubkey().to_string();
        let km = KeyMaterial::for_tests(Some(kp), None);
        let dbg = format!("{km:?}");
        assert!(!dbg.contains(&secret_b58));
        assert!(dbg.contains(&pubkey));
    }
}
