use super::bridge::TokenBridge;
use super::{ChainAddress, TokenId, WrappedAssetRecord};
use crate::chains::Chain;
use crate::config::LookupFailurePolicy;
use crate::errors::BridgeError;

/// Asks the destination chain whether a token is already wrapped there.
pub struct WrappedAssetLookup<'a> {
    bridge: &'a dyn TokenBridge,
    policy: LookupFailurePolicy,
}

impl<'a> WrappedAssetLookup<'a> {
    pub const fn new(bridge: &'a dyn TokenBridge, policy: LookupFailurePolicy) -> Self {
        Self { bridge, policy }
    }

    /// One best-effort query. Never fails; failures come back as `LookupFailed`.
    pub async fn lookup(&self, destination: Chain, token: &TokenId) -> WrappedAssetRecord {
        match self.bridge.wrapped_asset(destination, token).await {
            Ok(Some(a)) => WrappedAssetRecord::Wrapped(a),
            Ok(None) => WrappedAssetRecord::NotWrapped,
            Err(e) => WrappedAssetRecord::LookupFailed(format!("{e:#}")),
        }
    }

    /// `lookup` with the failure policy applied.
    pub async fn resolve(
        &self,
        destination: Chain,
        token: &TokenId,
    ) -> eyre::Result<Option<ChainAddress>> {
        match self.lookup(destination, token).await {
            WrappedAssetRecord::Wrapped(a) => {
                tracing::debug!(%token, chain = %destination, wrapped = %a.address, "token already wrapped");
                Ok(Some(a))
            }
            WrappedAssetRecord::NotWrapped => Ok(None),
            WrappedAssetRecord::LookupFailed(cause) => match self.policy {
                LookupFailurePolicy::AssumeAbsent => {
                    tracing::warn!(%token, chain = %destination, %cause, "wrapped asset lookup failed; treating as not wrapped");
                    Ok(None)
                }
                LookupFailurePolicy::Fail => Err(BridgeError::LookupFailed(cause).into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::find_bridge_error;
    use crate::wormhole::testing::{spl_token, FakeBridge};

    #[tokio::test]
    async fn reports_wrapped_and_absent() -> eyre::Result<()> {
        let token = spl_token();
        let bridge = FakeBridge::new().with_wrapped(Chain::BaseSepolia, &token);
        let l = WrappedAssetLookup::new(&bridge, LookupFailurePolicy::Fail);
        assert!(matches!(
            l.lookup(Chain::BaseSepolia, &token).await,
            WrappedAssetRecord::Wrapped(_)
        ));
        assert_eq!(l.resolve(Chain::Sepolia, &token).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn failure_policy_decides_between_absent_and_error() -> eyre::Result<()> {
        let token = spl_token();
        let bridge = FakeBridge {
            lookup_fails: true,
            ..FakeBridge::new()
        };
        let lenient = WrappedAssetLookup::new(&bridge, LookupFailurePolicy::AssumeAbsent);
        assert_eq!(lenient.resolve(Chain::BaseSepolia, &token).await?, None);

        let strict = WrappedAssetLookup::new(&bridge, LookupFailurePolicy::Fail);
        let r = strict.resolve(Chain::BaseSepolia, &token).await;
        let code = r.as_ref().err().and_then(find_bridge_error).map(BridgeError::code);
        assert_eq!(code, Some("lookup_failed"));
        Ok(())
    }
}
