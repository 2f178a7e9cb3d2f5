use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A structured error suitable for returning to an MCP client as tool output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub data: Value,
}

impl ToolError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: Value::Null,
        }
    }

    /// Map an arbitrary report onto a tool error, keeping the code of the first
    /// [`BridgeError`] when there is one.
    pub fn from_report(e: &eyre::Report) -> Self {
        let message = format!("{e:#}");
        match find_bridge_error(e) {
            Some(be) => Self::new(be.code(), message),
            None => Self::new("internal_error", message),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BridgeError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("No messages found in the transaction {txid}")]
    NoMessageFound { txid: String },

    #[error("VAA not found after retries exhausted. Try extending the timeout.")]
    VaaTimeout { message_id: String },

    #[error("Failed to get wrapped asset after multiple attempts ({attempts})")]
    WrappedAssetNotConfirmed { attempts: u32 },

    #[error("Failed to get attestation after multiple attempts ({attempts})")]
    AttestationTimeout { attempts: u32 },

    #[error("The amount requested is too low to cover the fee and any native gas requested.")]
    AmountTooLowForFee { destination_amount: i128 },

    #[error("Failed to create wrapped token: {0}")]
    CreateWrappedTokenFailed(String),

    #[error("wrapped asset lookup failed: {0}")]
    LookupFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{step} failed: {cause}")]
    Step { step: &'static str, cause: String },
}

impl BridgeError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform(_) => "unsupported_platform",
            Self::NoMessageFound { .. } => "no_message_found",
            Self::VaaTimeout { .. } => "vaa_timeout",
            Self::WrappedAssetNotConfirmed { .. } => "wrapped_asset_not_confirmed",
            Self::AttestationTimeout { .. } => "attestation_timeout",
            Self::AmountTooLowForFee { .. } => "amount_too_low_for_fee",
            Self::CreateWrappedTokenFailed(_) => "create_wrapped_token_failed",
            Self::LookupFailed(_) => "lookup_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Step { .. } => "bridge_error",
        }
    }

    /// Wrap a step failure, keeping an inner `BridgeError` as-is.
    pub fn step(step: &'static str, e: eyre::Report) -> eyre::Report {
        if find_bridge_error(&e).is_some() {
            return e;
        }
        Self::Step {
            step,
            cause: format!("{e:#}"),
        }
        .into()
    }
}

/// The outermost `BridgeError` in a report's chain, if any.
pub fn find_bridge_error(e: &eyre::Report) -> Option<&BridgeError> {
    e.chain().find_map(|c| c.downcast_ref::<BridgeError>())
}

impl From<BridgeError> for ToolError {
    fn from(e: BridgeError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}
