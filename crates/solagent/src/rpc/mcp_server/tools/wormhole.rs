use serde_json::Value;

use super::super::jsonrpc::{err, ok, tool_err, tool_result, JsonRpcResponse};
use crate::errors::ToolError;
use crate::wormhole::actions::{
    self, AgentContext, CreateWrappedTokenRequest, TransferTokenRequest,
};

fn arg_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Agents send amounts as strings or bare JSON numbers.
fn arg_amount(args: &Value, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(_) => arg_str(args, key),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

fn missing(key: &str) -> Value {
    tool_err(&ToolError::new("invalid_request", format!("missing {key}")))
}

pub async fn handle(
    req_id: Value,
    tool_name: &str,
    args: &Value,
    ctx: &AgentContext,
) -> eyre::Result<JsonRpcResponse> {
    let Some(destination_chain) = arg_str(args, "destinationChain") else {
        return Ok(ok(req_id, missing("destinationChain")));
    };
    let network = arg_str(args, "network");

    match tool_name {
        "wormhole_create_wrapped_token" => {
            let Some(token_address) = arg_str(args, "tokenAddress") else {
                return Ok(ok(req_id, missing("tokenAddress")));
            };
            let req = CreateWrappedTokenRequest {
                destination_chain,
                token_address,
                network,
            };
            tracing::info!(tool = tool_name, chain = %req.destination_chain, token = %req.token_address, "tool call");
            let resp = actions::create_wrapped_token(ctx, &req).await;
            let v = serde_json::to_value(&resp)?;
            Ok(ok(req_id, tool_result(&v, !resp.success)))
        }
        "wormhole_transfer_token" => {
            let Some(transfer_amount) = arg_amount(args, "transferAmount") else {
                return Ok(ok(req_id, missing("transferAmount")));
            };
            let req = TransferTokenRequest {
                destination_chain,
                transfer_amount,
                token_address: arg_str(args, "tokenAddress"),
                network,
            };
            tracing::info!(tool = tool_name, chain = %req.destination_chain, amount = %req.transfer_amount, token = ?req.token_address, "tool call");
            let resp = actions::transfer_token(ctx, &req).await;
            let v = serde_json::to_value(&resp)?;
            Ok(ok(req_id, tool_result(&v, !resp.success)))
        }
        _ => Ok(err(req_id, -32601, "unknown tool")),
    }
}
