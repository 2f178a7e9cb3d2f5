mod schema;
mod wormhole;

pub use schema::list_tools_result;

use serde_json::Value;

use super::jsonrpc::{err, ok, tool_err, JsonRpcResponse};
use crate::errors::ToolError;
use crate::wormhole::actions::AgentContext;

pub async fn handle_tools_call(
    req_id: Value,
    tool_name: &str,
    args: &Value,
    ctx: &AgentContext,
) -> eyre::Result<JsonRpcResponse> {
    if !args.is_object() && !args.is_null() {
        return Ok(ok(
            req_id,
            tool_err(&ToolError::new("invalid_request", "arguments must be an object")),
        ));
    }
    match tool_name {
        "wormhole_create_wrapped_token" | "wormhole_transfer_token" => {
            wormhole::handle(req_id, tool_name, args, ctx).await
        }
        _ => Ok(err(req_id, -32601, "unknown tool")),
    }
}
