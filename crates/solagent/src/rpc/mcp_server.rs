use crate::{
    config::NetworkMode,
    errors::ToolError,
    keys::KeyMaterial,
    paths::AgentPaths,
    store::ConfigStore,
    wormhole::actions::AgentContext,
};
use eyre::Context as _;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::warn;

mod jsonrpc;
mod tools;

pub use jsonrpc::{err, ok, tool_err, JsonRpcRequest, JsonRpcResponse};
pub use tools::{handle_tools_call, list_tools_result};

/// Lines longer than this end the session.
pub const MAX_JSONRPC_LINE_BYTES: usize = 1024 * 1024;

fn handle_initialize(req_id: Value, params: &Value, ctx: &mut AgentContext) -> JsonRpcResponse {
    if let Some(m) = params
        .get("solagent_network_override")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<NetworkMode>().ok())
    {
        // Session only; never persisted.
        ctx.cfg.network_mode = m;
    }
    ok(
        req_id,
        json!({
          "protocolVersion": "2025-06-18",
          "serverInfo": { "name": "solagent", "version": env!("CARGO_PKG_VERSION") },
          "capabilities": { "tools": {} }
        }),
    )
}

/// Answer one request. `None` for notifications and lines that are not JSON-RPC.
pub async fn dispatch(line: &str, ctx: &mut AgentContext) -> Option<JsonRpcResponse> {
    let v: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "invalid json on stdin");
            return None;
        }
    };
    // Notifications carry no id.
    if v.get("id").is_none() {
        return None;
    }
    let req: JsonRpcRequest = match serde_json::from_value(v) {
        Ok(parsed_req) => parsed_req,
        Err(e) => {
            warn!(error = %e, "failed to parse jsonrpc request");
            return None;
        }
    };
    if req.jsonrpc != "2.0" {
        return Some(err(req.id, -32600, "invalid jsonrpc version"));
    }

    let resp = match req.method.as_str() {
        "initialize" => handle_initialize(req.id, &req.params, ctx),
        "ping" => ok(req.id, json!({})),
        "tools/list" => ok(req.id, list_tools_result()),
        "tools/call" => {
            let name = req
                .params
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("");
            let args = req.params.get("arguments").cloned().unwrap_or(Value::Null);
            let id = req.id.clone();
            match handle_tools_call(id.clone(), name, &args, ctx).await {
                Ok(tool_resp) => tool_resp,
                Err(e) => ok(id, tool_err(&ToolError::from_report(&e))),
            }
        }
        _ => err(req.id, -32601, "method not found"),
    };
    Some(resp)
}

pub async fn run(network_override: Option<NetworkMode>) -> eyre::Result<()> {
    let paths = AgentPaths::discover()?;
    let cfg = ConfigStore::new(&paths)
        .load_or_init_default()
        .context("load config")?;
    let keys = KeyMaterial::from_env()?;
    let mut ctx = AgentContext::new(cfg, keys);
    if let Some(m) = network_override {
        ctx.cfg.network_mode = m;
    }
    tracing::info!(network = %ctx.cfg.network_mode, keys = ?ctx.keys, "mcp server ready");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = stdin.next_line().await? {
        if line.len() > MAX_JSONRPC_LINE_BYTES {
            warn!(len = line.len(), "oversized jsonrpc line; closing session");
            break;
        }
        if let Some(resp) = dispatch(&line, &mut ctx).await {
            jsonrpc::write_frame(&mut stdout, &resp).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn call(ctx: &mut AgentContext, v: &Value) -> eyre::Result<Value> {
        let Some(resp) = dispatch(&v.to_string(), ctx).await else {
            eyre::bail!("no response for {v}");
        };
        Ok(serde_json::to_value(resp)?)
    }

    #[tokio::test]
    async fn initialize_applies_session_network() -> eyre::Result<()> {
        let mut ctx = AgentContext::default();
        let v = call(
            &mut ctx,
            &json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": { "solagent_network_override": "testnet" } }),
        )
        .await?;
        assert_eq!(v["result"]["serverInfo"]["name"], "solagent");
        assert_eq!(ctx.cfg.network_mode, NetworkMode::Testnet);
        Ok(())
    }

    #[tokio::test]
    async fn lists_tools_and_rejects_unknown_methods() -> eyre::Result<()> {
        let mut ctx = AgentContext::default();
        let v = call(&mut ctx, &json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" })).await?;
        let names: Vec<&str> = v["result"]["tools"]
            .as_array()
            .map(|a| a.iter().filter_map(|t| t["name"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(names, ["wormhole_create_wrapped_token", "wormhole_transfer_token"]);

        let v = call(&mut ctx, &json!({ "jsonrpc": "2.0", "id": 3, "method": "resources/list" })).await?;
        assert_eq!(v["error"]["code"], -32601);
        let v = call(&mut ctx, &json!({ "jsonrpc": "1.0", "id": 4, "method": "ping" })).await?;
        assert_eq!(v["error"]["code"], -32600);
        Ok(())
    }

    #[tokio::test]
    async fn notifications_and_garbage_get_no_reply() {
        let mut ctx = AgentContext::default();
        assert!(dispatch("not json", &mut ctx).await.is_none(), "garbage");
        let note = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string();
        assert!(dispatch(&note, &mut ctx).await.is_none(), "notification");
    }
}
