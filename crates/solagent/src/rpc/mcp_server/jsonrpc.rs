use crate::errors::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

pub fn ok(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: Some(result),
        error: None,
    }
}

pub fn err(id: Value, code: i64, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.into(),
            data: Value::Null,
        }),
    }
}

/// MCP tool result carrying `payload` as JSON text.
pub fn tool_result(payload: &Value, is_error: bool) -> Value {
    json!({
      "content": [{ "type": "text", "text": payload.to_string() }],
      "isError": is_error
    })
}

pub fn tool_err(tool_error: &ToolError) -> Value {
    let text = serde_json::to_string(tool_error).unwrap_or_else(|_e| {
        "{\"code\":\"error\",\"message\":\"failed to serialize error\"}".into()
    });
    json!({
      "content": [{ "type": "text", "text": text }],
      "isError": true
    })
}

/// One newline-delimited JSON frame.
pub async fn write_frame<W, T>(out: &mut W, v: &T) -> eyre::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
    T: Serialize + Sync,
{
    use tokio::io::AsyncWriteExt as _;

    out.write_all(format!("{}\n", serde_json::to_string(v)?).as_bytes())
        .await?;
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_responses_omit_result() -> eyre::Result<()> {
        let v = serde_json::to_value(err(json!(7), -32601, "method not found"))?;
        assert_eq!(v["id"], 7);
        assert_eq!(v["error"]["code"], -32601);
        assert!(v.get("result").is_none(), "{v}");
        Ok(())
    }

    #[test]
    fn tool_errors_are_flagged() -> eyre::Result<()> {
        let v = tool_err(&ToolError::new("invalid_request", "missing destinationChain"));
        assert_eq!(v["isError"], true);
        let text = v["content"][0]["text"].as_str().unwrap_or_default();
        let inner: Value = serde_json::from_str(text)?;
        assert_eq!(inner["code"], "invalid_request");
        Ok(())
    }

    #[tokio::test]
    async fn frames_are_newline_terminated() -> eyre::Result<()> {
        let mut buf: Vec<u8> = vec![];
        write_frame(&mut buf, &ok(json!(1), json!({}))).await?;
        let s = String::from_utf8(buf)?;
        assert!(s.ends_with("}\n"), "{s}");
        assert_eq!(s.lines().count(), 1);
        Ok(())
    }
}
