use serde_json::{json, Value};

const CHAIN_HINT: &str = "Wormhole chain name, e.g. BaseSepolia, Sepolia, Ethereum, Base, Arbitrum, Optimism, Polygon, Bsc, Avalanche. Config names (base-sepolia, bnb) are accepted too.";
const NETWORK_HINT: &str = "Mainnet, Testnet or Devnet. If omitted, uses the configured network mode.";

fn wormhole_tool_schemas() -> Vec<Value> {
    vec![
        json!({ "name": "wormhole_create_wrapped_token", "description": "Create a wrapped version of a Solana token on another chain via the Wormhole token bridge. Returns the existing wrapped token if there already is one.", "inputSchema": {
          "type": "object",
          "properties": {
            "destinationChain": { "type": "string", "minLength": 1, "description": CHAIN_HINT },
            "tokenAddress": { "type": "string", "minLength": 1, "description": "SPL token mint on Solana." },
            "network": { "type": "string", "enum": ["Mainnet", "Testnet", "Devnet"], "description": NETWORK_HINT }
          },
          "required": ["destinationChain", "tokenAddress"],
          "additionalProperties": false
        }}),
        json!({ "name": "wormhole_transfer_token", "description": "Transfer SOL or an SPL token from Solana to another chain via the Wormhole token bridge. Wraps the token on the destination first when needed, then redeems the transfer with the configured EVM key.", "inputSchema": {
          "type": "object",
          "properties": {
            "destinationChain": { "type": "string", "minLength": 1, "description": CHAIN_HINT },
            "transferAmount": { "type": ["string", "number"], "minLength": 1, "description": "Amount in human units, e.g. \"0.5\"." },
            "tokenAddress": { "type": "string", "description": "SPL token mint on Solana. If omitted, transfers native SOL." },
            "network": { "type": "string", "enum": ["Mainnet", "Testnet", "Devnet"], "description": NETWORK_HINT }
          },
          "required": ["destinationChain", "transferAmount"],
          "additionalProperties": false
        }}),
    ]
}

pub fn list_tools_result() -> Value {
    json!({ "tools": wormhole_tool_schemas() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_declares_its_required_arguments() {
        let v = list_tools_result();
        let tools = v["tools"].as_array().cloned().unwrap_or_default();
        assert_eq!(tools.len(), 2);
        for t in &tools {
            assert!(t["name"].as_str().is_some_and(|n| n.starts_with("wormhole_")), "{t}");
            let required = t["inputSchema"]["required"].as_array().cloned().unwrap_or_default();
            assert!(required.contains(&json!("destinationChain")), "{t}");
            assert_eq!(t["inputSchema"]["additionalProperties"], false);
        }
    }

    #[test]
    fn transfer_amount_accepts_strings_and_numbers() {
        let v = list_tools_result();
        let tools = v["tools"].as_array().cloned().unwrap_or_default();
        let transfer = tools.iter().find(|t| t["name"] == "wormhole_transfer_token");
        let ty = transfer.map(|t| t["inputSchema"]["properties"]["transferAmount"]["type"].clone());
        assert_eq!(ty, Some(json!(["string", "number"])));
    }
}
