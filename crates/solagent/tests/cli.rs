use std::process::Command;

use assert_cmd::prelude::*;
use eyre::Context as _;
use predicates::prelude::*;

struct Sandbox {
    cfg_dir: tempfile::TempDir,
    data_dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> eyre::Result<Self> {
        Ok(Self {
            cfg_dir: tempfile::tempdir()?,
            data_dir: tempfile::tempdir()?,
        })
    }

    fn cmd(&self) -> Command {
        let mut c = Command::new(assert_cmd::cargo::cargo_bin!("solagent"));
        c.env("SOLAGENT_CONFIG_DIR", self.cfg_dir.path())
            .env("SOLAGENT_DATA_DIR", self.data_dir.path())
            .env_remove("SOLANA_PRIVATE_KEY")
            .env_remove("ETH_PRIVATE_KEY")
            .env_remove("RUST_LOG");
        c
    }
}

#[test]
fn tools_lists_both_wormhole_tools() -> eyre::Result<()> {
    let sb = Sandbox::new()?;
    sb.cmd()
        .arg("tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("wormhole_create_wrapped_token"))
        .stdout(predicate::str::contains("wormhole_transfer_token"));
    Ok(())
}

#[test]
fn paths_prints_the_overridden_dirs() -> eyre::Result<()> {
    let sb = Sandbox::new()?;
    let out = sb.cmd().arg("paths").output().context("run solagent paths")?;
    assert!(
        out.status.success(),
        "paths exited non-zero: stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).context("parse paths json")?;
    assert_eq!(
        v.get("data_dir").and_then(serde_json::Value::as_str),
        sb.data_dir.path().to_str()
    );
    assert!(
        v.get("log_file")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|s| s.ends_with("solagent.log.jsonl")),
        "{v}"
    );
    Ok(())
}

#[test]
fn transfer_without_solana_key_fails_with_unsupported_platform() -> eyre::Result<()> {
    let sb = Sandbox::new()?;
    let out = sb
        .cmd()
        .args(["transfer", "--to", "BaseSepolia", "--amount", "0.5", "--network", "testnet"])
        .output()
        .context("run solagent transfer")?;
    assert!(!out.status.success(), "transfer must fail without keys");
    let v: serde_json::Value =
        serde_json::from_slice(&out.stdout).context("parse transfer json")?;
    assert_eq!(v["success"], false);
    assert_eq!(v["status"], "failed");
    assert_eq!(v["errorCode"], "unsupported_platform");
    assert!(
        v["error"]
            .as_str()
            .is_some_and(|e| e.starts_with("transfer token failed: ")),
        "{v}"
    );
    assert!(sb.cfg_dir.path().join("config.toml").exists(), "default config written");
    Ok(())
}

#[test]
fn mcp_answers_initialize_and_tools_list_over_stdio() -> eyre::Result<()> {
    let sb = Sandbox::new()?;
    let input = [
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"wormhole_create_wrapped_token","arguments":{"destinationChain":"BaseSepolia"}}}"#,
    ]
    .join("\n");
    let out = assert_cmd::Command::from_std(sb.cmd())
        .args(["mcp", "--network", "testnet"])
        .write_stdin(format!("{input}\n"))
        .output()
        .context("run solagent mcp")?;
    assert!(
        out.status.success(),
        "mcp exited non-zero: stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    let frames: Vec<serde_json::Value> = String::from_utf8(out.stdout)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(frames.len(), 3, "one reply per request: {frames:?}");
    assert_eq!(frames.first().map(|f| f["id"].clone()), Some(serde_json::json!(1)));
    assert!(
        frames
            .get(1)
            .and_then(|f| f["result"]["tools"].as_array())
            .is_some_and(|t| t.len() == 2),
        "{frames:?}"
    );
    assert_eq!(
        frames.get(2).map(|f| f["result"]["isError"].clone()),
        Some(serde_json::json!(true))
    );
    Ok(())
}
