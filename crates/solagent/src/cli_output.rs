//! Centralised helpers for user-facing CLI output. Machine-readable results go to stdout,
//! human notes to stderr.

use eyre::Context as _;
use serde::Serialize;
use std::io::{IsTerminal as _, Write as _};

fn stderr_writeln(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    if stderr.write_all(b"\n").is_err() {
        return;
    }
    let _flush = stderr.flush();
}

/// Pretty JSON on stdout, one document per call.
pub fn print_json<T: Serialize>(v: &T) -> eyre::Result<()> {
    let s = serde_json::to_string_pretty(v).context("serialize output")?;
    writeln!(std::io::stdout().lock(), "{s}").context("write stdout")?;
    Ok(())
}

fn banner_enabled() -> bool {
    match std::env::var("SOLAGENT_BANNER") {
        Ok(v) => {
            let v = v.trim().to_ascii_lowercase();
            !(v.is_empty() || v == "0" || v == "false" || v == "no" || v == "off")
        }
        Err(_) => std::io::stderr().is_terminal(),
    }
}

/// MCP startup banner on stderr; MCP clients only read stdout.
pub fn print_mcp_banner(version: &str, network: &str) {
    if !banner_enabled() {
        return;
    }
    stderr_writeln(&format!(
        "solagent MCP\n============\nVersion : v{version}\nNetwork : {network}\nMode    : stdio\n\nTools: wormhole_create_wrapped_token, wormhole_transfer_token"
    ));
}

/// Stderr note shown while a long-running bridge command waits on the guardians.
pub fn print_progress_note(what: &str) {
    if std::io::stderr().is_terminal() {
        stderr_writeln(&format!(
            "solagent: {what}. Waiting for guardian signatures can take up to 25 minutes."
        ));
    }
}
