//! Cleanup and parsing of text captured from the remote shell.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{QqError, Result};

/// Terminal mode set/reset sequences (`ESC [ ... h` / `ESC [ ... l`),
/// which covers bracketed paste `ESC[?2004h` and `ESC[?2004l`.
static MODE_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-?]*[lh]").unwrap());

static PORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":(\d+)/").unwrap());

/// Line appended by [`crate::RemoteSession::run`] to learn the exit status
pub const EXIT_MARKER: &str = "__QQ_EXIT=";

static EXIT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^__QQ_EXIT=(\d+)\r?$").unwrap());

pub fn strip_ansi(text: &str) -> String {
    MODE_SEQUENCE.replace_all(text, "").into_owned()
}

/// Drop the terminal's echo of `command` from the front of `output`.
///
/// Output that does not start with the command is returned untouched.
pub fn strip_echo(output: &str, command: &str) -> String {
    match output.strip_prefix(command) {
        Some(rest) => rest.trim().to_string(),
        None => output.to_string(),
    }
}

/// Everything the remote runner does to raw text captured before the prompt
pub fn clean_command_output(raw: &str, command: &str) -> String {
    strip_echo(&strip_ansi(raw), command).replace("\r\n", "\n")
}

/// Pull the port number out of an `http://host:PORT/` banner.
pub fn parse_port(banner: &str) -> Option<u16> {
    PORT.captures(banner)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Split the exit status marker off command output.
pub fn split_exit_status(output: &str) -> (String, Option<i32>) {
    let Some(caps) = EXIT_LINE.captures_iter(output).last() else {
        return (output.to_string(), None);
    };
    let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
    let code = caps.get(1).and_then(|m| m.as_str().parse().ok());

    let mut text = String::with_capacity(output.len());
    text.push_str(&output[..whole.start]);
    text.push_str(&output[whole.end..]);
    (text.trim_end().to_string(), code)
}

#[derive(Debug, Deserialize)]
struct IpInterface {
    #[serde(default)]
    addr_info: Vec<IpAddrInfo>,
}

#[derive(Debug, Deserialize)]
struct IpAddrInfo {
    family: Option<String>,
    local: Option<String>,
}

/// First IPv4 address in the JSON printed by `ip -4 -j address show <interface>`.
pub fn parse_interface_address(json: &str, interface: &str) -> Result<String> {
    let interfaces: Vec<IpInterface> = serde_json::from_str(json.trim()).map_err(|e| {
        tracing::debug!("unparseable ip output {:?}: {}", json, e);
        QqError::AddressNotFound(interface.to_string())
    })?;

    interfaces
        .into_iter()
        .flat_map(|iface| iface.addr_info)
        .filter(|info| info.family.as_deref().map_or(true, |f| f == "inet"))
        .find_map(|info| info.local)
        .ok_or_else(|| QqError::AddressNotFound(interface.to_string()))
}
