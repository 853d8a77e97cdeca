//! Command lines run on the script server and locally.

use std::path::Path;

use crate::config::Config;
use crate::error::{QqError, Result};
use crate::ticket::TicketId;

/// rsync filters for the remote staging copy. `*/` drops every directory.
pub const EXCLUDE_PATTERNS: [&str; 5] = [
    "*/",
    "*-link",
    "*renamed-by-CDM*",
    "*vcf-cdm-copy*",
    "*vmx - Vi*",
];

/// Reject host names that ssh or rsync would read as options or that
/// would split into several arguments.
pub fn validate_host(host: &str) -> Result<()> {
    if host.is_empty()
        || host.starts_with('-')
        || host.chars().any(|c| c.is_whitespace() || c.is_control() || c == ':')
    {
        return Err(QqError::Config(format!("invalid hostname: {:?}", host)));
    }
    Ok(())
}

pub fn ssh_args(ssh_config: Option<&Path>, host: &str) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(path) = ssh_config {
        args.push("-F".to_string());
        args.push(path.display().to_string());
    }
    args.extend(
        ["-tt", "-o", "BatchMode=yes", "--", host]
            .iter()
            .map(|s| s.to_string()),
    );
    args
}

pub fn listing(config: &Config, ticket: &TicketId) -> String {
    format!("ls -halLt {}", ticket.remote_dir(&config.ticket_root))
}

/// Copy the ticket's regular files into the staging directory on the server.
pub fn stage_copy(config: &Config, ticket: &TicketId) -> String {
    let excludes: Vec<String> = EXCLUDE_PATTERNS
        .iter()
        .map(|p| format!("--exclude \"{}\"", p))
        .collect();
    format!(
        "rsync -av --partial {} {}/ {}",
        excludes.join(" "),
        ticket.remote_dir(&config.ticket_root),
        ticket.staging_dir()
    )
}

pub fn cleanup(ticket: &TicketId) -> String {
    format!("rm -rf {}", ticket.staging_dir())
}

pub fn address_query(interface: &str) -> String {
    format!("ip -4 -j address show {}", interface)
}

pub fn http_server(config: &Config, ticket: &TicketId) -> String {
    format!(
        "{} -m http.server -d {}/ 0",
        config.python_program,
        ticket.remote_dir(&config.ticket_root)
    )
}

/// Arguments for the local rsync that pulls the staged files.
///
/// The SSH config path ends up single-quoted inside rsync's `-e` command
/// line, so a path containing `'` is refused.
pub fn local_pull_args(
    ssh_config: Option<&Path>,
    host: &str,
    ticket: &TicketId,
    dest: &Path,
) -> Result<Vec<String>> {
    let mut args: Vec<String> = [
        "-av",
        "--progress",
        "--partial",
        "--partial-dir=.Unfinished",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if let Some(path) = ssh_config {
        let path = path.display().to_string();
        if path.contains('\'') {
            return Err(QqError::Config(format!(
                "ssh config path cannot contain a single quote: {}",
                path
            )));
        }
        args.push("-e".to_string());
        args.push(format!("ssh -F '{}'", path));
    }

    args.push(format!("{}:{}/*", host, ticket.staging_dir()));
    args.push(dest.display().to_string());
    Ok(args)
}
