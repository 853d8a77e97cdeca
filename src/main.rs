use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, CommandFactory, Parser};
use qq_tickets::{Config, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Import handler modules
mod handlers;

#[derive(Parser)]
#[command(name = "qq")]
#[command(about = "List and copy compressed files from script server to local.", long_about = None)]
#[command(version)]
struct Cli {
    /// List ticket directory contents (also -ls)
    #[arg(long = "list", num_args = 2, value_names = ["HOSTNAME", "TICKET"])]
    list: Option<Vec<String>>,

    /// Copy regular files from script server to local (also -cp)
    #[arg(long = "copy", num_args = 2, value_names = ["HOSTNAME", "TICKET"])]
    copy: Option<Vec<String>>,

    /// Create a graphical interface for downloading items in ticket directory (also -gui)
    #[arg(long = "graphical", num_args = 2, value_names = ["HOSTNAME", "TICKET"])]
    graphical: Option<Vec<String>>,

    /// Directory that --copy downloads into
    #[arg(long, value_name = "DIR", default_value = ".")]
    dest: PathBuf,

    /// Configuration file (default: <config dir>/qq/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SSH client configuration to use instead of ~/.ssh/config
    #[arg(long = "ssh-config", value_name = "FILE")]
    ssh_config: Option<PathBuf>,

    /// Check that ssh, rsync and the SSH config are usable
    #[arg(long)]
    check: bool,

    /// More log output (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

/// Single-dash spellings accepted alongside the long flags
const LEGACY_FLAGS: [(&str, &str); 3] = [
    ("-ls", "--list"),
    ("-cp", "--copy"),
    ("-gui", "--graphical"),
];

fn normalize_legacy_flags(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| {
            LEGACY_FLAGS
                .iter()
                .find(|(legacy, _)| arg == *legacy)
                .map(|(_, long)| OsString::from(long))
                .unwrap_or(arg)
        })
        .collect()
}

fn init_logging(quiet: bool, verbose: u8) {
    // Setup logging based on verbosity
    let log_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(ref path) = cli.ssh_config {
        config.ssh_config = Some(path.clone());
    }
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_legacy_flags(std::env::args_os()));
    init_logging(cli.quiet, cli.verbose);

    let nothing_requested =
        cli.list.is_none() && cli.copy.is_none() && cli.graphical.is_none() && !cli.check;
    if nothing_requested {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        if let Err(e) = handlers::handle_check(&config) {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    let mut failed = false;

    if let Some([host, ticket]) = cli.list.as_deref() {
        if let Err(e) = handlers::handle_list(&config, host, ticket) {
            tracing::error!("--list {} {} failed: {}", host, ticket, e);
            failed = true;
        }
    }

    if let Some([host, ticket]) = cli.copy.as_deref() {
        if let Err(e) = handlers::handle_copy(&config, host, ticket, &cli.dest) {
            tracing::error!("--copy {} {} failed: {}", host, ticket, e);
            failed = true;
        }
    }

    if let Some([host, ticket]) = cli.graphical.as_deref() {
        if let Err(e) = handlers::handle_serve(&config, host, ticket) {
            tracing::error!("--graphical {} {} failed: {}", host, ticket, e);
            failed = true;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_legacy_flags_are_rewritten() {
        assert_eq!(
            normalize_legacy_flags(args(&["qq", "-ls", "h", "SR1", "-cp", "h", "SR2", "-gui", "h", "SR3"])),
            args(&["qq", "--list", "h", "SR1", "--copy", "h", "SR2", "--graphical", "h", "SR3"])
        );
    }

    #[test]
    fn test_values_are_not_rewritten() {
        assert_eq!(
            normalize_legacy_flags(args(&["qq", "--list", "-lsx", "SR1", "-v"])),
            args(&["qq", "--list", "-lsx", "SR1", "-v"])
        );
    }

    #[test]
    fn test_flags_take_host_and_ticket() {
        let cli = Cli::parse_from(normalize_legacy_flags(args(&[
            "qq", "-ls", "script01", "SR12345", "--copy", "script02", "SR9",
        ])));
        assert_eq!(cli.list, Some(vec!["script01".to_string(), "SR12345".to_string()]));
        assert_eq!(cli.copy, Some(vec!["script02".to_string(), "SR9".to_string()]));
        assert_eq!(cli.graphical, None);
        assert_eq!(cli.dest, PathBuf::from("."));
    }

    #[test]
    fn test_flag_needs_two_values() {
        assert!(Cli::try_parse_from(args(&["qq", "--list", "script01"])).is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
