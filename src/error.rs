use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QqError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid ticket id: {0}")]
    InvalidTicket(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SSH config does not exist: {}", .0.display())]
    SshConfigMissing(PathBuf),

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("PTY error: {0}")]
    PtyError(String),

    #[error("Process error: {0}")]
    ProcessError(String),

    #[error("Signal error: {0}")]
    SignalError(String),

    #[error("Authentication failed for {host}: {reason}")]
    AuthenticationFailed { host: String, reason: String },

    #[error("Login to {host} failed: {output}")]
    LoginFailed { host: String, output: String },

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Timed out after {0:?} waiting for remote output")]
    Timeout(Duration),

    #[error("rsync exited with {status}: {stderr}")]
    SyncFailed { status: String, stderr: String },

    #[error("No IPv4 address found for interface {0}")]
    AddressNotFound(String),

    #[error("HTTP server did not report its address within {0:?}")]
    BannerTimeout(Duration),

    #[error("No port number in server banner: {0}")]
    PortNotFound(String),

    #[error("HTTP server failed to start: {0}")]
    ServerStartFailed(String),

    #[error("HTTP server exited: {0}")]
    ServerExited(String),
}

pub type Result<T> = std::result::Result<T, QqError>;

impl From<nix::Error> for QqError {
    fn from(err: nix::Error) -> Self {
        QqError::PtyError(err.to_string())
    }
}

impl From<toml::de::Error> for QqError {
    fn from(err: toml::de::Error) -> Self {
        QqError::Config(err.to_string())
    }
}
