use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{QqError, Result};

pub const DEFAULT_TICKET_ROOT: &str = "/opt/nfs/vcf_gs_csp_prd_sr";
pub const DEFAULT_INTERFACE: &str = "ens192";

/// Everything a session and the action handlers need to know about the
/// local tools and the script server layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SSH client configuration handed to `ssh -F`. `None` means
    /// `~/.ssh/config` if it exists, otherwise ssh's own defaults.
    pub ssh_config: Option<PathBuf>,
    pub ssh_program: String,
    pub rsync_program: String,
    /// Interpreter used on the remote side for the file browser
    pub python_program: String,
    /// NFS mount holding the `<ticket>.bcm` directories
    pub ticket_root: String,
    /// Remote network interface whose address the file browser is reached on
    pub interface: String,
    pub login_timeout_secs: u64,
    /// Unset means remote commands may run for as long as they need
    pub command_timeout_secs: Option<u64>,
    pub serve_banner_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ssh_config: None,
            ssh_program: "ssh".to_string(),
            rsync_program: "rsync".to_string(),
            python_program: "python3".to_string(),
            ticket_root: DEFAULT_TICKET_ROOT.to_string(),
            interface: DEFAULT_INTERFACE.to_string(),
            login_timeout_secs: 30,
            command_timeout_secs: None,
            serve_banner_timeout_secs: 5,
        }
    }
}

impl Config {
    /// Load the configuration file.
    ///
    /// An explicit path (flag or `QQ_CONFIG`) must exist; the default
    /// location is optional and falls back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("QQ_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(QqError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(&path)?
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        if let Some(ssh_config) = std::env::var_os("QQ_SSH_CONFIG") {
            config.ssh_config = Some(PathBuf::from(ssh_config));
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            QqError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("qq").join("config.toml"))
    }

    fn home_ssh_config() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".ssh").join("config"))
    }

    /// The SSH config file to pass with `-F`, if any.
    pub fn resolved_ssh_config(&self) -> Result<Option<PathBuf>> {
        match &self.ssh_config {
            Some(path) if path.is_file() => Ok(Some(path.clone())),
            Some(path) => Err(QqError::SshConfigMissing(path.clone())),
            None => Ok(Self::home_ssh_config().filter(|p| p.is_file())),
        }
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    pub fn serve_banner_timeout(&self) -> Duration {
        Duration::from_secs(self.serve_banner_timeout_secs)
    }
}
