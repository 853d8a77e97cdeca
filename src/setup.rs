//! Opt-in check of the local tools qq shells out to.

use std::env;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{QqError, Result};

/// Outcome of one prerequisite check
#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    /// Where it was found, or why it was not
    pub detail: String,
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Locate `program` the way a shell would: directly if it contains a slash,
/// otherwise on `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }

    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

pub fn check_prerequisites(config: &Config) -> Vec<Check> {
    let mut checks: Vec<Check> = [&config.ssh_program, &config.rsync_program]
        .into_iter()
        .map(|program| match find_program(program) {
            Some(path) => Check {
                name: program.clone(),
                ok: true,
                detail: path.display().to_string(),
            },
            None => Check {
                name: program.clone(),
                ok: false,
                detail: "not found on PATH".to_string(),
            },
        })
        .collect();

    let ssh_config = match config.resolved_ssh_config() {
        Ok(Some(path)) => Check {
            name: "ssh config".to_string(),
            ok: true,
            detail: path.display().to_string(),
        },
        Ok(None) => Check {
            name: "ssh config".to_string(),
            ok: true,
            detail: "none, using ssh defaults".to_string(),
        },
        Err(e) => Check {
            name: "ssh config".to_string(),
            ok: false,
            detail: e.to_string(),
        },
    };
    checks.push(ssh_config);
    checks
}

/// Fail with every missing prerequisite named.
pub fn ensure_prerequisites(checks: &[Check]) -> Result<()> {
    let missing: Vec<&str> = checks
        .iter()
        .filter(|c| !c.ok)
        .map(|c| c.name.as_str())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(QqError::MissingDependency(missing.join(", ")))
    }
}
