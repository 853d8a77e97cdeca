use std::sync::LazyLock;
use std::time::Duration;

use regex::bytes::Regex;

use crate::commands;
use crate::config::Config;
use crate::error::{QqError, Result};
use crate::expect::{Expecter, Found};
use crate::output::{clean_command_output, split_exit_status, EXIT_MARKER};
use crate::pty::PtyProcess;

/// Sent right after login. The split quoting keeps the echoed command from
/// matching [`PROMPT`].
pub const PROMPT_SETUP: &str = "unset PROMPT_COMMAND; PS1='[QQ''PROMPT]> '; PS2=''";

pub static PROMPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[QQPROMPT\]> ").unwrap());

/// csh and tcsh have no `PS1`; they set the prompt with this instead.
pub const CSH_PROMPT_SETUP: &str = "set prompt='[QQ''PROMPT]> '";

/// How csh rejects `PS1=...`. The rejected word contains the prompt text, so
/// this has to match from `PS1=` onwards to win over [`PROMPT`].
static CSH_REJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PS1=[^\r\n]*: Command not found").unwrap());

static AUTH_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)permission denied[^\r\n]*|host key verification failed|too many authentication failures",
    )
    .unwrap()
});

static PASSWORD_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:password|passphrase for key)[^\r\n]*:").unwrap());

/// Wide enough that command echoes never wrap
const PTY_COLS: u16 = 512;
const PTY_ROWS: u16 = 24;

const LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Text and exit status of a remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// An interactive shell on a remote host, reached through the system ssh
/// client. Shell state (working directory, environment) carries over
/// between commands.
pub struct RemoteSession {
    host: String,
    expect: Expecter,
    command_timeout: Option<Duration>,
}

impl RemoteSession {
    /// Log in to `host` and switch the remote shell to a known prompt.
    pub fn login(config: &Config, host: &str) -> Result<Self> {
        commands::validate_host(host)?;
        let ssh_config = config.resolved_ssh_config()?;
        let args = commands::ssh_args(ssh_config.as_deref(), host);

        tracing::info!(host, "opening ssh session");
        tracing::debug!("{} {}", config.ssh_program, args.join(" "));

        let pty = PtyProcess::spawn(&config.ssh_program, &args, PTY_COLS, PTY_ROWS)?;
        let mut expect = Expecter::new(pty);

        // The shell picks this up as soon as it starts reading input. If ssh
        // already gave up, the expect below reports why.
        if let Err(e) = expect.send_line(PROMPT_SETUP) {
            tracing::debug!(host, "could not send prompt setup: {}", e);
        }

        let mut found = expect.expect(
            &[&PROMPT, &AUTH_FAILURE, &PASSWORD_PROMPT, &CSH_REJECT],
            Some(config.login_timeout()),
        );

        if let Ok(Found { index: 3, .. }) = found {
            tracing::debug!(host, "login shell is csh, setting its prompt instead");
            expect.send_line(CSH_PROMPT_SETUP)?;
            found = expect.expect(&[&PROMPT], Some(config.login_timeout()));
        }

        match found {
            Ok(Found { index: 0, .. }) => {
                tracing::debug!(host, "remote prompt ready");
                Ok(RemoteSession {
                    host: host.to_string(),
                    expect,
                    command_timeout: config.command_timeout(),
                })
            }
            Ok(found) => Err(QqError::AuthenticationFailed {
                host: host.to_string(),
                reason: found.matched_text().trim().to_string(),
            }),
            Err(QqError::ConnectionLost(output)) => Err(classify_login_output(host, &output)),
            Err(e) => Err(e),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Run `command` and return its cleaned output.
    pub fn execute(&mut self, command: &str) -> Result<String> {
        tracing::debug!(host = %self.host, command, "remote command");
        self.expect.discard_pending()?;
        self.expect.send_line(command)?;
        let found = self.expect.expect(&[&PROMPT], self.command_timeout)?;
        Ok(clean_command_output(&found.before_text(), command))
    }

    /// Like [`execute`](Self::execute), also reporting the exit status.
    ///
    /// The status goes on a line of its own, so output without a trailing
    /// newline does not swallow it.
    pub fn run(&mut self, command: &str) -> Result<CommandOutput> {
        let line = format!("{}; printf '\\n{}%s\\n' $?", command, EXIT_MARKER);
        let output = self.execute(&line)?;
        let (text, exit_code) = split_exit_status(&output);
        if exit_code != Some(0) {
            tracing::debug!(host = %self.host, command, ?exit_code, "remote command failed");
        }
        Ok(CommandOutput { text, exit_code })
    }

    /// Send a line without waiting for the prompt
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        tracing::debug!(host = %self.host, line, "remote input");
        self.expect.send_line(line)
    }

    /// Send Ctrl+C to whatever runs in the foreground of the remote shell
    pub fn interrupt(&mut self) -> Result<()> {
        self.expect.send_interrupt()
    }

    pub fn expect(&mut self, patterns: &[&Regex], timeout: Option<Duration>) -> Result<Found> {
        self.expect.expect(patterns, timeout)
    }

    /// Wait for the prompt, returning the cleaned text printed before it
    pub fn wait_for_prompt(&mut self, timeout: Option<Duration>) -> Result<String> {
        let found = self.expect.expect(&[&PROMPT], timeout)?;
        Ok(clean_command_output(&found.before_text(), ""))
    }

    /// Log out and reap the ssh client.
    pub fn close(mut self) -> Result<()> {
        tracing::debug!(host = %self.host, "closing ssh session");
        if self.expect.send_line("exit").is_ok() && !self.expect.wait_eof(LOGOUT_TIMEOUT)? {
            tracing::warn!(host = %self.host, "remote shell did not exit, hanging up");
        }
        let status = self.expect.pty_mut().terminate(Duration::from_secs(1))?;
        tracing::debug!(host = %self.host, %status, "ssh exited");
        Ok(())
    }
}

/// Turn the output of an ssh client that exited before the prompt into an error.
fn classify_login_output(host: &str, output: &str) -> QqError {
    let bytes = output.as_bytes();
    if let Some(m) = AUTH_FAILURE
        .find(bytes)
        .or_else(|| PASSWORD_PROMPT.find(bytes))
    {
        return QqError::AuthenticationFailed {
            host: host.to_string(),
            reason: String::from_utf8_lossy(m.as_bytes()).trim().to_string(),
        };
    }

    let trimmed = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.contains("[QQ''PROMPT]"))
        .collect::<Vec<_>>()
        .join(" ");
    QqError::LoginFailed {
        host: host.to_string(),
        output: if trimmed.is_empty() {
            "ssh exited before a shell prompt appeared".to_string()
        } else {
            trimmed
        },
    }
}
