use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::LazyLock;
use std::time::Duration;

use regex::bytes::Regex;

use crate::commands;
use crate::config::Config;
use crate::error::{QqError, Result};
use crate::output::{clean_command_output, parse_port};
use crate::session::{RemoteSession, PROMPT};
use crate::ticket::TicketId;

/// The `http://host:PORT/` part of the http.server startup line
static BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s/()]*:\d+/").unwrap());

/// One complete line of server output
static LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\r\n]*\r?\n").unwrap());

/// Server lines kept for the error when the server dies
const TAIL_LINES: usize = 5;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A file browser running in the foreground of a remote shell.
///
/// The server lives as long as this value: [`stop`](Self::stop) or dropping
/// it interrupts the remote process and waits for the shell prompt.
pub struct RemoteHttpServer<'s> {
    session: &'s mut RemoteSession,
    address: String,
    port: u16,
    running: bool,
}

impl<'s> RemoteHttpServer<'s> {
    /// Start serving the ticket directory on an ephemeral port and wait for
    /// the server to announce which one it got.
    pub fn start(
        session: &'s mut RemoteSession,
        config: &Config,
        ticket: &TicketId,
        address: String,
    ) -> Result<Self> {
        let command = commands::http_server(config, ticket);
        let timeout = config.serve_banner_timeout();
        session.send_line(&command)?;

        let found = match session.expect(&[&BANNER, &PROMPT], Some(timeout)) {
            Ok(found) => found,
            Err(QqError::Timeout(_)) => {
                // Whatever is running never said where it listens; get rid of it
                let _ = session.interrupt();
                let _ = session.wait_for_prompt(Some(STOP_TIMEOUT));
                return Err(QqError::BannerTimeout(timeout));
            }
            Err(e) => return Err(e),
        };

        if found.index == 1 {
            let output = clean_command_output(&found.before_text(), &command);
            return Err(QqError::ServerStartFailed(if output.is_empty() {
                "server exited without output".to_string()
            } else {
                output
            }));
        }

        let banner = found.matched_text();
        let mut server = RemoteHttpServer {
            session,
            address,
            port: 0,
            running: true,
        };
        // From here on a bad banner still tears the server down via Drop
        server.port = parse_port(&banner).ok_or(QqError::PortNotFound(banner))?;

        tracing::info!(port = server.port, "remote http server started");
        Ok(server)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }

    /// Block until `stop` is raised, logging what the server prints.
    ///
    /// The shell prompt coming back means the server process ended; that
    /// is reported as [`QqError::ServerExited`] with its last output.
    pub fn serve_until(&mut self, stop: &AtomicBool) -> Result<()> {
        let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);

        while !stop.load(Ordering::SeqCst) {
            let found = match self.session.expect(&[&PROMPT, &LINE], Some(POLL_INTERVAL)) {
                Ok(found) => found,
                Err(QqError::Timeout(_)) => continue,
                Err(e) => {
                    // The shell is gone and took the server with it
                    self.running = false;
                    return Err(e);
                }
            };

            if found.index == 0 {
                self.running = false;
                let mut output: Vec<String> = tail.into_iter().collect();
                let rest = clean_command_output(&found.before_text(), "");
                if !rest.is_empty() {
                    output.push(rest);
                }
                tracing::warn!(port = self.port, "remote http server exited");
                return Err(QqError::ServerExited(if output.is_empty() {
                    "no output".to_string()
                } else {
                    output.join(" ")
                }));
            }

            let line = clean_command_output(&found.matched_text(), "");
            if line.is_empty() {
                continue;
            }
            tracing::debug!(target: "qq::http", "{}", line);
            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        Ok(())
    }

    /// Interrupt the remote server and wait for the shell to come back.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        tracing::info!(port = self.port, "stopping remote http server");
        self.session.interrupt()?;
        self.session.wait_for_prompt(Some(STOP_TIMEOUT))?;
        Ok(())
    }
}

impl Drop for RemoteHttpServer<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("Failed to stop remote http server: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_pattern() {
        let line = b"Serving HTTP on 0.0.0.0 port 53213 (http://0.0.0.0:53213/) ...";
        let m = BANNER.find(line).unwrap();
        assert_eq!(m.as_bytes(), b"http://0.0.0.0:53213/");
        assert!(!BANNER.is_match(b"python3 -m http.server -d /opt/x.bcm/ 0"));
        assert!(BANNER.is_match(b"Serving HTTP on :: port 8000 (http://[::]:8000/) ..."));
    }
}
