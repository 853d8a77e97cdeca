//! Pattern waiting on top of a PTY child, in the style of `expect`.

use std::time::{Duration, Instant};

use regex::bytes::Regex;

use crate::error::{QqError, Result};
use crate::pty::{PtyProcess, ReadOutcome, DEFAULT_BUFFER_SIZE};

/// What [`Expecter::expect`] found
#[derive(Debug, Clone)]
pub struct Found {
    /// Index into the pattern slice of the pattern that matched
    pub index: usize,
    /// Output received before the match
    pub before: Vec<u8>,
    pub matched: Vec<u8>,
}

impl Found {
    pub fn before_text(&self) -> String {
        String::from_utf8_lossy(&self.before).into_owned()
    }

    pub fn matched_text(&self) -> String {
        String::from_utf8_lossy(&self.matched).into_owned()
    }
}

pub struct Expecter {
    pty: PtyProcess,
    buffer: Vec<u8>,
    eof: bool,
}

impl Expecter {
    pub fn new(pty: PtyProcess) -> Self {
        Self {
            pty,
            buffer: Vec::new(),
            eof: false,
        }
    }

    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.eof {
            return Err(QqError::ConnectionLost(
                "remote session already closed".to_string(),
            ));
        }
        self.pty.io().write_to_pty(data)?;
        Ok(())
    }

    pub fn send_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.send(&data)
    }

    pub fn send_interrupt(&mut self) -> Result<()> {
        if self.eof {
            return Err(QqError::ConnectionLost(
                "remote session already closed".to_string(),
            ));
        }
        self.pty.io().send_interrupt()?;
        Ok(())
    }

    /// Earliest match of any pattern in the buffered output
    fn find(&self, patterns: &[&Regex]) -> Option<(usize, usize, usize)> {
        patterns
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.find(&self.buffer).map(|m| (i, m.start(), m.end())))
            .min_by_key(|&(_, start, _)| start)
    }

    /// Read once, waiting at most `wait`. Returns false on EOF.
    fn fill(&mut self, wait: Option<Duration>) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let mut chunk = [0u8; DEFAULT_BUFFER_SIZE];
        match self.pty.io().read_from_pty(&mut chunk, wait)? {
            ReadOutcome::Data(n) => {
                tracing::trace!(
                    "pty read: {:?}",
                    String::from_utf8_lossy(&chunk[..n])
                );
                self.buffer.extend_from_slice(&chunk[..n]);
            }
            ReadOutcome::Pending => {}
            ReadOutcome::Eof => self.eof = true,
        }
        Ok(!self.eof)
    }

    /// Block until one of `patterns` shows up in the output.
    ///
    /// Output up to the end of the match is consumed. EOF before a match
    /// yields [`QqError::ConnectionLost`] carrying whatever was received.
    pub fn expect(&mut self, patterns: &[&Regex], timeout: Option<Duration>) -> Result<Found> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if let Some((index, start, end)) = self.find(patterns) {
                let matched = self.buffer[start..end].to_vec();
                let before = self.buffer[..start].to_vec();
                self.buffer.drain(..end);
                return Ok(Found {
                    index,
                    before,
                    matched,
                });
            }

            if self.eof {
                let output = String::from_utf8_lossy(&self.buffer).into_owned();
                self.buffer.clear();
                return Err(QqError::ConnectionLost(output));
            }

            let wait = match (deadline, timeout) {
                (Some(deadline), Some(timeout)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(QqError::Timeout(timeout));
                    }
                    Some(deadline - now)
                }
                _ => None,
            };

            self.fill(wait)?;
        }
    }

    /// Throw away output nobody waited for, such as a second prompt after Ctrl+C.
    pub fn discard_pending(&mut self) -> Result<()> {
        while self.fill(Some(Duration::ZERO))? {
            if self.buffer.is_empty() {
                break;
            }
            tracing::trace!("discarding {:?}", String::from_utf8_lossy(&self.buffer));
            self.buffer.clear();
        }
        self.buffer.clear();
        Ok(())
    }

    /// Wait for the child to close the terminal. Returns true on EOF.
    pub fn wait_eof(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        while !self.eof {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            self.fill(Some(deadline - now))?;
            self.buffer.clear();
        }
        Ok(true)
    }

    pub fn pty_mut(&mut self) -> &mut PtyProcess {
        &mut self.pty
    }
}
