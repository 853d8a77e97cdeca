//! Local rsync pull of a staged ticket directory.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;

use crate::commands;
use crate::config::Config;
use crate::error::{QqError, Result};
use crate::ticket::TicketId;

/// Pull `~/.<ticket>.scp/*` from `host` into `dest`, reporting progress
/// records as they arrive. Files already transferred stay on failure.
pub fn pull(
    config: &Config,
    host: &str,
    ticket: &TicketId,
    dest: &Path,
    on_progress: impl FnMut(&str),
) -> Result<()> {
    let ssh_config = config.resolved_ssh_config()?;
    let args = commands::local_pull_args(ssh_config.as_deref(), host, ticket, dest)?;
    tracing::debug!("{} {}", config.rsync_program, args.join(" "));

    let mut command = Command::new(&config.rsync_program);
    command.args(&args);
    run_with_progress(command, on_progress)
}

/// rsync redraws its progress with carriage returns; those count as records.
pub fn is_progress(record: &str) -> bool {
    record.contains('%')
}

/// Run `command`, feeding every progress record on stdout to `on_progress`.
pub fn run_with_progress(mut command: Command, mut on_progress: impl FnMut(&str)) -> Result<()> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| QqError::ProcessError(format!("Failed to start rsync: {}", e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| QqError::ProcessError("rsync stdout not captured".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| QqError::ProcessError("rsync stderr not captured".to_string()))?;

    let stderr_reader = thread::spawn(move || {
        let mut text = String::new();
        let _ = stderr.read_to_string(&mut text);
        text
    });

    let mut reader = BufReader::new(stdout);
    let mut record = Vec::new();
    while read_record(&mut reader, &mut record)? {
        let line = String::from_utf8_lossy(&record);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_progress(line) {
            on_progress(line);
        } else {
            tracing::debug!(target: "qq::rsync", "{}", line);
        }
    }

    let status = child.wait()?;
    let stderr = stderr_reader.join().unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(QqError::SyncFailed {
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}

/// Read up to the next `\r` or `\n`. Returns false at end of input.
fn read_record(reader: &mut impl BufRead, record: &mut Vec<u8>) -> io::Result<bool> {
    record.clear();
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(!record.is_empty());
        }
        match available.iter().position(|&b| b == b'\r' || b == b'\n') {
            Some(pos) => {
                record.extend_from_slice(&available[..pos]);
                reader.consume(pos + 1);
                return Ok(true);
            }
            None => {
                let n = available.len();
                record.extend_from_slice(available);
                reader.consume(n);
            }
        }
    }
}

/// A single terminal line that is rewritten in place
pub struct ProgressLine<W: Write> {
    out: W,
    drawn: bool,
}

impl ProgressLine<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ProgressLine<W> {
    pub fn new(out: W) -> Self {
        Self { out, drawn: false }
    }

    pub fn update(&mut self, text: &str) {
        let _ = self
            .out
            .queue(MoveToColumn(0))
            .and_then(|o| o.queue(Clear(ClearType::CurrentLine)))
            .and_then(|o| o.queue(Print(text)));
        let _ = self.out.flush();
        self.drawn = true;
    }

    /// Move past the progress line, if anything was drawn
    pub fn finish(&mut self) {
        if self.drawn {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
            self.drawn = false;
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
