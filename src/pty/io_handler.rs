use std::io;
use std::os::unix::io::{BorrowedFd, RawFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

/// Read buffer size for PTY output
pub const DEFAULT_BUFFER_SIZE: usize = 16384;

/// Result of a single bounded read from the PTY master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(usize),
    /// Nothing arrived before the wait ran out
    Pending,
    /// The child side is gone
    Eof,
}

/// Raw reads and writes on a PTY master file descriptor
pub struct PtyIoHandler {
    master_fd: RawFd,
}

impl PtyIoHandler {
    pub fn new(master_fd: RawFd) -> Self {
        Self { master_fd }
    }

    /// Waits longer than `u16::MAX` ms are cut short; callers loop on `Pending`.
    fn poll(&self, events: PollFlags, wait: Option<Duration>) -> io::Result<bool> {
        let timeout = match wait {
            Some(d) => PollTimeout::from(d.as_millis().min(u16::MAX as u128) as u16),
            None => PollTimeout::NONE,
        };
        // SAFETY: the descriptor belongs to the PtyProcess that handed out this handler
        let fd = unsafe { BorrowedFd::borrow_raw(self.master_fd) };
        let mut fds = [PollFd::new(fd, events)];

        match poll(&mut fds, timeout) {
            Ok(ready) => Ok(ready > 0),
            // A signal (Ctrl+C) woke us up; let the caller look at its flags
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(io::Error::from(e)),
        }
    }

    /// Wait up to `wait` for output and read what is available.
    ///
    /// `None` blocks until data or EOF.
    pub fn read_from_pty(&self, buffer: &mut [u8], wait: Option<Duration>) -> io::Result<ReadOutcome> {
        if !self.poll(PollFlags::POLLIN, wait)? {
            return Ok(ReadOutcome::Pending);
        }

        let result = unsafe {
            libc::read(
                self.master_fd,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
            )
        };

        if result < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(ReadOutcome::Pending),
                // Linux reports a hung-up slave as EIO
                _ if err.raw_os_error() == Some(libc::EIO) => Ok(ReadOutcome::Eof),
                _ => Err(err),
            };
        }

        if result == 0 {
            Ok(ReadOutcome::Eof)
        } else {
            Ok(ReadOutcome::Data(result as usize))
        }
    }

    /// Write to PTY master file descriptor
    pub fn write_to_pty(&self, data: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < data.len() {
            let result = unsafe {
                libc::write(
                    self.master_fd,
                    data[written..].as_ptr() as *const libc::c_void,
                    data.len() - written,
                )
            };

            if result < 0 {
                let err = io::Error::last_os_error();
                match err.kind() {
                    io::ErrorKind::Interrupted => continue,
                    io::ErrorKind::WouldBlock => {
                        self.poll(PollFlags::POLLOUT, Some(Duration::from_millis(100)))?;
                        continue;
                    }
                    _ => return Err(err),
                }
            }

            written += result as usize;
        }
        Ok(())
    }

    /// Send Ctrl+C to the foreground job
    pub fn send_interrupt(&self) -> io::Result<()> {
        self.write_to_pty(&[0x03])
    }
}
