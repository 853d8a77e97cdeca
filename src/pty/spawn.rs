use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use nix::fcntl::{open, OFlag};
use nix::pty::{grantpt, posix_openpt, unlockpt, PtyMaster};
use nix::sys::signal::{kill, Signal};
use nix::sys::stat::Mode;
use nix::unistd::{setsid, Pid};

use super::io_handler::PtyIoHandler;
use super::terminal::{set_cloexec, set_nonblocking, set_terminal_size};
use crate::error::{QqError, Result};

#[cfg(any(target_os = "linux", target_os = "android"))]
fn slave_name(master: &PtyMaster) -> nix::Result<String> {
    nix::pty::ptsname_r(master)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn slave_name(master: &PtyMaster) -> nix::Result<String> {
    // SAFETY: ptsname's static buffer is copied into the returned String at once
    unsafe { nix::pty::ptsname(master) }
}

/// A child process running on the slave side of a fresh PTY
pub struct PtyProcess {
    master: OwnedFd,
    child: Child,
}

impl PtyProcess {
    /// Open a new PTY pair (master and slave)
    fn open_pty() -> Result<(OwnedFd, OwnedFd)> {
        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY)
            .map_err(|e| QqError::PtyError(format!("Failed to open PTY master: {}", e)))?;
        grantpt(&master)
            .map_err(|e| QqError::PtyError(format!("Failed to grant PTY access: {}", e)))?;
        unlockpt(&master)
            .map_err(|e| QqError::PtyError(format!("Failed to unlock PTY: {}", e)))?;

        let slave_name = slave_name(&master)
            .map_err(|e| QqError::PtyError(format!("Failed to get PTY slave name: {}", e)))?;
        let slave_fd = open(
            slave_name.as_str(),
            OFlag::O_RDWR | OFlag::O_NOCTTY,
            Mode::empty(),
        )
        .map_err(|e| QqError::PtyError(format!("Failed to open PTY slave: {}", e)))?;

        // SAFETY: both descriptors were just opened here and have no other owner
        let (master, slave) = unsafe {
            (
                OwnedFd::from_raw_fd(master.into_raw_fd()),
                OwnedFd::from_raw_fd(slave_fd),
            )
        };

        set_cloexec(master.as_raw_fd())?;
        set_cloexec(slave.as_raw_fd())?;

        Ok((master, slave))
    }

    /// Spawn `program` with the PTY slave as its controlling terminal.
    pub fn spawn(program: &str, args: &[String], cols: u16, rows: u16) -> Result<Self> {
        let (master, slave) = Self::open_pty()?;

        set_terminal_size(slave.as_raw_fd(), cols, rows)?;
        set_nonblocking(master.as_raw_fd())?;

        let mut command = Command::new(program);
        command
            .args(args)
            .env("TERM", "dumb")
            .stdin(Stdio::from(slave.try_clone()?))
            .stdout(Stdio::from(slave.try_clone()?))
            .stderr(Stdio::from(slave));

        // Runs in the child between fork and exec: only async-signal-safe calls
        unsafe {
            command.pre_exec(|| {
                setsid()?;
                if libc::ioctl(0, libc::TIOCSCTTY as _, 0) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = command
            .spawn()
            .map_err(|e| QqError::ProcessError(format!("Failed to spawn {}: {}", program, e)))?;

        tracing::debug!(program, pid = child.id(), "spawned child on pty");

        Ok(PtyProcess { master, child })
    }

    pub fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    pub fn io(&self) -> PtyIoHandler {
        PtyIoHandler::new(self.master.as_raw_fd())
    }

    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Hang up on the child and reap it, killing it if it lingers past `grace`.
    pub fn terminate(&mut self, grace: Duration) -> Result<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            return Ok(status);
        }

        kill(self.pid(), Signal::SIGHUP)
            .map_err(|e| QqError::ProcessError(format!("Failed to signal process: {}", e)))?;

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            thread::sleep(Duration::from_millis(20));
        }

        // Force kill if still alive
        tracing::debug!(pid = self.child.id(), "child ignored SIGHUP, killing");
        let _ = self.child.kill();
        Ok(self.child.wait()?)
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.terminate(Duration::from_millis(500));
        }
    }
}
