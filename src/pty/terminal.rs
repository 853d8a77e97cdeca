use std::os::unix::io::RawFd;

use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};

use crate::error::{QqError, Result};

/// Set terminal size on a file descriptor
pub fn set_terminal_size(fd: RawFd, cols: u16, rows: u16) -> Result<()> {
    unsafe {
        let winsize = libc::winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        if libc::ioctl(fd, libc::TIOCSWINSZ as _, &winsize) < 0 {
            return Err(QqError::PtyError(format!(
                "Failed to set terminal size: {}",
                std::io::Error::last_os_error()
            )));
        }
    }
    Ok(())
}

/// Put a descriptor into non-blocking mode
pub fn set_nonblocking(fd: RawFd) -> Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL)
        .map_err(|e| QqError::PtyError(format!("Failed to get flags: {}", e)))?;
    fcntl(
        fd,
        FcntlArg::F_SETFL(OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK),
    )
    .map_err(|e| QqError::PtyError(format!("Failed to set non-blocking: {}", e)))?;
    Ok(())
}

/// Keep a descriptor from leaking into spawned children
pub fn set_cloexec(fd: RawFd) -> Result<()> {
    fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
        .map_err(|e| QqError::PtyError(format!("Failed to set close-on-exec: {}", e)))?;
    Ok(())
}
