// PTY process management module
mod io_handler;
mod spawn;
mod terminal;


pub use io_handler::{PtyIoHandler, ReadOutcome, DEFAULT_BUFFER_SIZE};
pub use spawn::PtyProcess;
