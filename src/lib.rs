pub mod commands;
pub mod config;
pub mod error;
pub mod expect;
pub mod output;
pub mod pty;
pub mod serve;
pub mod session;
pub mod setup;
pub mod sync;
pub mod ticket;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use error::{QqError, Result};
pub use pty::PtyProcess;
pub use serve::RemoteHttpServer;
pub use session::{CommandOutput, RemoteSession};
pub use ticket::TicketId;
