use std::path::Path;

use qq_tickets::sync::{self, ProgressLine};
use qq_tickets::{commands, Config, RemoteSession, Result, TicketId};

/// Copies the ticket's regular files into `dest`.
///
/// Files go through a staging directory on the server, which is removed
/// again whether or not the local pull succeeded.
pub fn handle_copy(config: &Config, host: &str, ticket: &str, dest: &Path) -> Result<()> {
    let ticket = TicketId::new(ticket)?;
    let mut session = RemoteSession::login(config, host)?;

    println!("Attempting to download all non-directory artifacts:");
    let staged = match session.run(&commands::stage_copy(config, &ticket)) {
        Ok(staged) => staged,
        Err(e) => {
            let _ = session.close();
            return Err(e);
        }
    };
    if !staged.text.is_empty() {
        println!("{}", staged.text);
    }
    if !staged.success() {
        tracing::warn!(
            "Staging {} on {} exited with {:?}, pulling what was staged",
            ticket,
            host,
            staged.exit_code
        );
    }

    println!();
    let mut progress = ProgressLine::stdout();
    let pulled = sync::pull(config, host, &ticket, dest, |line| progress.update(line));
    progress.finish();

    // Partial transfers are kept; only the staging copy goes away
    let cleaned = session.execute(&commands::cleanup(&ticket));
    let closed = session.close();

    if let Err(e) = cleaned {
        tracing::warn!("Failed to remove {} on {}: {}", ticket.staging_dir(), host, e);
    }
    pulled?;
    closed
}
