use qq_tickets::{commands, Config, RemoteSession, Result, TicketId};

/// Prints the ticket directory listing
pub fn handle_list(config: &Config, host: &str, ticket: &str) -> Result<()> {
    let ticket = TicketId::new(ticket)?;
    let mut session = RemoteSession::login(config, host)?;

    let listed = session.run(&commands::listing(config, &ticket));
    let closed = session.close();
    let output = listed?;

    if !output.text.is_empty() {
        println!("{}", output.text);
    }
    if !output.success() {
        tracing::warn!(
            "Listing {} on {} exited with {:?}",
            ticket,
            host,
            output.exit_code
        );
    }
    closed
}
