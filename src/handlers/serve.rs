use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use qq_tickets::output::parse_interface_address;
use qq_tickets::{commands, Config, QqError, RemoteHttpServer, RemoteSession, Result, TicketId};

/// Serves the ticket directory over HTTP from the script server and opens
/// it in the local browser until Ctrl+C.
pub fn handle_serve(config: &Config, host: &str, ticket: &str) -> Result<()> {
    let ticket = TicketId::new(ticket)?;
    let mut session = RemoteSession::login(config, host)?;

    let served = serve_ticket(&mut session, config, &ticket);
    let closed = session.close();
    served?;
    closed
}

fn serve_ticket(session: &mut RemoteSession, config: &Config, ticket: &TicketId) -> Result<()> {
    let ip_output = session.execute(&commands::address_query(&config.interface))?;
    let address = parse_interface_address(&ip_output, &config.interface)?;

    // Handle Ctrl+C
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| QqError::SignalError(format!("Failed to set signal handler: {}", e)))?;

    let mut server = RemoteHttpServer::start(session, config, ticket, address)?;
    let url = server.url();

    println!("HTTP server is running at {}. Press Ctrl+C to stop.", url);
    if let Err(e) = open::that(&url) {
        tracing::warn!("Could not open a browser for {}: {}", url, e);
    }

    server.serve_until(&stop)?;

    println!("\nStopping HTTP server...");
    server.stop()
}
