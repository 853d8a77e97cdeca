use qq_tickets::setup::{check_prerequisites, ensure_prerequisites};
use qq_tickets::{Config, Result};

/// Reports whether the local tools qq relies on are available
pub fn handle_check(config: &Config) -> Result<()> {
    let checks = check_prerequisites(config);
    for check in &checks {
        let mark = if check.ok { "ok" } else { "MISSING" };
        println!("{:<8} {:<12} {}", mark, check.name, check.detail);
    }
    ensure_prerequisites(&checks)
}
