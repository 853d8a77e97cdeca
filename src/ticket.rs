use std::fmt;
use std::str::FromStr;

use crate::error::{QqError, Result};

/// A support ticket identifier such as `SR12345`.
///
/// Ticket ids end up inside remote shell command lines, so only
/// `[A-Za-z0-9._-]` is accepted and the id may not start with `-` or `.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketId(String);

impl TicketId {
    pub fn new(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(QqError::InvalidTicket("ticket id is empty".to_string()));
        }
        if id.starts_with('-') || id.starts_with('.') {
            return Err(QqError::InvalidTicket(id.to_string()));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(QqError::InvalidTicket(id.to_string()));
        }
        Ok(TicketId(id.to_string()))
    }

    /// Server-side ticket directory, `<root>/<id>.bcm`
    pub fn remote_dir(&self, ticket_root: &str) -> String {
        format!("{}/{}.bcm", ticket_root.trim_end_matches('/'), self.0)
    }

    /// Hidden staging directory under the remote user's home
    pub fn staging_dir(&self) -> String {
        format!("~/.{}.scp", self.0)
    }
}

impl FromStr for TicketId {
    type Err = QqError;

    fn from_str(s: &str) -> Result<Self> {
        TicketId::new(s)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
