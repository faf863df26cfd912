//! Invitation mail collaborator seam
//!
//! Actual SMTP delivery lives outside this crate; what lives here is the
//! contract: a [`Mailer`] takes a recipient, subject, body, and the SMTP
//! settings, and reports success or failure with a message. Delivery
//! failure never aborts the operation that requested it; callers surface
//! it as a warning.

use crate::config::EmailConfig;
use crate::{Error, Result};

/// Email-sending capability, implemented outside this crate
pub trait Mailer: Send + Sync {
    /// Deliver one message. Failures come back as
    /// [`Error::ExternalService`] with a human-readable message.
    fn send(&self, config: &EmailConfig, recipient: &str, subject: &str, body: &str)
        -> Result<()>;
}

/// Mailer that logs instead of delivering. Used in demo mode and tests.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(
        &self,
        _config: &EmailConfig,
        recipient: &str,
        subject: &str,
        _body: &str,
    ) -> Result<()> {
        tracing::info!("Would send '{subject}' to {recipient}");
        Ok(())
    }
}

/// A composed invitation ready for a [`Mailer`]
#[derive(Debug, Clone, PartialEq)]
pub struct Invitation {
    pub subject: String,
    pub body: String,
}

impl Invitation {
    /// Compose the invitation for one participant link
    pub fn compose(session_title: &str, session_description: &str, voting_link: &str) -> Self {
        let subject = format!("Voting Invitation: {session_title}");

        let mut body = format!("You're invited to vote\n\n{session_title}\n");
        if !session_description.is_empty() {
            body.push_str(&format!("\n{session_description}\n"));
        }
        body.push_str(&format!(
            "\nTo vote, copy and paste this link into your browser:\n{voting_link}\n\n\
             This is your personal voting link - don't share it with others.\n"
        ));

        Self { subject, body }
    }
}

/// Structural email validation: `local@domain.tld` with the character
/// classes invitations were historically validated against.
pub fn validate_email(email: &str) -> Result<()> {
    let valid = (|| {
        let (local, domain) = email.split_once('@')?;
        if local.is_empty()
            || !local
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
        {
            return None;
        }

        let (name, tld) = domain.rsplit_once('.')?;
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || ".-".contains(c))
        {
            return None;
        }
        if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(())
    })()
    .is_some();

    if valid {
        Ok(())
    } else {
        Err(Error::validation("email"))
    }
}
