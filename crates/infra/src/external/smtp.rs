//! SMTP mail transport.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, instrument};

use padmigrate_migration::ports::{Email, Notifier, NotifyError};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Upgrade the connection with STARTTLS before authenticating
    pub starttls: bool,
    pub timeout: Duration,
}

impl SmtpConfig {
    fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                Some(Credentials::new(username.clone(), password.clone()))
            }
            _ => None,
        }
    }

    /// STARTTLS is used when asked for, and always before authenticating.
    pub fn uses_starttls(&self) -> bool {
        self.starttls || self.credentials().is_some()
    }
}

pub struct SmtpNotifier {
    transport: SmtpTransport,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let mut builder = if config.uses_starttls() {
            SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| NotifyError::Transport(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port).timeout(Some(config.timeout));

        if let Some(credentials) = config.credentials() {
            builder = builder.credentials(credentials);
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Build the MIME message for `email`: plaintext, or
/// multipart/alternative when an HTML part is present.
pub fn build_message(email: &Email) -> Result<Message, NotifyError> {
    let mut builder = Message::builder()
        .from(mailbox(&email.from)?)
        .to(mailbox(&email.to)?)
        .subject(email.subject.clone());
    if let Some(bcc) = &email.bcc {
        builder = builder.bcc(mailbox(bcc)?);
    }

    let message = match &email.html {
        Some(html) => builder.multipart(MultiPart::alternative_plain_html(
            email.text.clone(),
            html.clone(),
        )),
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.text.clone()),
    };
    message.map_err(|e| NotifyError::Build(e.to_string()))
}

impl Notifier for SmtpNotifier {
    #[instrument(skip_all, fields(to = %email.to, subject = %email.subject), err)]
    fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let message = build_message(email)?;
        self.transport
            .send(&message)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        debug!("mail handed to relay");
        Ok(())
    }
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier").finish_non_exhaustive()
    }
}
