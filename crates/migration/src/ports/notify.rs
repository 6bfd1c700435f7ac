//! Outgoing email.

use std::sync::Mutex;

/// A plaintext email, optionally with an HTML alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub bcc: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },
    #[error("message could not be built: {0}")]
    Build(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Fire-and-forget mail transport. Callers log failures and move on.
pub trait Notifier: Send + Sync {
    fn send(&self, email: &Email) -> Result<(), NotifyError>;
}

/// Keeps every message instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Email>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, email: &Email) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
