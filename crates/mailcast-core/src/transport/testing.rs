//! Scripted transport for tests

use super::{MailTransport, TransportError};
use async_trait::async_trait;
use mailcast_storage::models::{EmailContact, SmtpSettings};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// One recorded send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub email: String,
    pub name: String,
    pub subject: String,
    pub html: String,
}

/// Rendezvous used to hold a run in the middle of its recipient list
#[derive(Debug, Default)]
pub struct SendGate {
    reached: Notify,
    resume: Notify,
}

impl SendGate {
    /// Wait until the transport is holding
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let the held send return
    pub fn release(&self) {
        self.resume.notify_one();
    }
}

/// Transport whose outcome per recipient is fixed up front
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    failures: HashMap<String, String>,
    verify_error: Option<String>,
    hold_after: Option<usize>,
    gate: Arc<SendGate>,
    attempts: Mutex<Vec<Attempt>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send to `email` with `reason`
    pub fn fail_for(mut self, email: &str, reason: &str) -> Self {
        self.failures.insert(email.to_string(), reason.to_string());
        self
    }

    /// Fail `verify` with `reason`
    pub fn fail_verify(mut self, reason: &str) -> Self {
        self.verify_error = Some(reason.to_string());
        self
    }

    /// Hold the `n`th send attempt until the gate is released
    pub fn hold_after(mut self, n: usize) -> Self {
        self.hold_after = Some(n);
        self
    }

    pub fn gate(&self) -> Arc<SendGate> {
        Arc::clone(&self.gate)
    }

    /// Every attempt so far, in order
    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recipient addresses attempted so far, in order
    pub fn attempted_emails(&self) -> Vec<String> {
        self.attempts().into_iter().map(|a| a.email).collect()
    }
}

#[async_trait]
impl MailTransport for ScriptedTransport {
    async fn verify(&self, _settings: &SmtpSettings) -> Result<(), TransportError> {
        match &self.verify_error {
            Some(reason) => Err(TransportError::Connect(reason.clone())),
            None => Ok(()),
        }
    }

    async fn send(
        &self,
        recipient: &EmailContact,
        subject: &str,
        html: &str,
        _settings: &SmtpSettings,
    ) -> Result<(), TransportError> {
        let count = {
            let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
            attempts.push(Attempt {
                email: recipient.email.clone(),
                name: recipient.name.clone(),
                subject: subject.to_string(),
                html: html.to_string(),
            });
            attempts.len()
        };

        if self.hold_after == Some(count) {
            self.gate.reached.notify_one();
            self.gate.resume.notified().await;
        }

        match self.failures.get(&recipient.email) {
            Some(reason) => Err(TransportError::Delivery(reason.clone())),
            None => Ok(()),
        }
    }
}
