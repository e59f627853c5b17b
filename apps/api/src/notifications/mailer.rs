/// Mail relay client. Every caretaker email leaves the service through here.
///
/// Sends are single attempts: a missed-dose email that fails is logged by the
/// caller and dropped, while the in-app notification is kept.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Relay error (status {status}): {message}")]
    Relay { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    message: String,
}

/// JSON-over-HTTP mail relay authenticated with a bearer key.
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(
        api_url: String,
        api_key: String,
        from: String,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let body = RelayRequest {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<RelayErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(MailError::Relay {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Mail relay accepted email to {}", email.to);
        Ok(())
    }
}

/// The caretaker email for one missed dose.
pub struct MissedDoseEmail<'a> {
    pub medication_name: &'a str,
    pub slot_label: Option<&'a str>,
    pub occurred_at: &'a str,
}

/// `" (Morning)"`, or nothing when the dose has no slot.
pub fn slot_suffix(slot_label: Option<&str>) -> String {
    slot_label.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl MissedDoseEmail<'_> {
    pub fn subject(&self) -> String {
        format!(
            "Medication Missed: {}{}",
            self.medication_name,
            slot_suffix(self.slot_label)
        )
    }

    pub fn html(&self) -> String {
        format!(
            "<h2>Medication Reminder Alert</h2>\
             <p>The medication <strong>{name}</strong>{slot} was not marked as taken.</p>\
             <p>Time: {at}</p>\
             <p>Please check in with the patient.</p>",
            name = escape_html(self.medication_name),
            slot = escape_html(&slot_suffix(self.slot_label)),
            at = escape_html(self.occurred_at),
        )
    }

    pub fn to(&self, recipient: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: recipient.to_string(),
            subject: self.subject(),
            html: self.html(),
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every send; fails them all when `failing` is set.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutgoingEmail>>,
        pub failing: bool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Self::default()
            }
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
            if self.failing {
                return Err(MailError::Relay {
                    status: 503,
                    message: "relay down".into(),
                });
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }
}
