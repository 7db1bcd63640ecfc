use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::warn;

use crate::config::Config;

/// Whether a message actually went out. `Skipped` means SMTP is not
/// configured for this deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Skipped,
}

#[derive(Clone)]
pub struct EmailService {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
}

impl EmailService {
    pub fn from_config(config: &Config) -> EmailService {
        let transport = match (
            config.smtp_host.as_deref(),
            config.smtp_username.as_deref(),
            config.smtp_password.as_deref(),
        ) {
            (Some(host), Some(username), Some(password)) => {
                match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host) {
                    Ok(builder) => Some(
                        builder
                            .port(config.smtp_port)
                            .credentials(Credentials::new(
                                username.to_string(),
                                password.to_string(),
                            ))
                            .build(),
                    ),
                    Err(err) => {
                        warn!("Invalid SMTP relay configuration: {}", err);
                        None
                    }
                }
            }
            _ => None,
        };

        if transport.is_none() {
            warn!("SMTP not configured, outgoing email is disabled");
        }

        EmailService {
            transport,
            from: config
                .smtp_from
                .clone()
                .unwrap_or_else(|| "no-reply@verifiedtutors.lk".to_string()),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<SendOutcome, String> {
        let transport = match &self.transport {
            Some(transport) => transport,
            None => return Ok(SendOutcome::Skipped),
        };

        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| format!("Invalid sender address: {}", e))?,
            )
            .to(to
                .parse()
                .map_err(|e| format!("Invalid recipient address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| format!("Failed to build email: {}", e))?;

        transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {}", e))?;

        Ok(SendOutcome::Sent)
    }
}
