use log::warn;

use crate::config::Config;
use crate::email::SendOutcome;

#[derive(Clone)]
struct TwilioCredentials {
    account_sid: String,
    auth_token: String,
    from_number: String,
}

/// Twilio-backed SMS delivery. Deployments without Twilio credentials get a
/// no-op service that reports `Skipped`.
#[derive(Clone)]
pub struct SmsService {
    client: reqwest::Client,
    credentials: Option<TwilioCredentials>,
}

impl SmsService {
    pub fn from_config(config: &Config, client: reqwest::Client) -> SmsService {
        let credentials = match (
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_from_number.clone(),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioCredentials {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        if credentials.is_none() {
            warn!("Twilio not configured, outgoing SMS is disabled");
        }

        SmsService {
            client,
            credentials,
        }
    }

    pub async fn send(&self, to: &str, body: &str) -> Result<SendOutcome, String> {
        let credentials = match &self.credentials {
            Some(credentials) => credentials,
            None => return Ok(SendOutcome::Skipped),
        };

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            credentials.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&credentials.account_sid, Some(&credentials.auth_token))
            .form(&[
                ("To", to),
                ("From", credentials.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|e| format!("Failed to reach Twilio: {}", e))?;

        if !response.status().is_success() {
            return Err(format!(
                "Twilio rejected the message with status {}",
                response.status()
            ));
        }

        Ok(SendOutcome::Sent)
    }
}
