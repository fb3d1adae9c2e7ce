use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::MessagingProvider;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TwilioSmsProvider {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct MessageResource {
    sid: String,
}

impl TwilioSmsProvider {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            account_sid,
            auth_token,
            from_number,
            client,
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_number.is_empty()
    }
}

#[async_trait]
impl MessagingProvider for TwilioSmsProvider {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<String> {
        anyhow::ensure!(self.is_configured(), "Twilio credentials are not configured");

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let resource: MessageResource = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", &self.from_number), ("Body", body)])
            .send()
            .await
            .context("failed to send Twilio SMS")?
            .error_for_status()
            .context("Twilio API returned error")?
            .json()
            .await
            .context("unexpected Twilio response body")?;

        Ok(resource.sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_provider_fails_without_network() {
        let provider = TwilioSmsProvider::new(String::new(), String::new(), String::new()).unwrap();
        assert!(!provider.is_configured());
        let err = provider.send_message("+15550001111", "hi").await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
