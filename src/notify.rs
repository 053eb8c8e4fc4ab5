//! Notification dispatcher trait and implementations.

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// HTTP request timeout for a single dispatch attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for notification dispatch failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider rejected the request.
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
}

/// Trait for placing alert calls and sending alert SMS.
///
/// Abstracted to support different providers and tests.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_sms(&self, to: &str, from: &str, body: &str) -> Result<(), DispatchError>;

    async fn place_call(
        &self,
        to: &str,
        from: &str,
        voice_url: &str,
        status_callback_url: Option<&str>,
    ) -> Result<(), DispatchError>;

    /// Whether the dispatcher has working credentials. The engine skips
    /// escalation bookkeeping entirely while this is false.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Dispatcher backed by the Twilio REST API.
pub struct TwilioNotifier {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
}

impl TwilioNotifier {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        }
    }

    async fn post_form(
        &self,
        resource: &str,
        form: &[(&str, &str)],
    ) -> Result<(), DispatchError> {
        let url = format!("{}/Accounts/{}/{}", TWILIO_API_BASE, self.account_sid, resource);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DispatchError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn send_sms(&self, to: &str, from: &str, body: &str) -> Result<(), DispatchError> {
        self.post_form("Messages.json", &[("To", to), ("From", from), ("Body", body)])
            .await
    }

    async fn place_call(
        &self,
        to: &str,
        from: &str,
        voice_url: &str,
        status_callback_url: Option<&str>,
    ) -> Result<(), DispatchError> {
        let mut form = vec![
            ("To", to),
            ("From", from),
            ("Url", voice_url),
            ("MachineDetection", "Enable"),
        ];
        if let Some(callback) = status_callback_url {
            form.push(("StatusCallback", callback));
            form.push(("StatusCallbackEvent", "completed"));
        }
        self.post_form("Calls.json", &form).await
    }
}

/// Stands in when Twilio credentials are missing. Logs what would have been
/// dispatched and reports not-ready so the engine leaves its flags alone.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_sms(&self, to: &str, _from: &str, body: &str) -> Result<(), DispatchError> {
        info!("SMS to {} suppressed, notifier not configured: {}", to, body);
        Ok(())
    }

    async fn place_call(
        &self,
        to: &str,
        _from: &str,
        _voice_url: &str,
        _status_callback_url: Option<&str>,
    ) -> Result<(), DispatchError> {
        info!("Call to {} suppressed, notifier not configured", to);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        false
    }
}
