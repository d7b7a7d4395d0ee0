//! Alert delivery.
//!
//! Delivery is best effort: callers log a failed [`Notifier::send`] and carry
//! on, a lost alert never rolls back a state transition.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use crate::aircraft::Fleet;
use crate::config::NotifyConfig;
use crate::error::{Error, Result};

/// Default Telegram Bot API endpoint.
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

const TELEGRAM_TIMEOUT: Duration = Duration::from_secs(10);

/// A sink for human-readable alerts.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Short name of the channel, for logs and status output.
    fn name(&self) -> &'static str;

    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Notify`] if the message could not be delivered.
    async fn send(&self, text: &str) -> Result<()>;
}

/// Posts alerts to a Telegram chat through the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Create a notifier for the given bot and chat.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self> {
        Self::with_api_url(TELEGRAM_API_URL, token, chat_id)
    }

    /// Create a notifier against a custom API endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_api_url(
        api_url: &str,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(TELEGRAM_TIMEOUT)
            .build()
            .map_err(|e| Error::notify(e.to_string()))?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.token)
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint())
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .await
            // The URL embeds the bot token; keep it out of the error text.
            .map_err(|e| Error::notify(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::notify(format!("telegram answered with status {status}")));
        }
        debug!("Delivered alert to chat {}", self.chat_id);
        Ok(())
    }
}

/// Writes alerts to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, text: &str) -> Result<()> {
        info!("Alert: {}", text.replace('\n', " | "));
        Ok(())
    }
}

/// Build the notifier described by the configuration.
///
/// Falls back to [`LogNotifier`] when the token or chat id is missing.
///
/// # Errors
///
/// Returns an error if the Telegram client cannot be built.
pub fn from_config(config: &NotifyConfig) -> Result<Arc<dyn Notifier>> {
    match (&config.telegram_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
            Ok(Arc::new(TelegramNotifier::new(token, chat_id)?))
        }
        _ => {
            debug!("Telegram not configured, alerts will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// The message sent by `notify-test`.
#[must_use]
pub fn self_test_message(fleet: &Fleet) -> String {
    let mut text = String::from("🧪 flightwatch test message\nWatching:");
    for aircraft in fleet.aircraft() {
        text.push_str(&format!("\n• {} ({})", aircraft.registration, aircraft.icao24));
    }
    text
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::aircraft::TrackedAircraft;

    /// Keeps every message it is asked to send.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingNotifier {
        pub sent: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub(crate) fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(Error::notify("chat unreachable"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_from_config_without_telegram_logs() {
        let notifier = from_config(&NotifyConfig::default()).unwrap();
        assert_eq!(notifier.name(), "log");
    }

    #[test]
    fn test_from_config_requires_both_fields() {
        let config = NotifyConfig {
            telegram_token: Some("123:abc".to_string()),
            telegram_chat_id: None,
        };
        assert_eq!(from_config(&config).unwrap().name(), "log");
    }

    #[test]
    fn test_from_config_with_telegram() {
        let config = NotifyConfig {
            telegram_token: Some("123:abc".to_string()),
            telegram_chat_id: Some("-100200".to_string()),
        };
        assert_eq!(from_config(&config).unwrap().name(), "telegram");
    }

    #[test]
    fn test_telegram_endpoint() {
        let notifier =
            TelegramNotifier::with_api_url("http://localhost:9/", "123:abc", "42").unwrap();
        assert_eq!(notifier.endpoint(), "http://localhost:9/bot123:abc/sendMessage");
    }

    #[tokio::test]
    async fn test_telegram_unreachable_is_notify_error() {
        let notifier =
            TelegramNotifier::with_api_url("http://127.0.0.1:9", "123:abc", "42").unwrap();
        let err = notifier.send("hello").await.unwrap_err();
        assert!(matches!(err, Error::Notify(_)));
        assert!(!err.to_string().contains("123:abc"));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.send("line one\nline two").await.is_ok());
    }

    #[test]
    fn test_self_test_message_lists_fleet() {
        let fleet = Fleet::new(vec![
            TrackedAircraft::new("e0659a", "LV-FVZ"),
            TrackedAircraft::new("e02c3f", "LV-CCO"),
        ]);
        let text = self_test_message(&fleet);
        assert!(text.contains("LV-FVZ (e0659a)"));
        assert!(text.contains("LV-CCO (e02c3f)"));
    }
}
