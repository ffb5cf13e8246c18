//! Gotify push notifications

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::Notifier;
use crate::error::{BackupError, Result};

/// Request timeout for every message
pub const GOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

const FAILURE_PRIORITY: u8 = 8;
const SUCCESS_PRIORITY: u8 = 2;

/// `notifiers.gotify` section of the settings file
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct GotifySettings {
    #[serde(default)]
    pub gotify_key: String,
    #[serde(default)]
    pub message_title: String,
    #[serde(default)]
    pub url: String,
}

impl GotifySettings {
    /// Check that every field is filled in
    pub fn validate(&self) -> Result<()> {
        if self.gotify_key.is_empty() {
            return Err(BackupError::notifier("gotify_key not configured"));
        }
        if self.message_title.is_empty() {
            return Err(BackupError::notifier("message_title not configured"));
        }
        if self.url.is_empty() {
            return Err(BackupError::notifier("url not configured"));
        }
        Ok(())
    }
}

/// JSON body posted to `<url>/message`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GotifyMessage {
    pub message: String,
    pub priority: u8,
    pub title: String,
}

pub struct Gotify {
    settings: GotifySettings,
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl Gotify {
    /// Build from the raw settings value
    pub fn from_settings(value: &Value) -> Result<Self> {
        let settings: GotifySettings = match value {
            Value::Null => GotifySettings::default(),
            other => serde_yaml::from_value(other.clone())?,
        };
        Self::new(settings)
    }

    pub fn new(settings: GotifySettings) -> Result<Self> {
        settings.validate()?;

        let client = reqwest::blocking::Client::builder()
            .timeout(GOTIFY_TIMEOUT)
            .build()
            .map_err(|e| BackupError::notifier(format!("gotify: {}", e)))?;

        Ok(Self {
            endpoint: format!("{}/message", settings.url.trim_end_matches('/')),
            settings,
            client,
        })
    }

    /// URL messages are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn failure_message(&self, msg: &str) -> GotifyMessage {
        GotifyMessage {
            message: msg.to_string(),
            priority: FAILURE_PRIORITY,
            title: format!("{}: Failed", self.settings.message_title),
        }
    }

    pub fn success_message(&self, msg: &str) -> GotifyMessage {
        GotifyMessage {
            message: msg.to_string(),
            priority: SUCCESS_PRIORITY,
            title: format!("{}: Success", self.settings.message_title),
        }
    }

    fn send(&self, payload: &GotifyMessage) {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Gotify-Key", &self.settings.gotify_key)
            .json(payload)
            .send();

        match response {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!("gotify: delivered '{}'", payload.title);
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().unwrap_or_default();
                tracing::error!("gotify: {}: {}", status.as_u16(), body);
            }
            Err(e) => {
                tracing::error!("gotify: {}", e);
            }
        }
    }
}

impl Notifier for Gotify {
    fn name(&self) -> &str {
        "gotify"
    }

    fn info(&self, _msg: &str) {}

    fn success(&self, msg: &str) {
        self.send(&self.success_message(msg));
    }

    fn failure(&self, msg: &str) {
        self.send(&self.failure_message(msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_validation_messages() {
        let err = |yaml: &str| Gotify::from_settings(&settings(yaml)).err().map(|e| e.to_string());

        assert_eq!(
            err("{message_title: t, url: http://x}"),
            Some("Notifier error: gotify_key not configured".to_string())
        );
        assert_eq!(
            err("{gotify_key: k, url: http://x}"),
            Some("Notifier error: message_title not configured".to_string())
        );
        assert_eq!(
            err("{gotify_key: k, message_title: t}"),
            Some("Notifier error: url not configured".to_string())
        );
        assert_eq!(
            Gotify::from_settings(&Value::Null).err().map(|e| e.to_string()),
            Some("Notifier error: gotify_key not configured".to_string())
        );
    }

    #[test]
    fn test_messages() {
        let config = settings("{gotify_key: k, message_title: nas, url: 'http://g/'}");
        let gotify = Gotify::from_settings(&config).unwrap();
        assert_eq!(gotify.endpoint(), "http://g/message");

        assert_eq!(
            gotify.failure_message("web: stop (docker): Failed: docker stop web"),
            GotifyMessage {
                message: "web: stop (docker): Failed: docker stop web".to_string(),
                priority: 8,
                title: "nas: Failed".to_string(),
            }
        );

        let json = serde_json::to_value(gotify.success_message("ok")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "ok", "priority": 2, "title": "nas: Success"})
        );
    }
}
