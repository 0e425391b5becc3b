use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::{BookingEvent, NotificationSink};

/// Posts each event as JSON to a configured admin endpoint, with an
/// HMAC-SHA1 signature of the body so the receiver can verify origin.
pub struct WebhookSink {
    url: String,
    secret: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: String, secret: String) -> Self {
        Self {
            url,
            secret,
            client: reqwest::Client::new(),
        }
    }

    fn sign(&self, body: &str) -> anyhow::Result<String> {
        let mut mac = Hmac::<Sha1>::new_from_slice(self.secret.as_bytes())
            .context("invalid webhook secret")?;
        mac.update(body.as_bytes());
        let result = mac.finalize().into_bytes();
        Ok(base64::engine::general_purpose::STANDARD.encode(result))
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn publish(&self, event: &BookingEvent) -> anyhow::Result<()> {
        let body = serde_json::to_string(event).context("failed to serialize event")?;
        let signature = self.sign(&body)?;

        self.client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Signature", signature)
            .body(body)
            .send()
            .await
            .context("failed to post webhook")?
            .error_for_status()
            .context("webhook endpoint returned error")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic() {
        let sink = WebhookSink::new("http://example.invalid".to_string(), "secret".to_string());
        let a = sink.sign("payload").unwrap();
        let b = sink.sign("payload").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, sink.sign("other").unwrap());
    }
}
