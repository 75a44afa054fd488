use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Body POSTed to the completion webhook when a learner finishes a bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitCompletionPayload {
    /// Discord id of the learner
    pub user_id: String,
    pub bit_id: String,
    pub bit_title: String,
    /// RFC 3339 timestamp
    pub completed_at: String,
    /// Seconds spent reading
    pub time_spent: u64,
    pub xp_earned: u64,
}

impl BitCompletionPayload {
    pub fn new(
        user_id: &str,
        bit_id: &str,
        bit_title: &str,
        completed_at_ms: i64,
        time_spent: u64,
        xp_earned: u64,
    ) -> Self {
        let completed_at = DateTime::<Utc>::from_timestamp_millis(completed_at_ms)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        Self {
            user_id: user_id.to_string(),
            bit_id: bit_id.to_string(),
            bit_title: bit_title.to_string(),
            completed_at,
            time_spent,
            xp_earned,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Skipped,
}

/// Announces completions to a bot listening on a webhook.
pub struct Notifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn send_completion(
        &self,
        payload: &BitCompletionPayload,
    ) -> Result<Delivery, reqwest::Error> {
        let Some(url) = self.webhook_url.as_deref() else {
            log::debug!("No completion webhook configured, skipping bit {}", payload.bit_id);
            return Ok(Delivery::Skipped);
        };

        self.http
            .post(url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;

        log::info!(
            "Announced completion of bit {} for {}",
            payload.bit_id,
            payload.user_id
        );
        Ok(Delivery::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_rfc3339_and_camel_case() {
        let payload = BitCompletionPayload::new("42", "1", "Understanding CIDR Notation", 0, 90, 10);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["completedAt"], "1970-01-01T00:00:00.000Z");
        assert_eq!(json["userId"], "42");
        assert_eq!(json["xpEarned"], 10);
    }

    #[tokio::test]
    async fn without_url_delivery_is_skipped() {
        let notifier = Notifier::new(None);
        let payload = BitCompletionPayload::new("42", "1", "t", 0, 0, 10);

        assert!(!notifier.is_enabled());
        assert!(matches!(
            notifier.send_completion(&payload).await,
            Ok(Delivery::Skipped)
        ));
    }
}
