//! Forwarding finished drafts to the record keeping webhook.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::constants::{ERROR_BODY_LOG_CHARS, SINK_REPLY_DISPLAY_CHARS, truncate_for_log};
use crate::pipeline::CaptionDraft;
use crate::prompt::draft_field_name;

/// Review state of a submission. The webhook owns every transition.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum ReviewStatus {
    /// Nobody looked at it yet
    #[default]
    #[serde(rename = "未確認")]
    Unconfirmed,
    /// Approved for posting
    #[serde(rename = "確認済")]
    Confirmed,
    /// Turned down
    #[serde(rename = "却下")]
    Rejected,
}

/// Everything the webhook receives for one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubmissionRecord {
    filename: String,
    space_type: String,
    tone: String,
    image_base64: Option<String>,
    drafts: Vec<CaptionDraft>,
    review_status: ReviewStatus,
}

impl SubmissionRecord {
    /// New records always start out [`ReviewStatus::Unconfirmed`].
    pub fn new(
        filename: &str,
        space_type: &str,
        tone: &str,
        drafts: Vec<CaptionDraft>,
        image_base64: Option<String>,
    ) -> Self {
        Self {
            filename: filename.to_string(),
            space_type: space_type.to_string(),
            tone: tone.to_string(),
            image_base64,
            drafts,
            review_status: ReviewStatus::Unconfirmed,
        }
    }

    /// Drafts in variant order.
    pub fn drafts(&self) -> &[CaptionDraft] {
        &self.drafts
    }

    /// Current review status.
    pub fn review_status(&self) -> ReviewStatus {
        self.review_status
    }

    /// Gives the drafts back, eg to surface them when the webhook fails.
    pub fn into_drafts(self) -> Vec<CaptionDraft> {
        self.drafts
    }

    /// Wire format: one `post_<id>` field per draft next to the metadata.
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("filename".into(), Value::from(self.filename.as_str()));
        payload.insert("space".into(), Value::from(self.space_type.as_str()));
        payload.insert("tone".into(), Value::from(self.tone.as_str()));
        if let Some(image) = &self.image_base64 {
            payload.insert("image_base64".into(), Value::from(image.as_str()));
        }
        for draft in &self.drafts {
            payload.insert(
                draft_field_name(&draft.variant_id),
                Value::from(draft.text.as_str()),
            );
        }
        let status = serde_json::to_value(self.review_status).unwrap_or(Value::Null);
        payload.insert("status".into(), status);
        Value::Object(payload)
    }
}

/// What the webhook said back.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SinkReply {
    /// HTTP status code
    pub status: u16,
    /// Start of the reply body
    pub body: String,
}

/// Why the webhook did not take the record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SinkFailure(pub String);

impl std::fmt::Display for SinkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for SinkFailure {}

impl From<reqwest::Error> for SinkFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SinkFailure(format!("webhook timed out: {err}"))
        } else {
            SinkFailure(err.to_string())
        }
    }
}

/// Where finished records go.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// One attempt, no retries.
    async fn submit(&self, record: &SubmissionRecord) -> Result<SinkReply, SinkFailure>;
}

/// [`SubmissionSink`] that POSTs JSON to a webhook URL.
#[derive(Clone, Debug)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: Url,
}

impl WebhookSink {
    /// Builds a sink with its own request timeout.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, SinkFailure> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl SubmissionSink for WebhookSink {
    async fn submit(&self, record: &SubmissionRecord) -> Result<SinkReply, SinkFailure> {
        let resp = self
            .client
            .post(self.url.clone())
            .json(&record.to_payload())
            .send()
            .await?;
        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(err) => {
                debug!("Failed to read webhook reply body: {}", err);
                String::new()
            }
        };
        debug!("Webhook returned {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(SinkFailure(format!(
                "webhook returned {status}: {}",
                truncate_for_log(&body, ERROR_BODY_LOG_CHARS)
            )));
        }

        Ok(SinkReply {
            status: status.as_u16(),
            body: body.chars().take(SINK_REPLY_DISPLAY_CHARS).collect(),
        })
    }
}
