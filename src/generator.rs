//! Caption generation against a vision capable text model.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::constants::{ERROR_BODY_LOG_CHARS, NORMALIZED_MIME_TYPE, truncate_for_log};

/// Why a single generation call produced nothing usable.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GenerationFailure(pub String);

impl std::fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for GenerationFailure {}

impl From<reqwest::Error> for GenerationFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationFailure(format!("request timed out: {err}"))
        } else {
            GenerationFailure(err.to_string())
        }
    }
}

/// Something that writes one caption for one image and one prompt.
#[async_trait]
pub trait CaptionGenerator: Send + Sync {
    /// Single shot, no retries. Returns trimmed, non-empty text.
    async fn generate(&self, image_jpeg: &[u8], prompt: &str) -> Result<String, GenerationFailure>;
}

// -----------------------------
// Responses API
// -----------------------------

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: [InputMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: [InputContent<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum InputContent<'a> {
    #[serde(rename = "input_text")]
    Text { text: &'a str },
    #[serde(rename = "input_image")]
    Image { image_url: String },
}

#[derive(Debug, Deserialize)]
struct ResponsesCreateResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<ResponseOutputItem>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseOutputItem {
    #[serde(default)]
    content: Vec<ResponseContentItem>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentItem {
    #[serde(rename = "output_text")]
    OutputText { text: String },
    #[serde(other)]
    Other,
}

impl ResponsesCreateResponse {
    fn into_text(self) -> Option<String> {
        self.output_text
            .filter(|text| !text.trim().is_empty())
            .or_else(|| {
                self.output
                    .into_iter()
                    .flat_map(|item| item.content.into_iter())
                    .find_map(|content| match content {
                        ResponseContentItem::OutputText { text } => Some(text),
                        ResponseContentItem::Other => None,
                    })
            })
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

/// Builds the `data:` URI the Responses API expects for inline images.
pub fn image_data_uri(image_jpeg: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        NORMALIZED_MIME_TYPE,
        general_purpose::STANDARD.encode(image_jpeg)
    )
}

/// [`CaptionGenerator`] backed by the OpenAI Responses API.
#[derive(Clone, Debug)]
pub struct OpenAiCaptioner {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl OpenAiCaptioner {
    /// `base_url` is the API root, eg `https://api.openai.com/v1`.
    pub fn new(
        base_url: &Url,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, GenerationFailure> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = Url::parse(&format!(
            "{}/responses",
            base_url.as_str().trim_end_matches('/')
        ))
        .map_err(|err| GenerationFailure(format!("Invalid API base URL: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl CaptionGenerator for OpenAiCaptioner {
    async fn generate(&self, image_jpeg: &[u8], prompt: &str) -> Result<String, GenerationFailure> {
        let body = ResponsesRequest {
            model: &self.model,
            input: [InputMessage {
                role: "user",
                content: [
                    InputContent::Text { text: prompt },
                    InputContent::Image {
                        image_url: image_data_uri(image_jpeg),
                    },
                ],
            }],
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        debug!("Responses API returned {} ({} bytes)", status, bytes.len());

        if !status.is_success() {
            return Err(GenerationFailure(format!(
                "Responses API error {status}: {}",
                truncate_for_log(&String::from_utf8_lossy(&bytes), ERROR_BODY_LOG_CHARS)
            )));
        }

        let parsed: ResponsesCreateResponse = serde_json::from_slice(&bytes).map_err(|err| {
            GenerationFailure(format!("Failed to parse Responses API JSON: {err}"))
        })?;
        if let Some(err) = parsed.error.as_ref().filter(|err| !err.is_null()) {
            return Err(GenerationFailure(format!(
                "Responses API returned error: {}",
                truncate_for_log(&err.to_string(), ERROR_BODY_LOG_CHARS)
            )));
        }

        parsed
            .into_text()
            .ok_or_else(|| GenerationFailure("Responses API returned no output text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Json;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use serde_json::json;

    async fn spawn_api(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test api");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve test api");
        });
        Url::parse(&format!("http://{addr}/v1")).expect("api url")
    }

    fn captioner(base_url: &Url, timeout: Duration) -> OpenAiCaptioner {
        OpenAiCaptioner::new(base_url, "sk-test", "gpt-4.1-mini", timeout).expect("build captioner")
    }

    #[test]
    fn data_uri_is_jpeg_base64() {
        assert_eq!(image_data_uri(&[0xFF, 0xD8]), "data:image/jpeg;base64,/9g=");
    }

    #[test]
    fn output_text_falls_back_to_content_items() {
        let parsed: ResponsesCreateResponse = serde_json::from_value(json!({
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "content": [
                    {"type": "refusal", "refusal": "no"},
                    {"type": "output_text", "text": "  . . 𖥧 𖥧 .\nhello  "}
                ]}
            ]
        }))
        .expect("parse response");
        assert_eq!(parsed.into_text().as_deref(), Some(". . 𖥧 𖥧 .\nhello"));
    }

    #[tokio::test]
    async fn sends_prompt_and_image_in_one_message() {
        let router = Router::new().route(
            "/v1/responses",
            axum::routing::post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(
                    headers.get("authorization").and_then(|v| v.to_str().ok()),
                    Some("Bearer sk-test")
                );
                assert_eq!(body["model"], "gpt-4.1-mini");
                let content = &body["input"][0]["content"];
                assert_eq!(body["input"][0]["role"], "user");
                assert_eq!(content[0]["type"], "input_text");
                assert_eq!(content[0]["text"], "describe");
                assert_eq!(content[1]["type"], "input_image");
                assert_eq!(content[1]["image_url"], "data:image/jpeg;base64,AQID");
                Json(json!({"output_text": "  caption text \n"}))
            }),
        );
        let base_url = spawn_api(router).await;

        let text = captioner(&base_url, Duration::from_secs(5))
            .generate(&[1, 2, 3], "describe")
            .await
            .expect("generate");
        assert_eq!(text, "caption text");
    }

    #[tokio::test]
    async fn error_status_is_a_failure() {
        let router = Router::new().route(
            "/v1/responses",
            axum::routing::post(|| async {
                (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response()
            }),
        );
        let base_url = spawn_api(router).await;

        let err = captioner(&base_url, Duration::from_secs(5))
            .generate(&[1], "describe")
            .await
            .expect_err("should fail");
        assert!(err.0.contains("429"));
        assert!(err.0.contains("slow down"));
    }

    #[tokio::test]
    async fn empty_text_is_a_failure() {
        let router = Router::new().route(
            "/v1/responses",
            axum::routing::post(|| async { Json(json!({"output_text": "   ", "output": []})) }),
        );
        let base_url = spawn_api(router).await;

        let err = captioner(&base_url, Duration::from_secs(5))
            .generate(&[1], "describe")
            .await
            .expect_err("should fail");
        assert!(err.0.contains("no output text"));
    }

    #[tokio::test]
    async fn slow_api_times_out() {
        let router = Router::new().route(
            "/v1/responses",
            axum::routing::post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"output_text": "too late"}))
            }),
        );
        let base_url = spawn_api(router).await;

        let err = captioner(&base_url, Duration::from_millis(200))
            .generate(&[1], "describe")
            .await
            .expect_err("should time out");
        assert!(err.0.contains("timed out"));
    }
}
