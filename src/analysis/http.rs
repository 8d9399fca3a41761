//! JSON-over-HTTP analysis client.
//!
//! Request body:
//!
//! ```json
//! {"contextText": "...", "imageBytes": "<base64>", "mimeType": "image/jpeg",
//!  "reasoningDepth": "LOW", "reasoningBudget": 1024}
//! ```
//!
//! The response is the verdict object itself, optionally wrapped in a
//! markdown code fence. A body of the form `{"error": "..."}` is reported
//! as a service error.

use super::client::{AnalysisClient, AnalysisError};
use super::result::{AnalysisResult, ImagePayload, ReasoningDepth};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_ERROR_BODY: usize = 512;

/// Where and how to reach the analysis service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisServiceConfig {
    /// Service URL. Without one the offline analyzer is used.
    pub endpoint: Option<String>,
    /// Bearer token sent with every request.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds (0 disables).
    pub timeout_secs: u64,
}

impl Default for AnalysisServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisRequest<'a> {
    context_text: &'a str,
    image_bytes: &'a str,
    mime_type: &'a str,
    reasoning_depth: ReasoningDepth,
    reasoning_budget: u32,
}

/// Talks to a remote analysis endpoint.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpAnalysisClient {
    /// Builds a client for `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, AnalysisError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    /// Builds a client from config; `None` when no endpoint is set.
    pub fn from_config(config: &AnalysisServiceConfig) -> Result<Option<Self>, AnalysisError> {
        let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.trim().is_empty()) else {
            return Ok(None);
        };
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        Self::new(endpoint.trim(), config.api_key.clone(), timeout).map(Some)
    }

    /// Target URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(
        &self,
        context: &str,
        image: &ImagePayload,
        depth: ReasoningDepth,
    ) -> Result<AnalysisResult, AnalysisError> {
        let body = AnalysisRequest {
            context_text: context,
            image_bytes: &image.data,
            mime_type: &image.mime_type,
            reasoning_depth: depth,
            reasoning_budget: depth.reasoning_budget(),
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            %depth,
            image_len = image.data.len(),
            "sending analysis request"
        );
        let response = request
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        parse_analysis_body(&text)
    }
}

/// Parses a verdict from a response body.
pub fn parse_analysis_body(body: &str) -> Result<AnalysisResult, AnalysisError> {
    let json = strip_code_fence(body.trim());
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

    if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
        return Err(AnalysisError::Service(message.to_string()));
    }

    serde_json::from_value(value).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))
}

fn strip_code_fence(body: &str) -> &str {
    let Some(rest) = body.strip_prefix("```") else {
        return body;
    };
    // Drop the info string ("json") on the opening line
    let rest = rest.split_once('\n').map_or("", |(_, tail)| tail);
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisStatus;

    const VERDICT: &str = r#"{"status":"WARNING","observation":"Foam rising","deduction":"Overheating","recommendation":"Reduce heat"}"#;

    #[test]
    fn test_parse_plain_body() {
        let result = parse_analysis_body(VERDICT).unwrap();
        assert_eq!(result.status, AnalysisStatus::Warning);
        assert_eq!(result.recommendation, "Reduce heat");
    }

    #[test]
    fn test_parse_fenced_body() {
        let fenced = format!("```json\n{VERDICT}\n```\n");
        let result = parse_analysis_body(&fenced).unwrap();
        assert_eq!(result.observation, "Foam rising");
    }

    #[test]
    fn test_parse_service_error() {
        let err = parse_analysis_body(r#"{"error":"quota exceeded"}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::Service(ref m) if m == "quota exceeded"));
    }

    #[test]
    fn test_parse_rejects_incomplete_verdict() {
        let err = parse_analysis_body(r#"{"status":"NORMAL"}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
        assert!(matches!(
            parse_analysis_body("not json"),
            Err(AnalysisError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_request_wire_names() {
        let body = AnalysisRequest {
            context_text: "ctx",
            image_bytes: "AAAA",
            mime_type: "image/png",
            reasoning_depth: ReasoningDepth::High,
            reasoning_budget: ReasoningDepth::High.reasoning_budget(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contextText"], "ctx");
        assert_eq!(json["imageBytes"], "AAAA");
        assert_eq!(json["mimeType"], "image/png");
        assert_eq!(json["reasoningDepth"], "HIGH");
        assert_eq!(json["reasoningBudget"], 8192);
    }

    #[test]
    fn test_from_config_without_endpoint() {
        let config = AnalysisServiceConfig::default();
        assert!(HttpAnalysisClient::from_config(&config).unwrap().is_none());

        let config = AnalysisServiceConfig {
            endpoint: Some("http://localhost:9000/analyze".into()),
            ..Default::default()
        };
        let client = HttpAnalysisClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9000/analyze");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "é".repeat(10);
        let cut = truncate(&text, 5);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate("short", 10), "short");
    }
}
