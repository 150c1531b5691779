//! HTTP-backed LLM analysis source
//!
//! Sends the snapshot to an Ollama-style completion endpoint and parses the
//! returned text into insights. Transport failures fail the source; text that
//! cannot be parsed degrades to a single low-confidence insight.

use super::AnalysisSource;
use crate::engine::AnalysisInput;
use crate::error::{EngineError, Result};
use crate::models::{Insight, MetricSnapshot, Severity};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_NAME: &str = "llm";
const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Confidence given to findings parsed from model output
const PARSED_CONFIDENCE: f64 = 70.0;
const FALLBACK_CONFIDENCE: f64 = 10.0;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// One candidate finding as emitted by the model
#[derive(Debug, Deserialize)]
struct RawFinding {
    #[serde(default = "default_title")]
    title: String,
    #[serde(default = "default_description")]
    description: String,
    #[serde(default = "default_component")]
    component: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    metrics: RawMetrics,
    #[serde(default)]
    root_cause: Option<String>,
}

/// Models return either `{"name": value}` or a list of metric names
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum RawMetrics {
    Values(BTreeMap<String, f64>),
    Names(Vec<String>),
    #[default]
    Empty,
}

fn default_title() -> String {
    "AI Analysis".to_string()
}

fn default_description() -> String {
    "Performance analysis completed".to_string()
}

fn default_component() -> String {
    "system".to_string()
}

pub struct LlmSource {
    name: String,
    client: Client,
    generate_url: Url,
    model: String,
    temperature: f64,
    timeout: Duration,
}

impl LlmSource {
    pub fn builder() -> LlmSourceBuilder {
        LlmSourceBuilder::new()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST a prompt and return the raw completion text
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        debug!(
            event = "llm_request",
            source = %self.name,
            url = %self.generate_url,
            model = %self.model,
            "Calling completion endpoint"
        );

        let response = self
            .client
            .post(self.generate_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::analysis(
                &self.name,
                format!("completion endpoint returned {}: {}", status, body),
            ));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| self.transport_error(e))?;
        info!(
            event = "llm_response",
            source = %self.name,
            chars = body.response.len(),
            "Received completion"
        );
        Ok(body.response)
    }

    /// Client-side timeouts share the engine budget and are reported as such
    fn transport_error(&self, err: reqwest::Error) -> EngineError {
        if err.is_timeout() {
            EngineError::SourceTimeout {
                source_name: self.name.clone(),
                budget: self.timeout,
            }
        } else {
            EngineError::Http(err)
        }
    }
}

#[async_trait]
impl AnalysisSource for LlmSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    async fn analyze(&self, input: &AnalysisInput) -> Result<Vec<Insight>> {
        let prompt = build_prompt(&input.snapshot)?;
        let text = self.generate(&prompt).await?;
        Ok(parse_llm_response(&self.name, &text, &input.snapshot))
    }
}

/// Builder for [`LlmSource`]
pub struct LlmSourceBuilder {
    name: String,
    endpoint: Option<String>,
    model: Option<String>,
    temperature: f64,
    timeout: Duration,
}

impl LlmSourceBuilder {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            endpoint: None,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Base URL of the model server, e.g. `http://localhost:11434`
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<LlmSource> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| EngineError::InvalidConfig("llm source requires an endpoint".into()))?;
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| EngineError::InvalidConfig("llm source requires a model".into()))?;
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EngineError::InvalidConfig(format!(
                "llm temperature {} outside [0, 2]",
                self.temperature
            )));
        }

        let base = endpoint.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        let generate_url = Url::parse(&format!("{}/api/generate", base))
            .map_err(|e| EngineError::InvalidConfig(format!("invalid llm endpoint {}: {}", endpoint, e)))?;

        let client = Client::builder().timeout(self.timeout).build()?;

        Ok(LlmSource {
            name: self.name,
            client,
            generate_url,
            model,
            temperature: self.temperature,
            timeout: self.timeout,
        })
    }
}

impl Default for LlmSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn build_prompt(snapshot: &MetricSnapshot) -> Result<String> {
    let metrics = serde_json::to_string(snapshot)?;
    Ok(format!(
        r#"You are a performance engineer applying the USE Method (Utilization, Saturation, Errors).

Analyze this resource snapshot and produce 2-3 findings:
{metrics}

Respond with ONLY a JSON array. Each element must look like:
{{"title":"CPU Saturation Detected","description":"...","component":"cpu","severity":"HIGH","recommendations":["..."],"metrics":["cpu_utilization","load_1m"],"root_cause":"..."}}

Severity is one of INFO, LOW, MEDIUM, HIGH, CRITICAL."#
    ))
}

/// Parse model output into insights; never fails
///
/// The JSON array is taken from the first `[` to the last `]`. Elements that
/// do not deserialize are skipped. Unknown severities become MEDIUM. If
/// nothing usable remains, a single fallback insight is returned.
pub fn parse_llm_response(source: &str, text: &str, snapshot: &MetricSnapshot) -> Vec<Insight> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        warn!(event = "llm_parse_failed", source, reason = "no_json_array", "No JSON array in completion");
        return vec![fallback_insight(source)];
    };
    if end < start {
        warn!(event = "llm_parse_failed", source, reason = "no_json_array", "No JSON array in completion");
        return vec![fallback_insight(source)];
    }

    let values: Vec<serde_json::Value> = match serde_json::from_str(&text[start..=end]) {
        Ok(values) => values,
        Err(e) => {
            warn!(event = "llm_parse_failed", source, reason = "parse_error", error = %e, "Completion is not a JSON array");
            return vec![fallback_insight(source)];
        }
    };

    let insights: Vec<Insight> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawFinding>(value) {
            Ok(raw) => Some(to_insight(source, raw, snapshot)),
            Err(e) => {
                debug!(event = "llm_finding_skipped", source, error = %e, "Skipping malformed finding");
                None
            }
        })
        .collect();

    if insights.is_empty() {
        warn!(event = "llm_parse_failed", source, reason = "no_findings", "No usable findings in completion");
        return vec![fallback_insight(source)];
    }
    insights
}

fn to_insight(source: &str, raw: RawFinding, snapshot: &MetricSnapshot) -> Insight {
    let severity = raw
        .severity
        .as_deref()
        .and_then(|s| s.parse::<Severity>().ok())
        .unwrap_or(Severity::Medium);

    let mut insight = Insight::new(source, raw.component, severity, raw.title, raw.description)
        .with_recommendations(raw.recommendations)
        .with_confidence(PARSED_CONFIDENCE);

    match raw.metrics {
        RawMetrics::Values(values) => {
            for (name, value) in values {
                insight = insight.with_evidence(name, value);
            }
        }
        RawMetrics::Names(names) => {
            for name in names {
                if let Some(value) = snapshot.metric(&name) {
                    insight = insight.with_evidence(name, value);
                }
            }
        }
        RawMetrics::Empty => {}
    }

    match raw.root_cause {
        Some(cause) => insight.with_root_cause(cause),
        None => insight,
    }
}

fn fallback_insight(source: &str) -> Insight {
    Insight::new(
        source,
        "system",
        Severity::Info,
        "AI analysis unavailable",
        "The model response could not be interpreted; no findings were extracted",
    )
    .with_confidence(FALLBACK_CONFIDENCE)
    .with_recommendations(["Review the model output or rerun the analysis"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CpuMetrics;
    use serde_json::json;

    fn snapshot() -> MetricSnapshot {
        MetricSnapshot::new("h").with_cpu(CpuMetrics {
            utilization: Some(88.0),
            load_1m: Some(3.5),
            ..Default::default()
        })
    }

    #[test]
    fn test_parse_with_surrounding_text() {
        let text = r#"Sure, here you go:
[{"title":"CPU Saturation","description":"Load is high","component":"cpu","severity":"high",
  "recommendations":["Scale out"],"metrics":["cpu_percent","load_avg","bogus"],"root_cause":"Traffic"}]
Let me know if you need more."#;

        let insights = parse_llm_response("llm", text, &snapshot());
        assert_eq!(insights.len(), 1);
        let insight = &insights[0];
        assert_eq!(insight.severity, Severity::High);
        assert_eq!(insight.component, "cpu");
        assert_eq!(insight.evidence.get("cpu_percent"), Some(&88.0));
        assert_eq!(insight.evidence.get("load_avg"), Some(&3.5));
        assert!(!insight.evidence.contains_key("bogus"));
        assert_eq!(insight.root_cause.as_deref(), Some("Traffic"));
        assert_eq!(insight.confidence, 70.0);
    }

    #[test]
    fn test_unknown_severity_defaults_to_medium() {
        let text = r#"[{"title":"x","severity":"URGENT","metrics":{"queue_depth":12.0}}]"#;
        let insights = parse_llm_response("llm", text, &snapshot());
        assert_eq!(insights[0].severity, Severity::Medium);
        assert_eq!(insights[0].component, "system");
        assert_eq!(insights[0].evidence.get("queue_depth"), Some(&12.0));
    }

    #[test]
    fn test_garbage_yields_single_fallback() {
        for text in ["no json here", "][", "[{not json}]", "[1, 2, 3]", "[]"] {
            let insights = parse_llm_response("llm", text, &snapshot());
            assert_eq!(insights.len(), 1, "input: {}", text);
            assert_eq!(insights[0].severity, Severity::Info);
            assert_eq!(insights[0].confidence, 10.0);
        }
    }

    #[test]
    fn test_builder_requires_endpoint_and_model() {
        assert!(LlmSourceBuilder::new().model("m").build().is_err());
        assert!(LlmSourceBuilder::new().endpoint("http://x").build().is_err());
        assert!(LlmSourceBuilder::new()
            .endpoint("http://x")
            .model("m")
            .temperature(5.0)
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_strips_v1_suffix() {
        let source = LlmSourceBuilder::new()
            .endpoint("http://localhost:11434/v1/")
            .model("llama3")
            .build()
            .unwrap();
        assert_eq!(
            source.generate_url.as_str(),
            "http://localhost:11434/api/generate"
        );
    }

    #[tokio::test]
    async fn test_analyze_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let completion = json!({
            "response": r#"[{"title":"Memory Pressure","component":"memory","severity":"CRITICAL"}]"#
        });
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(mockito::Matcher::PartialJson(
                json!({"model": "llama3", "stream": false}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion.to_string())
            .create_async()
            .await;

        let source = LlmSourceBuilder::new()
            .name("ollama")
            .endpoint(server.url())
            .model("llama3")
            .build()
            .unwrap();
        let insights = source
            .analyze(&AnalysisInput::new(snapshot()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].source, "ollama");
        assert_eq!(insights[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_http_error_fails_source() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let source = LlmSourceBuilder::new()
            .endpoint(server.url())
            .model("llama3")
            .build()
            .unwrap();
        let err = source
            .analyze(&AnalysisInput::new(snapshot()))
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "analysis_failure");
        assert!(err.to_string().contains("model not loaded"));
    }

    #[tokio::test]
    async fn test_client_timeout_is_source_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let source = LlmSourceBuilder::new()
            .endpoint(format!("http://{}", addr))
            .model("llama3")
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let err = source
            .analyze(&AnalysisInput::new(snapshot()))
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "source_timeout");
    }
}
