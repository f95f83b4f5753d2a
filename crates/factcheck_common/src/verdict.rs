//! Verdict reasoning collaborator.
//!
//! The engine never decides a verdict itself: it hands a claim, the raw
//! aggregated search results and the allowed-source policy to a model and
//! gets back `{verdict, directness, reasoning_short}` as strict JSON.
//! Supports Ollama-style and OpenAI-compatible backends, plus a fake client
//! for testing.

use crate::config::LlmConfig;
use crate::error::VerdictError;
use crate::evidence::{domain_from_url, truncate_chars};
use crate::types::{SearchResult, Verdict};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::{LazyLock, Mutex};
use std::time::Duration;
use tracing::debug;

/// Directness assumed when the model omits it or sends garbage
pub const DEFAULT_DIRECTNESS: f64 = 0.3;

const TITLE_CHARS: usize = 180;
const SNIPPET_CHARS: usize = 420;
const RAW_PREFIX_CHARS: usize = 120;

/// A comma directly before a closing brace or bracket
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma pattern"));

pub const VERDICT_PROMPT_TEMPLATE: &str = "You are a Fact Checker. Task: Given ONE claim and provided search results, decide: Supported (evidence explicitly affirms the core claim), Contradicted (evidence explicitly denies the core claim or states the opposite), Unverified (evidence is missing, vague, mixed, or only partially matches). STRICT EVIDENCE RULES: Use ONLY the provided search results; Do NOT use outside knowledge; Do NOT guess missing numbers/dates/names; Do NOT treat \"similar topic\" as proof of this specific claim. HOW TO DECIDE: Supported if at least ONE source directly confirms the core event/action AND the important details do not conflict; Contradicted if a source directly rejects the event/action OR clearly reverses the direction; Unverified if sources are related but do not directly confirm/deny the claim, or only confirm a weaker version. DIRECTNESS SCORE (0.0 to 1.0): 1.0 = explicit confirmation with matching key details; 0.7 = confirms the core event/action but misses ONE key detail; 0.4 = same entity/topic but does not confirm the event/action; 0.0 = no relevant evidence. SOURCE USE RULES: Prefer sources from the allowed list first; Ignore social media, forums, and personal blogs. OUTPUT RULES: Return ONLY valid JSON (no markdown, no extra text). Return JSON in this exact shape:\n{\n  \"verdict\": \"Supported|Contradicted|Unverified\",\n  \"directness\": 0.0,\n  \"reasoning_short\": \"1-2 sentence justification\"\n}\nALLOWED SOURCE LIST: {{ALLOWED_SOURCES}} CLAIM: {{CLAIM}} FULL SEARCH RESULTS: {{RAW_RESULTS}}";

/// Input to one verdict evaluation.
#[derive(Debug, Clone, Copy)]
pub struct VerdictRequest<'a> {
    pub claim: &'a str,
    pub results: &'a [SearchResult],
    pub allowed_sources: &'a str,
}

impl VerdictRequest<'_> {
    pub fn prompt(&self) -> String {
        VERDICT_PROMPT_TEMPLATE
            .replace("{{ALLOWED_SOURCES}}", self.allowed_sources)
            .replace("{{CLAIM}}", self.claim)
            .replace("{{RAW_RESULTS}}", &format_results_for_prompt(self.results))
    }
}

/// Normalized collaborator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictAssessment {
    pub verdict: Verdict,
    /// Clamped to [0, 1]
    pub directness: f64,
    pub reasoning_short: String,
}

/// Trait abstraction for verdict reasoning
#[async_trait]
pub trait VerdictReasoner: Send + Sync {
    async fn evaluate(&self, request: &VerdictRequest<'_>) -> Result<VerdictAssessment, VerdictError>;
}

/// One block per distinct URL, numbered in encounter order.
pub fn format_results_for_prompt(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results available.".to_string();
    }
    let mut seen: HashSet<&str> = HashSet::new();
    let mut blocks: Vec<String> = Vec::new();
    for item in results {
        if item.url.is_empty() || !seen.insert(item.url.as_str()) {
            continue;
        }
        blocks.push(format!(
            "Result {} ({}): {}\nSnippet: {}\nURL: {}",
            blocks.len() + 1,
            domain_from_url(&item.url),
            truncate_chars(&item.title, TITLE_CHARS),
            truncate_chars(item.body_text(), SNIPPET_CHARS),
            item.url
        ));
    }
    blocks.join("\n")
}

/// Parse model output strictly, with one repair pass for trailing commas.
pub fn parse_strict_json(text: &str, label: &str) -> Result<serde_json::Value, VerdictError> {
    let raw = text.trim();
    if let Ok(value) = serde_json::from_str(raw) {
        return Ok(value);
    }
    let cleaned = TRAILING_COMMA.replace_all(raw, "$1");
    if cleaned != raw {
        if let Ok(value) = serde_json::from_str(&cleaned) {
            debug!("{} output repaired (trailing comma)", label);
            return Ok(value);
        }
    }
    Err(VerdictError::InvalidJson {
        label: label.to_string(),
        raw_prefix: raw.chars().take(RAW_PREFIX_CHARS).collect(),
    })
}

/// Turn raw model text into a normalized assessment.
pub fn parse_verdict_output(text: &str) -> Result<VerdictAssessment, VerdictError> {
    let json = parse_strict_json(text, "FactCheck Verdict")?;
    assessment_from_json(&json)
}

fn assessment_from_json(json: &serde_json::Value) -> Result<VerdictAssessment, VerdictError> {
    if !json.is_object() {
        return Err(VerdictError::InvalidJson {
            label: "FactCheck Verdict".to_string(),
            raw_prefix: json.to_string().chars().take(RAW_PREFIX_CHARS).collect(),
        });
    }
    let verdict = Verdict::normalize(json.get("verdict").and_then(|v| v.as_str()).unwrap_or(""));
    let directness = match json.get("directness") {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|d| d.is_finite())
    .unwrap_or(DEFAULT_DIRECTNESS)
    .clamp(0.0, 1.0);
    let reasoning_short = json
        .get("reasoning_short")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    Ok(VerdictAssessment {
        verdict,
        directness,
        reasoning_short,
    })
}

// ============================================================================
// HTTP Reasoner (Production)
// ============================================================================

/// Model-backed verdict reasoner
pub struct HttpVerdictReasoner {
    config: LlmConfig,
    client: reqwest::Client,
}

impl HttpVerdictReasoner {
    pub fn new(config: LlmConfig) -> Result<Self, VerdictError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VerdictError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Check if endpoint is Ollama-style
    fn is_ollama_endpoint(&self) -> bool {
        self.config.endpoint.contains("11434") || self.config.endpoint.contains("ollama")
    }

    fn map_send_error(&self, e: reqwest::Error) -> VerdictError {
        if e.is_timeout() {
            VerdictError::Timeout(self.config.timeout_secs)
        } else {
            VerdictError::Http(format!("Request failed: {}", e))
        }
    }

    async fn call_ollama(&self, prompt: &str) -> Result<String, VerdictError> {
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        if !response.status().is_success() {
            return Err(VerdictError::Http(format!("HTTP {} from Ollama", response.status())));
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VerdictError::Http(format!("Failed to read response: {}", e)))?;
        envelope
            .get("response")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or(VerdictError::EmptyResponse)
    }

    async fn call_openai_compatible(&self, prompt: &str) -> Result<String, VerdictError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "user", "content": prompt},
            ],
            "response_format": {"type": "json_object"},
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        if !response.status().is_success() {
            return Err(VerdictError::Http(format!(
                "HTTP {} from OpenAI-compatible API",
                response.status()
            )));
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VerdictError::Http(format!("Failed to read response: {}", e)))?;
        envelope
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or(VerdictError::EmptyResponse)
    }
}

#[async_trait]
impl VerdictReasoner for HttpVerdictReasoner {
    async fn evaluate(&self, request: &VerdictRequest<'_>) -> Result<VerdictAssessment, VerdictError> {
        if !self.config.enabled {
            return Err(VerdictError::Disabled);
        }
        let prompt = request.prompt();

        let text = if self.is_ollama_endpoint() {
            match self.call_ollama(&prompt).await {
                Ok(text) => text,
                Err(e) => {
                    debug!("Ollama API failed, trying OpenAI-compatible: {}", e);
                    self.call_openai_compatible(&prompt).await?
                }
            }
        } else {
            self.call_openai_compatible(&prompt).await?
        };

        if text.trim().is_empty() {
            return Err(VerdictError::EmptyResponse);
        }
        parse_verdict_output(&text)
    }
}

// ============================================================================
// Fake Reasoner (Testing)
// ============================================================================

/// Reasoner with pre-defined raw outputs. The last queued response repeats.
pub struct FakeVerdictReasoner {
    responses: Mutex<VecDeque<Result<String, VerdictError>>>,
    claims_seen: Mutex<Vec<String>>,
}

impl FakeVerdictReasoner {
    pub fn new(responses: Vec<Result<String, VerdictError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            claims_seen: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the given verdict.
    pub fn always(verdict: Verdict, directness: f64, reasoning: &str) -> Self {
        let body = serde_json::json!({
            "verdict": verdict.to_string(),
            "directness": directness,
            "reasoning_short": reasoning,
        });
        Self::new(vec![Ok(body.to_string())])
    }

    /// Always answer with raw text (e.g. malformed JSON).
    pub fn always_raw(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.claims_seen.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Claims evaluated so far, in order.
    pub fn claims_seen(&self) -> Vec<String> {
        self.claims_seen.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl VerdictReasoner for FakeVerdictReasoner {
    async fn evaluate(&self, request: &VerdictRequest<'_>) -> Result<VerdictAssessment, VerdictError> {
        self.claims_seen
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.claim.to_string());

        let next = {
            let mut responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
            if responses.len() > 1 {
                responses.pop_front()
            } else {
                responses.front().cloned()
            }
        };
        match next {
            Some(Ok(text)) => parse_verdict_output(&text),
            Some(Err(e)) => Err(e),
            None => Err(VerdictError::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_output() {
        let a = parse_verdict_output(
            r#"{"verdict":"supported","directness":0.7,"reasoning_short":"  AP confirms the vote. "}"#,
        )
        .unwrap();
        assert_eq!(a.verdict, Verdict::Supported);
        assert_eq!(a.directness, 0.7);
        assert_eq!(a.reasoning_short, "AP confirms the vote.");
    }

    #[test]
    fn test_parse_repairs_trailing_comma() {
        let a = parse_verdict_output(r#"{"verdict":"Contradicted","directness":1,"reasoning_short":"x",}"#)
            .unwrap();
        assert_eq!(a.verdict, Verdict::Contradicted);
        assert_eq!(a.directness, 1.0);
    }

    #[test]
    fn test_trailing_comma_repair_is_reusable() {
        for _ in 0..3 {
            let value = parse_strict_json(r#"{"a":[1,2,],"b":{"c":true,},}"#, "test").unwrap();
            assert_eq!(value["a"], serde_json::json!([1, 2]));
            assert_eq!(value["b"]["c"], true);
        }
        assert!(TRAILING_COMMA.is_match(",}"));
        assert!(parse_strict_json("{,}", "test").is_err());
    }

    #[test]
    fn test_parse_defaults_and_clamps_directness() {
        let a = parse_verdict_output(r#"{"verdict":"maybe","directness":"n/a"}"#).unwrap();
        assert_eq!(a.verdict, Verdict::Unverified);
        assert_eq!(a.directness, DEFAULT_DIRECTNESS);
        assert_eq!(a.reasoning_short, "");

        let b = parse_verdict_output(r#"{"verdict":"Supported","directness":4.2}"#).unwrap();
        assert_eq!(b.directness, 1.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_verdict_output("Sure! Here is the JSON you asked for").unwrap_err();
        match err {
            VerdictError::InvalidJson { label, raw_prefix } => {
                assert_eq!(label, "FactCheck Verdict");
                assert!(raw_prefix.starts_with("Sure!"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(parse_verdict_output("[1,2]").is_err());
    }

    #[test]
    fn test_format_results_dedupes_urls() {
        let mut a = SearchResult::from_url("https://a.gov/1");
        a.title = "Title A".to_string();
        a.snippet = "snippet a".to_string();
        let results = vec![a.clone(), a, SearchResult::from_url(""), SearchResult::from_url("https://b.com/2")];
        let text = format_results_for_prompt(&results);
        assert!(text.starts_with("Result 1 (a.gov): Title A\nSnippet: snippet a\nURL: https://a.gov/1"));
        assert!(text.contains("Result 2 (b.com)"));
        assert!(!text.contains("Result 3"));
    }

    #[test]
    fn test_format_results_empty() {
        assert_eq!(format_results_for_prompt(&[]), "No results available.");
    }

    #[test]
    fn test_prompt_fills_placeholders() {
        let results = vec![SearchResult::from_url("https://a.gov/1")];
        let request = VerdictRequest {
            claim: "The bill passed",
            results: &results,
            allowed_sources: "Allowed TLDs: .gov",
        };
        let prompt = request.prompt();
        assert!(prompt.contains("CLAIM: The bill passed"));
        assert!(prompt.contains("ALLOWED SOURCE LIST: Allowed TLDs: .gov"));
        assert!(prompt.contains("URL: https://a.gov/1"));
        assert!(!prompt.contains("{{"));
    }

    #[tokio::test]
    async fn test_fake_reasoner_sequence_then_repeat() {
        let fake = FakeVerdictReasoner::new(vec![
            Ok(r#"{"verdict":"Supported","directness":1.0,"reasoning_short":"first one"}"#.to_string()),
            Err(VerdictError::Timeout(30)),
        ]);
        let request = VerdictRequest {
            claim: "c",
            results: &[],
            allowed_sources: "",
        };
        assert!(fake.evaluate(&request).await.is_ok());
        assert_eq!(fake.evaluate(&request).await, Err(VerdictError::Timeout(30)));
        assert_eq!(fake.evaluate(&request).await, Err(VerdictError::Timeout(30)));
        assert_eq!(fake.call_count(), 3);
    }

    #[tokio::test]
    async fn test_disabled_reasoner() {
        let config = LlmConfig {
            enabled: false,
            ..LlmConfig::default()
        };
        let reasoner = HttpVerdictReasoner::new(config).unwrap();
        let request = VerdictRequest {
            claim: "c",
            results: &[],
            allowed_sources: "",
        };
        assert_eq!(reasoner.evaluate(&request).await, Err(VerdictError::Disabled));
    }
}
