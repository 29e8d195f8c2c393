use super::QuoteTextSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

fn build_prompt(topic: &str, count: u32) -> String {
    format!(
        "You are a social media strategist. Write {count} distinct, engaging \
         quote-post texts about \"{topic}\".\n\
         Rules:\n\
         1. One text per line.\n\
         2. No numbering.\n\
         3. No hashtags.\n\
         4. Vary the tone: supportive, critical, casual.\n\
         5. Return only the texts, no preamble or closing remarks."
    )
}

/// The model returns one text per line; keep trimmed non-empty lines.
fn split_generated(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl QuoteTextSource for GeminiClient {
    async fn generate(&self, topic: &str, count: u32) -> Result<Vec<String>> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key,
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(topic, count),
                }],
            }],
        };

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("generation request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("generation service error ({}): {}", status, body);
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .context("failed to parse generation response")?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        Ok(split_generated(&text))
    }
}
