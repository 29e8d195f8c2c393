use super::QuoteBackend;
use crate::account::Account;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const GENERIC_FAILURE: &str = "execution backend returned an error";

/// HTTP client for the quote-tweet execution backend.
pub struct ExecutionClient {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct AccountPayload<'a> {
    username: &'a str,
    password: Option<&'a str>,
    email: Option<&'a str>,
    cookie: Option<&'a str>,
}

// Field names follow the backend's wire format.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequest<'a> {
    account: AccountPayload<'a>,
    tweet_url: &'a str,
    quote_text: &'a str,
}

#[derive(Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// Pull the `detail` field out of an error response body, falling back to a
/// generic message when the body is not JSON or carries no detail.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

impl ExecutionClient {
    pub fn new(endpoint: &str) -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl QuoteBackend for ExecutionClient {
    async fn submit_quote(
        &self,
        account: &Account,
        tweet_url: &str,
        quote_text: &str,
    ) -> Result<String> {
        let request = QuoteRequest {
            account: AccountPayload {
                username: &account.username,
                password: account.password.as_deref(),
                email: account.email.as_deref(),
                cookie: account.cookie.as_deref(),
            },
            tweet_url,
            quote_text,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("quote request failed — is the backend running?")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} ({})", error_detail(&body), status);
        }

        let parsed: QuoteResponse = resp
            .json()
            .await
            .context("failed to parse backend response")?;
        Ok(parsed.message)
    }
}
