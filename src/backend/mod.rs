pub mod rest;

use crate::account::Account;
use anyhow::Result;
use async_trait::async_trait;

/// Boundary to the external execution backend that actually performs the
/// quote action. One call per dispatch iteration; the Ok value is the
/// backend's human-readable confirmation message.
#[async_trait]
pub trait QuoteBackend: Send + Sync {
    async fn submit_quote(
        &self,
        account: &Account,
        tweet_url: &str,
        quote_text: &str,
    ) -> Result<String>;
}
