pub mod gemini;

use crate::dispatch::DispatchContext;
use crate::logbook::{LogBook, LogLevel};
use anyhow::Result;
use async_trait::async_trait;

/// Boundary to the external AI text-generation service: a topic and a
/// desired count in, a list of candidate quote texts out.
#[async_trait]
pub trait QuoteTextSource: Send + Sync {
    async fn generate(&self, topic: &str, count: u32) -> Result<Vec<String>>;
}

/// Generate quote texts for a topic and append them to the task list.
/// A generation failure is a single error log entry; run state is untouched.
pub async fn extend_quote_texts(
    source: &dyn QuoteTextSource,
    ctx: &DispatchContext,
    log: &LogBook,
    topic: &str,
    count: u32,
) {
    log.push(LogLevel::Info, format!("generating quote texts for topic '{topic}'"), None);
    match source.generate(topic, count).await {
        Ok(lines) => {
            let n = lines.len();
            ctx.append_quote_texts(lines);
            log.push(LogLevel::Success, format!("{n} quote texts generated"), None);
        }
        Err(err) => {
            tracing::warn!(error = %err, "text generation failed");
            log.push(LogLevel::Error, format!("text generation failed: {err:#}"), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStore;
    use crate::task::TaskConfig;

    struct FixedSource(Vec<String>);

    #[async_trait]
    impl QuoteTextSource for FixedSource {
        async fn generate(&self, _topic: &str, _count: u32) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl QuoteTextSource for FailingSource {
        async fn generate(&self, _topic: &str, _count: u32) -> Result<Vec<String>> {
            anyhow::bail!("service unavailable")
        }
    }

    #[tokio::test]
    async fn test_generated_texts_are_appended() {
        let ctx = DispatchContext::new(AccountStore::new(), TaskConfig::default());
        ctx.update_task(|t| t.quote_texts.push("existing".to_string()));
        let log = LogBook::new(16);
        let source = FixedSource(vec!["one".to_string(), "  two  ".to_string()]);

        extend_quote_texts(&source, &ctx, &log, "economy", 2).await;

        let task = ctx.task_snapshot();
        assert_eq!(task.quote_texts, vec!["existing", "one", "two"]);
        assert!(log.records().iter().any(|r| r.level == LogLevel::Success));
    }

    #[tokio::test]
    async fn test_failure_logs_one_error_and_leaves_texts_alone() {
        let ctx = DispatchContext::new(AccountStore::new(), TaskConfig::default());
        let log = LogBook::new(16);

        extend_quote_texts(&FailingSource, &ctx, &log, "economy", 2).await;

        assert!(ctx.task_snapshot().quote_texts.is_empty());
        let errors: Vec<_> = log.records().into_iter().filter(|r| r.level == LogLevel::Error).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("service unavailable"));
    }
}
