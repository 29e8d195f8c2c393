use anyhow::{Context, Result};
use quotedeck::backend::rest::ExecutionClient;
use quotedeck::config::Config;
use quotedeck::dispatch::{DispatchContext, Dispatcher};
use quotedeck::logbook::{LogBook, LogRecord};
use quotedeck::task::TaskConfig;
use quotedeck::textgen::gemini::GeminiClient;
use quotedeck::{account::AccountStore, textgen};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn print_record(record: &LogRecord) {
    let time = record.timestamp.format("%H:%M:%S");
    match &record.account {
        Some(account) => println!("  {} [{:>4}] {} ({})", time, record.level, record.message, account),
        None => println!("  {} [{:>4}] {}", time, record.level, record.message),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_file = std::fs::File::create("quotedeck.log")?;
    tracing_subscriber::fmt()
        .with_env_filter("quotedeck=info")
        .with_writer(log_file)
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(Path::new(&config_path))?;

    // Load saved keys from .env (real env vars take precedence)
    Config::load_env_file();

    println!();
    println!("  quotedeck v0.1.0");
    println!("  ================");
    println!();

    // Console feed: every log record is mirrored to stdout as it happens.
    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    let log = Arc::new(LogBook::with_tap(config.log.capacity, log_tx));
    let printer = tokio::spawn(async move {
        while let Some(record) = log_rx.recv().await {
            print_record(&record);
        }
    });

    let task: TaskConfig = config.task.clone();
    let ctx = Arc::new(DispatchContext::new(AccountStore::new(), task));

    if let Some(path) = &config.accounts.file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read accounts file: {path}"))?;
        ctx.import_accounts(&text, &log);
    }

    // Optional startup generation: top up the quote-text list before running.
    if let Some(topic) = &config.generator.topic {
        let api_key = Config::generator_api_key()?;
        let generator = GeminiClient::new(api_key, &config.generator.base_url, &config.generator.model);
        textgen::extend_quote_texts(&generator, &ctx, &log, topic, config.generator.count).await;
    }

    let backend = Arc::new(ExecutionClient::new(&config.backend.endpoint));
    let dispatcher = Arc::new(Dispatcher::new(
        ctx,
        backend,
        log,
        config.dispatch.demote_on_failure,
    ));

    // Ctrl-C requests a stop; the current iteration still runs to completion.
    let stopper = dispatcher.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });

    dispatcher.run().await;

    // Give the console feed a moment to drain before exiting.
    drop(dispatcher);
    let _ = tokio::time::timeout(Duration::from_millis(200), printer).await;

    tracing::debug!("shutting down");
    Ok(())
}
