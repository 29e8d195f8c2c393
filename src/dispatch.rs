use crate::account::{Account, AccountStatus, AccountStore};
use crate::backend::QuoteBackend;
use crate::logbook::{LogBook, LogLevel};
use crate::task::TaskConfig;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Lifecycle of the dispatch loop. Exactly one loop instance may be Running;
/// the transition in and out goes through `DispatchContext` so a second start
/// while Running is a clean no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Running,
}

/// Shared mutable state the loop reads through at iteration boundaries:
/// the account pool, the latest task configuration, and the run flags.
/// Handed around by `Arc` so the loop never works off a stale capture.
pub struct DispatchContext {
    accounts: Mutex<AccountStore>,
    task: Mutex<TaskConfig>,
    enabled: AtomicBool,
    phase: Mutex<LoopPhase>,
}

impl DispatchContext {
    pub fn new(accounts: AccountStore, task: TaskConfig) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            task: Mutex::new(task),
            enabled: AtomicBool::new(false),
            phase: Mutex::new(LoopPhase::Idle),
        }
    }

    pub fn phase(&self) -> LoopPhase {
        *self.phase.lock().expect("phase lock poisoned")
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Ask a running loop to stop. Only observed at iteration boundaries;
    /// an in-flight request and its delay run to completion.
    pub fn request_stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Idle -> Running transition. Returns false when a loop already holds
    /// the guard, in which case the caller must back off.
    fn try_begin(&self) -> bool {
        let mut phase = self.phase.lock().expect("phase lock poisoned");
        if *phase == LoopPhase::Running {
            return false;
        }
        *phase = LoopPhase::Running;
        true
    }

    /// Running -> Idle. Clears the guard and the enabled flag together so a
    /// finished loop can never be observed as still runnable.
    fn finish(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        *self.phase.lock().expect("phase lock poisoned") = LoopPhase::Idle;
    }

    pub fn task_snapshot(&self) -> TaskConfig {
        self.task.lock().expect("task lock poisoned").clone()
    }

    pub fn update_task(&self, f: impl FnOnce(&mut TaskConfig)) {
        f(&mut self.task.lock().expect("task lock poisoned"));
    }

    pub fn with_accounts<R>(&self, f: impl FnOnce(&mut AccountStore) -> R) -> R {
        f(&mut self.accounts.lock().expect("accounts lock poisoned"))
    }

    pub fn eligible_accounts(&self) -> Vec<Account> {
        self.accounts.lock().expect("accounts lock poisoned").eligible()
    }

    fn set_account_status(&self, id: &str, status: AccountStatus) {
        self.accounts
            .lock()
            .expect("accounts lock poisoned")
            .set_status(id, status);
    }

    /// Import pasted account lines into the pool. Valid lines are kept even
    /// when others are invalid; the log only reports the overall outcome.
    pub fn import_accounts(&self, input: &str, log: &LogBook) -> usize {
        let parsed = crate::account::parse_accounts(input);
        let n = parsed.len();
        if n > 0 {
            self.with_accounts(|store| store.add_all(parsed));
            log.push(LogLevel::Success, format!("{n} accounts imported"), None);
        } else {
            log.push(
                LogLevel::Error,
                "no valid account lines — expected user:pass[:email[:token]]",
                None,
            );
        }
        n
    }

    /// Append generated quote texts to the task list (trimmed, non-empty).
    pub fn append_quote_texts(&self, lines: Vec<String>) {
        self.update_task(|task| {
            task.quote_texts
                .extend(lines.into_iter().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()));
        });
    }
}

/// Uniform draw from [min, max] seconds, inclusive. Tolerates an inverted
/// window (the configuration surface does not enforce min <= max).
pub fn sample_delay_s(min: u64, max: u64) -> u64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    rand::thread_rng().gen_range(lo..=hi)
}

/// Position in the (link x repeat) walk plus the independent text cursor.
#[derive(Debug, Default)]
struct Cursor {
    link_idx: usize,
    text_idx: usize,
    repeats_done: u32,
}

impl Cursor {
    /// Advance after one iteration. Returns true when the link list is
    /// exhausted. The text cursor always moves; the link cursor only moves
    /// once the per-link repeat count is spent.
    fn advance(&mut self, repeats_per_link: u32, link_count: usize) -> bool {
        self.text_idx += 1;
        self.repeats_done += 1;
        if self.repeats_done >= repeats_per_link.max(1) {
            self.repeats_done = 0;
            self.link_idx += 1;
            if self.link_idx >= link_count {
                return true;
            }
        }
        false
    }
}

/// Sequential dispatcher: one outbound request and one randomized delay in
/// flight at a time, everything else read fresh per iteration.
pub struct Dispatcher {
    ctx: Arc<DispatchContext>,
    backend: Arc<dyn QuoteBackend>,
    log: Arc<LogBook>,
    /// Mark an account Error after a failed request and stop selecting it.
    /// Off by default: failures then leave the account status untouched.
    demote_on_failure: bool,
}

impl Dispatcher {
    pub fn new(
        ctx: Arc<DispatchContext>,
        backend: Arc<dyn QuoteBackend>,
        log: Arc<LogBook>,
        demote_on_failure: bool,
    ) -> Self {
        Self {
            ctx,
            backend,
            log,
            demote_on_failure,
        }
    }

    pub fn context(&self) -> &Arc<DispatchContext> {
        &self.ctx
    }

    /// Request a stop. The current iteration (request + delay) still runs
    /// to completion; there is no cancellation of an in-flight request.
    pub fn stop(&self) {
        self.log.push(LogLevel::Warning, "dispatcher stopped by operator", None);
        self.ctx.request_stop();
    }

    /// Run the dispatch loop to completion. A second call while a loop is
    /// active returns immediately without touching any state.
    pub async fn run(&self) {
        if !self.ctx.try_begin() {
            tracing::debug!("dispatch loop already active, start ignored");
            return;
        }
        if !self.check_preconditions() {
            self.ctx.finish();
            return;
        }

        self.ctx.enabled.store(true, Ordering::SeqCst);
        self.log.push(
            LogLevel::Info,
            "dispatcher started, handing work to execution backend",
            None,
        );
        tracing::info!("dispatch loop started");

        let mut cursor = Cursor::default();

        while self.ctx.is_enabled() {
            let task = self.ctx.task_snapshot();

            let eligible = self.ctx.eligible_accounts();
            if eligible.is_empty() {
                // Fatal for this run: every account has been banned or errored.
                self.log.push(LogLevel::Error, "no usable accounts left", None);
                break;
            }

            // Uniform re-sample every iteration; recently used accounts are
            // not excluded.
            let Some(account) = eligible.choose(&mut rand::thread_rng()).cloned() else {
                break;
            };

            // The configuration surface can shrink lists mid-run; both are
            // re-checked against the fresh snapshot.
            let Some(link) = task.target_links.get(cursor.link_idx).cloned() else {
                self.log.push(LogLevel::Error, "target link list shrank below cursor", None);
                break;
            };
            if task.quote_texts.is_empty() {
                self.log.push(LogLevel::Error, "quote text list is empty", None);
                break;
            }
            let text = task.quote_texts[cursor.text_idx % task.quote_texts.len()].clone();

            let link_tail = link.rsplit('/').next().unwrap_or(&link);
            self.log.push(
                LogLevel::Info,
                format!("dispatching quote for {link_tail}"),
                Some(&account.username),
            );

            match self.backend.submit_quote(&account, &link, &text).await {
                Ok(message) => {
                    self.log
                        .push(LogLevel::Success, format!("OK: {message}"), Some(&account.username));
                    self.ctx.set_account_status(&account.id, AccountStatus::Active);
                }
                Err(err) => {
                    self.log.push(
                        LogLevel::Error,
                        format!("request failed: {err:#}"),
                        Some(&account.username),
                    );
                    tracing::warn!(account = %account.username, error = %err, "quote request failed");
                    if self.demote_on_failure {
                        self.ctx.set_account_status(&account.id, AccountStatus::Error);
                    }
                }
            }

            if cursor.advance(task.repeats_per_link, task.target_links.len()) {
                self.log.push(LogLevel::Success, "all target links processed", None);
                break;
            }

            if self.ctx.is_enabled() {
                let delay = sample_delay_s(task.delay_min_s, task.delay_max_s);
                self.log
                    .push(LogLevel::Warning, format!("waiting {delay}s before next dispatch"), None);
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
        }

        self.ctx.finish();
        tracing::info!("dispatch loop exited");
    }

    /// Hard start preconditions. Every missing input gets its own error entry
    /// and any failure aborts the start — nothing is retried.
    fn check_preconditions(&self) -> bool {
        let task = self.ctx.task_snapshot();
        let mut ok = true;
        if self.ctx.eligible_accounts().is_empty() {
            self.log
                .push(LogLevel::Error, "add at least one usable account before starting", None);
            ok = false;
        }
        if task.target_links.is_empty() {
            self.log.push(LogLevel::Error, "no target links configured", None);
            ok = false;
        }
        if task.quote_texts.is_empty() {
            self.log.push(LogLevel::Error, "no quote texts configured", None);
            ok = false;
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_walks_repeats_then_links() {
        let mut cursor = Cursor::default();
        // 2 links x 2 repeats -> done on the 4th advance
        assert!(!cursor.advance(2, 2));
        assert_eq!((cursor.link_idx, cursor.repeats_done), (0, 1));
        assert!(!cursor.advance(2, 2));
        assert_eq!((cursor.link_idx, cursor.repeats_done), (1, 0));
        assert!(!cursor.advance(2, 2));
        assert!(cursor.advance(2, 2));
        assert_eq!(cursor.text_idx, 4);
    }

    #[test]
    fn test_cursor_treats_zero_repeats_as_one() {
        let mut cursor = Cursor::default();
        assert!(cursor.advance(0, 1));
    }

    #[test]
    fn test_sample_delay_bounds_inclusive() {
        for _ in 0..1000 {
            let d = sample_delay_s(3, 9);
            assert!((3..=9).contains(&d));
        }
        assert_eq!(sample_delay_s(5, 5), 5);
    }

    #[test]
    fn test_sample_delay_tolerates_inverted_window() {
        for _ in 0..100 {
            let d = sample_delay_s(9, 3);
            assert!((3..=9).contains(&d));
        }
    }

    #[test]
    fn test_sample_delay_not_skewed_to_one_bound() {
        let samples: Vec<u64> = (0..1000).map(|_| sample_delay_s(0, 9)).collect();
        let low = samples.iter().filter(|&&d| d < 5).count();
        // Uniform over 10 values: each half expects ~500.
        assert!((300..=700).contains(&low), "low-half count {low} outside uniform range");
        assert!(samples.contains(&0));
        assert!(samples.contains(&9));
    }

    #[test]
    fn test_guard_transition_is_single_entry() {
        let ctx = DispatchContext::new(AccountStore::new(), TaskConfig::default());
        assert_eq!(ctx.phase(), LoopPhase::Idle);
        assert!(ctx.try_begin());
        assert_eq!(ctx.phase(), LoopPhase::Running);
        assert!(!ctx.try_begin());
        ctx.finish();
        assert_eq!(ctx.phase(), LoopPhase::Idle);
        assert!(!ctx.is_enabled());
        assert!(ctx.try_begin());
    }
}
