//! Timeout-bounded process execution
//!
//! Every external command the engine runs goes through [`TimeoutExecutor`]:
//! installer backends, version-control clients, build tools, downloads. The
//! executor owns the full lifecycle of one attempt: spawn, stream output to
//! the attempt's private log file, enforce the wall-clock bound, and on
//! overrun terminate gracefully before force-killing. It always hands back
//! exactly one [`ExecutionResult`], never leaving the caller waiting.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use armory_core::error::Result;
use armory_core::retry::{
    AlwaysRetry, RetryError, RetryExecutorBuilder, RetryPredicate, TracingObserver,
};
use armory_core::types::RetryPolicy;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default grace window between SIGTERM and forced kill
const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// One external command invocation, built up before execution
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Shell-style rendering for log headers and error reasons
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn build(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        command
    }
}

/// How a bounded command invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Process exited on its own with this code
    Completed(i32),
    /// Wall-clock bound elapsed; process was terminated by the executor
    TimedOut,
    /// Process was ended by a signal the executor did not send
    Killed,
}

/// Result of exactly one command attempt
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub log_path: PathBuf,
    pub duration: Duration,
    pub attempt: u32,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, ExecutionStatus::Completed(0))
    }
}

/// Runs one external command under a wall-clock bound
#[derive(Debug, Clone)]
pub struct TimeoutExecutor {
    grace: Duration,
}

impl Default for TimeoutExecutor {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
        }
    }
}

impl TimeoutExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the SIGTERM-to-kill grace window (tests use a short one)
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run `spec` with output appended to `log_sink`
    ///
    /// The log sink must be private to this invocation; concurrent
    /// invocations each get their own file so attribution stays unambiguous.
    pub async fn execute(
        &self,
        spec: &CommandSpec,
        timeout: Duration,
        log_sink: &Path,
        attempt: u32,
    ) -> Result<ExecutionResult> {
        if let Some(parent) = log_sink.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut log_file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_sink)
            .await?;
        log_file
            .write_all(format!("$ {}\n", spec.display_line()).as_bytes())
            .await?;

        let mut command = spec.build();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %spec.display_line(), timeout_secs = timeout.as_secs(), "spawning");
        let start = Instant::now();
        let mut child = command.spawn()?;

        let log = Arc::new(Mutex::new(log_file));
        let mut writers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            writers.push(tokio::spawn(copy_lines(stdout, log.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            writers.push(tokio::spawn(copy_lines(stderr, log.clone())));
        }

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(exit) => {
                let exit = exit?;
                match exit.code() {
                    Some(code) => ExecutionStatus::Completed(code),
                    // No exit code means an external signal ended it
                    None => ExecutionStatus::Killed,
                }
            }
            Err(_) => {
                warn!(
                    command = %spec.display_line(),
                    timeout_secs = timeout.as_secs(),
                    "command exceeded its timeout, terminating"
                );
                self.terminate(&mut child).await;
                ExecutionStatus::TimedOut
            }
        };

        for writer in writers {
            let _ = writer.await;
        }
        {
            let mut file = log.lock().await;
            let _ = file.flush().await;
        }

        Ok(ExecutionResult {
            status,
            log_path: log_sink.to_path_buf(),
            duration: start.elapsed(),
            attempt,
        })
    }

    /// SIGTERM, wait out the grace window, then kill
    async fn terminate(&self, child: &mut Child) {
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
        if tokio::time::timeout(self.grace, child.wait()).await.is_err() {
            let _ = child.kill().await;
        }
    }
}

async fn copy_lines<R>(reader: R, log: Arc<Mutex<tokio::fs::File>>)
where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut file = log.lock().await;
        let _ = file.write_all(line.as_bytes()).await;
        let _ = file.write_all(b"\n").await;
    }
}

/// One failed attempt, shaped for the retry engine
///
/// `TimedOut` and nonzero exits are deliberately indistinguishable to the
/// retry loop; `timed_out` survives on the final error so the driver can
/// decide whether a post-condition probe applies.
#[derive(Debug, thiserror::Error)]
#[error("{message} (log: {log_path})")]
pub struct AttemptFailure {
    message: String,
    log_path: String,
    pub timed_out: bool,
}

impl AttemptFailure {
    fn new(message: impl Into<String>, log_path: &Path, timed_out: bool) -> Self {
        Self {
            message: message.into(),
            log_path: log_path.display().to_string(),
            timed_out,
        }
    }
}

/// Last few output lines of an attempt log
///
/// Failure messages carry this excerpt so the ledger reason names the actual
/// error and message-based retry predicates have command output to match.
async fn log_excerpt(path: &Path) -> Option<String> {
    let text = tokio::fs::read_to_string(path).await.ok()?;
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with("$ "))
        .collect();
    let start = lines.len().saturating_sub(3);
    let excerpt = lines[start..].join(" | ");
    (!excerpt.is_empty()).then_some(excerpt)
}

/// Run one command through the retry policy, retrying every failure
pub async fn run_with_retry(
    executor: &TimeoutExecutor,
    policy: &RetryPolicy,
    spec: &CommandSpec,
    timeout: Duration,
    log_for_attempt: impl Fn(u32) -> PathBuf,
    operation: &str,
) -> std::result::Result<ExecutionResult, RetryError<AttemptFailure>> {
    run_with_retry_if(
        executor,
        policy,
        AlwaysRetry,
        spec,
        timeout,
        log_for_attempt,
        operation,
    )
    .await
}

/// Run one command through the retry policy, with a fresh log per attempt
///
/// The predicate sees each attempt's [`AttemptFailure`], whose message ends
/// with the log excerpt; acquisition passes a message predicate here so only
/// network-shaped failures burn further attempts.
pub async fn run_with_retry_if<P>(
    executor: &TimeoutExecutor,
    policy: &RetryPolicy,
    predicate: P,
    spec: &CommandSpec,
    timeout: Duration,
    log_for_attempt: impl Fn(u32) -> PathBuf,
    operation: &str,
) -> std::result::Result<ExecutionResult, RetryError<AttemptFailure>>
where
    P: RetryPredicate<AttemptFailure>,
{
    let attempt_counter = AtomicU32::new(0);

    RetryExecutorBuilder::new()
        .with_policy(policy.clone())
        .with_predicate(predicate)
        .with_observer(TracingObserver::new(operation))
        .build()
        .execute(|| {
            let attempt = attempt_counter.fetch_add(1, Ordering::SeqCst) + 1;
            let log_path = log_for_attempt(attempt);
            async move {
                let result = executor
                    .execute(spec, timeout, &log_path, attempt)
                    .await
                    .map_err(|err| AttemptFailure::new(err.to_string(), &log_path, false))?;

                match result.status {
                    ExecutionStatus::Completed(0) => Ok(result),
                    ExecutionStatus::Completed(code) => {
                        let mut message = format!("exit code {code}");
                        if let Some(excerpt) = log_excerpt(&result.log_path).await {
                            message.push_str(": ");
                            message.push_str(&excerpt);
                        }
                        Err(AttemptFailure::new(message, &result.log_path, false))
                    }
                    ExecutionStatus::TimedOut => Err(AttemptFailure::new(
                        format!("timed out after {}s", timeout.as_secs()),
                        &result.log_path,
                        true,
                    )),
                    ExecutionStatus::Killed => Err(AttemptFailure::new(
                        "terminated by signal",
                        &result.log_path,
                        false,
                    )),
                }
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use armory_core::types::{RetryPolicy, RetryStrategy};
    use tempfile::TempDir;

    fn log_in(dir: &TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    #[tokio::test]
    async fn test_zero_exit_is_completed() {
        let tmp = TempDir::new().unwrap();
        let executor = TimeoutExecutor::new();
        let spec = CommandSpec::new("sh").arg("-c").arg("echo hello");

        let result = executor
            .execute(&spec, Duration::from_secs(10), &log_in(&tmp, "echo.log"), 1)
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Completed(0));
        assert!(result.succeeded());

        let log = std::fs::read_to_string(result.log_path).unwrap();
        assert!(log.contains("hello"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_code_is_preserved() {
        let tmp = TempDir::new().unwrap();
        let executor = TimeoutExecutor::new();
        let spec = CommandSpec::new("sh").arg("-c").arg("exit 3");

        let result = executor
            .execute(&spec, Duration::from_secs(10), &log_in(&tmp, "exit.log"), 1)
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Completed(3));
        assert!(!result.succeeded());
    }

    #[tokio::test]
    async fn test_sleep_beyond_timeout_yields_timed_out() {
        let tmp = TempDir::new().unwrap();
        let executor = TimeoutExecutor::new().with_grace(Duration::from_millis(200));
        // Trap-less sleep accepts SIGTERM, so the grace path suffices
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo $$ > pid; sleep 60")
            .current_dir(tmp.path());

        let result = executor
            .execute(
                &spec,
                Duration::from_millis(300),
                &log_in(&tmp, "sleep.log"),
                1,
            )
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::TimedOut);

        // The spawned process must be gone afterward
        let pid: i32 = std::fs::read_to_string(tmp.path().join("pid"))
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive, "timed-out process should no longer be running");
    }

    #[tokio::test]
    async fn test_stderr_lands_in_log() {
        let tmp = TempDir::new().unwrap();
        let executor = TimeoutExecutor::new();
        let spec = CommandSpec::new("sh").arg("-c").arg("echo oops >&2; exit 1");

        let result = executor
            .execute(&spec, Duration::from_secs(10), &log_in(&tmp, "err.log"), 1)
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Completed(1));
        let log = std::fs::read_to_string(result.log_path).unwrap();
        assert!(log.contains("oops"));
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            strategy: RetryStrategy::FixedDelay,
            backoff_multiplier: 1.0,
            initial_delay_ms: 5,
            max_delay_ms: 20,
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_third_attempt() {
        let tmp = TempDir::new().unwrap();
        let executor = TimeoutExecutor::new();
        // Fails until the marker file accumulates three lines
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo x >> marker; test $(wc -l < marker) -ge 3")
            .current_dir(tmp.path());

        let result = run_with_retry(
            &executor,
            &fast_policy(3),
            &spec,
            Duration::from_secs(10),
            |attempt| tmp.path().join(format!("try-{attempt}.log")),
            "flaky step",
        )
        .await
        .unwrap();

        assert!(result.succeeded());
        assert_eq!(result.attempt, 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_at_max_attempts() {
        let tmp = TempDir::new().unwrap();
        let executor = TimeoutExecutor::new();
        let spec = CommandSpec::new("sh").arg("-c").arg("exit 1");

        let err = run_with_retry(
            &executor,
            &fast_policy(3),
            &spec,
            Duration::from_secs(10),
            |attempt| tmp.path().join(format!("fail-{attempt}.log")),
            "doomed step",
        )
        .await
        .unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        // Each attempt wrote its own log
        for attempt in 1..=3 {
            assert!(tmp.path().join(format!("fail-{attempt}.log")).exists());
        }
    }

    #[tokio::test]
    async fn test_failure_message_carries_log_excerpt() {
        let tmp = TempDir::new().unwrap();
        let executor = TimeoutExecutor::new();
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo 'E: unable to locate package' >&2; exit 100");

        let err = run_with_retry(
            &executor,
            &fast_policy(1),
            &spec,
            Duration::from_secs(10),
            |attempt| tmp.path().join(format!("apt-{attempt}.log")),
            "apt step",
        )
        .await
        .unwrap_err();

        let failure = err.into_source().unwrap().to_string();
        assert!(failure.contains("exit code 100"));
        assert!(failure.contains("unable to locate package"));
    }

    #[tokio::test]
    async fn test_network_failures_retry_but_fatal_ones_do_not() {
        let tmp = TempDir::new().unwrap();
        let executor = TimeoutExecutor::new();
        let predicate = armory_core::retry::MessagePredicate::network_errors();

        // Resolver failure text matches a transient pattern
        let transient = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo 'curl: (6) Could not resolve host: example.invalid' >&2; exit 6");
        let err = run_with_retry_if(
            &executor,
            &fast_policy(3),
            predicate.clone(),
            &transient,
            Duration::from_secs(10),
            |attempt| tmp.path().join(format!("net-{attempt}.log")),
            "transient fetch",
        )
        .await
        .unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);

        // A missing repository is not transient; one attempt is enough
        let fatal = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo 'fatal: repository not found' >&2; exit 128");
        let err = run_with_retry_if(
            &executor,
            &fast_policy(3),
            predicate,
            &fatal,
            Duration::from_secs(10),
            |attempt| tmp.path().join(format!("fatal-{attempt}.log")),
            "doomed fetch",
        )
        .await
        .unwrap_err();
        assert!(err.is_non_retryable());
        assert!(!tmp.path().join("fatal-2.log").exists());
    }

    #[tokio::test]
    async fn test_timed_out_flag_survives_exhaustion() {
        let tmp = TempDir::new().unwrap();
        let executor = TimeoutExecutor::new().with_grace(Duration::from_millis(100));
        let spec = CommandSpec::new("sh").arg("-c").arg("sleep 60");

        let err = run_with_retry(
            &executor,
            &fast_policy(1),
            &spec,
            Duration::from_millis(200),
            |attempt| tmp.path().join(format!("slow-{attempt}.log")),
            "slow step",
        )
        .await
        .unwrap_err();

        let failure = err.into_source().unwrap();
        assert!(failure.timed_out);
    }
}
