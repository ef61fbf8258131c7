//! Child process runner with a hard wall-clock timeout.
//!
//! The runner never returns an error: spawn failures, non-zero exits and
//! timeouts all come back as a [`ProcessOutcome`] so callers can feed
//! "could not run" and "ran and failed" into the same fallback decision.

use futures::stream::BoxStream;
use futures::StreamExt;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// A stream of byte chunks, used to feed a child's standard input.
pub type ByteStream = BoxStream<'static, std::io::Result<Vec<u8>>>;

/// Synthetic exit code when the binary could not be started.
pub const SPAWN_FAILED_EXIT_CODE: i32 = 127;

/// Synthetic exit code when the process was killed by the deadline.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Only the tail of stderr is kept.
const STDERR_LIMIT: usize = 64 * 1024;

/// How long to wait for stderr to drain after the process exits.
const STDERR_GRACE: Duration = Duration::from_secs(2);

/// Exit status plus captured diagnostics of one child process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub stderr: String,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    fn spawn_failed(binary: &Path, error: std::io::Error, elapsed: Duration) -> Self {
        Self {
            exit_code: SPAWN_FAILED_EXIT_CODE,
            stderr: format!("failed to start {}: {}", binary.display(), error),
            timed_out: false,
            elapsed,
        }
    }

    fn timed_out(limit: Duration, elapsed: Duration) -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            stderr: format!("Timed out after {}s", limit.as_secs_f64()),
            timed_out: true,
            elapsed,
        }
    }
}

/// Runs external binaries with stdin closed (or fed), stdout discarded and stderr captured.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs `binary` with `args` and no standard input.
    pub async fn run(&self, binary: &Path, args: &[String]) -> ProcessOutcome {
        self.execute(binary, args, None).await
    }

    /// Runs `binary` with `input` piped into its standard input.
    ///
    /// A failure of the input stream turns a zero exit into a failure, since the
    /// child only saw a truncated input.
    pub async fn run_with_input(
        &self,
        binary: &Path,
        args: &[String],
        input: ByteStream,
    ) -> ProcessOutcome {
        self.execute(binary, args, Some(input)).await
    }

    async fn execute(
        &self,
        binary: &Path,
        args: &[String],
        input: Option<ByteStream>,
    ) -> ProcessOutcome {
        let start = Instant::now();

        let mut command = Command::new(binary);
        command
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match spawn(&mut command).await {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(binary = %binary.display(), error = %e, "Spawn failed");
                return ProcessOutcome::spawn_failed(binary, e, start.elapsed());
            }
        };

        let mut stderr_task = child.stderr.take().map(|s| tokio::spawn(read_tail(s)));
        let mut stdin_task = match (input, child.stdin.take()) {
            (Some(input), Some(stdin)) => Some(tokio::spawn(feed_stdin(input, stdin))),
            _ => None,
        };

        match timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let feed_error = match stdin_task.take() {
                    Some(task) => task.await.unwrap_or_else(|e| Err(e.to_string())).err(),
                    None => None,
                };
                let mut stderr = collect_stderr(stderr_task.take()).await;
                // Signal terminations carry no code.
                let mut exit_code = status.code().unwrap_or(1);

                if let Some(feed_error) = feed_error {
                    if exit_code == 0 {
                        exit_code = 1;
                    }
                    if !stderr.is_empty() && !stderr.ends_with('\n') {
                        stderr.push('\n');
                    }
                    stderr.push_str(&feed_error);
                }

                ProcessOutcome {
                    exit_code,
                    stderr,
                    timed_out: false,
                    elapsed: start.elapsed(),
                }
            }
            Ok(Err(e)) => {
                let _ = child.kill().await;
                abort(stdin_task.take());
                abort(stderr_task.take());
                ProcessOutcome {
                    exit_code: 1,
                    stderr: format!("failed waiting for {}: {}", binary.display(), e),
                    timed_out: false,
                    elapsed: start.elapsed(),
                }
            }
            Err(_) => {
                // Force termination, waiting alone would leak the process.
                if let Err(e) = child.kill().await {
                    tracing::warn!(
                        binary = %binary.display(),
                        error = %e,
                        "Failed to kill timed out process"
                    );
                }
                abort(stdin_task.take());
                abort(stderr_task.take());
                tracing::warn!(
                    binary = %binary.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "Process timed out and was killed"
                );
                ProcessOutcome::timed_out(self.timeout, start.elapsed())
            }
        }
    }
}

/// A binary written moments ago can be briefly reported busy (ETXTBSY)
/// while another thread's fork still holds its write handle.
async fn spawn(command: &mut Command) -> std::io::Result<Child> {
    const EXECUTABLE_BUSY: i32 = 26;
    let mut retries = 3;
    loop {
        match command.spawn() {
            Err(e)
                if retries > 0
                    && cfg!(target_os = "linux")
                    && e.raw_os_error() == Some(EXECUTABLE_BUSY) =>
            {
                retries -= 1;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            result => return result,
        }
    }
}

async fn read_tail<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut captured: Vec<u8> = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                captured.extend_from_slice(&buf[..n]);
                if captured.len() > STDERR_LIMIT {
                    let excess = captured.len() - STDERR_LIMIT;
                    captured.drain(..excess);
                }
            }
        }
    }
    String::from_utf8_lossy(&captured).trim_end().to_string()
}

async fn feed_stdin(mut input: ByteStream, mut stdin: ChildStdin) -> Result<(), String> {
    while let Some(chunk) = input.next().await {
        let chunk = chunk.map_err(|e| format!("input stream failed: {}", e))?;
        stdin
            .write_all(&chunk)
            .await
            .map_err(|e| format!("failed writing to stdin: {}", e))?;
    }
    stdin
        .shutdown()
        .await
        .map_err(|e| format!("failed closing stdin: {}", e))
}

async fn collect_stderr(task: Option<JoinHandle<String>>) -> String {
    let Some(mut task) = task else {
        return String::new();
    };
    match timeout(STDERR_GRACE, &mut task).await {
        Ok(Ok(text)) => text,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            // A grandchild may still hold the pipe open.
            task.abort();
            String::new()
        }
    }
}

fn abort<T>(task: Option<JoinHandle<T>>) {
    if let Some(task) = task {
        task.abort();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::write_script;
    use futures::stream;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_binary_is_synthetic_exit() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let outcome = runner
            .run(Path::new("/nonexistent/definitely-not-here"), &[])
            .await;
        assert_eq!(outcome.exit_code, SPAWN_FAILED_EXIT_CODE);
        assert!(!outcome.stderr.is_empty());
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn test_nonzero_exit_returned_as_data() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "fail", "echo 'ERROR: unsupported url' >&2\nexit 3");

        let outcome = ProcessRunner::new(Duration::from_secs(5))
            .run(&script, &[])
            .await;
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.stderr.contains("unsupported url"));
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn test_args_are_passed() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("args.txt");
        let script = write_script(dir.path(), "echo-args", "printf '%s\\n' \"$@\" > \"$1\"");

        let args = vec![out.to_string_lossy().to_string(), "--flag".to_string()];
        let outcome = ProcessRunner::new(Duration::from_secs(5))
            .run(&script, &args)
            .await;
        assert!(outcome.success());
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("--flag"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "hang", "exec sleep 30");

        let runner = ProcessRunner::new(Duration::from_millis(200));
        let start = Instant::now();
        let outcome = runner.run(&script, &[]).await;

        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(outcome.exit_code, TIMEOUT_EXIT_CODE);
        assert!(outcome.timed_out);
        assert!(outcome.stderr.contains("Timed out after"));
    }

    #[tokio::test]
    async fn test_run_with_input_pipes_stdin() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("stdin.bin");
        let script = write_script(dir.path(), "sink", "cat > \"$1\"");

        let input: ByteStream =
            stream::iter(vec![Ok(b"hello ".to_vec()), Ok(b"world".to_vec())]).boxed();
        let outcome = ProcessRunner::new(Duration::from_secs(5))
            .run_with_input(&script, &[out.to_string_lossy().to_string()], input)
            .await;

        assert!(outcome.success(), "stderr: {}", outcome.stderr);
        assert_eq!(std::fs::read(&out).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_failed_input_stream_fails_run() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("stdin.bin");
        let script = write_script(dir.path(), "sink", "cat > \"$1\"");

        let input: ByteStream = stream::iter(vec![
            Ok(b"partial".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "connection reset")),
        ])
        .boxed();
        let outcome = ProcessRunner::new(Duration::from_secs(5))
            .run_with_input(&script, &[out.to_string_lossy().to_string()], input)
            .await;

        assert!(!outcome.success());
        assert!(outcome.stderr.contains("connection reset"));
    }
}
