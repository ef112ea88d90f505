//! Subprocess abstraction for testability.
//!
//! The [`CommandRunner`] trait abstracts process execution, allowing
//! production code to use [`TokioCommandRunner`] while tests use `MockCommandRunner`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │ TrivyScanner / Verifier  │
//! └────────────┬─────────────┘
//!              │
//!              ▼
//!      ┌───────────────┐
//!      │ CommandRunner │ (trait)
//!      └───────────────┘
//!          │       │
//!          ▼       ▼
//!      ┌───────┐ ┌──────┐
//!      │ Tokio │ │ Mock │
//!      └───┬───┘ └──────┘
//!          │
//!          ▼
//!   trivy / skopeo / podman
//! ```
//!
//! # Timeouts
//!
//! Every invocation carries its own timeout. A timed-out child is killed
//! (`kill_on_drop`) and reported as [`CommandOutput::timed_out`], never as an error.
//! Partial output of a timed-out process is discarded.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tracing::debug;

use crate::error::ToolError;

/// Default timeout used when a spec does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Extra environment variables set on top of the inherited environment.
    pub envs: Vec<(String, String)>,
    /// Wall-clock limit for the whole invocation.
    pub timeout: Duration,
}

impl CommandSpec {
    /// Creates a spec with no arguments and the default timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a finished (or timed-out) invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal or timed out.
    pub code: Option<i32>,
    /// The process did not finish within its timeout.
    pub timed_out: bool,
    /// Captured stdout (empty when output went to a file).
    pub stdout: Vec<u8>,
    /// Captured stderr (empty when output went to a file).
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Successful exit with the given stdout.
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Non-zero exit with the given stderr.
    pub fn failure(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// Timed-out invocation.
    pub fn timeout() -> Self {
        Self {
            timed_out: true,
            ..Self::default()
        }
    }

    /// Exit code 0 within the timeout.
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }

    /// Trimmed, lossy stderr for diagnostics.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_owned()
    }

    /// Short human-readable failure description.
    pub fn describe_failure(&self) -> String {
        if self.timed_out {
            return "timed out".to_owned();
        }
        let stderr = self.stderr_text();
        match (self.code, stderr.is_empty()) {
            (Some(code), true) => format!("exit code {code}"),
            (Some(code), false) => format!("exit code {code}: {stderr}"),
            (None, _) => "terminated by signal".to_owned(),
        }
    }
}

/// Trait abstracting external process execution.
///
/// The trait is `Send + Sync + 'static`, allowing safe sharing across async contexts.
///
/// # Implementations
///
/// - [`TokioCommandRunner`]: Production implementation using `tokio::process`
/// - `MockCommandRunner`: Scripted responses (tests and the `test-util` feature only)
///
/// # Errors
///
/// Both methods return `ToolError::Spawn` only when the process cannot be started
/// (e.g. the executable is missing). Non-zero exits and timeouts are `Ok`.
pub trait CommandRunner: Send + Sync + 'static {
    /// Runs the command and captures stdout and stderr.
    fn run(
        &self,
        spec: &CommandSpec,
    ) -> impl Future<Output = Result<CommandOutput, ToolError>> + Send;

    /// Runs the command with stdout and stderr both written to `output`.
    ///
    /// The file is truncated first.
    fn run_to_file(
        &self,
        spec: &CommandSpec,
        output: &Path,
    ) -> impl Future<Output = Result<CommandOutput, ToolError>> + Send;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    /// Creates a runner.
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(spec: &CommandSpec, source: std::io::Error) -> ToolError {
        ToolError::Spawn {
            program: spec.program.clone(),
            source,
        }
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ToolError> {
        debug!(command = %spec, timeout_secs = spec.timeout.as_secs(), "running command");
        let child = Self::command(spec)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                code: output.status.code(),
                timed_out: false,
                stdout: output.stdout,
                stderr: output.stderr,
            }),
            Ok(Err(e)) => Err(Self::spawn_error(spec, e)),
            Err(_) => {
                debug!(command = %spec, "command timed out");
                Ok(CommandOutput::timeout())
            }
        }
    }

    async fn run_to_file(
        &self,
        spec: &CommandSpec,
        output: &Path,
    ) -> Result<CommandOutput, ToolError> {
        debug!(command = %spec, output = %output.display(), "running command to file");
        let io_error = |source| ToolError::Io {
            path: output.display().to_string(),
            source,
        };

        let stdout_file = tokio::fs::File::create(output)
            .await
            .map_err(io_error)?
            .into_std()
            .await;
        let stderr_file = stdout_file.try_clone().map_err(io_error)?;

        let mut child = Self::command(spec)
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file))
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        let waited = tokio::time::timeout(spec.timeout, child.wait()).await;
        match waited {
            Ok(Ok(status)) => Ok(CommandOutput {
                code: status.code(),
                ..CommandOutput::default()
            }),
            Ok(Err(e)) => Err(Self::spawn_error(spec, e)),
            Err(_) => {
                // kill_on_drop 대신 명시적으로 종료하여 파일 핸들을 즉시 닫습니다.
                let _ = child.kill().await;
                debug!(command = %spec, "command timed out");
                Ok(CommandOutput::timeout())
            }
        }
    }
}

/// 테스트용 Mock 러너
///
/// 명령 문자열(`program arg1 arg2 ...`)에 부분 문자열이 포함된 첫 규칙의 응답을 반환합니다.
/// 일치하는 규칙이 없으면 성공(빈 출력)을 반환합니다.
#[cfg(any(test, feature = "test-util"))]
#[derive(Default)]
pub struct MockCommandRunner {
    rules: Vec<(String, MockReply)>,
    calls: std::sync::Mutex<Vec<CommandSpec>>,
}

/// Mock 응답
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 프로세스가 실행되어 주어진 결과로 종료
    Output(CommandOutput),
    /// 프로세스 실행 자체가 실패 (도구 미설치)
    SpawnError,
}

#[cfg(any(test, feature = "test-util"))]
impl MockCommandRunner {
    /// 규칙 없는 mock 러너를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 명령 문자열에 `needle`이 포함되면 `reply`를 반환하는 규칙을 추가합니다.
    pub fn on(mut self, needle: impl Into<String>, reply: MockReply) -> Self {
        self.rules.push((needle.into(), reply));
        self
    }

    /// 성공 응답 규칙을 추가합니다.
    pub fn succeed(self, needle: impl Into<String>, stdout: impl Into<Vec<u8>>) -> Self {
        self.on(needle, MockReply::Output(CommandOutput::success(stdout)))
    }

    /// 실패 응답 규칙을 추가합니다.
    pub fn fail(self, needle: impl Into<String>, stderr: impl Into<Vec<u8>>) -> Self {
        self.on(needle, MockReply::Output(CommandOutput::failure(1, stderr)))
    }

    /// 타임아웃 응답 규칙을 추가합니다.
    pub fn time_out(self, needle: impl Into<String>) -> Self {
        self.on(needle, MockReply::Output(CommandOutput::timeout()))
    }

    /// 실행 불가 응답 규칙을 추가합니다.
    pub fn missing(self, needle: impl Into<String>) -> Self {
        self.on(needle, MockReply::SpawnError)
    }

    /// 지금까지 실행된 명령 목록
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// 실행된 명령 문자열 목록
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }

    fn reply(&self, spec: &CommandSpec) -> Result<CommandOutput, ToolError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        let line = spec.to_string();
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| MockReply::Output(CommandOutput::success(Vec::new())));
        match reply {
            MockReply::Output(output) => Ok(output),
            MockReply::SpawnError => Err(ToolError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock: not installed"),
            }),
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ToolError> {
        self.reply(spec)
    }

    async fn run_to_file(
        &self,
        spec: &CommandSpec,
        output: &Path,
    ) -> Result<CommandOutput, ToolError> {
        let mut result = self.reply(spec)?;
        // 실제 러너처럼 stdout/stderr를 파일로 보냅니다.
        let mut content = std::mem::take(&mut result.stdout);
        content.extend(std::mem::take(&mut result.stderr));
        if !result.timed_out {
            tokio::fs::write(output, &content)
                .await
                .map_err(|source| ToolError::Io {
                    path: output.display().to_string(),
                    source,
                })?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_display_joins_args() {
        let spec = CommandSpec::new("trivy")
            .arg("image")
            .args(["--quiet", "--format", "json"])
            .env("REGISTRY_AUTH_FILE", "/tmp/auth.json")
            .timeout(Duration::from_secs(5));
        assert_eq!(spec.to_string(), "trivy image --quiet --format json");
        assert_eq!(spec.timeout, Duration::from_secs(5));
        assert_eq!(spec.envs.len(), 1);
    }

    #[test]
    fn output_describe_failure() {
        assert_eq!(CommandOutput::timeout().describe_failure(), "timed out");
        assert_eq!(
            CommandOutput::failure(125, "manifest unknown\n").describe_failure(),
            "exit code 125: manifest unknown"
        );
        assert_eq!(
            CommandOutput::failure(2, "").describe_failure(),
            "exit code 2"
        );
        assert!(CommandOutput::success("ok").is_success());
        assert!(!CommandOutput::timeout().is_success());
    }

    #[tokio::test]
    async fn mock_runner_matches_first_rule_and_records_calls() {
        let runner = MockCommandRunner::new()
            .fail("--image-src remote", "unauthorized")
            .succeed("trivy", "{}");

        let remote = CommandSpec::new("trivy").args(["image", "--image-src", "remote"]);
        let local = CommandSpec::new("trivy").args(["image", "--image-src", "podman"]);

        assert!(!runner.run(&remote).await.expect("run").is_success());
        assert!(runner.run(&local).await.expect("run").is_success());
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn mock_runner_missing_tool_is_spawn_error() {
        let runner = MockCommandRunner::new().missing("skopeo");
        let err = runner
            .run(&CommandSpec::new("skopeo").arg("--version"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[tokio::test]
    async fn mock_runner_writes_output_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.json");
        let runner = MockCommandRunner::new().succeed("trivy", "{\"Results\":[]}");
        let output = runner
            .run_to_file(&CommandSpec::new("trivy"), &path)
            .await
            .expect("run");
        assert!(output.is_success());
        let written = tokio::fs::read_to_string(&path).await.expect("read");
        assert_eq!(written, "{\"Results\":[]}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tokio_runner_captures_output() {
        let runner = TokioCommandRunner::new();
        let output = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo hello; echo oops >&2; exit 3"]))
            .await
            .expect("sh should run");
        assert_eq!(output.code, Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
        assert_eq!(output.stderr_text(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tokio_runner_merges_streams_into_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("merged.txt");
        let runner = TokioCommandRunner::new();
        let output = runner
            .run_to_file(
                &CommandSpec::new("sh").args(["-c", "echo out; echo err >&2"]),
                &path,
            )
            .await
            .expect("sh should run");
        assert!(output.is_success());
        let content = tokio::fs::read_to_string(&path).await.expect("read");
        assert!(content.contains("out"));
        assert!(content.contains("err"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tokio_runner_times_out() {
        let runner = TokioCommandRunner::new();
        let output = runner
            .run(&CommandSpec::new("sleep").arg("5").timeout(Duration::from_millis(100)))
            .await
            .expect("sleep should spawn");
        assert!(output.timed_out);
        assert!(!output.is_success());
    }

    #[tokio::test]
    async fn tokio_runner_missing_program_is_spawn_error() {
        let runner = TokioCommandRunner::new();
        let err = runner
            .run(&CommandSpec::new("relscan-definitely-not-installed"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
