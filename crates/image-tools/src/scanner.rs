//! Trivy 스캐너 어댑터
//!
//! 이미지 하나당 최대 세 번의 호출을 수행합니다.
//!
//! ```text
//! trivy --image-src remote ──ok──> ScanMode::Remote
//!        │ 실패 / 타임아웃
//!        ▼
//! podman pull ──실패──> ScanFailure (여기서 중단, 출력 파일에 사유 기록)
//!        │ ok
//!        ▼
//! trivy --image-src podman ──ok──> ScanMode::LocalStore
//!                          └─실패─> ScanFailure
//! ```
//!
//! 스캔 결과 내용은 해석하지 않습니다. 아티팩트 파싱은 `relscan-vuln-report`가 담당합니다.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use relscan_core::config::ScanConfig;
use relscan_vuln_report::ArtifactFormat;
use tracing::{debug, info, warn};

use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

/// trivy 실행 파일 이름
pub const TRIVY: &str = "trivy";
/// podman 실행 파일 이름
pub const PODMAN: &str = "podman";
/// 인증 파일을 전달하는 환경 변수
pub const AUTH_FILE_ENV: &str = "REGISTRY_AUTH_FILE";

/// 스캔이 성공한 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// 로컬 이미지 없이 레지스트리에서 직접 스캔
    Remote,
    /// pull 후 로컬 저장소에서 스캔
    LocalStore,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::LocalStore => write!(f, "local"),
        }
    }
}

/// 이미지 단위 스캔 실패
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    /// 최종 실패 사유
    pub reason: String,
}

impl ScanFailure {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for ScanFailure {}

/// 스캐너 옵션
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// severity 필터 (예: `HIGH,CRITICAL`)
    pub severity: String,
    /// trivy 자체 타임아웃 문자열 (예: `10m`)
    pub trivy_timeout: String,
    /// 출력 형식
    pub format: ArtifactFormat,
    /// 원격/로컬 스캔 프로세스 타임아웃
    pub scan_timeout: Duration,
    /// pull 프로세스 타임아웃
    pub pull_timeout: Duration,
    /// `REGISTRY_AUTH_FILE`로 전달할 인증 파일
    pub auth_file: Option<PathBuf>,
}

impl ScanOptions {
    /// `[scan]` 설정에서 옵션을 만듭니다.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            severity: config.severity.clone(),
            trivy_timeout: config.timeout.clone(),
            format: if config.output_json {
                ArtifactFormat::Json
            } else {
                ArtifactFormat::Table
            },
            scan_timeout: Duration::from_secs(config.scan_timeout_secs),
            pull_timeout: Duration::from_secs(config.pull_timeout_secs),
            auth_file: None,
        }
    }

    /// 인증 파일을 설정합니다.
    pub fn with_auth_file(mut self, auth_file: Option<PathBuf>) -> Self {
        self.auth_file = auth_file;
        self
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

/// Trivy 스캐너
pub struct TrivyScanner<R: CommandRunner> {
    runner: R,
    options: ScanOptions,
}

impl<R: CommandRunner> TrivyScanner<R> {
    /// 새 스캐너를 생성합니다.
    pub fn new(runner: R, options: ScanOptions) -> Self {
        Self { runner, options }
    }

    /// 스캐너 옵션
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// 러너 참조 (테스트에서 호출 기록 확인용)
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// `trivy image` 명령을 구성합니다. `image_src`는 `remote` 또는 `podman`입니다.
    fn trivy_command(&self, reference: &str, image_src: &str) -> CommandSpec {
        let mut spec = CommandSpec::new(TRIVY).arg("image");
        if self.options.format == ArtifactFormat::Json {
            spec = spec.arg("--quiet");
        }
        spec = spec
            .args(["--image-src", image_src])
            .args(["--severity", self.options.severity.as_str()])
            .args(["--timeout", self.options.trivy_timeout.as_str()])
            .args(["--format", self.options.format.scanner_arg()])
            .arg(reference)
            .timeout(self.options.scan_timeout);
        if let Some(auth) = &self.options.auth_file {
            spec = spec.env(AUTH_FILE_ENV, auth.display().to_string());
        }
        spec
    }

    fn pull_command(&self, reference: &str) -> CommandSpec {
        CommandSpec::new(PODMAN)
            .args(["pull", "--quiet", reference])
            .timeout(self.options.pull_timeout)
    }

    /// 이미지 하나를 스캔하여 원시 출력을 `output`에 기록합니다.
    ///
    /// 원격 스캔이 실패하거나 타임아웃되면 pull 후 로컬 스캔을 한 번 시도합니다.
    /// pull 실패는 즉시 최종 실패가 되며, 사유가 출력 파일에 기록됩니다.
    pub async fn scan(&self, reference: &str, output: &Path) -> Result<ScanMode, ScanFailure> {
        let remote = self
            .runner
            .run_to_file(&self.trivy_command(reference, "remote"), output)
            .await;
        match remote {
            Ok(out) if out.is_success() => {
                debug!(reference, "remote scan succeeded");
                return Ok(ScanMode::Remote);
            }
            Ok(out) => {
                info!(
                    reference,
                    reason = %out.describe_failure(),
                    "remote scan failed, falling back to pull"
                );
            }
            Err(e) => {
                warn!(reference, error = %e, "remote scan could not run, falling back to pull");
            }
        }

        let pull = self.runner.run(&self.pull_command(reference)).await;
        let pull_failure = match pull {
            Ok(out) if out.is_success() => None,
            Ok(out) => Some(pull_failure_reason(&out)),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = pull_failure {
            warn!(reference, reason = %reason, "image pull failed");
            let note = format!("Failed to pull image: {reason}\n");
            if let Err(e) = tokio::fs::write(output, note).await {
                warn!(path = %output.display(), error = %e, "failed to record pull failure");
            }
            return Err(ScanFailure::new(format!("pull failed: {reason}")));
        }

        match self
            .runner
            .run_to_file(&self.trivy_command(reference, "podman"), output)
            .await
        {
            Ok(out) if out.is_success() => {
                debug!(reference, "local scan succeeded");
                Ok(ScanMode::LocalStore)
            }
            Ok(out) => Err(ScanFailure::new(format!(
                "local scan failed: {}",
                out.describe_failure()
            ))),
            Err(e) => Err(ScanFailure::new(format!("local scan failed: {e}"))),
        }
    }
}

fn pull_failure_reason(out: &CommandOutput) -> String {
    if out.timed_out {
        return "timed out".to_owned();
    }
    let stderr = out.stderr_text();
    if stderr.is_empty() {
        out.describe_failure()
    } else {
        stderr
    }
}
