//! 이미지 pull 가능 여부 검증
//!
//! 실행 단위로 도구 하나를 고정합니다.
//!
//! - skopeo: `skopeo inspect --raw docker://REF` (메타데이터만 조회, pull 없음)
//! - podman: `podman image inspect REF` → 로컬에 없고 `pull_on_miss`면 `podman pull -q REF`

use std::fmt;
use std::time::{Duration, Instant};

use relscan_core::config::VerifyConfig;
use tracing::{debug, warn};

use crate::runner::{CommandRunner, CommandSpec};
use crate::scanner::PODMAN;

/// skopeo 실행 파일 이름
pub const SKOPEO: &str = "skopeo";

/// 검증 방식
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyMethod {
    /// skopeo 원격 inspect
    Skopeo {
        /// `--override-arch` 값
        arch: Option<String>,
        /// `--override-os` 값
        os: Option<String>,
        /// inspect 타임아웃
        timeout: Duration,
    },
    /// podman 로컬 inspect (+ 선택적 pull)
    Podman {
        /// 로컬에 없을 때 pull 시도
        pull_on_miss: bool,
        /// 로컬 inspect 타임아웃
        inspect_timeout: Duration,
        /// pull 타임아웃
        pull_timeout: Duration,
    },
}

impl VerifyMethod {
    /// `[verify]` 설정에서 방식을 결정합니다.
    ///
    /// 검증된 설정을 전제로 하며, `skopeo`가 아니면 podman으로 취급합니다.
    pub fn from_config(config: &VerifyConfig) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_owned());
        if config.tool == SKOPEO {
            return Self::Skopeo {
                arch: non_empty(&config.override_arch),
                os: non_empty(&config.override_os),
                timeout: Duration::from_secs(config.inspect_timeout_secs),
            };
        }
        if !config.override_arch.is_empty() || !config.override_os.is_empty() {
            warn!("architecture/OS overrides are only supported with skopeo, ignoring");
        }
        Self::Podman {
            pull_on_miss: config.pull_on_miss,
            inspect_timeout: Duration::from_secs(config.local_inspect_timeout_secs),
            pull_timeout: Duration::from_secs(config.pull_timeout_secs),
        }
    }

    /// 실행 파일 이름
    pub fn program(&self) -> &'static str {
        match self {
            Self::Skopeo { .. } => SKOPEO,
            Self::Podman { .. } => PODMAN,
        }
    }

    /// 아키텍처 오버라이드 (skopeo 전용)
    pub fn arch(&self) -> Option<&str> {
        match self {
            Self::Skopeo { arch, .. } => arch.as_deref(),
            Self::Podman { .. } => None,
        }
    }

    /// OS 오버라이드 (skopeo 전용)
    pub fn os(&self) -> Option<&str> {
        match self {
            Self::Skopeo { os, .. } => os.as_deref(),
            Self::Podman { .. } => None,
        }
    }
}

/// 이미지 단위 검증 실패
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyFailure {
    /// 실패 사유
    pub reason: String,
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for VerifyFailure {}

/// 검증 결과와 소요 시간
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    /// 성공 여부
    pub result: Result<(), VerifyFailure>,
    /// 호출에 걸린 시간
    pub elapsed: Duration,
}

impl VerifyOutcome {
    /// 접근 가능 여부
    pub fn is_accessible(&self) -> bool {
        self.result.is_ok()
    }
}

/// 이미지 검증기
pub struct Verifier<R: CommandRunner> {
    runner: R,
    method: VerifyMethod,
}

impl<R: CommandRunner> Verifier<R> {
    /// 새 검증기를 생성합니다.
    pub fn new(runner: R, method: VerifyMethod) -> Self {
        Self { runner, method }
    }

    /// 검증 방식
    pub fn method(&self) -> &VerifyMethod {
        &self.method
    }

    /// 러너 참조
    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn skopeo_command(
        reference: &str,
        arch: Option<&str>,
        os: Option<&str>,
        timeout: Duration,
    ) -> CommandSpec {
        let mut spec = CommandSpec::new(SKOPEO).args(["inspect", "--raw"]);
        if let Some(arch) = arch {
            spec = spec.args(["--override-arch", arch]);
        }
        if let Some(os) = os {
            spec = spec.args(["--override-os", os]);
        }
        spec.arg(format!("docker://{reference}")).timeout(timeout)
    }

    /// 이미지 하나의 접근 가능 여부를 확인합니다.
    pub async fn verify(&self, reference: &str) -> VerifyOutcome {
        let started = Instant::now();
        let result = self.verify_inner(reference).await;
        let elapsed = started.elapsed();
        debug!(
            reference,
            ok = result.is_ok(),
            elapsed_ms = elapsed.as_millis() as u64,
            "verified"
        );
        VerifyOutcome { result, elapsed }
    }

    async fn verify_inner(&self, reference: &str) -> Result<(), VerifyFailure> {
        match &self.method {
            VerifyMethod::Skopeo { arch, os, timeout } => {
                let spec = Self::skopeo_command(
                    reference,
                    arch.as_deref(),
                    os.as_deref(),
                    *timeout,
                );
                self.run_checked(&spec).await
            }
            VerifyMethod::Podman {
                pull_on_miss,
                inspect_timeout,
                pull_timeout,
            } => {
                let inspect = CommandSpec::new(PODMAN)
                    .args(["image", "inspect", reference])
                    .timeout(*inspect_timeout);
                match self.run_checked(&inspect).await {
                    Ok(()) => Ok(()),
                    Err(failure) if !*pull_on_miss => Err(failure),
                    Err(_) => {
                        debug!(reference, "not in local store, pulling");
                        let pull = CommandSpec::new(PODMAN)
                            .args(["pull", "-q", reference])
                            .timeout(*pull_timeout);
                        self.run_checked(&pull).await
                    }
                }
            }
        }
    }

    async fn run_checked(&self, spec: &CommandSpec) -> Result<(), VerifyFailure> {
        match self.runner.run(spec).await {
            Ok(out) if out.is_success() => Ok(()),
            Ok(out) => Err(VerifyFailure {
                reason: out.describe_failure(),
            }),
            Err(e) => Err(VerifyFailure {
                reason: e.to_string(),
            }),
        }
    }
}
