//! 도구 설치 여부와 컨테이너 런타임 환경 탐지

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::ToolError;
use crate::runner::{CommandRunner, CommandSpec};
use crate::scanner::PODMAN;

/// 버전 확인 타임아웃
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);
/// podman machine inspect 타임아웃
const MACHINE_INSPECT_TIMEOUT: Duration = Duration::from_secs(10);
/// 기본 podman machine 이름
pub const DEFAULT_MACHINE: &str = "podman-machine-default";

/// `PROGRAM --version`이 실행되면 설치된 것으로 봅니다.
///
/// 실행 자체가 불가능한 경우에만 false입니다. 종료 코드는 보지 않습니다.
pub async fn is_available<R: CommandRunner>(runner: &R, program: &str) -> bool {
    let spec = CommandSpec::new(program)
        .arg("--version")
        .timeout(VERSION_TIMEOUT);
    match runner.run(&spec).await {
        Ok(_) => true,
        Err(e) => {
            debug!(program, error = %e, "tool not available");
            false
        }
    }
}

/// 필수 도구가 없으면 [`ToolError::Unavailable`]을 반환합니다.
pub async fn ensure_available<R: CommandRunner>(
    runner: &R,
    program: &str,
) -> Result<(), ToolError> {
    if is_available(runner, program).await {
        Ok(())
    } else {
        Err(ToolError::Unavailable {
            tool: program.to_owned(),
        })
    }
}

/// podman machine의 API 소켓 경로를 찾습니다.
///
/// `podman machine inspect` 출력(배열 또는 객체)의 `ConnectionInfo.PodmanSocket.Path`가
/// 존재하는 파일일 때만 반환합니다.
pub async fn podman_socket<R: CommandRunner>(runner: &R) -> Option<PathBuf> {
    let spec = CommandSpec::new(PODMAN)
        .args(["machine", "inspect", DEFAULT_MACHINE])
        .timeout(MACHINE_INSPECT_TIMEOUT);
    let output = runner.run(&spec).await.ok()?;
    if !output.is_success() {
        return None;
    }
    let path = socket_path_from_inspect(&output.stdout)?;
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        info!(socket = %path.display(), "podman machine socket found");
        Some(path)
    } else {
        debug!(socket = %path.display(), "podman machine socket missing");
        None
    }
}

/// `podman machine inspect` JSON에서 소켓 경로를 추출합니다.
pub fn socket_path_from_inspect(raw: &[u8]) -> Option<PathBuf> {
    let value: Value = serde_json::from_slice(raw).ok()?;
    let machine = match &value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    machine
        .pointer("/ConnectionInfo/PodmanSocket/Path")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

/// `~/.config/containers/auth.json`이 있으면 반환합니다.
pub fn registry_auth_file() -> Option<PathBuf> {
    dirs::home_dir().and_then(|home| auth_file_in(&home))
}

/// 주어진 홈 디렉토리 아래의 레지스트리 인증 파일
pub fn auth_file_in(home: &Path) -> Option<PathBuf> {
    let path = home.join(".config").join("containers").join("auth.json");
    path.is_file().then_some(path)
}
