//! 설정 관리: relscan.toml 파싱 및 런타임 설정
//!
//! [`RelscanConfig`]는 모든 명령의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`RELSCAN_SCAN_SEVERITY=CRITICAL` 형식)
//! 3. 설정 파일 (`relscan.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), relscan_core::error::RelscanError> {
//! use relscan_core::config::RelscanConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = RelscanConfig::load("relscan.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = RelscanConfig::parse("[scan]\nseverity = \"CRITICAL\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, RelscanError};

/// 설정 파일 경로가 주어지지 않았을 때 찾는 기본 파일 이름
pub const DEFAULT_CONFIG_FILE: &str = "relscan.toml";

/// 민감 정보 마스킹 문자열
pub const REDACTED: &str = "***REDACTED***";

/// relscan 통합 설정
///
/// `relscan.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 명령은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelscanConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 경로 설정
    #[serde(default)]
    pub paths: PathsConfig,
    /// 취약점 스캔 설정
    #[serde(default)]
    pub scan: ScanConfig,
    /// 이미지 검증 설정
    #[serde(default)]
    pub verify: VerifyConfig,
    /// 알림 설정
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl RelscanConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RelscanError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일 경로가 선택적인 경우의 로딩
    ///
    /// - 경로가 주어지면 해당 파일을 반드시 로드합니다.
    /// - 경로가 없으면 작업 디렉토리의 `relscan.toml`을 찾고,
    ///   그것도 없으면 기본값에 환경변수 오버라이드만 적용합니다.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, RelscanError> {
        if let Some(path) = path {
            return Self::load(path).await;
        }

        let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
        if tokio::fs::try_exists(&fallback).await.unwrap_or(false) {
            debug!(path = %fallback.display(), "using config file from working directory");
            return Self::load(&fallback).await;
        }

        debug!("no config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RelscanError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelscanError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RelscanError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, RelscanError> {
        toml::from_str(toml_str).map_err(|e| {
            RelscanError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `RELSCAN_{SECTION}_{FIELD}`
    /// 예: `RELSCAN_NOTIFY_CHANNEL=#release-cves`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "RELSCAN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "RELSCAN_GENERAL_LOG_FORMAT");

        // Paths
        override_string(&mut self.paths.manifest_dir, "RELSCAN_PATHS_MANIFEST_DIR");
        override_string(&mut self.paths.reports_dir, "RELSCAN_PATHS_REPORTS_DIR");
        override_string(&mut self.paths.mirror_config, "RELSCAN_PATHS_MIRROR_CONFIG");
        override_string(&mut self.paths.version, "RELSCAN_PATHS_VERSION");

        // Scan
        override_string(&mut self.scan.severity, "RELSCAN_SCAN_SEVERITY");
        override_string(&mut self.scan.timeout, "RELSCAN_SCAN_TIMEOUT");
        override_bool(&mut self.scan.output_json, "RELSCAN_SCAN_OUTPUT_JSON");
        override_u64(
            &mut self.scan.scan_timeout_secs,
            "RELSCAN_SCAN_SCAN_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.scan.pull_timeout_secs,
            "RELSCAN_SCAN_PULL_TIMEOUT_SECS",
        );

        // Verify
        override_string(&mut self.verify.tool, "RELSCAN_VERIFY_TOOL");
        override_string(
            &mut self.verify.override_arch,
            "RELSCAN_VERIFY_OVERRIDE_ARCH",
        );
        override_string(&mut self.verify.override_os, "RELSCAN_VERIFY_OVERRIDE_OS");
        override_u64(
            &mut self.verify.inspect_timeout_secs,
            "RELSCAN_VERIFY_INSPECT_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.verify.local_inspect_timeout_secs,
            "RELSCAN_VERIFY_LOCAL_INSPECT_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.verify.pull_timeout_secs,
            "RELSCAN_VERIFY_PULL_TIMEOUT_SECS",
        );
        override_bool(&mut self.verify.pull_on_miss, "RELSCAN_VERIFY_PULL_ON_MISS");

        // Notify
        override_string(&mut self.notify.webhook_url, "RELSCAN_NOTIFY_WEBHOOK_URL");
        override_string(&mut self.notify.bot_token, "RELSCAN_NOTIFY_BOT_TOKEN");
        override_string(&mut self.notify.channel, "RELSCAN_NOTIFY_CHANNEL");
        override_string(&mut self.notify.api_url, "RELSCAN_NOTIFY_API_URL");
        override_string(&mut self.notify.format, "RELSCAN_NOTIFY_FORMAT");
        override_bool(&mut self.notify.threading, "RELSCAN_NOTIFY_THREADING");
        override_string(
            &mut self.notify.previous_reports_dir,
            "RELSCAN_NOTIFY_PREVIOUS_REPORTS_DIR",
        );
        override_string(&mut self.notify.product, "RELSCAN_NOTIFY_PRODUCT");
        override_string(&mut self.notify.username, "RELSCAN_NOTIFY_USERNAME");
        override_string(&mut self.notify.icon_emoji, "RELSCAN_NOTIFY_ICON_EMOJI");
        override_u64(
            &mut self.notify.request_timeout_secs,
            "RELSCAN_NOTIFY_REQUEST_TIMEOUT_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), RelscanError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.paths.manifest_dir.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "paths.manifest_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.paths.reports_dir.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "paths.reports_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        // severity 필터 검증 (Trivy 심각도 목록)
        let valid_severities = ["UNKNOWN", "LOW", "MEDIUM", "HIGH", "CRITICAL"];
        for part in self.scan.severity.split(',') {
            let part = part.trim();
            if !valid_severities.contains(&part) {
                return Err(ConfigError::InvalidValue {
                    field: "scan.severity".to_owned(),
                    reason: format!(
                        "'{part}' is not a severity, expected comma-separated list of: {}",
                        valid_severities.join(", ")
                    ),
                }
                .into());
            }
        }

        // 타임아웃 검증
        let timeouts = [
            ("scan.scan_timeout_secs", self.scan.scan_timeout_secs),
            ("scan.pull_timeout_secs", self.scan.pull_timeout_secs),
            (
                "verify.inspect_timeout_secs",
                self.verify.inspect_timeout_secs,
            ),
            (
                "verify.local_inspect_timeout_secs",
                self.verify.local_inspect_timeout_secs,
            ),
            ("verify.pull_timeout_secs", self.verify.pull_timeout_secs),
            (
                "notify.request_timeout_secs",
                self.notify.request_timeout_secs,
            ),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "timeout must be greater than 0".to_owned(),
                }
                .into());
            }
        }

        // 검증 도구
        let valid_tools = ["skopeo", "podman"];
        if !valid_tools.contains(&self.verify.tool.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "verify.tool".to_owned(),
                reason: format!("must be one of: {}", valid_tools.join(", ")),
            }
            .into());
        }

        // 알림 메시지 형식
        let valid_notify_formats = ["summary", "detailed"];
        if !valid_notify_formats.contains(&self.notify.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "notify.format".to_owned(),
                reason: format!("must be one of: {}", valid_notify_formats.join(", ")),
            }
            .into());
        }

        Ok(())
    }

    /// 민감 정보(토큰, 웹훅 URL)를 마스킹한 사본을 반환합니다.
    ///
    /// 비어 있는 값은 "설정되지 않음"을 보여주기 위해 그대로 둡니다.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        redact(&mut config.notify.webhook_url);
        redact(&mut config.notify.bot_token);
        config
    }
}

fn redact(value: &mut String) {
    if !value.is_empty() {
        *value = REDACTED.to_owned();
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 입출력 경로 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// 매니페스트(`*.json`) 디렉토리
    pub manifest_dir: String,
    /// 리포트 출력 디렉토리
    pub reports_dir: String,
    /// 미러(ICSP) 설정 파일 경로 (없으면 미러 없이 진행)
    pub mirror_config: String,
    /// 릴리스 버전 오버라이드 (비어 있으면 매니페스트 파일 이름 사용)
    pub version: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            manifest_dir: "extras".to_owned(),
            reports_dir: "reports".to_owned(),
            mirror_config: "icsp-config.json".to_owned(),
            version: String::new(),
        }
    }
}

impl PathsConfig {
    /// 버전 오버라이드가 설정되어 있으면 반환합니다.
    pub fn version_override(&self) -> Option<&str> {
        if self.version.is_empty() {
            None
        } else {
            Some(self.version.as_str())
        }
    }
}

/// 취약점 스캔 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Trivy 심각도 필터 (쉼표 구분)
    pub severity: String,
    /// Trivy 자체 타임아웃 문자열 (`--timeout` 인자)
    pub timeout: String,
    /// JSON 아티팩트 출력 여부 (false면 table 텍스트)
    pub output_json: bool,
    /// 원격/로컬 스캔 프로세스 타임아웃 (초)
    pub scan_timeout_secs: u64,
    /// 이미지 pull 타임아웃 (초)
    pub pull_timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            severity: "HIGH,CRITICAL".to_owned(),
            timeout: "10m".to_owned(),
            output_json: false,
            scan_timeout_secs: 600,
            pull_timeout_secs: 300,
        }
    }
}

/// 이미지 pull 가능 여부 검증 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// 검증 도구 (skopeo, podman)
    pub tool: String,
    /// 아키텍처 오버라이드 (skopeo 전용)
    pub override_arch: String,
    /// OS 오버라이드 (skopeo 전용)
    pub override_os: String,
    /// skopeo inspect 타임아웃 (초)
    pub inspect_timeout_secs: u64,
    /// podman 로컬 image inspect 타임아웃 (초)
    pub local_inspect_timeout_secs: u64,
    /// podman pull 타임아웃 (초)
    pub pull_timeout_secs: u64,
    /// 로컬에 없을 때 pull 시도 여부 (podman 전용)
    pub pull_on_miss: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            tool: "skopeo".to_owned(),
            override_arch: String::new(),
            override_os: String::new(),
            inspect_timeout_secs: 60,
            local_inspect_timeout_secs: 30,
            pull_timeout_secs: 120,
            pull_on_miss: true,
        }
    }
}

/// 채팅 알림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Incoming webhook URL (webhook 모드)
    pub webhook_url: String,
    /// 봇 토큰 (threaded 모드)
    pub bot_token: String,
    /// 채널 (threaded 모드)
    pub channel: String,
    /// chat.postMessage API URL
    pub api_url: String,
    /// 메시지 형식 (summary, detailed)
    pub format: String,
    /// 봇 토큰과 채널이 있을 때 threaded 모드 사용 여부
    pub threading: bool,
    /// 이전 릴리스 리포트 디렉토리 (비어 있으면 추세 비교 생략)
    pub previous_reports_dir: String,
    /// 헤더에 표시할 제품 이름
    pub product: String,
    /// webhook 메시지 사용자 이름
    pub username: String,
    /// webhook 메시지 아이콘
    pub icon_emoji: String,
    /// HTTP 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            bot_token: String::new(),
            channel: String::new(),
            api_url: "https://slack.com/api/chat.postMessage".to_owned(),
            format: "summary".to_owned(),
            threading: true,
            previous_reports_dir: String::new(),
            product: "Release".to_owned(),
            username: "relscan".to_owned(),
            icon_emoji: ":robot_face:".to_owned(),
            request_timeout_secs: 30,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.to_ascii_lowercase().parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
