//! 매니페스트 모델: 릴리스 버전별 이미지 선언 목록
//!
//! 매니페스트는 이미지 레코드의 JSON 배열이며,
//! 파일 이름(확장자 제외)이 릴리스 버전 식별자입니다.
//!
//! ```json
//! [
//!   {
//!     "image-key": "console",
//!     "image-remote": "quay.io/stolostron",
//!     "image-name": "console",
//!     "image-digest": "sha256:...",
//!     "git-url": "https://github.com/stolostron/console",
//!     "git-revision": "a1b2c3"
//!   }
//! ]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::digest::{self, DigestClass};
use crate::error::{ConfigError, ManifestError};

/// 이미지 키가 없을 때 사용하는 값
pub const UNKNOWN_KEY: &str = "unknown";

/// 선언된 이미지 하나
///
/// 비어 있는 문자열 필드는 `None`으로 정규화됩니다.
/// 다이제스트는 형식이 틀려도 거부하지 않고 그대로 보존합니다 (보고 대상 데이터).
/// 직렬화도 매니페스트와 같은 키 이름을 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawImageRecord")]
pub struct ImageRecord {
    /// 매니페스트 내 고유 키 (없으면 `"unknown"`)
    #[serde(rename = "image-key")]
    pub key: String,
    /// 레지스트리/저장소 경로
    #[serde(rename = "image-remote", skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// 이미지 이름
    #[serde(rename = "image-name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 콘텐츠 다이제스트
    #[serde(rename = "image-digest", skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// 소스 저장소 URL
    #[serde(rename = "git-url", skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    /// 소스 리비전
    #[serde(rename = "git-revision", skip_serializing_if = "Option::is_none")]
    pub git_revision: Option<String>,
}

#[derive(Deserialize)]
struct RawImageRecord {
    #[serde(rename = "image-key")]
    key: Option<String>,
    #[serde(rename = "image-remote")]
    remote: Option<String>,
    #[serde(rename = "image-name")]
    name: Option<String>,
    #[serde(rename = "image-digest")]
    digest: Option<String>,
    #[serde(rename = "git-url")]
    git_url: Option<String>,
    #[serde(rename = "git-revision")]
    git_revision: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl From<RawImageRecord> for ImageRecord {
    fn from(raw: RawImageRecord) -> Self {
        Self {
            key: non_empty(raw.key).unwrap_or_else(|| UNKNOWN_KEY.to_owned()),
            remote: non_empty(raw.remote),
            name: non_empty(raw.name),
            digest: non_empty(raw.digest),
            git_url: non_empty(raw.git_url),
            git_revision: non_empty(raw.git_revision),
        }
    }
}

impl ImageRecord {
    /// 키만 가진 레코드를 생성합니다. 나머지 필드는 빌더 메서드로 채웁니다.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            key: if key.is_empty() {
                UNKNOWN_KEY.to_owned()
            } else {
                key
            },
            remote: None,
            name: None,
            digest: None,
            git_url: None,
            git_revision: None,
        }
    }

    /// 레지스트리, 이름, 다이제스트를 설정합니다.
    pub fn with_image(
        mut self,
        remote: impl Into<String>,
        name: impl Into<String>,
        digest: impl Into<String>,
    ) -> Self {
        self.remote = non_empty(Some(remote.into()));
        self.name = non_empty(Some(name.into()));
        self.digest = non_empty(Some(digest.into()));
        self
    }

    /// git 출처 정보를 설정합니다.
    pub fn with_git(mut self, url: impl Into<String>, revision: impl Into<String>) -> Self {
        self.git_url = non_empty(Some(url.into()));
        self.git_revision = non_empty(Some(revision.into()));
        self
    }

    /// `{remote}/{name}@{digest}` (없는 부분은 빈 문자열)
    pub fn reference(&self) -> String {
        format!(
            "{}/{}@{}",
            self.remote.as_deref().unwrap_or_default(),
            self.name.as_deref().unwrap_or_default(),
            self.digest_str(),
        )
    }

    /// 세 부분이 모두 있을 때만 전체 참조를 반환합니다.
    pub fn full_reference(&self) -> Option<String> {
        match (&self.remote, &self.name, &self.digest) {
            (Some(remote), Some(name), Some(digest)) => Some(format!("{remote}/{name}@{digest}")),
            _ => None,
        }
    }

    /// 레지스트리 (없으면 `"unknown"`)
    pub fn registry(&self) -> &str {
        self.remote.as_deref().unwrap_or(UNKNOWN_KEY)
    }

    /// 다이제스트 문자열 (없으면 빈 문자열)
    pub fn digest_str(&self) -> &str {
        self.digest.as_deref().unwrap_or_default()
    }

    /// git URL과 리비전이 모두 있는지
    pub fn has_git_info(&self) -> bool {
        self.git_url.is_some() && self.git_revision.is_some()
    }

    /// 다이제스트 분류
    pub fn digest_class(&self) -> DigestClass {
        digest::classify(self.digest_str())
    }

    /// 표시용 다이제스트. `full`이 false면 12자로 줄입니다.
    pub fn display_digest(&self, full: bool) -> &str {
        if full {
            self.digest_str()
        } else {
            digest::short_digest(self.digest_str())
        }
    }
}

/// 릴리스 버전 하나의 매니페스트
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    /// 릴리스 버전 (파일 이름에서 확장자 제외)
    pub version: String,
    /// 원본 파일 경로
    pub path: PathBuf,
    /// 선언된 이미지 (파일 순서 유지)
    pub images: Vec<ImageRecord>,
}

impl Manifest {
    /// 매니페스트 파일을 읽고 파싱합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| ManifestError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_slice(path, &bytes)
    }

    /// 바이트 슬라이스에서 매니페스트를 파싱합니다.
    pub fn from_slice(path: impl AsRef<Path>, bytes: &[u8]) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let images: Vec<ImageRecord> =
            serde_json::from_slice(bytes).map_err(|e| ManifestError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(path = %path.display(), images = images.len(), "manifest parsed");
        Ok(Self {
            version: version_of(path),
            path: path.to_path_buf(),
            images,
        })
    }

    /// 파일 이름
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// 이미지 수
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// 이미지가 없는지
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// 매니페스트 경로에서 릴리스 버전을 추출합니다.
pub fn version_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 매니페스트 디렉토리의 `*.json` 파일 목록
///
/// 디렉토리가 존재하고 JSON 파일이 하나 이상 있음이 보장됩니다.
#[derive(Debug, Clone)]
pub struct ManifestSet {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl ManifestSet {
    /// 디렉토리에서 매니페스트를 찾습니다. 경로 순으로 정렬됩니다.
    pub async fn discover(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let files = discover_manifests(dir).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
        })
    }

    /// 매니페스트 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 정렬된 매니페스트 파일 경로
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// 첫 번째 매니페스트 (알림 대상 버전)
    pub fn primary(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }

    /// 파일 수
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// 파일이 없는지 (`discover`로 만든 경우 항상 false)
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// 디렉토리의 `*.json` 파일을 정렬된 순서로 반환합니다.
pub async fn discover_manifests(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ConfigError> {
    let dir = dir.as_ref();
    let not_found = || ConfigError::ManifestDirNotFound {
        path: dir.display().to_string(),
    };

    if !tokio::fs::metadata(dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(not_found());
    }

    let mut entries = tokio::fs::read_dir(dir).await.map_err(|_| not_found())?;
    let mut files = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(ConfigError::NoManifests {
            path: dir.display().to_string(),
        });
    }

    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "manifests discovered");
    Ok(files)
}
