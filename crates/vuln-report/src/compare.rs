//! 릴리스 간 스캔 비교
//!
//! 현재와 이전 릴리스의 이미지별 요약을 비교해 추세를 계산합니다.
//! 개선/악화 판단에는 severity weight(critical + high)만 사용합니다.
//!
//! 입력이 `BTreeMap`이므로 결과 목록은 키 순서로 결정적입니다.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::VulnReportError;
use crate::layout::summary_map;
use crate::summary::{ImageResult, VulnerabilitySummary};

/// 이미지 키 → 요약
pub type SummaryMap = BTreeMap<String, VulnerabilitySummary>;

/// 양쪽에 모두 있는 이미지의 변화
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonEntry {
    pub key: String,
    /// 이전 severity weight
    pub previous_count: u64,
    /// 현재 severity weight
    pub current_count: u64,
    /// `current_count - previous_count`
    pub delta: i64,
    pub previous_critical: u64,
    pub current_critical: u64,
}

impl ComparisonEntry {
    /// critical만의 변화량
    pub fn critical_delta(&self) -> i64 {
        signed_diff(self.current_critical, self.previous_critical)
    }
}

/// 전체 합계의 변화량
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetChange {
    pub critical: i64,
    pub high: i64,
    pub total: i64,
}

/// 비교 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    /// 현재에만 있는 이미지
    pub new_components: Vec<String>,
    /// 이전에만 있는 이미지
    pub removed_components: Vec<String>,
    pub improved: Vec<ComparisonEntry>,
    pub worsened: Vec<ComparisonEntry>,
    pub unchanged: Vec<String>,
    /// 현재 스캔이 실패해 비교에서 빠진 이미지
    ///
    /// 제거된 이미지로 취급하지 않으며 `net_change` 어느 쪽에도 포함되지 않습니다.
    pub failed_components: Vec<String>,
    pub net_change: NetChange,
}

impl ComparisonResult {
    /// 악화 목록을 delta 내림차순(가장 나빠진 것 먼저)으로 반환합니다.
    pub fn worsened_worst_first(&self) -> Vec<&ComparisonEntry> {
        let mut entries: Vec<_> = self.worsened.iter().collect();
        entries.sort_by(|a, b| b.delta.cmp(&a.delta).then_with(|| a.key.cmp(&b.key)));
        entries
    }

    /// 개선 목록을 delta 오름차순(가장 좋아진 것 먼저)으로 반환합니다.
    pub fn improved_best_first(&self) -> Vec<&ComparisonEntry> {
        let mut entries: Vec<_> = self.improved.iter().collect();
        entries.sort_by(|a, b| a.delta.cmp(&b.delta).then_with(|| a.key.cmp(&b.key)));
        entries
    }

    /// 변화가 하나라도 있는지
    pub fn has_changes(&self) -> bool {
        !self.new_components.is_empty()
            || !self.removed_components.is_empty()
            || !self.improved.is_empty()
            || !self.worsened.is_empty()
    }
}

/// 두 요약 집합을 비교합니다.
///
/// 어느 한쪽에라도 table 아티팩트에서 나온 요약이 있으면
/// [`VulnReportError::UnsupportedComparison`]을 반환합니다 (현재 쪽을 먼저 검사).
pub fn compare(
    current: &SummaryMap,
    previous: &SummaryMap,
) -> Result<ComparisonResult, VulnReportError> {
    for (key, summary) in current.iter().chain(previous.iter()) {
        if !summary.has_breakdown() {
            return Err(VulnReportError::UnsupportedComparison { key: key.clone() });
        }
    }

    let (cur_critical, cur_high, cur_total) = sums(current);
    let (prev_critical, prev_high, prev_total) = sums(previous);

    let mut result = ComparisonResult {
        net_change: NetChange {
            critical: signed_diff(cur_critical, prev_critical),
            high: signed_diff(cur_high, prev_high),
            total: signed_diff(cur_total, prev_total),
        },
        ..ComparisonResult::default()
    };

    for (key, cur) in current {
        let Some(prev) = previous.get(key) else {
            result.new_components.push(key.clone());
            continue;
        };

        let current_count = cur.severity_weight();
        let previous_count = prev.severity_weight();
        let entry = ComparisonEntry {
            key: key.clone(),
            previous_count,
            current_count,
            delta: signed_diff(current_count, previous_count),
            previous_critical: prev.critical,
            current_critical: cur.critical,
        };

        match current_count.cmp(&previous_count) {
            std::cmp::Ordering::Less => result.improved.push(entry),
            std::cmp::Ordering::Greater => result.worsened.push(entry),
            std::cmp::Ordering::Equal => result.unchanged.push(key.clone()),
        }
    }

    result.removed_components = previous
        .keys()
        .filter(|key| !current.contains_key(*key))
        .cloned()
        .collect();

    Ok(result)
}

/// 현재 스캔 결과 목록과 이전 요약 집합을 비교합니다.
///
/// 현재 스캔이 실패한 이미지는 이전 집합에서도 빼고
/// `failed_components`에 따로 기록합니다.
pub fn compare_results(
    current: &[ImageResult],
    previous: &SummaryMap,
) -> Result<ComparisonResult, VulnReportError> {
    let mut failed: Vec<String> = current
        .iter()
        .filter(|r| r.is_failed())
        .map(|r| r.key.clone())
        .collect();
    failed.sort();
    failed.dedup();

    let succeeded = summary_map(current);
    let comparable: SummaryMap = previous
        .iter()
        .filter(|(key, _)| failed.binary_search(*key).is_err())
        .map(|(key, summary)| (key.clone(), summary.clone()))
        .collect();

    let mut result = compare(&succeeded, &comparable)?;
    result.failed_components = failed;
    Ok(result)
}

fn sums(map: &SummaryMap) -> (u64, u64, u64) {
    map.values().fold((0, 0, 0), |(c, h, t), s| {
        (c + s.critical, h + s.high, t + s.total)
    })
}

fn signed_diff(current: u64, previous: u64) -> i64 {
    i64::try_from(current).unwrap_or(i64::MAX) - i64::try_from(previous).unwrap_or(i64::MAX)
}
