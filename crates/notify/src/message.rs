//! 스캔 결과 → 채팅 메시지
//!
//! # 요약 형식
//!
//! ```text
//! header    {🚨|⚠️|✅} CVE ALERT - {product} {version} Scan Results
//! section   스캔 시각, 성공/실패 수
//! section   전체 취약점 수 (CRITICAL, HIGH)
//! divider
//! section   추세 (이전 스캔이 있을 때)
//! divider
//! section   위험 평가
//! section   권장 조치
//! context   후속 조치 (critical > 0 또는 실패 > 10)
//! ```
//!
//! threaded 모드에서는 비교 상세, 상위 영향 컴포넌트, 전체 컴포넌트 목록을
//! 각각 스레드 답글로 보냅니다.

use std::collections::BTreeMap;

use relscan_core::{DigestClass, Manifest, Severity};
use relscan_vuln_report::{
    ComparisonEntry, ComparisonResult, ImageResult, Totals, VulnerabilitySummary,
};

use crate::blocks::{Block, Message};

/// 요약 메시지에 나열하는 최대 항목 수
pub const LIST_LIMIT: usize = 10;
/// 상세 형식에서 이미지당 보여 주는 CVE 수
pub const DETAIL_LIMIT: usize = 5;
/// 상위 영향 컴포넌트 항목에서 보여 주는 CVE 링크 수
const LINK_LIMIT: usize = 5;
/// 스레드 답글 대체 텍스트
pub const THREAD_FALLBACK_TEXT: &str = "CVE scan details";

const NVD_URL: &str = "https://nvd.nist.gov/vuln/detail/";
const SEPARATOR: &str = "───────────────────";

/// 메시지 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    /// 전체 요약 + 위험 평가
    Summary,
    /// 이미지별 상세
    Detailed,
}

impl MessageFormat {
    /// 설정 문자열을 해석합니다. `detailed`가 아니면 요약입니다.
    pub fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case("detailed") {
            Self::Detailed
        } else {
            Self::Summary
        }
    }
}

/// 메시지 생성에 필요한 이미지 정보
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentInfo {
    /// 전체 참조 (`remote/name@digest`)
    pub reference: Option<String>,
    /// 플레이스홀더 다이제스트 여부
    pub placeholder: bool,
}

/// 메시지 입력
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// 제품 이름
    pub product: String,
    /// 릴리스 버전
    pub version: String,
    /// 스캔 시각 (표시용)
    pub scan_time: String,
    /// 매니페스트 순서의 이미지별 결과
    pub results: Vec<ImageResult>,
    /// 이미지 키 → 참조 정보
    pub components: BTreeMap<String, ComponentInfo>,
    /// 이전 스캔과의 비교
    pub comparison: Option<ComparisonResult>,
}

impl ReportContext {
    /// 결과 목록으로 컨텍스트를 생성합니다. 스캔 시각은 현재 로컬 시각입니다.
    pub fn new(
        product: impl Into<String>,
        version: impl Into<String>,
        results: Vec<ImageResult>,
    ) -> Self {
        Self {
            product: product.into(),
            version: version.into(),
            scan_time: chrono::Local::now().format("%Y-%m-%d %H:%M").to_string(),
            results,
            components: BTreeMap::new(),
            comparison: None,
        }
    }

    /// 매니페스트에서 이미지 참조 정보를 채웁니다.
    pub fn with_manifest(mut self, manifest: &Manifest) -> Self {
        self.components = manifest
            .images
            .iter()
            .map(|image| {
                let info = ComponentInfo {
                    reference: image.full_reference(),
                    placeholder: image.digest_class() == DigestClass::Placeholder,
                };
                (image.key.clone(), info)
            })
            .collect();
        self
    }

    /// 비교 결과를 설정합니다.
    pub fn with_comparison(mut self, comparison: Option<ComparisonResult>) -> Self {
        self.comparison = comparison;
        self
    }

    /// 스캔 시각을 고정합니다.
    pub fn with_scan_time(mut self, scan_time: impl Into<String>) -> Self {
        self.scan_time = scan_time.into();
        self
    }

    fn component(&self, key: &str) -> Option<&ComponentInfo> {
        self.components.get(key)
    }
}

/// 전송할 메시지 묶음
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// 본문 메시지
    pub main: Message,
    /// 스레드 답글 (webhook 모드에서는 비어 있음)
    pub threads: Vec<Message>,
}

/// 릴리스 위험도
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// critical 합계로 위험도를 결정합니다.
    pub fn from_critical(critical: u64) -> Self {
        match critical {
            0 => Self::Low,
            1..=10 => Self::Medium,
            _ => Self::High,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    fn emoji(self) -> &'static str {
        match self {
            Self::High => "🔴",
            Self::Medium => "🟠",
            Self::Low => "🟢",
        }
    }
}

/// 형식과 모드에 맞는 메시지를 생성합니다.
///
/// 상세 형식은 항상 단일 메시지입니다.
pub fn build(context: &ReportContext, format: MessageFormat, threaded: bool) -> Notification {
    match format {
        MessageFormat::Summary => build_summary(context, threaded),
        MessageFormat::Detailed => Notification {
            main: build_detailed(context),
            threads: Vec::new(),
        },
    }
}

/// 요약 메시지
pub fn build_summary(context: &ReportContext, threaded: bool) -> Notification {
    let totals = Totals::from_results(&context.results);
    let top = top_impacted(&context.results);

    let mut blocks = vec![
        Block::header(format!(
            "{} CVE ALERT - {} {} Scan Results",
            header_emoji(totals.critical),
            context.product,
            context.version
        )),
        Block::section(scan_overview(context, &totals)),
        Block::section(format!(
            "🛑 *Total Vulnerabilities:* {}\n   • {} CRITICAL\n   • {} HIGH",
            totals.total, totals.critical, totals.high
        )),
        Block::Divider,
    ];

    if let Some(comparison) = &context.comparison {
        blocks.push(Block::section(trend_text(comparison)));
        blocks.push(Block::Divider);
    }

    blocks.push(Block::Divider);
    blocks.push(Block::section(risk_text(&totals)));
    blocks.push(Block::section(actions_text(
        &totals,
        top.first().map(|r| r.key.as_str()),
    )));

    if totals.critical > 0 || totals.failed > 10 {
        blocks.push(Block::Divider);
        blocks.push(Block::context(follow_up_text(totals.critical > 0)));
    }

    let header = blocks
        .first()
        .and_then(Block::text)
        .unwrap_or_default()
        .to_owned();
    let main = Message::new(blocks).with_text(header);

    let mut threads = Vec::new();
    if threaded {
        if let Some(text) = context.comparison.as_ref().and_then(comparison_details) {
            threads.push(thread_reply(text));
        }
        if !top.is_empty() {
            threads.push(thread_reply(top_impacted_text(context, &top)));
        }
        threads.push(thread_reply(all_components_text(context)));
    }

    Notification { main, threads }
}

/// 상세 메시지: 취약점이 있는 이미지별 심각도와 CVE 목록
pub fn build_detailed(context: &ReportContext) -> Message {
    let mut blocks = vec![Block::header(format!(
        "🔒 Detailed CVE Report - {} {}",
        context.product, context.version
    ))];

    for result in &context.results {
        let Some(summary) = result.summary() else {
            continue;
        };
        if summary.total == 0 {
            continue;
        }
        let emoji = if summary.critical > 0 { "🔴" } else { "🟠" };
        blocks.push(Block::section(format!(
            "{emoji} *{}* - {} CVEs\n• {} CRITICAL, {} HIGH, {} MEDIUM, {} LOW",
            result.key, summary.total, summary.critical, summary.high, summary.medium, summary.low
        )));

        if !summary.details.is_empty() {
            let list: Vec<String> = summary
                .details
                .iter()
                .take(DETAIL_LIMIT)
                .map(|d| format!("  - {} ({}): {}", d.id, d.severity, d.title))
                .collect();
            blocks.push(Block::section(format!("```{}```", list.join("\n"))));
        }
    }

    Message::new(blocks).with_text(format!(
        "Detailed CVE Report - {} {}",
        context.product, context.version
    ))
}

fn thread_reply(text: String) -> Message {
    Message::new(vec![Block::section(text)]).with_text(THREAD_FALLBACK_TEXT)
}

fn header_emoji(critical: u64) -> &'static str {
    match critical {
        0 => "✅",
        1..=10 => "⚠️",
        _ => "🚨",
    }
}

fn failure_rate(totals: &Totals) -> u64 {
    let attempted = totals.scanned + totals.failed;
    if attempted == 0 {
        return 0;
    }
    (totals.failed * 100 / attempted) as u64
}

fn signed(value: i64) -> String {
    format!("{value:+}")
}

fn scan_overview(context: &ReportContext, totals: &Totals) -> String {
    let mut text = format!(
        "📅 *Scan Time:* {}\n📦 *Images Scanned:* {} successful, {} failed",
        context.scan_time, totals.scanned, totals.failed
    );
    if totals.failed > 10 {
        text.push_str(&format!(" (⚠️ {}% failure rate)", failure_rate(totals)));
    }
    text
}

fn trend_text(comparison: &ComparisonResult) -> String {
    let net = comparison.net_change;
    let emoji = match net.critical {
        c if c < 0 => "📉",
        c if c > 0 => "📈",
        _ => "➡️",
    };

    let mut text = format!("{emoji} *CVE Trends (vs. previous scan):*\n");
    if net.total == 0 {
        text.push_str("   • No change in total CVE count\n");
    } else {
        text.push_str(&format!("   • Total CVEs: {}\n", signed(net.total)));
    }
    if net.critical != 0 {
        text.push_str(&format!("   • CRITICAL: {}\n", signed(net.critical)));
    }
    if net.high != 0 {
        text.push_str(&format!("   • HIGH: {}\n", signed(net.high)));
    }

    let counts = [
        (comparison.improved.len(), "✅", "component(s) improved"),
        (comparison.worsened.len(), "⚠️", "component(s) worsened"),
        (comparison.new_components.len(), "🆕", "new component(s)"),
        (
            comparison.removed_components.len(),
            "➖",
            "component(s) removed",
        ),
        (
            comparison.failed_components.len(),
            "❌",
            "component(s) not compared (scan failed)",
        ),
    ];
    for (count, emoji, label) in counts {
        if count > 0 {
            text.push_str(&format!("   • {emoji} {count} {label}\n"));
        }
    }
    text
}

fn risk_text(totals: &Totals) -> String {
    let risk = RiskLevel::from_critical(totals.critical);
    let mut text = format!(
        "{} *Risk Assessment:*\n   • Production release risk: *{}*\n",
        risk.emoji(),
        risk.label()
    );
    if totals.critical > 0 {
        text.push_str(&format!(
            "   • {} CRITICAL vulnerabilities present in runtime components\n",
            totals.critical
        ));
    }
    if totals.failed > 20 {
        text.push_str(&format!(
            "   • Scan reliability degraded ({}% failure rate)\n",
            failure_rate(totals)
        ));
    }
    text
}

fn actions_text(totals: &Totals, top_image: Option<&str>) -> String {
    let mut actions = Vec::new();
    if totals.failed > 10 {
        actions.push(format!(
            "Investigate {} scan failures (registry/auth/connectivity?)",
            totals.failed
        ));
    }
    if totals.critical > 5 {
        actions.push("Block release promotion until CRITICAL CVEs are reviewed".to_owned());
    }
    if let Some(image) = top_image {
        actions.push(format!("Triage `{image}` first (highest concentration of CRIT)"));
    }
    actions.push("Check detailed reports in workflow artifacts".to_owned());
    if totals.high > 50 {
        actions.push("Verify base image updates for affected components".to_owned());
    }

    let mut text = "🎯 *Recommended Actions:*\n".to_owned();
    for (i, action) in actions.iter().enumerate() {
        text.push_str(&format!("{}. {action}\n", i + 1));
    }
    text
}

fn follow_up_text(has_critical: bool) -> String {
    let mut text = "🧪 *Suggested Follow-up:*\n".to_owned();
    text.push_str("• Re-run full scan to confirm results\n");
    text.push_str("• Compare image digests between scans\n");
    if has_critical {
        text.push_str("• Check for upstream base image CVE disclosures\n");
        text.push_str("• Scan specific images locally:\n");
        text.push_str("  ```trivy image --severity HIGH,CRITICAL <image-reference>```\n");
    }
    text
}

fn comparison_line(entry: &ComparisonEntry) -> String {
    let critical = entry.critical_delta();
    let critical_note = if critical != 0 {
        format!(" ({} CRIT)", signed(critical))
    } else {
        String::new()
    };
    format!(
        "  • {}: {} → {} ({}{critical_note})\n",
        entry.key,
        entry.previous_count,
        entry.current_count,
        signed(entry.delta)
    )
}

fn push_overflow(text: &mut String, len: usize) {
    if len > LIST_LIMIT {
        text.push_str(&format!("  ... and {} more\n", len - LIST_LIMIT));
    }
}

/// 비교 상세 (악화 → 개선 → 신규 → 제거 → 스캔 실패). 내용이 없으면 `None`
fn comparison_details(comparison: &ComparisonResult) -> Option<String> {
    let mut text = String::new();

    let worsened = comparison.worsened_worst_first();
    if !worsened.is_empty() {
        text.push_str("⚠️ *Worsened Components:*\n");
        for entry in worsened.iter().take(LIST_LIMIT) {
            text.push_str(&comparison_line(entry));
        }
        push_overflow(&mut text, worsened.len());
        text.push('\n');
    }

    let improved = comparison.improved_best_first();
    if !improved.is_empty() {
        text.push_str("✅ *Improved Components:*\n");
        for entry in improved.iter().take(LIST_LIMIT) {
            text.push_str(&comparison_line(entry));
        }
        push_overflow(&mut text, improved.len());
        text.push('\n');
    }

    for (title, keys) in [
        ("🆕 *New Components:*\n", &comparison.new_components),
        ("➖ *Removed Components:*\n", &comparison.removed_components),
        (
            "❌ *Not Compared (scan failed):*\n",
            &comparison.failed_components,
        ),
    ] {
        if keys.is_empty() {
            continue;
        }
        text.push_str(title);
        for key in keys.iter().take(LIST_LIMIT) {
            text.push_str(&format!("  • {key}\n"));
        }
        push_overflow(&mut text, keys.len());
        text.push('\n');
    }

    let text = text.trim_end().to_owned();
    (!text.is_empty()).then_some(text)
}

/// critical이 있는 이미지를 (critical, high) 내림차순으로 최대 10개
fn top_impacted(results: &[ImageResult]) -> Vec<&ImageResult> {
    let mut impacted: Vec<_> = results
        .iter()
        .filter(|r| r.summary().is_some_and(|s| s.critical > 0))
        .collect();
    impacted.sort_by(|a, b| {
        let weight = |r: &ImageResult| r.summary().map_or((0, 0), |s| (s.critical, s.high));
        weight(b).cmp(&weight(a)).then_with(|| a.key.cmp(&b.key))
    });
    impacted
}

fn remediation(summary: &VulnerabilitySummary) -> String {
    let total = summary.has_fix + summary.no_fix;
    if total == 0 {
        "Monitor for updates".to_owned()
    } else if summary.has_fix == total {
        format!("✅ All {total} CVEs fixable")
    } else if summary.has_fix > 0 {
        format!("⚠️ {}/{total} CVEs fixable", summary.has_fix)
    } else {
        "❌ No fixes available".to_owned()
    }
}

fn top_impacted_text(context: &ReportContext, impacted: &[&ImageResult]) -> String {
    let mut text = if impacted.len() > LIST_LIMIT {
        format!(
            "🔥 *Top {LIST_LIMIT} Impacted Components ({} total with CRITICAL CVEs):*\n",
            impacted.len()
        )
    } else {
        format!(
            "🔥 *Top Impacted Components ({} with CRITICAL CVEs):*\n",
            impacted.len()
        )
    };

    for result in impacted.iter().take(LIST_LIMIT) {
        let Some(summary) = result.summary() else {
            continue;
        };
        let reference = context
            .component(&result.key)
            .and_then(|c| c.reference.as_deref())
            .unwrap_or_default();

        text.push_str(&format!("\n🔴 *{}*\n", result.key));
        text.push_str(&format!("{} CRIT, {} HIGH\n", summary.critical, summary.high));
        text.push_str(&format!("`{reference}`\n"));

        let links: Vec<String> = summary
            .details
            .iter()
            .take(LINK_LIMIT)
            .filter(|d| d.severity == Severity::Critical)
            .map(|d| format!("<{NVD_URL}{}|{}>", d.id, d.id))
            .collect();
        if !links.is_empty() {
            text.push_str(&links.join(" "));
            text.push('\n');
        }

        text.push_str(&remediation(summary));
        text.push('\n');
        text.push_str(SEPARATOR);
        text.push('\n');
    }
    text
}

fn all_components_text(context: &ReportContext) -> String {
    let mut sorted: Vec<&ImageResult> = context.results.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let mut text = format!(
        "📋 *All Components ({} total, alphabetically):*\n",
        sorted.len()
    );
    for result in sorted {
        let placeholder = context.component(&result.key).is_some_and(|c| c.placeholder);
        let line = match result.summary() {
            Some(s) if s.has_breakdown() => {
                let emoji = if s.critical > 0 {
                    "🔴"
                } else if s.high > 0 {
                    "🟠"
                } else {
                    "🟢"
                };
                format!(
                    "{emoji} {}: {} CVEs ({} CRIT, {} HIGH)",
                    result.key, s.total, s.critical, s.high
                )
            }
            Some(s) => format!(
                "❓ {}: {} CVEs (no severity breakdown)",
                result.key, s.total
            ),
            None if placeholder => format!("⚪ {}: PLACEHOLDER SHA", result.key),
            None => format!("❌ {}: SCAN FAILED", result.key),
        };
        text.push_str(&line);
        text.push('\n');
    }
    text
}
